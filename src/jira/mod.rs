//! Jira REST access
//!
//! Tool handlers only ever talk to Jira through the [`JiraApi`] trait; HTTP
//! details live in [`client::JiraClient`].
pub mod client;
pub mod error;
pub mod field_mapper;
pub mod models;

#[cfg(test)]
pub(crate) mod mock;

pub use self::{
    client::JiraClient,
    error::JiraError,
    field_mapper::{FieldCatalog, FieldMapper, FieldMapperError},
};

use async_trait::async_trait;
use serde_json::{Map, Value};

use self::models::{
    JiraAttachment, JiraComment, JiraCreateMeta, JiraCreatedIssue, JiraField, JiraIssue,
    JiraIssueType, JiraLinkType, JiraProject, JiraTransition, JiraUser,
};

pub type JiraResult<T> = Result<T, JiraError>;

/// One method per Jira REST interaction the tools need
#[async_trait]
pub trait JiraApi: Send + Sync {
    /// Every system and custom field known to the instance
    async fn fields(&self) -> JiraResult<Vec<JiraField>>;

    async fn get_issue(
        &self,
        key: &str,
        fields: Option<&str>,
        expand: Option<&str>,
    ) -> JiraResult<JiraIssue>;

    async fn create_issue(&self, fields: Map<String, Value>) -> JiraResult<JiraCreatedIssue>;

    async fn update_issue(&self, key: &str, fields: Map<String, Value>) -> JiraResult<()>;

    async fn delete_issue(&self, key: &str) -> JiraResult<()>;

    async fn search_issues(
        &self,
        jql: &str,
        max_results: u32,
        fields: &[&str],
    ) -> JiraResult<Vec<JiraIssue>>;

    /// Transitions available from the issue's current status, with their screen fields
    async fn transitions(&self, key: &str) -> JiraResult<Vec<JiraTransition>>;

    async fn transition_issue(
        &self,
        key: &str,
        transition_id: &str,
        fields: Option<Map<String, Value>>,
        comment: Option<&str>,
    ) -> JiraResult<()>;

    async fn add_comment(&self, key: &str, body: &str) -> JiraResult<JiraComment>;

    /// Upload one file; Jira answers with the created attachment records
    async fn add_attachment(
        &self,
        key: &str,
        filename: &str,
        data: Vec<u8>,
    ) -> JiraResult<Vec<JiraAttachment>>;

    async fn attachment(&self, id: &str) -> JiraResult<JiraAttachment>;

    async fn download_attachment(&self, attachment: &JiraAttachment) -> JiraResult<Vec<u8>>;

    async fn issue_types(&self) -> JiraResult<Vec<JiraIssueType>>;

    async fn issue_link_types(&self) -> JiraResult<Vec<JiraLinkType>>;

    async fn create_issue_link(
        &self,
        link_type: &str,
        inward_key: &str,
        outward_key: &str,
    ) -> JiraResult<()>;

    async fn search_users(&self, query: &str) -> JiraResult<Vec<JiraUser>>;

    async fn projects(&self) -> JiraResult<Vec<JiraProject>>;

    async fn create_meta(&self, project_key: &str) -> JiraResult<JiraCreateMeta>;
}
