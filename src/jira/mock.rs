use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::jira::models::{
    JiraAttachment, JiraComment, JiraCommentPage, JiraCreateMeta, JiraCreatedIssue, JiraField,
    JiraFieldSchema, JiraIssue, JiraIssueFields, JiraIssueType, JiraLinkType, JiraNamed,
    JiraProject, JiraTransition, JiraUser,
};
use crate::jira::{JiraApi, JiraError, JiraResult};

pub fn field(id: &str, name: &str, custom: bool) -> JiraField {
    JiraField {
        id: id.to_string(),
        name: name.to_string(),
        custom,
        schema: Some(JiraFieldSchema {
            field_type: if custom { "number".into() } else { "string".into() },
            ..Default::default()
        }),
    }
}

/// Build an issue from a JSON `fields` object
pub fn issue(key: &str, fields: Value) -> JiraIssue {
    JiraIssue {
        id: format!("1{}", key.rsplit('-').next().unwrap_or("0")),
        key: key.to_string(),
        self_url: Some(format!("https://jira.test/rest/api/2/issue/{}", key)),
        fields: serde_json::from_value(fields).expect("valid issue fields"),
    }
}

pub fn transition(id: &str, name: &str, to: &str) -> JiraTransition {
    JiraTransition {
        id: id.to_string(),
        name: name.to_string(),
        to: Some(JiraNamed {
            id: None,
            name: to.to_string(),
        }),
        fields: Default::default(),
    }
}

/// In-memory Jira that records every call made through [`JiraApi`]
#[derive(Default)]
pub struct MockJira {
    calls: Mutex<Vec<String>>,
    fields: Vec<JiraField>,
    fail_fields: bool,
    issues: Mutex<HashMap<String, JiraIssue>>,
    search_results: Vec<JiraIssue>,
    transitions: HashMap<String, Vec<JiraTransition>>,
    link_types: Vec<JiraLinkType>,
    issue_types: Vec<JiraIssueType>,
    users: Vec<JiraUser>,
    projects: Vec<JiraProject>,
    create_meta: JiraCreateMeta,
    attachment_data: Mutex<HashMap<String, Vec<u8>>>,
    next_id: AtomicU64,

    pub jql: Mutex<Vec<String>>,
    pub created: Mutex<Vec<Map<String, Value>>>,
    pub updated: Mutex<Vec<(String, Map<String, Value>)>>,
    pub links: Mutex<Vec<(String, String, String)>>,
    pub performed_transitions: Mutex<Vec<(String, String, Option<String>)>>,
}

impl MockJira {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(10000),
            ..Default::default()
        }
    }

    pub fn with_fields(mut self, fields: Vec<JiraField>) -> Self {
        self.fields = fields;
        self
    }

    pub fn failing_fields(mut self) -> Self {
        self.fail_fields = true;
        self
    }

    pub fn with_issue(self, issue: JiraIssue) -> Self {
        self.issues.lock().insert(issue.key.clone(), issue);
        self
    }

    pub fn with_search_results(mut self, issues: Vec<JiraIssue>) -> Self {
        self.search_results = issues;
        self
    }

    pub fn with_transitions(mut self, key: &str, transitions: Vec<JiraTransition>) -> Self {
        self.transitions.insert(key.to_string(), transitions);
        self
    }

    pub fn with_link_types(mut self, link_types: Vec<JiraLinkType>) -> Self {
        self.link_types = link_types;
        self
    }

    pub fn with_issue_types(mut self, issue_types: Vec<JiraIssueType>) -> Self {
        self.issue_types = issue_types;
        self
    }

    pub fn with_users(mut self, users: Vec<JiraUser>) -> Self {
        self.users = users;
        self
    }

    pub fn with_projects(mut self, projects: Vec<JiraProject>) -> Self {
        self.projects = projects;
        self
    }

    pub fn with_create_meta(mut self, meta: Value) -> Self {
        self.create_meta = serde_json::from_value(meta).expect("valid createmeta");
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn calls_to(&self, method: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.as_str() == method).count()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn last_jql(&self) -> Option<String> {
        self.jql.lock().last().cloned()
    }

    pub fn stored_issue(&self, key: &str) -> Option<JiraIssue> {
        self.issues.lock().get(key).cloned()
    }

    fn record(&self, method: &str) {
        self.calls.lock().push(method.to_string());
    }

    fn next_id(&self) -> String {
        self.next_id.fetch_add(1, Ordering::SeqCst).to_string()
    }

    fn missing_issue(key: &str) -> JiraError {
        JiraError::NotFound {
            message: format!("Issue {} does not exist or you do not have permission to see it.", key),
        }
    }
}

#[async_trait]
impl JiraApi for MockJira {
    async fn fields(&self) -> JiraResult<Vec<JiraField>> {
        self.record("fields");
        if self.fail_fields {
            return Err(JiraError::Unauthorized {
                message: "Client must be authenticated to access this resource.".into(),
            });
        }
        Ok(self.fields.clone())
    }

    async fn get_issue(
        &self,
        key: &str,
        _fields: Option<&str>,
        _expand: Option<&str>,
    ) -> JiraResult<JiraIssue> {
        self.record("get_issue");
        self.issues
            .lock()
            .get(key)
            .cloned()
            .ok_or_else(|| Self::missing_issue(key))
    }

    async fn create_issue(&self, fields: Map<String, Value>) -> JiraResult<JiraCreatedIssue> {
        self.record("create_issue");
        let project = fields["project"]["key"].as_str().unwrap_or("TEST").to_string();
        let id = self.next_id();
        let key = format!("{}-{}", project, id);

        let stored_fields: JiraIssueFields =
            serde_json::from_value(Value::Object(fields.clone())).unwrap_or_default();
        self.issues.lock().insert(
            key.clone(),
            JiraIssue {
                id: id.clone(),
                key: key.clone(),
                self_url: None,
                fields: stored_fields,
            },
        );
        self.created.lock().push(fields);

        Ok(JiraCreatedIssue {
            self_url: format!("https://jira.test/rest/api/2/issue/{}", id),
            id,
            key,
        })
    }

    async fn update_issue(&self, key: &str, fields: Map<String, Value>) -> JiraResult<()> {
        self.record("update_issue");
        if !self.issues.lock().contains_key(key) {
            return Err(Self::missing_issue(key));
        }
        self.updated.lock().push((key.to_string(), fields));
        Ok(())
    }

    async fn delete_issue(&self, key: &str) -> JiraResult<()> {
        self.record("delete_issue");
        self.issues
            .lock()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| Self::missing_issue(key))
    }

    async fn search_issues(
        &self,
        jql: &str,
        max_results: u32,
        _fields: &[&str],
    ) -> JiraResult<Vec<JiraIssue>> {
        self.record("search_issues");
        self.jql.lock().push(jql.to_string());
        Ok(self
            .search_results
            .iter()
            .take(max_results as usize)
            .cloned()
            .collect())
    }

    async fn transitions(&self, key: &str) -> JiraResult<Vec<JiraTransition>> {
        self.record("transitions");
        Ok(self.transitions.get(key).cloned().unwrap_or_default())
    }

    async fn transition_issue(
        &self,
        key: &str,
        transition_id: &str,
        _fields: Option<Map<String, Value>>,
        comment: Option<&str>,
    ) -> JiraResult<()> {
        self.record("transition_issue");
        let target = self
            .transitions
            .get(key)
            .and_then(|ts| ts.iter().find(|t| t.id == transition_id))
            .and_then(|t| t.to.clone());

        if let (Some(issue), Some(to)) = (self.issues.lock().get_mut(key), target) {
            issue.fields.status = Some(to);
        }
        self.performed_transitions.lock().push((
            key.to_string(),
            transition_id.to_string(),
            comment.map(str::to_string),
        ));
        Ok(())
    }

    async fn add_comment(&self, key: &str, body: &str) -> JiraResult<JiraComment> {
        self.record("add_comment");
        let mut issues = self.issues.lock();
        let issue = issues.get_mut(key).ok_or_else(|| Self::missing_issue(key))?;

        let comment = JiraComment {
            id: self.next_id(),
            author: Some(JiraUser {
                display_name: Some("Mock User".into()),
                ..Default::default()
            }),
            body: Some(body.to_string()),
            created: Some("2024-01-01T00:00:00.000+0000".into()),
        };
        issue
            .fields
            .comment
            .get_or_insert_with(JiraCommentPage::default)
            .comments
            .push(comment.clone());
        Ok(comment)
    }

    async fn add_attachment(
        &self,
        key: &str,
        filename: &str,
        data: Vec<u8>,
    ) -> JiraResult<Vec<JiraAttachment>> {
        self.record("add_attachment");
        let mut issues = self.issues.lock();
        let issue = issues.get_mut(key).ok_or_else(|| Self::missing_issue(key))?;

        let id = self.next_id();
        let attachment = JiraAttachment {
            id: id.clone(),
            filename: filename.to_string(),
            size: data.len() as u64,
            created: Some("2024-01-01T00:00:00.000+0000".into()),
            mime_type: None,
            content: Some(format!("https://jira.test/secure/attachment/{}/{}", id, filename)),
        };
        issue
            .fields
            .attachment
            .get_or_insert_with(Vec::new)
            .push(attachment.clone());
        self.attachment_data.lock().insert(id, data);
        Ok(vec![attachment])
    }

    async fn attachment(&self, id: &str) -> JiraResult<JiraAttachment> {
        self.record("attachment");
        self.issues
            .lock()
            .values()
            .flat_map(|issue| issue.fields.attachments().to_vec())
            .find(|a| a.id == id)
            .ok_or_else(|| JiraError::NotFound {
                message: format!("The attachment with id '{}' does not exist", id),
            })
    }

    async fn download_attachment(&self, attachment: &JiraAttachment) -> JiraResult<Vec<u8>> {
        self.record("download_attachment");
        self.attachment_data
            .lock()
            .get(&attachment.id)
            .cloned()
            .ok_or_else(|| JiraError::NotFound {
                message: format!("No content for attachment {}", attachment.id),
            })
    }

    async fn issue_types(&self) -> JiraResult<Vec<JiraIssueType>> {
        self.record("issue_types");
        Ok(self.issue_types.clone())
    }

    async fn issue_link_types(&self) -> JiraResult<Vec<JiraLinkType>> {
        self.record("issue_link_types");
        Ok(self.link_types.clone())
    }

    async fn create_issue_link(
        &self,
        link_type: &str,
        inward_key: &str,
        outward_key: &str,
    ) -> JiraResult<()> {
        self.record("create_issue_link");
        self.links.lock().push((
            link_type.to_string(),
            inward_key.to_string(),
            outward_key.to_string(),
        ));
        Ok(())
    }

    async fn search_users(&self, query: &str) -> JiraResult<Vec<JiraUser>> {
        self.record("search_users");
        let query = query.to_lowercase();
        Ok(self
            .users
            .iter()
            .filter(|u| {
                u.email_address
                    .as_deref()
                    .is_some_and(|email| email.to_lowercase().contains(&query))
            })
            .cloned()
            .collect())
    }

    async fn projects(&self) -> JiraResult<Vec<JiraProject>> {
        self.record("projects");
        Ok(self.projects.clone())
    }

    async fn create_meta(&self, project_key: &str) -> JiraResult<JiraCreateMeta> {
        self.record("create_meta");
        Ok(JiraCreateMeta {
            projects: self
                .create_meta
                .projects
                .iter()
                .filter(|p| p.key == project_key)
                .cloned()
                .collect(),
        })
    }
}

#[test]
fn mock_issue_helper_parses_fields() {
    let issue = issue("PROJ-7", json!({"summary": "hello", "status": {"name": "Open"}}));
    assert_eq!(issue.fields.status_name(), "Open");
    assert_eq!(issue.id, "17");
}
