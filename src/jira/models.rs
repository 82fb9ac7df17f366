use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Any Jira object that is mostly identified by its name (status, priority, issue type, component)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JiraNamed {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JiraUser {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    /// Username on Server/Data Center
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

impl JiraUser {
    pub fn display(&self) -> String {
        self.display_name
            .as_deref()
            .or(self.name.as_deref())
            .or(self.email_address.as_deref())
            .or(self.account_id.as_deref())
            .unwrap_or("Unknown")
            .to_string()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JiraComment {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<JiraUser>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JiraCommentPage {
    #[serde(default)]
    pub comments: Vec<JiraComment>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JiraAttachment {
    pub id: String,
    pub filename: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Absolute download URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JiraProjectRef {
    #[serde(default)]
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JiraParent {
    pub key: String,
}

/// Issue fields with the well-known ones typed and everything else
/// (custom fields included) kept in `other`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JiraIssueFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<JiraNamed>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuetype: Option<JiraNamed>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<JiraNamed>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<JiraUser>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reporter: Option<JiraUser>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<JiraProjectRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<Vec<JiraNamed>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<JiraCommentPage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Vec<JiraAttachment>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<JiraParent>,
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

impl JiraIssueFields {
    pub fn status_name(&self) -> String {
        named_or_unknown(&self.status)
    }

    pub fn type_name(&self) -> String {
        named_or_unknown(&self.issuetype)
    }

    pub fn priority_name(&self) -> Option<String> {
        self.priority.as_ref().map(|p| p.name.clone())
    }

    pub fn assignee_name(&self) -> Option<String> {
        self.assignee.as_ref().map(JiraUser::display)
    }

    /// A non-null value from the untyped part of the field map
    pub fn value(&self, field_id: &str) -> Option<&Value> {
        self.other.get(field_id).filter(|v| !v.is_null())
    }

    /// Custom field values that are set, keyed by field id
    pub fn custom_values(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.other
            .iter()
            .filter(|(id, value)| id.starts_with("customfield_") && !value.is_null())
    }

    pub fn attachments(&self) -> &[JiraAttachment] {
        self.attachment.as_deref().unwrap_or_default()
    }

    pub fn comments(&self) -> &[JiraComment] {
        self.comment
            .as_ref()
            .map(|page| page.comments.as_slice())
            .unwrap_or_default()
    }
}

fn named_or_unknown(named: &Option<JiraNamed>) -> String {
    named
        .as_ref()
        .map(|n| n.name.clone())
        .unwrap_or_else(|| "Unknown".to_string())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JiraIssue {
    #[serde(default)]
    pub id: String,
    pub key: String,
    #[serde(rename = "self", default, skip_serializing_if = "Option::is_none")]
    pub self_url: Option<String>,
    #[serde(default)]
    pub fields: JiraIssueFields,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JiraCreatedIssue {
    pub id: String,
    pub key: String,
    #[serde(rename = "self")]
    pub self_url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JiraSearchResponse {
    #[serde(default)]
    pub issues: Vec<JiraIssue>,
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JiraFieldSchema {
    #[serde(rename = "type", default)]
    pub field_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<String>,
}

/// Entry of the field listing endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JiraField {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub custom: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<JiraFieldSchema>,
}

impl JiraField {
    pub fn type_name(&self) -> &str {
        self.schema
            .as_ref()
            .map(|s| s.field_type.as_str())
            .filter(|t| !t.is_empty())
            .unwrap_or("unknown")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JiraTransitionField {
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JiraTransition {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<JiraNamed>,
    #[serde(default)]
    pub fields: BTreeMap<String, JiraTransitionField>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JiraTransitionsResponse {
    #[serde(default)]
    pub transitions: Vec<JiraTransition>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JiraIssueType {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub subtask: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JiraLinkType {
    pub id: String,
    pub name: String,
    pub inward: String,
    pub outward: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JiraLinkTypesResponse {
    #[serde(default)]
    pub issue_link_types: Vec<JiraLinkType>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JiraProject {
    #[serde(default)]
    pub id: String,
    pub key: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lead: Option<JiraUser>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_type_key: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JiraCreateMetaField {
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<JiraFieldSchema>,
    #[serde(default)]
    pub allowed_values: Vec<Value>,
}

impl JiraCreateMetaField {
    /// Labels of the allowed values, or `None` when there are none or more than `limit`
    pub fn allowed_labels(&self, limit: usize) -> Option<Vec<String>> {
        if self.allowed_values.is_empty() || self.allowed_values.len() > limit {
            return None;
        }
        Some(
            self.allowed_values
                .iter()
                .filter(|v| v.is_object())
                .map(|v| {
                    v["name"]
                        .as_str()
                        .or_else(|| v["value"].as_str())
                        .map(str::to_string)
                        .unwrap_or_else(|| v.to_string())
                })
                .collect(),
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JiraCreateMetaIssueType {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, JiraCreateMetaField>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JiraCreateMetaProject {
    pub key: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub issuetypes: Vec<JiraCreateMetaIssueType>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JiraCreateMeta {
    #[serde(default)]
    pub projects: Vec<JiraCreateMetaProject>,
}
