/// Jira tools exposed over MCP, grouped by the area of Jira they touch
pub mod assist;
pub mod attachments;
pub mod comments;
pub mod issues;
pub mod links;
pub mod metadata;
pub mod search;
pub mod workflow;

use serde_json::{Value, json};

use crate::jira::models::JiraIssue;
use crate::mcp::tools::MCPTool;

/// Every Jira tool, in the order `tools/list` reports them
pub fn all_tools() -> Vec<Box<dyn MCPTool>> {
    vec![
        Box::new(issues::CreateIssueTool),
        Box::new(issues::GetIssueTool),
        Box::new(issues::UpdateIssueTool),
        Box::new(issues::DeleteIssueTool),
        Box::new(search::SearchIssuesTool),
        Box::new(search::SearchMyIssuesTool),
        Box::new(search::ListEpicsTool),
        Box::new(search::GetEpicIssuesTool),
        Box::new(workflow::GetTransitionsTool),
        Box::new(workflow::TransitionIssueTool),
        Box::new(comments::AddCommentTool),
        Box::new(comments::AddCommentWithAttachmentTool),
        Box::new(attachments::AttachFileTool),
        Box::new(attachments::AttachContentTool),
        Box::new(attachments::GetIssueAttachmentTool),
        Box::new(links::CreateIssueLinkTool),
        Box::new(links::ListLinkTypesTool),
        Box::new(metadata::ListFieldsTool),
        Box::new(metadata::GetFieldMappingTool),
        Box::new(metadata::ListIssueTypesTool),
        Box::new(metadata::ListProjectsTool),
        Box::new(metadata::GetUserTool),
        Box::new(metadata::GetCreateMetaTool),
        Box::new(assist::FormatCommitTool),
        Box::new(assist::SuggestIssueFieldsTool),
        Box::new(assist::AuditIssueTool),
    ]
}

/// Collapse a raw Jira field value for display.
///
/// Objects become their `name`, `value` or `displayName`; arrays are mapped
/// element-wise; anything else is returned as is.
pub fn format_field_value(value: &Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.iter().map(format_field_value).collect()),
        Value::Object(map) => ["name", "value", "displayName"]
            .iter()
            .find_map(|key| map.get(*key))
            .cloned()
            .unwrap_or_else(|| value.clone()),
        other => other.clone(),
    }
}

/// Key, summary, status, priority, assignee and type of a search hit
pub fn issue_row(issue: &JiraIssue) -> Value {
    json!({
        "key": issue.key,
        "summary": issue.fields.summary,
        "status": issue.fields.status_name(),
        "priority": issue.fields.priority_name(),
        "assignee": issue.fields.assignee_name(),
        "type": issue.fields.type_name(),
    })
}

pub(crate) fn percent(part: f64, total: f64) -> f64 {
    if total > 0.0 {
        (part / total * 1000.0).round() / 10.0
    } else {
        0.0
    }
}
