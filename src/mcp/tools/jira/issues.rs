use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tracing::{debug, info};

use super::format_field_value;
use crate::jira::models::JiraIssue;
use crate::jira::FieldCatalog;
use crate::mcp::tools::{
    ExecutionContext, MCPTool, ToolError, ToolResult, optional_bool, optional_object, optional_str,
    required_str,
};

/// Standard fields `update_issue` accepts besides `customFields`
const UPDATABLE_FIELDS: [&str; 4] = ["summary", "description", "assignee", "priority"];

/// Set the optional standard fields shared by create and update
fn apply_standard_fields(params: &Value, fields: &mut Map<String, Value>) {
    if let Some(summary) = params.get("summary").and_then(Value::as_str) {
        fields.insert("summary".into(), json!(summary));
    }
    if let Some(description) = params.get("description").and_then(Value::as_str) {
        fields.insert("description".into(), json!(description));
    }
    if let Some(priority) = optional_str(params, "priority") {
        fields.insert("priority".into(), json!({ "name": priority }));
    }
    if let Some(assignee) = optional_str(params, "assignee") {
        fields.insert("assignee".into(), json!({ "emailAddress": assignee }));
    }
}

/// Translate `customFields` through the field catalog and merge them in
async fn apply_custom_fields(
    params: &Value,
    context: &ExecutionContext,
    fields: &mut Map<String, Value>,
) -> Result<(), ToolError> {
    let Some(custom) = optional_object(params, "customFields")? else {
        return Ok(());
    };
    if custom.is_empty() {
        return Ok(());
    }

    let catalog = context.field_catalog().await?;
    let translated = catalog.translate_to_ids(custom)?;
    debug!("Translated {} custom fields", translated.len());
    fields.extend(translated);
    Ok(())
}

pub struct CreateIssueTool;

#[async_trait]
impl MCPTool for CreateIssueTool {
    fn name(&self) -> &str {
        "create_jira_issue"
    }

    fn description(&self) -> &str {
        "Create a new Jira issue with standard and custom fields.\n\n\
         Custom fields can be given by display name (e.g. 'Story Points': 5) \
         or by id (customfield_10001). Use get_field_mapping to discover them."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "projectKey": { "type": "string", "description": "Project key (e.g. 'TEST')" },
                "summary": { "type": "string", "description": "Issue summary/title" },
                "issueType": { "type": "string", "description": "Type of issue (e.g. 'Bug', 'Task', 'Story')" },
                "description": { "type": "string", "description": "Issue description" },
                "priority": { "type": "string", "description": "Priority name" },
                "assignee": { "type": "string", "description": "Email of the assignee" },
                "customFields": {
                    "type": "object",
                    "description": "Custom fields keyed by display name or id"
                }
            },
            "required": ["projectKey", "summary", "issueType"]
        })
    }

    async fn execute(&self, params: Value, context: &ExecutionContext) -> Result<ToolResult, ToolError> {
        let project_key = required_str(&params, "projectKey")?;
        required_str(&params, "summary")?;
        let issue_type = required_str(&params, "issueType")?;

        let mut fields = Map::new();
        fields.insert("project".into(), json!({ "key": project_key }));
        fields.insert("issuetype".into(), json!({ "name": issue_type }));
        apply_standard_fields(&params, &mut fields);
        apply_custom_fields(&params, context, &mut fields).await?;

        let created = context.jira.create_issue(fields).await?;
        info!("Created issue {}", created.key);

        Ok(ToolResult::json(&json!({
            "key": created.key,
            "id": created.id,
            "self": created.self_url,
        })))
    }
}

pub struct GetIssueTool;

impl GetIssueTool {
    /// Non-empty custom field values keyed by display name
    fn custom_fields(issue: &JiraIssue, catalog: &FieldCatalog) -> Map<String, Value> {
        let mut custom = Map::new();
        for (field_id, value) in issue.fields.custom_values() {
            let formatted = format_field_value(value);
            let empty = match &formatted {
                Value::Null => true,
                Value::String(s) => s.is_empty(),
                Value::Array(items) => items.is_empty(),
                _ => false,
            };
            if !empty {
                custom.insert(catalog.display_name_or_id(field_id).to_string(), formatted);
            }
        }
        custom
    }
}

#[async_trait]
impl MCPTool for GetIssueTool {
    fn name(&self) -> &str {
        "get_issue"
    }

    fn description(&self) -> &str {
        "Get complete issue details including comments, attachments and custom fields.\n\n\
         Custom fields are reported under their display names."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "issueKey": { "type": "string", "description": "Issue key (e.g. PROJ-123)" },
                "includeCustomFields": {
                    "type": "boolean",
                    "description": "Include custom fields in the response",
                    "default": true
                },
                "customFieldsOnly": {
                    "type": "boolean",
                    "description": "Only return custom fields",
                    "default": false
                }
            },
            "required": ["issueKey"]
        })
    }

    async fn execute(&self, params: Value, context: &ExecutionContext) -> Result<ToolResult, ToolError> {
        let issue_key = required_str(&params, "issueKey")?;
        let include_custom = optional_bool(&params, "includeCustomFields", true);
        let custom_only = optional_bool(&params, "customFieldsOnly", false);

        let issue = context.jira.get_issue(issue_key, None, None).await?;

        let custom = if include_custom || custom_only {
            let catalog = context.field_catalog().await?;
            Some(Self::custom_fields(&issue, &catalog))
        } else {
            None
        };

        if custom_only {
            return Ok(ToolResult::json(&json!({
                "key": issue.key,
                "customFields": custom.unwrap_or_default(),
            })));
        }

        let fields = &issue.fields;
        let comments: Vec<Value> = fields
            .comments()
            .iter()
            .map(|c| {
                json!({
                    "id": c.id,
                    "author": c.author.as_ref().map(|a| a.display()),
                    "body": c.body,
                    "created": c.created,
                })
            })
            .collect();
        let attachments: Vec<Value> = fields
            .attachments()
            .iter()
            .map(|a| {
                json!({
                    "id": a.id,
                    "filename": a.filename,
                    "size": a.size,
                    "created": a.created,
                })
            })
            .collect();

        let mut data = json!({
            "key": issue.key,
            "summary": fields.summary,
            "description": fields.description,
            "status": fields.status_name(),
            "priority": fields.priority_name(),
            "assignee": fields.assignee_name(),
            "type": fields.type_name(),
            "comments": comments,
            "attachments": attachments,
        });
        if let Some(custom) = custom {
            data["customFields"] = Value::Object(custom);
        }

        Ok(ToolResult::json(&data))
    }
}

pub struct UpdateIssueTool;

#[async_trait]
impl MCPTool for UpdateIssueTool {
    fn name(&self) -> &str {
        "update_issue"
    }

    fn description(&self) -> &str {
        "Update an existing Jira issue with standard and custom fields.\n\n\
         Custom fields can be given by display name or id. Use get_field_mapping to discover them."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "issueKey": { "type": "string", "description": "Key of the issue to update (e.g. 'PROJ-123')" },
                "summary": { "type": "string", "description": "New summary/title" },
                "description": { "type": "string", "description": "New description" },
                "assignee": { "type": "string", "description": "Email of the new assignee" },
                "priority": { "type": "string", "description": "New priority" },
                "customFields": {
                    "type": "object",
                    "description": "Custom fields to update, keyed by display name or id"
                }
            },
            "required": ["issueKey"]
        })
    }

    fn validate_params(&self, params: &Value) -> Result<(), ToolError> {
        let has_standard = UPDATABLE_FIELDS.iter().any(|f| params.get(*f).is_some_and(|v| !v.is_null()));
        let has_custom = optional_object(params, "customFields")?.is_some_and(|m| !m.is_empty());
        if !has_standard && !has_custom {
            return Err(ToolError::InvalidParams(
                "At least one of summary, description, assignee, priority or customFields is required"
                    .to_string(),
            ));
        }
        Ok(())
    }

    async fn execute(&self, params: Value, context: &ExecutionContext) -> Result<ToolResult, ToolError> {
        let issue_key = required_str(&params, "issueKey")?;

        let mut fields = Map::new();
        apply_standard_fields(&params, &mut fields);
        apply_custom_fields(&params, context, &mut fields).await?;

        context.jira.update_issue(issue_key, fields).await?;
        info!("Updated issue {}", issue_key);

        Ok(ToolResult::message(format!("Issue {} updated successfully", issue_key)))
    }
}

pub struct DeleteIssueTool;

#[async_trait]
impl MCPTool for DeleteIssueTool {
    fn name(&self) -> &str {
        "delete_issue"
    }

    fn description(&self) -> &str {
        "Delete a Jira issue or subtask"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "issueKey": { "type": "string", "description": "Key of the issue to delete" }
            },
            "required": ["issueKey"]
        })
    }

    async fn execute(&self, params: Value, context: &ExecutionContext) -> Result<ToolResult, ToolError> {
        let issue_key = required_str(&params, "issueKey")?;
        context.jira.delete_issue(issue_key).await?;
        info!("Deleted issue {}", issue_key);
        Ok(ToolResult::message(format!("Issue {} deleted successfully", issue_key)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jira::FieldMapperError;
    use crate::jira::mock::{MockJira, field, issue};
    use crate::mcp::tools::ErrorKind;
    use crate::mcp::tools::jira::testing::{context, run};
    use std::sync::Arc;

    fn story_points_jira() -> MockJira {
        MockJira::new().with_fields(vec![
            field("summary", "Summary", false),
            field("customfield_10002", "Story Points", true),
            field("customfield_10005", "Team", true),
        ])
    }

    #[tokio::test]
    async fn create_translates_custom_field_names() {
        let jira = Arc::new(story_points_jira());
        let ctx = context(&jira);

        let result = run(
            &CreateIssueTool,
            json!({
                "projectKey": "PROJ",
                "summary": "New login page",
                "issueType": "Story",
                "priority": "High",
                "customFields": {"Story Points": 5, "customfield_10005": {"value": "Core"}}
            }),
            &ctx,
        )
        .await
        .unwrap();

        assert!(result["key"].as_str().unwrap().starts_with("PROJ-"));
        let created = jira.created.lock()[0].clone();
        assert_eq!(created["customfield_10002"], 5);
        assert_eq!(created["customfield_10005"], json!({"value": "Core"}));
        assert_eq!(created["priority"], json!({"name": "High"}));
        assert_eq!(created["issuetype"], json!({"name": "Story"}));
        assert!(!created.contains_key("Story Points"));
    }

    #[tokio::test]
    async fn create_with_unknown_custom_field_makes_no_create_call() {
        let jira = Arc::new(story_points_jira());
        let err = run(
            &CreateIssueTool,
            json!({
                "projectKey": "PROJ",
                "summary": "x",
                "issueType": "Task",
                "customFields": {"story points": 3}
            }),
            &context(&jira),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ToolError::Field(FieldMapperError::UnknownField(ref n)) if n == "story points"));
        assert_eq!(err.kind(), ErrorKind::Resolution);
        assert_eq!(jira.calls_to("create_issue"), 0);
    }

    #[tokio::test]
    async fn get_issue_reports_display_names() {
        let jira = Arc::new(story_points_jira().with_issue(issue(
            "PROJ-1",
            json!({
                "summary": "Fix login",
                "status": {"name": "In Progress"},
                "issuetype": {"name": "Story"},
                "customfield_10002": 8,
                "customfield_10005": {"value": "Core"},
                "customfield_10099": [],
                "customfield_10100": null,
                "customfield_10200": "raw"
            }),
        )));

        let result = run(&GetIssueTool, json!({"issueKey": "PROJ-1"}), &context(&jira))
            .await
            .unwrap();

        let custom = result["customFields"].as_object().unwrap();
        assert_eq!(custom["Story Points"], 8);
        assert_eq!(custom["Team"], "Core");
        assert_eq!(custom["customfield_10200"], "raw");
        assert!(!custom.contains_key("customfield_10002"));
        assert_eq!(custom.len(), 3);
        assert_eq!(result["status"], "In Progress");
        assert_eq!(result["comments"], json!([]));
    }

    #[tokio::test]
    async fn get_issue_reuses_the_field_catalog() {
        let jira = Arc::new(
            story_points_jira()
                .with_issue(issue("PROJ-1", json!({"customfield_10002": 1})))
                .with_issue(issue("PROJ-2", json!({"customfield_10002": 2}))),
        );
        let ctx = context(&jira);

        run(&GetIssueTool, json!({"issueKey": "PROJ-1"}), &ctx).await.unwrap();
        run(&GetIssueTool, json!({"issueKey": "PROJ-2", "customFieldsOnly": true}), &ctx)
            .await
            .unwrap();

        assert_eq!(jira.calls_to("fields"), 1);
    }

    #[tokio::test]
    async fn get_issue_without_custom_fields_skips_the_listing() {
        let jira = Arc::new(story_points_jira().with_issue(issue("PROJ-1", json!({"summary": "s"}))));

        let result = run(
            &GetIssueTool,
            json!({"issueKey": "PROJ-1", "includeCustomFields": false}),
            &context(&jira),
        )
        .await
        .unwrap();

        assert!(result.get("customFields").is_none());
        assert_eq!(jira.calls_to("fields"), 0);
    }

    #[tokio::test]
    async fn update_requires_some_field() {
        let jira = Arc::new(story_points_jira().with_issue(issue("PROJ-1", json!({}))));
        let ctx = context(&jira);

        let err = run(&UpdateIssueTool, json!({"issueKey": "PROJ-1"}), &ctx).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(jira.call_count(), 0);

        let result = run(
            &UpdateIssueTool,
            json!({"issueKey": "PROJ-1", "assignee": "ann@example.com", "customFields": {"Story Points": 3}}),
            &ctx,
        )
        .await
        .unwrap();
        assert_eq!(result["message"], "Issue PROJ-1 updated successfully");

        let (key, fields) = jira.updated.lock()[0].clone();
        assert_eq!(key, "PROJ-1");
        assert_eq!(fields["assignee"], json!({"emailAddress": "ann@example.com"}));
        assert_eq!(fields["customfield_10002"], 3);
    }

    #[tokio::test]
    async fn delete_passes_not_found_through() {
        let jira = Arc::new(MockJira::new().with_issue(issue("PROJ-1", json!({}))));
        let ctx = context(&jira);

        let result = run(&DeleteIssueTool, json!({"issueKey": "PROJ-1"}), &ctx).await.unwrap();
        assert_eq!(result["message"], "Issue PROJ-1 deleted successfully");

        let err = run(&DeleteIssueTool, json!({"issueKey": "PROJ-1"}), &ctx).await.unwrap_err();
        assert_eq!(err.status(), Some(404));
    }
}
