use async_trait::async_trait;
use serde_json::{Map, Value, json};

use crate::jira::FieldCatalog;
use crate::jira::models::{JiraCreateMeta, JiraCreateMetaField, JiraCreateMetaProject, JiraField};
use crate::mcp::tools::{
    ExecutionContext, MCPTool, ToolError, ToolResult, optional_bool, optional_str, optional_u64, required_str,
};

/// Fields createmeta reports that the create call fills in itself
const IMPLIED_FIELDS: [&str; 2] = ["project", "issuetype"];

fn field_row(field: &JiraField) -> Value {
    json!({
        "id": field.id,
        "name": field.name,
        "custom": field.custom,
        "type": field.schema.as_ref().map(|s| s.field_type.clone()),
    })
}

/// One createmeta field as reported to callers.
///
/// `allowedValues` is only listed when there are at most `allowed_limit`.
pub(crate) fn meta_field_row(
    field_id: &str,
    field: &JiraCreateMetaField,
    catalog: Option<&FieldCatalog>,
    allowed_limit: usize,
) -> Value {
    let name = field
        .name
        .clone()
        .or_else(|| catalog.map(|c| c.display_name_or_id(field_id).to_string()))
        .unwrap_or_else(|| field_id.to_string());

    let mut row = json!({
        "id": field_id,
        "name": name,
        "required": field.required,
    });
    if let Some(schema) = &field.schema {
        row["type"] = json!(if schema.field_type.is_empty() { "unknown" } else { &schema.field_type });
        if let Some(items) = &schema.items {
            row["itemType"] = json!(items);
        }
    }
    if let Some(allowed) = field.allowed_labels(allowed_limit) {
        row["allowedValues"] = json!(allowed);
    }
    row
}

/// The single project createmeta returned for `project_key`
pub(crate) fn meta_project(meta: JiraCreateMeta, project_key: &str) -> Result<JiraCreateMetaProject, ToolError> {
    meta.projects
        .into_iter()
        .next()
        .ok_or_else(|| ToolError::Unresolved(format!("Project {} not found or no access", project_key)))
}

pub struct ListFieldsTool;

#[async_trait]
impl MCPTool for ListFieldsTool {
    fn name(&self) -> &str {
        "list_fields"
    }

    fn description(&self) -> &str {
        "List all system and custom fields available in Jira"
    }

    fn input_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _params: Value, context: &ExecutionContext) -> Result<ToolResult, ToolError> {
        let catalog = context.field_catalog().await?;
        let rows: Vec<Value> = catalog.fields().iter().map(field_row).collect();
        Ok(ToolResult::json(&Value::Array(rows)))
    }
}

pub struct GetFieldMappingTool;

#[async_trait]
impl MCPTool for GetFieldMappingTool {
    fn name(&self) -> &str {
        "get_field_mapping"
    }

    fn description(&self) -> &str {
        "Get Jira field mapping information.\n\n\
         Shows display names and ids of fields, so custom fields can be set by name \
         in create_jira_issue and update_issue."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "search": {
                    "type": "string",
                    "description": "Filter fields by name or id (case-insensitive substring)"
                },
                "customOnly": { "type": "boolean", "default": false, "description": "Only return custom fields" },
                "limit": { "type": "integer", "default": 50, "description": "Maximum number of fields to return" }
            }
        })
    }

    async fn execute(&self, params: Value, context: &ExecutionContext) -> Result<ToolResult, ToolError> {
        let search = optional_str(&params, "search").map(str::to_lowercase);
        let custom_only = optional_bool(&params, "customOnly", false);
        let limit = optional_u64(&params, "limit", 50) as usize;

        let catalog = context.field_catalog().await?;
        let rows: Vec<Value> = catalog
            .fields()
            .iter()
            .filter(|f| !custom_only || f.custom)
            .filter(|f| {
                search.as_deref().is_none_or(|needle| {
                    f.name.to_lowercase().contains(needle) || f.id.to_lowercase().contains(needle)
                })
            })
            .take(limit)
            .map(|f| json!({ "name": f.name, "id": f.id, "custom": f.custom, "type": f.schema.as_ref().map(|s| s.field_type.clone()) }))
            .collect();

        Ok(ToolResult::json(&json!({
            "count": rows.len(),
            "fields": rows,
            "totalAvailable": catalog.len(),
        })))
    }
}

pub struct ListIssueTypesTool;

#[async_trait]
impl MCPTool for ListIssueTypesTool {
    fn name(&self) -> &str {
        "list_issue_types"
    }

    fn description(&self) -> &str {
        "List all available issue types"
    }

    fn input_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _params: Value, context: &ExecutionContext) -> Result<ToolResult, ToolError> {
        let issue_types = context.jira.issue_types().await?;
        let rows: Vec<Value> = issue_types
            .iter()
            .map(|it| {
                json!({
                    "id": it.id,
                    "name": it.name,
                    "description": it.description,
                    "subtask": it.subtask,
                })
            })
            .collect();
        Ok(ToolResult::json(&Value::Array(rows)))
    }
}

pub struct ListProjectsTool;

#[async_trait]
impl MCPTool for ListProjectsTool {
    fn name(&self) -> &str {
        "list_projects"
    }

    fn description(&self) -> &str {
        "List Jira projects you have access to, optionally filtered by key or name"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Filter projects by key or name (case-insensitive)" },
                "maxResults": { "type": "integer", "default": 50, "description": "Maximum number of projects to return" }
            }
        })
    }

    async fn execute(&self, params: Value, context: &ExecutionContext) -> Result<ToolResult, ToolError> {
        let query = optional_str(&params, "query");
        let max_results = optional_u64(&params, "maxResults", 50) as usize;
        let needle = query.map(str::to_lowercase);

        let projects = context.jira.projects().await?;
        let rows: Vec<Value> = projects
            .iter()
            .filter(|p| {
                needle.as_deref().is_none_or(|needle| {
                    p.key.to_lowercase().contains(needle) || p.name.to_lowercase().contains(needle)
                })
            })
            .take(max_results)
            .map(|p| {
                let mut row = json!({ "key": p.key, "name": p.name });
                if let Some(lead) = &p.lead {
                    row["lead"] = json!(lead.display());
                }
                if let Some(kind) = &p.project_type_key {
                    row["type"] = json!(kind);
                }
                row
            })
            .collect();

        let mut result = json!({ "count": rows.len(), "projects": rows });
        if let Some(query) = query {
            result["filter"] = json!(query);
        }
        Ok(ToolResult::json(&result))
    }
}

pub struct GetUserTool;

#[async_trait]
impl MCPTool for GetUserTool {
    fn name(&self) -> &str {
        "get_user"
    }

    fn description(&self) -> &str {
        "Get a user's account id and details by email address"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "email": { "type": "string", "description": "User's email address" }
            },
            "required": ["email"]
        })
    }

    async fn execute(&self, params: Value, context: &ExecutionContext) -> Result<ToolResult, ToolError> {
        let email = required_str(&params, "email")?;

        let users = context.jira.search_users(email).await?;
        let user = users
            .into_iter()
            .next()
            .ok_or_else(|| ToolError::Unresolved(format!("No user found with email: {}", email)))?;

        Ok(ToolResult::json(&json!({
            "accountId": user.account_id,
            "displayName": user.display_name,
            "emailAddress": user.email_address,
            "active": user.active,
        })))
    }
}

pub struct GetCreateMetaTool;

#[async_trait]
impl MCPTool for GetCreateMetaTool {
    fn name(&self) -> &str {
        "get_create_meta"
    }

    fn description(&self) -> &str {
        "Get the fields required and allowed when creating an issue in a project, \
         per issue type, with allowed values for select fields."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "projectKey": { "type": "string", "description": "Project key (e.g. 'PROJ')" },
                "issueType": { "type": "string", "description": "Only report this issue type (e.g. 'Story')" }
            },
            "required": ["projectKey"]
        })
    }

    async fn execute(&self, params: Value, context: &ExecutionContext) -> Result<ToolResult, ToolError> {
        let project_key = required_str(&params, "projectKey")?;
        let issue_type = optional_str(&params, "issueType");

        let project = meta_project(context.jira.create_meta(project_key).await?, project_key)?;

        let selected: Vec<_> = match issue_type {
            Some(wanted) => {
                let lowered = wanted.to_lowercase();
                let matching: Vec<_> = project
                    .issuetypes
                    .iter()
                    .filter(|it| it.name.to_lowercase() == lowered)
                    .collect();
                if matching.is_empty() {
                    let available: Vec<&str> = project.issuetypes.iter().map(|it| it.name.as_str()).collect();
                    return Err(ToolError::Unresolved(format!(
                        "Issue type '{}' not found. Available: {}",
                        wanted,
                        available.join(", ")
                    )));
                }
                matching
            }
            None => project.issuetypes.iter().collect(),
        };

        // Only used for display names createmeta leaves out; never fetched here
        let catalog = context.field_mapper.catalog();

        let types: Vec<Value> = selected
            .iter()
            .map(|it| {
                let mut required = Vec::new();
                let mut optional = Vec::new();
                for (field_id, field) in &it.fields {
                    if IMPLIED_FIELDS.contains(&field_id.as_str()) {
                        continue;
                    }
                    let row = meta_field_row(field_id, field, catalog.as_deref(), 20);
                    if field.required {
                        required.push(row);
                    } else {
                        optional.push(row);
                    }
                }
                sort_by_name(&mut required);
                sort_by_name(&mut optional);

                let total_optional = optional.len();
                optional.truncate(15);
                json!({
                    "name": it.name,
                    "description": it.description.clone().unwrap_or_default(),
                    "requiredFields": required,
                    "optionalFields": optional,
                    "totalOptionalFields": total_optional,
                })
            })
            .collect();

        let mut result = Map::new();
        result.insert("projectKey".into(), json!(project_key));
        result.insert(
            "projectName".into(),
            json!(if project.name.is_empty() { project_key } else { &project.name }),
        );
        result.insert("issueTypes".into(), Value::Array(types));
        Ok(ToolResult::json(&Value::Object(result)))
    }
}

pub(crate) fn sort_by_name(rows: &mut [Value]) {
    rows.sort_by(|a, b| {
        a["name"]
            .as_str()
            .unwrap_or_default()
            .cmp(b["name"].as_str().unwrap_or_default())
    });
}
