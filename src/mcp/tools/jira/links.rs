use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::info;

use crate::jira::models::JiraLinkType;
use crate::mcp::tools::{ExecutionContext, MCPTool, ToolError, ToolResult, required_str};

/// Match a link type by its name or either direction's description
fn find_link_type<'a>(link_types: &'a [JiraLinkType], wanted: &str) -> Option<&'a JiraLinkType> {
    link_types
        .iter()
        .find(|lt| lt.name == wanted || lt.inward == wanted || lt.outward == wanted)
}

pub struct CreateIssueLinkTool;

#[async_trait]
impl MCPTool for CreateIssueLinkTool {
    fn name(&self) -> &str {
        "create_issue_link"
    }

    fn description(&self) -> &str {
        "Create a link between two Jira issues. \
         linkType must name an existing link type; see list_link_types."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "inwardIssueKey": { "type": "string", "description": "Key of the inward issue (e.g. 'PROJ-1')" },
                "outwardIssueKey": { "type": "string", "description": "Key of the outward issue (e.g. 'PROJ-2')" },
                "linkType": {
                    "type": "string",
                    "description": "Link type name or direction (e.g. 'Blocks', 'is blocked by')"
                }
            },
            "required": ["inwardIssueKey", "outwardIssueKey", "linkType"]
        })
    }

    async fn execute(&self, params: Value, context: &ExecutionContext) -> Result<ToolResult, ToolError> {
        let inward = required_str(&params, "inwardIssueKey")?;
        let outward = required_str(&params, "outwardIssueKey")?;
        let wanted = required_str(&params, "linkType")?;

        let link_types = context.jira.issue_link_types().await?;
        let link_type = find_link_type(&link_types, wanted).ok_or_else(|| ToolError::UnknownLinkType {
            name: wanted.to_string(),
            available: link_types.iter().map(|lt| lt.name.clone()).collect(),
        })?;

        context
            .jira
            .create_issue_link(&link_type.name, inward, outward)
            .await?;
        info!("Linked {} -> {} ({})", inward, outward, link_type.name);

        Ok(ToolResult::json(&json!({
            "message": "Issue link created successfully",
            "inwardIssue": inward,
            "outwardIssue": outward,
            "linkType": link_type.name,
        })))
    }
}

pub struct ListLinkTypesTool;

#[async_trait]
impl MCPTool for ListLinkTypesTool {
    fn name(&self) -> &str {
        "list_link_types"
    }

    fn description(&self) -> &str {
        "List all issue link types available in Jira"
    }

    fn input_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _params: Value, context: &ExecutionContext) -> Result<ToolResult, ToolError> {
        let link_types = context.jira.issue_link_types().await?;
        let rows: Vec<Value> = link_types
            .iter()
            .map(|lt| json!({ "id": lt.id, "name": lt.name, "inward": lt.inward, "outward": lt.outward }))
            .collect();
        Ok(ToolResult::json(&Value::Array(rows)))
    }
}
