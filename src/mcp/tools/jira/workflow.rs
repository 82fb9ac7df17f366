use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::info;

use crate::jira::models::JiraTransition;
use crate::mcp::tools::{
    ExecutionContext, MCPTool, ToolError, ToolResult, optional_object, optional_str, required_str,
};

fn target_status(transition: &JiraTransition) -> String {
    transition
        .to
        .as_ref()
        .map(|to| to.name.clone())
        .unwrap_or_else(|| "Unknown".to_string())
}

/// Exact id first, then case-insensitive name, then case-insensitive substring
fn find_transition<'a>(transitions: &'a [JiraTransition], wanted: &str) -> Option<&'a JiraTransition> {
    let lowered = wanted.to_lowercase();
    transitions
        .iter()
        .find(|t| t.id == wanted)
        .or_else(|| transitions.iter().find(|t| t.name.to_lowercase() == lowered))
        .or_else(|| transitions.iter().find(|t| t.name.to_lowercase().contains(&lowered)))
}

pub struct GetTransitionsTool;

#[async_trait]
impl MCPTool for GetTransitionsTool {
    fn name(&self) -> &str {
        "get_transitions"
    }

    fn description(&self) -> &str {
        "Get the workflow transitions available for an issue from its current status, \
         including any fields a transition requires."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "issueKey": { "type": "string", "description": "Issue key (e.g. 'PROJ-123')" }
            },
            "required": ["issueKey"]
        })
    }

    async fn execute(&self, params: Value, context: &ExecutionContext) -> Result<ToolResult, ToolError> {
        let issue_key = required_str(&params, "issueKey")?;

        let issue = context.jira.get_issue(issue_key, Some("status"), None).await?;
        let transitions = context.jira.transitions(issue_key).await?;

        let available: Vec<Value> = transitions
            .iter()
            .map(|t| {
                let mut row = json!({
                    "id": t.id,
                    "name": t.name,
                    "to": target_status(t),
                });
                let required: Vec<Value> = t
                    .fields
                    .iter()
                    .filter(|(_, field)| field.required)
                    .map(|(id, field)| json!({ "id": id, "name": field.name.as_deref().unwrap_or(id) }))
                    .collect();
                if !required.is_empty() {
                    row["requiredFields"] = Value::Array(required);
                }
                row
            })
            .collect();

        Ok(ToolResult::json(&json!({
            "issueKey": issue_key,
            "currentStatus": issue.fields.status_name(),
            "availableTransitions": available,
        })))
    }
}

pub struct TransitionIssueTool;

#[async_trait]
impl MCPTool for TransitionIssueTool {
    fn name(&self) -> &str {
        "transition_issue"
    }

    fn description(&self) -> &str {
        "Transition a Jira issue to a new workflow state.\n\n\
         The transition may be given by id or by name (e.g. 'Done', 'In Progress'). \
         Fields a transition requires go in `fields`, keyed by display name or id."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "issueKey": { "type": "string", "description": "Issue key (e.g. 'PROJ-123')" },
                "transition": { "type": "string", "description": "Transition name or id" },
                "comment": { "type": "string", "description": "Optional comment to add with the transition" },
                "fields": {
                    "type": "object",
                    "description": "Fields required by the transition (e.g. resolution)"
                }
            },
            "required": ["issueKey", "transition"]
        })
    }

    async fn execute(&self, params: Value, context: &ExecutionContext) -> Result<ToolResult, ToolError> {
        let issue_key = required_str(&params, "issueKey")?;
        let wanted = required_str(&params, "transition")?;
        let comment = optional_str(&params, "comment");
        let fields = optional_object(&params, "fields")?.filter(|f| !f.is_empty());

        let transitions = context.jira.transitions(issue_key).await?;
        let transition = find_transition(&transitions, wanted).ok_or_else(|| {
            let names: Vec<&str> = transitions.iter().map(|t| t.name.as_str()).collect();
            ToolError::Unresolved(format!(
                "Transition '{}' not available. Available transitions: {}",
                wanted,
                names.join(", ")
            ))
        })?;

        let issue = context.jira.get_issue(issue_key, Some("status"), None).await?;
        let from_status = issue.fields.status_name();

        let translated = match fields {
            Some(fields) => Some(context.field_catalog().await?.translate_to_ids(fields)?),
            None => None,
        };

        context
            .jira
            .transition_issue(issue_key, &transition.id, translated, comment)
            .await?;
        info!("Transitioned {} via '{}'", issue_key, transition.name);

        let mut result = json!({
            "message": format!("Issue {} transitioned successfully", issue_key),
            "issueKey": issue_key,
            "from": from_status,
            "to": target_status(transition),
            "transition": transition.name,
        });
        if comment.is_some() {
            result["comment"] = json!("Added");
        }
        Ok(ToolResult::json(&result))
    }
}
