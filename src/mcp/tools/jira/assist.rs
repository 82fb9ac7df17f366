//! Tools that help write good issues and commits rather than change Jira

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use super::metadata::{meta_field_row, meta_project};
use crate::jira::models::{JiraIssue, JiraIssueFields};
use crate::mcp::tools::{
    ExecutionContext, MCPTool, ToolError, ToolResult, optional_bool, optional_str, required_str,
};

lazy_static! {
    static ref ISSUE_KEY: Regex = Regex::new(r"^[A-Z][A-Z0-9]+-\d+$").unwrap();
}

const COMMIT_TYPES: [&str; 7] = ["feat", "fix", "docs", "style", "refactor", "test", "chore"];

pub struct FormatCommitTool;

#[async_trait]
impl MCPTool for FormatCommitTool {
    fn name(&self) -> &str {
        "format_commit"
    }

    fn description(&self) -> &str {
        "Format a git commit message with a Jira issue reference.\n\n\
         Formats:\n\
         - Standard: 'PROJ-123: message'\n\
         - Conventional: 'feat(PROJ-123): message'\n\
         - Detailed: 'PROJ-123: message' followed by the issue summary"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "issueKey": { "type": "string", "description": "Jira issue key (e.g. 'PROJ-123')" },
                "message": { "type": "string", "description": "Commit message without the issue key" },
                "type": {
                    "type": "string",
                    "enum": COMMIT_TYPES,
                    "description": "Conventional commit type"
                },
                "includeDescription": {
                    "type": "boolean",
                    "default": false,
                    "description": "Include the issue summary in the commit body"
                },
                "validate": {
                    "type": "boolean",
                    "default": true,
                    "description": "Check that the issue exists in Jira"
                }
            },
            "required": ["issueKey", "message"]
        })
    }

    fn validate_params(&self, params: &Value) -> Result<(), ToolError> {
        let issue_key = required_str(params, "issueKey")?.to_uppercase();
        if !ISSUE_KEY.is_match(&issue_key) {
            return Err(ToolError::InvalidParams(format!(
                "Invalid issue key format: {}. Expected format: PROJ-123",
                issue_key
            )));
        }
        if required_str(params, "message")?.trim().is_empty() {
            return Err(ToolError::InvalidParams("message must not be blank".to_string()));
        }
        Ok(())
    }

    async fn execute(&self, params: Value, context: &ExecutionContext) -> Result<ToolResult, ToolError> {
        let issue_key = required_str(&params, "issueKey")?.to_uppercase();
        let message = required_str(&params, "message")?.trim();
        let commit_type = optional_str(&params, "type");
        let include_description = optional_bool(&params, "includeDescription", false);
        let validate = optional_bool(&params, "validate", true);

        let issue = if validate {
            Some(
                context
                    .jira
                    .get_issue(&issue_key, Some("summary,issuetype"), None)
                    .await?,
            )
        } else {
            None
        };
        let summary = issue.as_ref().and_then(|i| i.fields.summary.clone());

        let subject = match commit_type {
            Some(kind) => format!("{}({}): {}", kind, issue_key, message),
            None => format!("{}: {}", issue_key, message),
        };

        let mut commit_message = subject.clone();
        if include_description {
            if let (Some(issue), Some(summary)) = (&issue, &summary) {
                commit_message.push_str(&format!("\n\nRelated to: {}", summary));
                if issue.fields.issuetype.is_some() {
                    commit_message.push_str(&format!("\nIssue type: {}", issue.fields.type_name()));
                }
            }
        }

        let mut result = json!({
            "issueKey": issue_key,
            "commitMessage": commit_message,
            "subject": subject,
        });
        if let Some(summary) = summary {
            result["issueSummary"] = json!(summary);
        }
        result["gitCommand"] = json!(format!("git commit -m \"{}\"", commit_message.replace('"', "\\\"")));

        Ok(ToolResult::json(&result))
    }
}

/// Fields worth filling in for an issue type beyond what Jira requires
fn recommendations(issue_type: &str) -> Vec<Value> {
    match issue_type {
        "story" | "user story" => vec![
            json!({
                "field": "Story Points",
                "reason": "Helps with sprint planning",
                "suggestedValues": [1, 2, 3, 5, 8, 13]
            }),
            json!({ "field": "Epic Link", "reason": "Stories should belong to an epic" }),
        ],
        "bug" => vec![
            json!({ "field": "Priority", "reason": "Helps triage bugs" }),
            json!({ "field": "Steps to Reproduce", "reason": "Add to description for faster debugging" }),
        ],
        "task" => vec![json!({
            "field": "Story Points",
            "reason": "Tasks benefit from estimation",
            "suggestedValues": [1, 2, 3, 5]
        })],
        "epic" => vec![json!({ "field": "Epic Name", "reason": "Short name for linked issues" })],
        _ => Vec::new(),
    }
}

pub struct SuggestIssueFieldsTool;

#[async_trait]
impl MCPTool for SuggestIssueFieldsTool {
    fn name(&self) -> &str {
        "suggest_issue_fields"
    }

    fn description(&self) -> &str {
        "Get suggestions for creating a well-formed Jira issue: required fields, \
         recommended fields for the issue type and open epics to link to. \
         Use before create_jira_issue."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "projectKey": { "type": "string", "description": "Project key (e.g. 'PROJ')" },
                "issueType": { "type": "string", "description": "Issue type (e.g. 'Story', 'Bug', 'Task')" }
            },
            "required": ["projectKey", "issueType"]
        })
    }

    async fn execute(&self, params: Value, context: &ExecutionContext) -> Result<ToolResult, ToolError> {
        let project_key = required_str(&params, "projectKey")?;
        let issue_type = required_str(&params, "issueType")?;
        let lowered = issue_type.to_lowercase();

        let project = meta_project(context.jira.create_meta(project_key).await?, project_key)?;
        let matching = project
            .issuetypes
            .iter()
            .find(|it| it.name.to_lowercase() == lowered)
            .ok_or_else(|| {
                let available: Vec<&str> = project.issuetypes.iter().map(|it| it.name.as_str()).collect();
                ToolError::Unresolved(format!(
                    "Issue type '{}' not found. Available: {}",
                    issue_type,
                    available.join(", ")
                ))
            })?;

        let catalog = context.field_mapper.catalog();
        let required: Vec<Value> = matching
            .fields
            .iter()
            .filter(|(id, field)| field.required && id.as_str() != "project" && id.as_str() != "issuetype")
            .map(|(id, field)| {
                let mut row = meta_field_row(id, field, catalog.as_deref(), 10);
                if let Value::Object(map) = &mut row {
                    map.retain(|key, _| matches!(key.as_str(), "id" | "name" | "allowedValues"));
                }
                row
            })
            .collect();

        let mut result = json!({
            "projectKey": project_key,
            "issueType": issue_type,
            "requiredFields": required,
            "recommendations": recommendations(&lowered),
        });

        if lowered != "epic" {
            let jql = format!(
                "project = {} AND issuetype = Epic AND status != Done ORDER BY created DESC",
                project_key
            );
            match context.jira.search_issues(&jql, 5, &["summary"]).await {
                Ok(epics) if !epics.is_empty() => {
                    let rows: Vec<Value> = epics
                        .iter()
                        .map(|e| json!({ "key": e.key, "summary": e.fields.summary }))
                        .collect();
                    result["availableEpics"] = Value::Array(rows);
                }
                Ok(_) => {}
                Err(e) => warn!("Skipping epic suggestions for {}: {}", project_key, e),
            }
        }

        result["tips"] = json!([
            "Use get_create_meta for full field details",
            "Custom fields can use friendly names",
        ]);
        Ok(ToolResult::json(&result))
    }
}

const STORY_POINT_FIELDS: [&str; 2] = ["customfield_10016", "customfield_10026"];
const EPIC_LINK_FIELDS: [&str; 2] = ["customfield_10014", "customfield_10008"];

const AC_KEYWORDS: [&str; 6] = ["acceptance criteria", "given", "when", "then", "ac:", "criteria:"];
const DOD_KEYWORDS: [&str; 8] = [
    "definition of done",
    "dod",
    "done when",
    "complete when",
    "✓",
    "☑",
    "- [x]",
    "- [ ]",
];

const NO_DESCRIPTION: &str = "No description provided";
const NO_STORY_POINTS: &str = "No story points assigned";

/// Problems lower the score more than suggestions do
#[derive(Debug, Default)]
struct Findings {
    issues: Vec<&'static str>,
    suggestions: Vec<&'static str>,
    metadata: Map<String, Value>,
}

impl Findings {
    fn problem(&mut self, issue: &'static str, suggestion: &'static str) {
        self.issues.push(issue);
        self.suggestions.push(suggestion);
    }

    fn score(&self) -> u32 {
        let penalty = self.issues.len() * 15 + self.suggestions.len() * 5;
        100usize.saturating_sub(penalty) as u32
    }

    fn check_description(&mut self, description: Option<&str>, check_dod: bool, check_ac: bool) {
        let Some(description) = description.filter(|d| !d.is_empty()) else {
            self.problem(NO_DESCRIPTION, "Add a clear description of the work required");
            return;
        };

        let lowered = description.to_lowercase();
        if description.chars().count() < 50 {
            self.problem("Description is very short", "Expand description with more context");
        }
        if check_ac && !AC_KEYWORDS.iter().any(|kw| lowered.contains(kw)) {
            self.problem(
                "No acceptance criteria found",
                "Add acceptance criteria using Given/When/Then or bullet points",
            );
        }
        if check_dod && !DOD_KEYWORDS.iter().any(|kw| lowered.contains(kw)) {
            self.suggestions
                .push("Consider adding Definition of Done checklist items");
        }
    }

    fn check_estimation(&mut self, fields: &JiraIssueFields) {
        match STORY_POINT_FIELDS.iter().find_map(|id| fields.value(id)) {
            Some(points) => {
                self.metadata.insert("storyPoints".into(), points.clone());
            }
            None => self.problem(NO_STORY_POINTS, "Add story point estimate for capacity planning"),
        }

        let epic = EPIC_LINK_FIELDS
            .iter()
            .find_map(|id| fields.value(id))
            .map(|value| match value {
                Value::String(key) => key.clone(),
                Value::Object(map) => map
                    .get("key")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| value.to_string()),
                other => other.to_string(),
            })
            .or_else(|| fields.parent.as_ref().map(|p| p.key.clone()));
        match epic {
            Some(key) => {
                self.metadata.insert("epicLink".into(), json!(key));
            }
            None => self
                .suggestions
                .push("Consider linking to an Epic for better tracking"),
        }
    }

    fn check_metadata(&mut self, fields: &JiraIssueFields) {
        let issue_type = fields.type_name();
        self.metadata.insert("issueType".into(), json!(issue_type));

        if matches!(issue_type.to_lowercase().as_str(), "story" | "task" | "bug") {
            self.check_estimation(fields);
        }

        match fields.priority_name() {
            Some(priority) => {
                self.metadata.insert("priority".into(), json!(priority));
            }
            None => self.problem("No priority set", "Set priority to help with triage"),
        }

        match fields.assignee_name() {
            Some(assignee) => {
                self.metadata.insert("assignee".into(), json!(assignee));
            }
            None => self.suggestions.push("Assign to a team member when ready"),
        }

        match fields.labels.as_ref().filter(|l| !l.is_empty()) {
            Some(labels) => {
                self.metadata.insert("labels".into(), json!(labels));
            }
            None => self
                .suggestions
                .push("Consider adding labels for categorization"),
        }

        if let Some(components) = fields.components.as_ref().filter(|c| !c.is_empty()) {
            let names: Vec<&str> = components.iter().map(|c| c.name.as_str()).collect();
            self.metadata.insert("components".into(), json!(names));
        }
    }
}

fn quality_level(score: u32) -> &'static str {
    match score {
        90.. => "Excellent",
        75..=89 => "Good",
        50..=74 => "Needs Improvement",
        _ => "Poor",
    }
}

fn audit(issue: &JiraIssue, check_dod: bool, check_ac: bool) -> Value {
    let mut findings = Findings::default();
    findings.check_description(issue.fields.description.as_deref(), check_dod, check_ac);
    findings.check_metadata(&issue.fields);

    let score = findings.score();
    debug!("Audit of {} scored {}", issue.key, score);

    let mut result = json!({
        "issueKey": issue.key,
        "summary": issue.fields.summary,
        "qualityScore": score,
        "qualityLevel": quality_level(score),
        "issues": findings.issues,
        "suggestions": findings.suggestions,
        "metadata": findings.metadata,
    });

    if !findings.issues.is_empty() || !findings.suggestions.is_empty() {
        let mut actions = Vec::new();
        if findings.issues.contains(&NO_DESCRIPTION) {
            actions.push("Use update_issue to add description");
        }
        if findings.issues.contains(&NO_STORY_POINTS) {
            actions.push("Use update_issue to add story points");
        }
        result["quickActions"] = json!(actions);
    }
    result
}

pub struct AuditIssueTool;

#[async_trait]
impl MCPTool for AuditIssueTool {
    fn name(&self) -> &str {
        "audit_issue"
    }

    fn description(&self) -> &str {
        "Audit a Jira issue for quality and completeness.\n\n\
         Checks the description for acceptance criteria and Definition of Done, \
         story points and epic link for estimable items, and priority, assignee \
         and labels. Returns a quality score with actionable recommendations."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "issueKey": { "type": "string", "description": "Issue key (e.g. 'PROJ-123')" },
                "checkDefinitionOfDone": {
                    "type": "boolean",
                    "default": true,
                    "description": "Check for Definition of Done criteria"
                },
                "checkAcceptanceCriteria": {
                    "type": "boolean",
                    "default": true,
                    "description": "Check for acceptance criteria"
                }
            },
            "required": ["issueKey"]
        })
    }

    async fn execute(&self, params: Value, context: &ExecutionContext) -> Result<ToolResult, ToolError> {
        let issue_key = required_str(&params, "issueKey")?;
        let check_dod = optional_bool(&params, "checkDefinitionOfDone", true);
        let check_ac = optional_bool(&params, "checkAcceptanceCriteria", true);

        let issue = context.jira.get_issue(issue_key, None, None).await?;
        Ok(ToolResult::json(&audit(&issue, check_dod, check_ac)))
    }
}
