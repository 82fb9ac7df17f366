use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tracing::debug;

use super::{issue_row, percent};
use crate::mcp::tools::{ExecutionContext, MCPTool, ToolError, ToolResult, optional_str, optional_u64, required_str};

const SEARCH_FIELDS: [&str; 6] = ["summary", "description", "status", "priority", "assignee", "issuetype"];

/// Story points field read by `get_epic_issues`
const STORY_POINTS_FIELD: &str = "customfield_10001";

/// Clamp a caller-supplied page size into what Jira accepts
fn max_results(params: &Value, default: u64) -> u32 {
    optional_u64(params, "maxResults", default).clamp(1, 1000) as u32
}

/// Integral floats render without a fraction
fn number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        json!(value as i64)
    } else {
        json!(value)
    }
}

pub struct SearchIssuesTool;

#[async_trait]
impl MCPTool for SearchIssuesTool {
    fn name(&self) -> &str {
        "search_issues"
    }

    fn description(&self) -> &str {
        "Search for issues in a project using JQL"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "projectKey": { "type": "string", "description": "Project key (e.g. \"MRR\")" },
                "jql": { "type": "string", "description": "JQL filter statement" }
            },
            "required": ["projectKey", "jql"]
        })
    }

    async fn execute(&self, params: Value, context: &ExecutionContext) -> Result<ToolResult, ToolError> {
        let project_key = required_str(&params, "projectKey")?;
        let jql = required_str(&params, "jql")?;

        let full_jql = format!("project = {} AND {}", project_key, jql);
        let issues = context.jira.search_issues(&full_jql, 30, &SEARCH_FIELDS).await?;
        debug!("search_issues matched {} issues", issues.len());

        let rows: Vec<Value> = issues.iter().map(issue_row).collect();
        Ok(ToolResult::json(&Value::Array(rows)))
    }
}

pub struct SearchMyIssuesTool;

impl SearchMyIssuesTool {
    fn build_jql(role: &str, project_key: Option<&str>, status: &str) -> String {
        let mut clauses = vec![match role {
            "reporter" => "reporter = currentUser()".to_string(),
            "watcher" => "watcher = currentUser()".to_string(),
            "any" => "(assignee = currentUser() OR reporter = currentUser() OR watcher = currentUser())"
                .to_string(),
            _ => "assignee = currentUser()".to_string(),
        }];
        if let Some(project_key) = project_key {
            clauses.push(format!("project = {}", project_key));
        }
        match status {
            "in_progress" => clauses.push("status = \"In Progress\"".to_string()),
            "open" => clauses.push("status != Done AND status != Closed".to_string()),
            _ => {}
        }
        format!("{} ORDER BY updated DESC", clauses.join(" AND "))
    }
}

#[async_trait]
impl MCPTool for SearchMyIssuesTool {
    fn name(&self) -> &str {
        "search_my_issues"
    }

    fn description(&self) -> &str {
        "Search for Jira issues assigned to you, reported by you or that you are watching.\n\n\
         Returns key, summary and status of each issue, ready to reference in a git commit."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "projectKey": { "type": "string", "description": "Optional: filter to a specific project" },
                "status": {
                    "type": "string",
                    "enum": ["in_progress", "open", "all"],
                    "default": "in_progress",
                    "description": "Filter by status"
                },
                "role": {
                    "type": "string",
                    "enum": ["assignee", "reporter", "watcher", "any"],
                    "default": "assignee",
                    "description": "Your role on the issue"
                },
                "maxResults": { "type": "integer", "default": 10, "description": "Maximum results" }
            },
            "required": []
        })
    }

    async fn execute(&self, params: Value, context: &ExecutionContext) -> Result<ToolResult, ToolError> {
        let project_key = optional_str(&params, "projectKey");
        let status = optional_str(&params, "status").unwrap_or("in_progress");
        let role = optional_str(&params, "role").unwrap_or("assignee");

        let jql = Self::build_jql(role, project_key, status);
        let issues = context
            .jira
            .search_issues(&jql, max_results(&params, 10), &["summary", "status", "issuetype", "priority", "project"])
            .await?;

        let rows: Vec<Value> = issues
            .iter()
            .map(|issue| {
                json!({
                    "key": issue.key,
                    "summary": issue.fields.summary,
                    "status": issue.fields.status_name(),
                    "type": issue.fields.type_name(),
                    "project": issue.fields.project.as_ref().map(|p| p.key.clone()),
                    "commitFormat": format!("{}: ", issue.key),
                })
            })
            .collect();

        let mut result = Map::new();
        result.insert("count".into(), json!(rows.len()));
        if let Some(project_key) = project_key {
            result.insert("projectFilter".into(), json!(project_key));
        }
        result.insert("statusFilter".into(), json!(status));
        result.insert("roleFilter".into(), json!(role));
        if let Some(first) = issues.first() {
            result.insert(
                "hint".into(),
                json!(format!("Use issue key in commit: git commit -m \"{}: your message\"", first.key)),
            );
        }
        result.insert("issues".into(), Value::Array(rows));

        Ok(ToolResult::json(&Value::Object(result)))
    }
}

pub struct ListEpicsTool;

#[async_trait]
impl MCPTool for ListEpicsTool {
    fn name(&self) -> &str {
        "list_epics"
    }

    fn description(&self) -> &str {
        "List epics in a Jira project with their key, summary and status.\n\n\
         Useful for finding which epic a new story should belong to."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "projectKey": { "type": "string", "description": "Project key (e.g. 'PROJ')" },
                "status": {
                    "type": "string",
                    "enum": ["open", "done", "all"],
                    "default": "open",
                    "description": "Filter by status"
                },
                "maxResults": { "type": "integer", "default": 50, "description": "Maximum number of epics" }
            },
            "required": ["projectKey"]
        })
    }

    async fn execute(&self, params: Value, context: &ExecutionContext) -> Result<ToolResult, ToolError> {
        let project_key = required_str(&params, "projectKey")?;
        let status = optional_str(&params, "status").unwrap_or("open");

        let status_clause = match status {
            "open" => " AND status != Done",
            "done" => " AND status = Done",
            _ => "",
        };
        let jql = format!(
            "project = {} AND issuetype = Epic{} ORDER BY created DESC",
            project_key, status_clause
        );

        let epics = context
            .jira
            .search_issues(&jql, max_results(&params, 50), &["summary", "status", "priority", "assignee"])
            .await?;

        let rows: Vec<Value> = epics
            .iter()
            .map(|epic| {
                let mut row = json!({
                    "key": epic.key,
                    "summary": epic.fields.summary,
                    "status": epic.fields.status_name(),
                });
                if let Some(priority) = epic.fields.priority_name() {
                    row["priority"] = json!(priority);
                }
                if let Some(assignee) = epic.fields.assignee_name() {
                    row["assignee"] = json!(assignee);
                }
                row
            })
            .collect();

        Ok(ToolResult::json(&json!({
            "projectKey": project_key,
            "filter": status,
            "count": rows.len(),
            "epics": rows,
        })))
    }
}

pub struct GetEpicIssuesTool;

#[async_trait]
impl MCPTool for GetEpicIssuesTool {
    fn name(&self) -> &str {
        "get_epic_issues"
    }

    fn description(&self) -> &str {
        "Get all issues that belong to an epic, with a progress summary.\n\n\
         Returns stories, tasks and bugs linked to the epic and how many are done."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "epicKey": { "type": "string", "description": "Epic issue key (e.g. 'PROJ-100')" },
                "status": {
                    "type": "string",
                    "enum": ["open", "done", "all"],
                    "default": "all",
                    "description": "Filter by status"
                },
                "maxResults": { "type": "integer", "default": 100, "description": "Maximum number of issues" }
            },
            "required": ["epicKey"]
        })
    }

    async fn execute(&self, params: Value, context: &ExecutionContext) -> Result<ToolResult, ToolError> {
        let epic_key = required_str(&params, "epicKey")?;
        let status = optional_str(&params, "status").unwrap_or("all");

        let epic = context.jira.get_issue(epic_key, Some("summary"), None).await?;

        let status_clause = match status {
            "open" => " AND status != Done",
            "done" => " AND status = Done",
            _ => "",
        };
        let jql = format!(
            "\"Epic Link\" = {}{} ORDER BY status ASC, priority DESC",
            epic_key, status_clause
        );
        let issues = context
            .jira
            .search_issues(
                &jql,
                max_results(&params, 100),
                &["summary", "status", "issuetype", "priority", "assignee", STORY_POINTS_FIELD],
            )
            .await?;

        let mut done_issues = 0usize;
        let mut total_points = 0.0;
        let mut done_points = 0.0;
        let mut has_points = false;

        let rows: Vec<Value> = issues
            .iter()
            .map(|issue| {
                let fields = &issue.fields;
                let mut row = json!({
                    "key": issue.key,
                    "summary": fields.summary,
                    "type": fields.type_name(),
                    "status": fields.status_name(),
                });
                if let Some(priority) = fields.priority_name() {
                    row["priority"] = json!(priority);
                }
                if let Some(assignee) = fields.assignee_name() {
                    row["assignee"] = json!(assignee);
                }

                let points = fields
                    .value(STORY_POINTS_FIELD)
                    .and_then(Value::as_f64)
                    .filter(|p| *p != 0.0);
                if let Some(points) = points {
                    row["storyPoints"] = number(points);
                    total_points += points;
                    has_points = true;
                }

                let status = fields.status_name().to_lowercase();
                if status == "done" || status == "closed" {
                    done_issues += 1;
                    done_points += points.unwrap_or(0.0);
                }
                row
            })
            .collect();

        let total_issues = rows.len();
        let mut progress = json!({
            "totalIssues": total_issues,
            "doneIssues": done_issues,
            "percentComplete": percent(done_issues as f64, total_issues as f64),
            "summary": format!("{}/{} complete", done_issues, total_issues),
        });
        if has_points {
            progress["totalPoints"] = number(total_points);
            progress["donePoints"] = number(done_points);
            progress["pointsPercentComplete"] = json!(percent(done_points, total_points));
        }

        Ok(ToolResult::json(&json!({
            "epicKey": epic_key,
            "epicSummary": epic.fields.summary,
            "filter": status,
            "progress": progress,
            "issues": rows,
        })))
    }
}
