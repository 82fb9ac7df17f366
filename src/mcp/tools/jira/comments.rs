use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::info;

use super::attachments::{read_upload, upload};
use crate::mcp::tools::{ExecutionContext, MCPTool, ToolError, ToolResult, required_str};

const EMOTICON_NOTE: &str = "Supported Jira emoticons:\n\
    - Smileys: :) :( :P :D ;)\n\
    - Symbols: (y) (n) (i) (/) (x) (!)\n\
    - Notation: (+) (-) (?) (on) (off) (*) (*r) (*g) (*b) (*y) (flag)\n\n\
    Only use these Jira emoticons, never unicode emoji.";

pub struct AddCommentTool;

#[async_trait]
impl MCPTool for AddCommentTool {
    fn name(&self) -> &str {
        "add_comment"
    }

    fn description(&self) -> &str {
        "Add a comment to a Jira issue"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "issueKey": { "type": "string", "description": "Key of the issue to comment on" },
                "comment": { "type": "string", "description": format!("Comment text. {}", EMOTICON_NOTE) }
            },
            "required": ["issueKey", "comment"]
        })
    }

    async fn execute(&self, params: Value, context: &ExecutionContext) -> Result<ToolResult, ToolError> {
        let issue_key = required_str(&params, "issueKey")?;
        let body = required_str(&params, "comment")?;

        let comment = context.jira.add_comment(issue_key, body).await?;
        info!("Added comment {} to {}", comment.id, issue_key);

        Ok(ToolResult::json(&json!({
            "message": "Comment added successfully",
            "id": comment.id,
        })))
    }
}

pub struct AddCommentWithAttachmentTool;

#[async_trait]
impl MCPTool for AddCommentWithAttachmentTool {
    fn name(&self) -> &str {
        "add_comment_with_attachment"
    }

    fn description(&self) -> &str {
        "Add a comment with a file attachment to a Jira issue. \
         The file is checked before anything is posted."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "issueKey": { "type": "string", "description": "Key of the issue to comment on" },
                "comment": { "type": "string", "description": format!("Comment text. {}", EMOTICON_NOTE) },
                "filename": { "type": "string", "description": "Name of the attachment in the issue" },
                "filepath": { "type": "string", "description": "Path of the local file to attach" }
            },
            "required": ["issueKey", "comment", "filename", "filepath"]
        })
    }

    async fn execute(&self, params: Value, context: &ExecutionContext) -> Result<ToolResult, ToolError> {
        let issue_key = required_str(&params, "issueKey")?;
        let body = required_str(&params, "comment")?;
        let filename = required_str(&params, "filename")?;
        let filepath = required_str(&params, "filepath")?;

        let data = read_upload(context, filepath).await?;

        let comment = context.jira.add_comment(issue_key, body).await?;
        let attachment = upload(context, issue_key, filename, data).await?;

        Ok(ToolResult::json(&json!({
            "message": "Comment and attachment added successfully",
            "commentId": comment.id,
            "attachmentId": attachment.map(|a| a.id),
            "filename": filename,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jira::mock::{MockJira, issue};
    use crate::mcp::tools::jira::testing::{context, run};
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn adds_comment() {
        let jira = Arc::new(MockJira::new().with_issue(issue("PROJ-1", json!({}))));

        let result = run(
            &AddCommentTool,
            json!({"issueKey": "PROJ-1", "comment": "Looks good (y)"}),
            &context(&jira),
        )
        .await
        .unwrap();

        assert_eq!(result["message"], "Comment added successfully");
        let stored = jira.stored_issue("PROJ-1").unwrap();
        assert_eq!(stored.fields.comments()[0].body.as_deref(), Some("Looks good (y)"));
        assert_eq!(result["id"], stored.fields.comments()[0].id);
    }

    #[tokio::test]
    async fn comment_with_attachment_posts_both_in_order() {
        let jira = Arc::new(MockJira::new().with_issue(issue("PROJ-1", json!({}))));
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("trace.log"), "stack").unwrap();
        let ctx = ExecutionContext::new(jira.clone(), dir.path());

        let result = run(
            &AddCommentWithAttachmentTool,
            json!({
                "issueKey": "PROJ-1",
                "comment": "Trace attached",
                "filename": "trace.log",
                "filepath": "trace.log"
            }),
            &ctx,
        )
        .await
        .unwrap();

        assert_eq!(jira.calls(), vec!["add_comment", "add_attachment"]);
        assert!(result["commentId"].is_string());
        assert!(result["attachmentId"].is_string());
    }

    #[tokio::test]
    async fn unreadable_file_posts_nothing() {
        let jira = Arc::new(MockJira::new().with_issue(issue("PROJ-1", json!({}))));
        let dir = TempDir::new().unwrap();
        let ctx = ExecutionContext::new(jira.clone(), dir.path());

        let err = run(
            &AddCommentWithAttachmentTool,
            json!({
                "issueKey": "PROJ-1",
                "comment": "Trace attached",
                "filename": "trace.log",
                "filepath": "absent.log"
            }),
            &ctx,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ToolError::FileSystem(_)));
        assert_eq!(jira.call_count(), 0);
    }
}
