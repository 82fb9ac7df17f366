use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};
use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

use crate::jira::models::JiraAttachment;
use crate::mcp::tools::{
    ExecutionContext, MCPTool, ToolError, ToolResult, optional_str, required_str, required_text,
};

/// Read a local file for upload, enforcing the attachment limit before
/// loading it into memory
pub(crate) async fn read_upload(context: &ExecutionContext, filepath: &str) -> Result<Vec<u8>, ToolError> {
    let path = context.resolve_path(filepath);
    let metadata = fs::metadata(&path)
        .await
        .map_err(|_| ToolError::FileSystem(format!("File not found: {}", path.display())))?;
    if !metadata.is_file() {
        return Err(ToolError::FileSystem(format!("Not a regular file: {}", path.display())));
    }
    context.check_attachment_size(metadata.len(), &format!("File {}", path.display()))?;

    fs::read(&path)
        .await
        .map_err(|e| ToolError::FileSystem(format!("Failed to read {}: {}", path.display(), e)))
}

/// Upload and return the record Jira created
pub(crate) async fn upload(
    context: &ExecutionContext,
    issue_key: &str,
    filename: &str,
    data: Vec<u8>,
) -> Result<Option<JiraAttachment>, ToolError> {
    let size = data.len();
    let created = context.jira.add_attachment(issue_key, filename, data).await?;
    info!("Attached {} ({} bytes) to {}", filename, size, issue_key);
    Ok(created.into_iter().next())
}

/// Final path component of the Jira filename
fn local_name(attachment: &JiraAttachment) -> OsString {
    Path::new(&attachment.filename)
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| format!("attachment-{}", attachment.id).into())
}

/// One target path per attachment. A name already taken in this batch is
/// prefixed with the attachment id.
fn download_targets(dir: &Path, attachments: &[&JiraAttachment]) -> Vec<PathBuf> {
    let mut taken = HashSet::new();
    attachments
        .iter()
        .map(|attachment| {
            let mut name = local_name(attachment);
            while !taken.insert(name.clone()) {
                let mut renamed = OsString::from(format!("{}-", attachment.id));
                renamed.push(&name);
                name = renamed;
            }
            dir.join(name)
        })
        .collect()
}

async fn download(
    context: &ExecutionContext,
    attachment: &JiraAttachment,
    target: &Path,
) -> Result<Value, ToolError> {
    let data = context.jira.download_attachment(attachment).await?;
    fs::write(&target, &data)
        .await
        .map_err(|e| ToolError::FileSystem(format!("Failed to write {}: {}", target.display(), e)))?;
    debug!("Downloaded attachment {} to {}", attachment.id, target.display());

    Ok(json!({
        "id": attachment.id,
        "filename": attachment.filename,
        "path": target.display().to_string(),
        "size": data.len(),
    }))
}

pub struct AttachFileTool;

#[async_trait]
impl MCPTool for AttachFileTool {
    fn name(&self) -> &str {
        "attach_file"
    }

    fn description(&self) -> &str {
        "Add a local file as an attachment to a Jira issue"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "issueKey": { "type": "string", "description": "Key of the issue to attach to" },
                "filename": { "type": "string", "description": "Name of the attachment in the issue" },
                "filepath": { "type": "string", "description": "Path of the local file to attach" }
            },
            "required": ["issueKey", "filename", "filepath"]
        })
    }

    async fn execute(&self, params: Value, context: &ExecutionContext) -> Result<ToolResult, ToolError> {
        let issue_key = required_str(&params, "issueKey")?;
        let filename = required_str(&params, "filename")?;
        let filepath = required_str(&params, "filepath")?;

        let data = read_upload(context, filepath).await?;
        let attachment = upload(context, issue_key, filename, data).await?;

        Ok(ToolResult::json(&json!({
            "message": "File attached successfully",
            "filename": filename,
            "attachmentId": attachment.map(|a| a.id),
        })))
    }
}

pub struct AttachContentTool;

impl AttachContentTool {
    fn decode(content: &str, encoding: &str) -> Result<Vec<u8>, ToolError> {
        match encoding {
            "base64" => STANDARD
                .decode(content.trim())
                .map_err(|e| ToolError::InvalidParams(format!("Failed to decode base64 content: {}", e))),
            _ => Ok(content.as_bytes().to_vec()),
        }
    }
}

#[async_trait]
impl MCPTool for AttachContentTool {
    fn name(&self) -> &str {
        "attach_content"
    }

    fn description(&self) -> &str {
        "Create and attach content directly to a Jira issue. \
         Binary content can be sent base64 encoded."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "issueKey": { "type": "string", "description": "Key of the issue to attach to" },
                "filename": { "type": "string", "description": "Name of the attachment in the issue" },
                "content": { "type": "string", "description": "Content of the attachment" },
                "encoding": {
                    "type": "string",
                    "enum": ["none", "base64"],
                    "default": "none",
                    "description": "Encoding of the content"
                }
            },
            "required": ["issueKey", "filename", "content"]
        })
    }

    async fn execute(&self, params: Value, context: &ExecutionContext) -> Result<ToolResult, ToolError> {
        let issue_key = required_str(&params, "issueKey")?;
        let filename = required_str(&params, "filename")?;
        let content = required_text(&params, "content")?;
        let encoding = optional_str(&params, "encoding").unwrap_or("none");

        let data = Self::decode(content, encoding)?;
        context.check_attachment_size(data.len() as u64, "Content")?;
        let attachment = upload(context, issue_key, filename, data).await?;

        Ok(ToolResult::json(&json!({
            "message": "Content attached successfully",
            "filename": filename,
            "attachmentId": attachment.map(|a| a.id),
        })))
    }
}

pub struct GetIssueAttachmentTool;

#[async_trait]
impl MCPTool for GetIssueAttachmentTool {
    fn name(&self) -> &str {
        "get_issue_attachment"
    }

    fn description(&self) -> &str {
        "Download attachments from a Jira issue to a local directory. \
         Select one by attachmentId or filename; with neither, every attachment is downloaded."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "issueKey": { "type": "string", "description": "Key of the issue containing the attachment" },
                "attachmentId": { "type": "string", "description": "Id of the attachment to download" },
                "filename": { "type": "string", "description": "Name of the attachment to download" },
                "outputPath": {
                    "type": "string",
                    "description": "Directory to save into (defaults to the working directory)"
                }
            },
            "required": ["issueKey"]
        })
    }

    async fn execute(&self, params: Value, context: &ExecutionContext) -> Result<ToolResult, ToolError> {
        let issue_key = required_str(&params, "issueKey")?;
        let attachment_id = optional_str(&params, "attachmentId");
        let filename = optional_str(&params, "filename");
        let output_dir = context.resolve_path(optional_str(&params, "outputPath").unwrap_or("."));

        let by_id;
        let issue;
        let selected: Vec<&JiraAttachment> = match (attachment_id, filename) {
            (Some(id), _) => {
                by_id = context.jira.attachment(id).await?;
                vec![&by_id]
            }
            (None, filename) => {
                issue = context.jira.get_issue(issue_key, Some("attachment"), None).await?;
                let attachments = issue.fields.attachments();
                if attachments.is_empty() {
                    return Err(ToolError::Unresolved(format!("No attachments found in issue {}", issue_key)));
                }
                match filename {
                    Some(filename) => {
                        let found = attachments.iter().find(|a| a.filename == filename).ok_or_else(|| {
                            ToolError::Unresolved(format!(
                                "Attachment '{}' not found in issue {}",
                                filename, issue_key
                            ))
                        })?;
                        vec![found]
                    }
                    None => attachments.iter().collect(),
                }
            }
        };

        fs::create_dir_all(&output_dir).await.map_err(|e| {
            ToolError::FileSystem(format!("Failed to create {}: {}", output_dir.display(), e))
        })?;

        let targets = download_targets(&output_dir, &selected);
        let mut files = Vec::with_capacity(selected.len());
        for (attachment, target) in selected.iter().zip(&targets) {
            files.push(download(context, attachment, target).await?);
        }

        if attachment_id.is_some() || filename.is_some() {
            if let Some(mut file) = files.pop() {
                file["message"] = json!("Attachment downloaded successfully");
                return Ok(ToolResult::json(&file));
            }
        }

        Ok(ToolResult::json(&json!({
            "message": format!("Downloaded {} attachments", files.len()),
            "files": files,
            "outputPath": output_dir.display().to_string(),
        })))
    }
}
