/// MCP tools: the handler trait, results, errors and the per-call context
///
/// Every Jira operation is a value implementing [`MCPTool`], registered once
/// in an immutable [`ToolRegistry`].
pub mod jira;
pub mod registry;

pub use self::registry::{ToolInfo, ToolRegistry, ToolRegistryBuilder};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::DEFAULT_MAX_ATTACHMENT_BYTES;
use crate::jira::{FieldCatalog, FieldMapper, FieldMapperError, JiraApi, JiraError};

/// Core trait that all MCP tools must implement
#[async_trait]
pub trait MCPTool: Send + Sync {
    /// Get the tool name (unique identifier)
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Get the JSON schema for input parameters
    fn input_schema(&self) -> Value;

    /// Checks beyond the JSON schema. Runs before `execute`, so a failure
    /// here means no Jira call was made.
    fn validate_params(&self, _params: &Value) -> Result<(), ToolError> {
        Ok(())
    }

    async fn execute(&self, params: Value, context: &ExecutionContext) -> Result<ToolResult, ToolError>;
}

/// Everything a tool may touch while executing
#[derive(Clone)]
pub struct ExecutionContext {
    pub jira: Arc<dyn JiraApi>,
    pub field_mapper: Arc<FieldMapper>,

    /// Base for relative attachment paths and the default download directory
    pub working_directory: PathBuf,

    pub max_attachment_size: u64,
}

impl ExecutionContext {
    pub fn new(jira: Arc<dyn JiraApi>, working_directory: impl Into<PathBuf>) -> Self {
        Self {
            jira,
            field_mapper: Arc::new(FieldMapper::new()),
            working_directory: working_directory.into(),
            max_attachment_size: DEFAULT_MAX_ATTACHMENT_BYTES,
        }
    }

    pub fn with_field_mapper(mut self, field_mapper: Arc<FieldMapper>) -> Self {
        self.field_mapper = field_mapper;
        self
    }

    pub fn with_max_attachment_size(mut self, bytes: u64) -> Self {
        self.max_attachment_size = bytes;
        self
    }

    /// The populated field catalog, fetching it on first use
    pub async fn field_catalog(&self) -> Result<Arc<FieldCatalog>, ToolError> {
        Ok(self.field_mapper.populate(self.jira.as_ref()).await?)
    }

    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.working_directory.join(path)
        }
    }

    pub fn check_attachment_size(&self, size: u64, what: &str) -> Result<(), ToolError> {
        if size > self.max_attachment_size {
            return Err(ToolError::ResourceLimit(format!(
                "{} is {} bytes, exceeding the {} byte attachment limit",
                what, size, self.max_attachment_size
            )));
        }
        Ok(())
    }
}

/// Result of a `tools/call`, serialized as `{content, isError}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub content: Vec<Content>,
    #[serde(rename = "isError", default)]
    pub is_error: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Content {
    #[serde(rename = "text")]
    Text { text: String },
}

impl ToolResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![Content::Text { text: text.into() }],
            is_error: false,
        }
    }

    /// Pretty-printed JSON in a single text block
    pub fn json(value: &Value) -> Self {
        Self::text(serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()))
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self::json(&json!({ "message": message.into() }))
    }

    pub fn from_error(error: &ToolError) -> Self {
        let mut payload = json!({
            "error": error.to_string(),
            "kind": error.kind().as_str(),
        });
        if let Some(status) = error.status() {
            payload["status"] = json!(status);
        }
        Self {
            is_error: true,
            ..Self::json(&payload)
        }
    }

    /// Concatenated text of all blocks
    pub fn text_content(&self) -> String {
        self.content
            .iter()
            .map(|Content::Text { text }| text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Resolution,
    External,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Resolution => "resolution",
            ErrorKind::External => "external",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error(transparent)]
    Field(#[from] FieldMapperError),

    #[error("Unknown link type '{name}'. Available link types: {}", .available.join(", "))]
    UnknownLinkType { name: String, available: Vec<String> },

    #[error("{0}")]
    Unresolved(String),

    #[error(transparent)]
    Jira(#[from] JiraError),

    #[error("File system error: {0}")]
    FileSystem(String),

    #[error("Resource limit exceeded: {0}")]
    ResourceLimit(String),
}

impl ToolError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ToolError::InvalidParams(_) => ErrorKind::Validation,
            ToolError::NotFound(_)
            | ToolError::Field(_)
            | ToolError::UnknownLinkType { .. }
            | ToolError::Unresolved(_) => ErrorKind::Resolution,
            ToolError::Jira(_) | ToolError::FileSystem(_) | ToolError::ResourceLimit(_) => {
                ErrorKind::External
            }
        }
    }

    /// HTTP status of the underlying Jira failure, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            ToolError::Jira(e) => e.status(),
            _ => None,
        }
    }
}

/// A required, non-empty string argument
pub fn required_str<'a>(params: &'a Value, name: &str) -> Result<&'a str, ToolError> {
    match params.get(name) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.as_str()),
        Some(Value::String(_)) => Err(ToolError::InvalidParams(format!("{} must not be empty", name))),
        Some(_) => Err(ToolError::InvalidParams(format!("{} must be a string", name))),
        None => Err(ToolError::InvalidParams(format!("{} is required", name))),
    }
}

/// Like [`required_str`] but keeps whitespace-only values, for payloads
/// such as attachment content
pub fn required_text<'a>(params: &'a Value, name: &str) -> Result<&'a str, ToolError> {
    match params.get(name) {
        Some(Value::String(s)) if s.is_empty() => {
            Err(ToolError::InvalidParams(format!("{} must not be empty", name)))
        }
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(_) => Err(ToolError::InvalidParams(format!("{} must be a string", name))),
        None => Err(ToolError::InvalidParams(format!("{} is required", name))),
    }
}

/// An optional string argument; empty strings count as absent
pub fn optional_str<'a>(params: &'a Value, name: &str) -> Option<&'a str> {
    params
        .get(name)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

pub fn optional_bool(params: &Value, name: &str, default: bool) -> bool {
    params.get(name).and_then(Value::as_bool).unwrap_or(default)
}

pub fn optional_u64(params: &Value, name: &str, default: u64) -> u64 {
    params.get(name).and_then(Value::as_u64).unwrap_or(default)
}

pub fn optional_object<'a>(params: &'a Value, name: &str) -> Result<Option<&'a Map<String, Value>>, ToolError> {
    match params.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(ToolError::InvalidParams(format!("{} must be an object", name))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jira::mock::MockJira;

    #[test]
    fn error_results_carry_kind_and_status() {
        let err = ToolError::Jira(JiraError::NotFound {
            message: "Issue does not exist".into(),
        });
        let result = ToolResult::from_error(&err);
        assert!(result.is_error);

        let payload: Value = serde_json::from_str(&result.text_content()).unwrap();
        assert_eq!(payload["kind"], "external");
        assert_eq!(payload["status"], 404);

        let result = ToolResult::from_error(&ToolError::InvalidParams("issueKey is required".into()));
        let payload: Value = serde_json::from_str(&result.text_content()).unwrap();
        assert_eq!(payload["kind"], "validation");
        assert!(payload.get("status").is_none());
    }

    #[test]
    fn tool_result_serializes_is_error_in_camel_case() {
        let value = serde_json::to_value(ToolResult::text("ok")).unwrap();
        assert_eq!(value, json!({"content": [{"type": "text", "text": "ok"}], "isError": false}));
    }

    #[test]
    fn argument_helpers() {
        let params = json!({"a": "x", "b": "", "c": 3, "d": {"k": 1}, "e": true});
        assert_eq!(required_str(&params, "a").unwrap(), "x");
        assert!(matches!(required_str(&params, "b"), Err(ToolError::InvalidParams(_))));
        assert!(matches!(required_str(&params, "c"), Err(ToolError::InvalidParams(_))));
        assert!(matches!(required_str(&params, "z"), Err(ToolError::InvalidParams(_))));
        assert!(required_str(&json!({"w": " \t"}), "w").is_err());
        assert_eq!(required_text(&json!({"w": " \t"}), "w").unwrap(), " \t");
        assert!(required_text(&params, "b").is_err());
        assert_eq!(optional_str(&params, "b"), None);
        assert_eq!(optional_u64(&params, "c", 10), 3);
        assert_eq!(optional_u64(&params, "z", 10), 10);
        assert!(optional_bool(&params, "e", false));
        assert!(optional_object(&params, "d").unwrap().is_some());
        assert!(optional_object(&params, "a").is_err());
    }

    #[test]
    fn relative_paths_resolve_against_working_directory() {
        let context = ExecutionContext::new(Arc::new(MockJira::new()), "/work");
        assert_eq!(context.resolve_path("a/b.txt"), PathBuf::from("/work/a/b.txt"));
        assert_eq!(context.resolve_path("/tmp/c.txt"), PathBuf::from("/tmp/c.txt"));

        let context = context.with_max_attachment_size(4);
        assert!(context.check_attachment_size(4, "x").is_ok());
        assert!(matches!(
            context.check_attachment_size(5, "x"),
            Err(ToolError::ResourceLimit(_))
        ));
    }
}
