use jsonschema::JSONSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::mcp::errors::{MCPError, MCPResult};
use crate::mcp::tools::{ExecutionContext, MCPTool, ToolError, ToolResult};

/// Tool information for MCP client discovery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

struct RegisteredTool {
    tool: Box<dyn MCPTool>,
    schema: JSONSchema,
    info: ToolInfo,
}

/// Collects tools at startup. [`ToolRegistryBuilder::build`] freezes them.
#[derive(Default)]
pub struct ToolRegistryBuilder {
    tools: HashMap<String, RegisteredTool>,
    order: Vec<String>,
}

impl ToolRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, compiling its input schema
    pub fn register(mut self, tool: Box<dyn MCPTool>) -> MCPResult<Self> {
        let name = tool.name().to_string();
        if name.is_empty() {
            return Err(MCPError::Validation("Tool name cannot be empty".to_string()));
        }
        if self.tools.contains_key(&name) {
            return Err(MCPError::Validation(format!("Tool '{}' is already registered", name)));
        }

        let input_schema = tool.input_schema();
        if !input_schema.is_object() {
            return Err(MCPError::Validation(format!(
                "Tool '{}' input schema must be a JSON object",
                name
            )));
        }
        let schema = JSONSchema::compile(&input_schema).map_err(|e| {
            MCPError::Validation(format!("Tool '{}' has an invalid input schema: {}", name, e))
        })?;

        debug!("Registering tool: {}", name);
        let info = ToolInfo {
            name: name.clone(),
            description: tool.description().to_string(),
            input_schema,
        };
        self.order.push(name.clone());
        self.tools.insert(name, RegisteredTool { tool, schema, info });
        Ok(self)
    }

    pub fn register_all(self, tools: Vec<Box<dyn MCPTool>>) -> MCPResult<Self> {
        tools.into_iter().try_fold(self, |builder, tool| builder.register(tool))
    }

    pub fn build(self) -> ToolRegistry {
        info!("Tool registry built with {} tools", self.order.len());
        ToolRegistry {
            tools: self.tools,
            order: self.order,
        }
    }
}

/// Immutable name -> tool table, safe to share across concurrent calls
pub struct ToolRegistry {
    tools: HashMap<String, RegisteredTool>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::new()
    }

    /// Registry holding every Jira tool
    pub fn with_jira_tools() -> MCPResult<Self> {
        Ok(Self::builder()
            .register_all(crate::mcp::tools::jira::all_tools())?
            .build())
    }

    /// Tools in registration order
    pub fn list_tools(&self) -> Vec<ToolInfo> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|registered| registered.info.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Look up, validate and execute. Nothing reaches Jira unless the
    /// arguments pass both the schema and the tool's own checks.
    pub async fn call_tool(
        &self,
        name: &str,
        params: Option<Value>,
        context: &ExecutionContext,
    ) -> Result<ToolResult, ToolError> {
        let registered = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        let params = match params {
            None | Some(Value::Null) => json!({}),
            Some(params @ Value::Object(_)) => params,
            Some(_) => {
                return Err(ToolError::InvalidParams(
                    "Tool arguments must be a JSON object".to_string(),
                ));
            }
        };

        if let Err(errors) = registered.schema.validate(&params) {
            let messages: Vec<String> = errors
                .map(|e| {
                    let path = e.instance_path.to_string();
                    if path.is_empty() {
                        e.to_string()
                    } else {
                        format!("{}: {}", path, e)
                    }
                })
                .collect();
            return Err(ToolError::InvalidParams(messages.join("; ")));
        }
        registered.tool.validate_params(&params)?;

        debug!("Executing tool: {}", name);
        registered.tool.execute(params, context).await
    }

    /// Like [`ToolRegistry::call_tool`], with every failure folded into an
    /// error result
    pub async fn dispatch(&self, name: &str, params: Option<Value>, context: &ExecutionContext) -> ToolResult {
        match self.call_tool(name, params, context).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Tool '{}' failed ({}): {}", name, e.kind().as_str(), e);
                ToolResult::from_error(&e)
            }
        }
    }
}
