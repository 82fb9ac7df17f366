//! JSON-RPC 2.0 envelope and the MCP payloads this server reads or writes.

use crate::mcp::errors::{JsonRpcError, MCPError, MCPResult, ProtocolError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const JSONRPC_VERSION: &str = "2.0";

/// One JSON-RPC line as it appears on the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MCPMessage {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Request,
    Response,
    Notification,
}

/// A message that expects exactly one response carrying `id`
#[derive(Debug, Clone)]
pub struct MCPRequest {
    pub id: Value,
    pub method: String,
    pub params: Option<Value>,
}

fn invalid(reason: impl Into<String>) -> MCPError {
    MCPError::Protocol(ProtocolError::InvalidMessage(reason.into()))
}

impl MCPMessage {
    fn envelope(id: Option<Value>, method: Option<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method,
            params: None,
            result: None,
            error: None,
        }
    }

    pub fn request(id: impl Into<Value>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            params,
            ..Self::envelope(Some(id.into()), Some(method.into()))
        }
    }

    pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            params,
            ..Self::envelope(None, Some(method.into()))
        }
    }

    pub fn response(id: Value, result: Value) -> Self {
        Self {
            result: Some(result),
            ..Self::envelope(Some(id), None)
        }
    }

    pub fn error_response(id: Value, error: JsonRpcError) -> Self {
        Self {
            error: Some(error),
            ..Self::envelope(Some(id), None)
        }
    }

    /// Classify the message, rejecting field combinations JSON-RPC 2.0 forbids
    pub fn kind(&self) -> MCPResult<MessageKind> {
        if self.jsonrpc != JSONRPC_VERSION {
            return Err(invalid(format!("Unsupported jsonrpc version '{}'", self.jsonrpc)));
        }

        let carries_outcome = self.result.is_some() || self.error.is_some();
        match (&self.id, &self.method) {
            (_, Some(_)) if carries_outcome => Err(invalid("A call cannot carry result or error")),
            (Some(_), Some(_)) => Ok(MessageKind::Request),
            (None, Some(_)) => Ok(MessageKind::Notification),
            (Some(_), None) if self.params.is_some() => Err(invalid("A response cannot carry params")),
            (Some(_), None) => match (&self.result, &self.error) {
                (Some(_), Some(_)) => Err(invalid("A response cannot carry both result and error")),
                (None, None) => Err(invalid("A response needs a result or an error")),
                _ => Ok(MessageKind::Response),
            },
            (None, None) => Err(invalid("Message has neither id nor method")),
        }
    }

    pub fn is_request(&self) -> bool {
        matches!(self.kind(), Ok(MessageKind::Request))
    }

    pub fn is_notification(&self) -> bool {
        matches!(self.kind(), Ok(MessageKind::Notification))
    }

    pub fn into_request(self) -> MCPResult<MCPRequest> {
        match (self.id, self.method) {
            (Some(id), Some(method)) => Ok(MCPRequest {
                id,
                method,
                params: self.params,
            }),
            _ => Err(invalid("Message is not a request")),
        }
    }
}

/// MCP protocol initialization parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeParams {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    #[serde(default)]
    pub capabilities: Value,
    #[serde(rename = "clientInfo")]
    pub client_info: ClientInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    pub name: String,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsCapability {
    #[serde(rename = "listChanged", default)]
    pub list_changed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerCapabilities {
    #[serde(default)]
    pub tools: ToolsCapability,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

/// Initialize response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeResult {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    pub capabilities: ServerCapabilities,
    #[serde(rename = "serverInfo")]
    pub server_info: ServerInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

/// Parameters of a `tools/call` request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Option<Value>,
}

/// Newline framing: one JSON document per line in each direction
pub struct MessageParser;

impl MessageParser {
    pub fn parse_line(line: &str) -> MCPResult<MCPMessage> {
        let message: MCPMessage = serde_json::from_str(line)
            .map_err(|e| MCPError::Protocol(ProtocolError::ParseError(e.to_string())))?;
        message.kind()?;
        Ok(message)
    }

    /// Serialized message followed by `\n`
    pub fn encode_line(message: &MCPMessage) -> MCPResult<Vec<u8>> {
        message.kind()?;
        let mut line = serde_json::to_vec(message)
            .map_err(|e| MCPError::Protocol(ProtocolError::InternalError(e.to_string())))?;
        line.push(b'\n');
        Ok(line)
    }
}
