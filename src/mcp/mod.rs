//! Model Context Protocol server: JSON-RPC framing, request routing and the
//! Jira tool catalogue.
pub mod errors;
pub mod protocol;
pub mod server;
pub mod tools;
pub mod transport;

pub use self::{server::MCPServer, tools::MCPTool, transport::MCPTransport};

/// MCP protocol revision this server speaks
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

pub const SERVER_NAME: &str = "jira-api";
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");
