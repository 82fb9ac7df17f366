pub mod config;
pub mod jira;
pub mod mcp;
