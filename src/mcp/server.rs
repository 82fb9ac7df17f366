//! MCP server loop: reads JSON-RPC messages from a transport, routes them and
//! writes the responses back.
//!
//! Every request runs on its own task, so one slow Jira call never holds up
//! the others. Responses funnel through a single channel into the transport,
//! which is the only writer.

use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::mcp::{
    MCP_PROTOCOL_VERSION, SERVER_NAME, SERVER_VERSION,
    errors::{MCPError, MCPResult, ServerError},
    protocol::{
        CallToolParams, InitializeParams, InitializeResult, MCPMessage, MCPRequest, MessageKind, ServerCapabilities,
        ServerInfo, ToolsCapability,
    },
    tools::{ExecutionContext, ToolRegistry},
    transport::MCPTransport,
};

#[derive(Clone)]
pub struct MCPServer {
    tool_registry: Arc<ToolRegistry>,
    context: Arc<ExecutionContext>,
}

impl MCPServer {
    pub fn new(tool_registry: Arc<ToolRegistry>, context: ExecutionContext) -> Self {
        info!(
            "MCP server ready with {} tools, working directory {}",
            tool_registry.len(),
            context.working_directory.display()
        );
        Self {
            tool_registry,
            context: Arc::new(context),
        }
    }

    /// Serve one connection until the peer closes its side.
    ///
    /// Requests still in flight at that point are allowed to finish and their
    /// responses are written before returning.
    pub async fn serve(&self, mut transport: Box<dyn MCPTransport>) -> MCPResult<()> {
        let (response_tx, mut response_rx) = mpsc::unbounded_channel::<MCPMessage>();

        loop {
            tokio::select! {
                incoming = transport.receive() => match incoming {
                    Ok(message) => self.handle_message(message, &response_tx),
                    Err(MCPError::Transport(_)) => {
                        debug!("Input closed");
                        break;
                    }
                    Err(e) => {
                        error!("Transport error: {}", e);
                        break;
                    }
                },
                Some(response) = response_rx.recv() => transport.send(response).await?,
            }
        }

        drop(response_tx);
        while let Some(response) = response_rx.recv().await {
            if let Err(e) = transport.send(response).await {
                warn!("Dropping response after input closed: {}", e);
            }
        }

        transport.close().await?;
        info!("MCP server stopped");
        Ok(())
    }

    fn handle_message(&self, message: MCPMessage, responses: &mpsc::UnboundedSender<MCPMessage>) {
        match message.kind() {
            Ok(MessageKind::Request) => {
                let request = match message.into_request() {
                    Ok(request) => request,
                    Err(e) => {
                        warn!("Malformed request: {}", e);
                        return;
                    }
                };

                let server = self.clone();
                let responses = responses.clone();
                tokio::spawn(async move {
                    let response = server.handle_request(request).await;
                    if responses.send(response).is_err() {
                        debug!("Response channel closed before a response was sent");
                    }
                });
            }
            Ok(MessageKind::Notification) => {
                debug!("Notification: {}", message.method.as_deref().unwrap_or_default());
            }
            Ok(MessageKind::Response) => {
                warn!("Ignoring response from client; this server sends no requests");
            }
            Err(e) => warn!("Dropping invalid message: {}", e),
        }
    }

    async fn handle_request(&self, request: MCPRequest) -> MCPMessage {
        debug!("Request {} ({})", request.method, request.id);

        let response = match request.method.as_str() {
            "initialize" => self.handle_initialize(request.params),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": self.tool_registry.list_tools() })),
            "tools/call" => self.handle_tool_call(request.params).await,
            _ => Err(MCPError::Server(ServerError::MethodNotFound(request.method.clone()))),
        };

        match response {
            Ok(result) => MCPMessage::response(request.id, result),
            Err(error) => {
                warn!("Request {} failed: {}", request.method, error);
                MCPMessage::error_response(request.id, error.into())
            }
        }
    }

    fn handle_initialize(&self, params: Option<Value>) -> MCPResult<Value> {
        if let Some(params) = params {
            let init_params: InitializeParams = serde_json::from_value(params)
                .map_err(|e| MCPError::Server(ServerError::InvalidParams(e.to_string())))?;
            info!(
                "Client {} {} connected (protocol {})",
                init_params.client_info.name, init_params.client_info.version, init_params.protocol_version
            );
        }

        let result = InitializeResult {
            protocol_version: MCP_PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: ToolsCapability { list_changed: false },
            },
            server_info: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: SERVER_VERSION.to_string(),
            },
            instructions: None,
        };

        Ok(serde_json::to_value(result)?)
    }

    async fn handle_tool_call(&self, params: Option<Value>) -> MCPResult<Value> {
        let params = params
            .ok_or_else(|| MCPError::Server(ServerError::InvalidParams("Missing parameters".to_string())))?;
        let call: CallToolParams = serde_json::from_value(params)
            .map_err(|_| MCPError::Server(ServerError::InvalidParams("Missing tool name".to_string())))?;

        let result = self
            .tool_registry
            .dispatch(&call.name, call.arguments, &self.context)
            .await;
        Ok(serde_json::to_value(result)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jira::mock::{MockJira, issue};
    use crate::mcp::tools::{MCPTool, ToolError, ToolResult};
    use crate::mcp::transport::ChannelTransport;
    use async_trait::async_trait;
    use tokio::sync::Notify;
    use tokio::task::JoinHandle;

    struct Harness {
        client: ChannelTransport,
        server: JoinHandle<MCPResult<()>>,
        jira: Arc<MockJira>,
    }

    fn start(registry: ToolRegistry, jira: MockJira) -> Harness {
        let jira = Arc::new(jira);
        let context = ExecutionContext::new(jira.clone(), std::env::temp_dir());
        let server = MCPServer::new(Arc::new(registry), context);
        let (client, server_end) = ChannelTransport::pair();
        let server = tokio::spawn(async move { server.serve(Box::new(server_end)).await });
        Harness { client, server, jira }
    }

    fn start_jira(jira: MockJira) -> Harness {
        start(ToolRegistry::with_jira_tools().unwrap(), jira)
    }

    async fn call(client: &mut ChannelTransport, id: i64, method: &str, params: Option<Value>) -> MCPMessage {
        client.send(MCPMessage::request(id, method, params)).await.unwrap();
        client.receive().await.unwrap()
    }

    #[tokio::test]
    async fn initialize_reports_server_identity() {
        let mut h = start_jira(MockJira::new());

        let response = call(
            &mut h.client,
            1,
            "initialize",
            Some(json!({"protocolVersion": "2024-11-05", "clientInfo": {"name": "test", "version": "1"}})),
        )
        .await;

        let result = response.result.unwrap();
        assert_eq!(response.id, Some(json!(1)));
        assert_eq!(result["protocolVersion"], "2024-11-05");
        assert_eq!(result["serverInfo"]["name"], "jira-api");
        assert!(result["capabilities"]["tools"].is_object());
    }

    #[tokio::test]
    async fn ping_and_tool_listing() {
        let mut h = start_jira(MockJira::new());

        let pong = call(&mut h.client, 1, "ping", None).await;
        assert_eq!(pong.result, Some(json!({})));

        let listing = call(&mut h.client, 2, "tools/list", None).await.result.unwrap();
        let tools = listing["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 26);
        assert_eq!(tools[0]["name"], "create_jira_issue");
        assert!(tools[0]["inputSchema"].is_object());
    }

    #[tokio::test]
    async fn tool_call_returns_content() {
        let mut h = start_jira(MockJira::new().with_issue(issue(
            "PROJ-1",
            json!({"summary": "Fix login", "status": {"name": "Open"}}),
        )));

        let response = call(
            &mut h.client,
            3,
            "tools/call",
            Some(json!({"name": "get_issue", "arguments": {"issueKey": "PROJ-1", "includeCustomFields": false}})),
        )
        .await;

        let result = response.result.unwrap();
        assert_eq!(result["isError"], false);
        let text: Value = serde_json::from_str(result["content"][0]["text"].as_str().unwrap()).unwrap();
        assert_eq!(text["summary"], "Fix login");
        assert_eq!(h.jira.calls(), vec!["get_issue"]);
    }

    #[tokio::test]
    async fn tool_failures_stay_inside_the_result() {
        let mut h = start_jira(MockJira::new());

        let response = call(
            &mut h.client,
            4,
            "tools/call",
            Some(json!({"name": "get_issue", "arguments": {"issueKey": "NOPE-1"}})),
        )
        .await;

        assert!(response.error.is_none());
        let result = response.result.unwrap();
        assert_eq!(result["isError"], true);
        let text: Value = serde_json::from_str(result["content"][0]["text"].as_str().unwrap()).unwrap();
        assert_eq!(text["status"], 404);
    }

    #[tokio::test]
    async fn protocol_errors_use_json_rpc_codes() {
        let mut h = start_jira(MockJira::new());

        let unknown = call(&mut h.client, 5, "resources/list", None).await;
        assert_eq!(unknown.error.unwrap().code, -32601);

        let nameless = call(&mut h.client, 6, "tools/call", Some(json!({"arguments": {}}))).await;
        let error = nameless.error.unwrap();
        assert_eq!(error.code, -32602);
        assert_eq!(error.message, "Missing tool name");
        assert_eq!(h.jira.call_count(), 0);
    }

    #[tokio::test]
    async fn notifications_get_no_response() {
        let mut h = start_jira(MockJira::new());

        h.client
            .send(MCPMessage::notification("notifications/initialized", None))
            .await
            .unwrap();
        let pong = call(&mut h.client, 7, "ping", None).await;
        assert_eq!(pong.id, Some(json!(7)));
    }

    #[tokio::test]
    async fn closing_input_stops_the_server() {
        let h = start_jira(MockJira::new());
        drop(h.client);
        assert!(h.server.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn replies_are_written_when_input_ends_right_after_requests() {
        use crate::mcp::transport::StdioTransport;
        use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

        let (mut client_in, server_in) = tokio::io::duplex(4096);
        let (server_out, client_out) = tokio::io::duplex(1 << 20);
        let context = ExecutionContext::new(Arc::new(MockJira::new()), std::env::temp_dir());
        let server = MCPServer::new(Arc::new(ToolRegistry::with_jira_tools().unwrap()), context);
        let serving = tokio::spawn(async move {
            server
                .serve(Box::new(StdioTransport::from_io(server_in, server_out)))
                .await
        });

        client_in
            .write_all(
                b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n\
                  {\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"tools/list\"}\n",
            )
            .await
            .unwrap();
        drop(client_in);
        serving.await.unwrap().unwrap();

        let mut lines = BufReader::new(client_out).lines();
        let mut ids = Vec::new();
        while let Some(line) = lines.next_line().await.unwrap() {
            let reply: Value = serde_json::from_str(&line).unwrap();
            ids.push(reply["id"].as_i64().unwrap());
        }
        ids.sort();
        assert_eq!(ids, vec![1, 2]);
    }

    struct BlockedTool(Arc<Notify>);

    #[async_trait]
    impl MCPTool for BlockedTool {
        fn name(&self) -> &str {
            "blocked"
        }

        fn description(&self) -> &str {
            "Waits until released"
        }

        fn input_schema(&self) -> Value {
            json!({ "type": "object", "properties": {} })
        }

        async fn execute(&self, _params: Value, _context: &ExecutionContext) -> Result<ToolResult, ToolError> {
            self.0.notified().await;
            Ok(ToolResult::message("released"))
        }
    }

    #[tokio::test]
    async fn slow_call_does_not_block_other_requests() {
        let release = Arc::new(Notify::new());
        let registry = ToolRegistry::builder()
            .register(Box::new(BlockedTool(release.clone())))
            .unwrap()
            .build();
        let mut h = start(registry, MockJira::new());

        let blocked = MCPMessage::request(1, "tools/call", Some(json!({"name": "blocked"})));
        h.client.send(blocked).await.unwrap();

        let pong = call(&mut h.client, 2, "ping", None).await;
        assert_eq!(pong.id, Some(json!(2)));

        release.notify_one();
        let released = h.client.receive().await.unwrap();
        assert_eq!(released.id, Some(json!(1)));
        assert_eq!(released.result.unwrap()["isError"], false);
    }
}
