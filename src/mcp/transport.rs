use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::mcp::{
    errors::{JsonRpcError, MCPError, MCPResult, TransportError},
    protocol::{MCPMessage, MessageParser},
};

/// Abstract transport trait for MCP communication
#[async_trait]
pub trait MCPTransport: Send + Sync {
    /// Send a message through the transport
    async fn send(&mut self, message: MCPMessage) -> MCPResult<()>;

    /// Receive the next message. Cancel-safe.
    async fn receive(&mut self) -> MCPResult<MCPMessage>;

    async fn close(&mut self) -> MCPResult<()>;

    fn is_connected(&self) -> bool;
}

/// Newline-delimited JSON-RPC over a byte stream pair, normally stdin/stdout
///
/// [`send`](MCPTransport::send) only queues; [`close`](MCPTransport::close)
/// waits until the writer task has flushed everything queued before it.
pub struct StdioTransport {
    sender: Option<mpsc::UnboundedSender<MCPMessage>>,
    receiver: mpsc::UnboundedReceiver<MCPMessage>,
    is_connected: Arc<AtomicBool>,
    reader: JoinHandle<()>,
    writer: Option<JoinHandle<()>>,
}

impl StdioTransport {
    pub fn new() -> Self {
        Self::from_io(tokio::io::stdin(), tokio::io::stdout())
    }

    /// Run the framing over arbitrary streams. Must be called inside a tokio runtime.
    pub fn from_io<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (msg_sender, msg_receiver) = mpsc::unbounded_channel();
        let (response_sender, response_receiver) = mpsc::unbounded_channel::<MCPMessage>();
        let is_connected = Arc::new(AtomicBool::new(true));

        // Writer: one JSON document per line
        let is_connected_clone = is_connected.clone();
        let writer = tokio::spawn(async move {
            let mut writer = writer;
            let mut response_receiver = response_receiver;
            while let Some(message) = response_receiver.recv().await {
                let json_data = match MessageParser::encode_line(&message) {
                    Ok(data) => data,
                    Err(e) => {
                        error!("Failed to serialize message: {}", e);
                        continue;
                    }
                };

                if let Err(e) = writer.write_all(&json_data).await {
                    error!("Failed to write to output: {}", e);
                    is_connected_clone.store(false, Ordering::SeqCst);
                    break;
                }
                if let Err(e) = writer.flush().await {
                    error!("Failed to flush output: {}", e);
                    is_connected_clone.store(false, Ordering::SeqCst);
                    break;
                }
            }
        });

        // Reader: unparseable lines are answered with a parse error
        let parse_error_sender = response_sender.clone();
        let is_connected_clone = is_connected.clone();
        let reader = tokio::spawn(async move {
            let mut lines = BufReader::new(reader).lines();

            loop {
                let line = match lines.next_line().await {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        debug!("Input stream closed");
                        break;
                    }
                    Err(e) => {
                        error!("Failed to read input: {}", e);
                        break;
                    }
                };

                if line.trim().is_empty() {
                    continue;
                }

                match MessageParser::parse_line(&line) {
                    Ok(mcp_message) => {
                        if msg_sender.send(mcp_message).is_err() {
                            warn!("Receiver dropped, closing stdio connection");
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Failed to parse MCP message: {}", e);
                        let reply = MCPMessage::error_response(serde_json::Value::Null, JsonRpcError::from(e));
                        let _ = parse_error_sender.send(reply);
                    }
                }
            }

            is_connected_clone.store(false, Ordering::SeqCst);
        });

        Self {
            sender: Some(response_sender),
            receiver: msg_receiver,
            is_connected,
            reader,
            writer: Some(writer),
        }
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MCPTransport for StdioTransport {
    async fn send(&mut self, message: MCPMessage) -> MCPResult<()> {
        let sender = self
            .sender
            .as_ref()
            .ok_or(MCPError::Transport(TransportError::Closed))?;
        sender.send(message).map_err(|_| {
            MCPError::Transport(TransportError::ConnectionLost(
                "Stdio sender channel closed".to_string(),
            ))
        })
    }

    async fn receive(&mut self) -> MCPResult<MCPMessage> {
        self.receiver
            .recv()
            .await
            .ok_or(MCPError::Transport(TransportError::Closed))
    }

    async fn close(&mut self) -> MCPResult<()> {
        self.is_connected.store(false, Ordering::SeqCst);
        self.receiver.close();

        // The writer stops once every reply sender is gone, including the
        // reader's parse-error clone.
        self.reader.abort();
        self.sender = None;
        if let Some(writer) = self.writer.take() {
            writer.await.map_err(|e| {
                MCPError::Transport(TransportError::ConnectionLost(format!("Writer task failed: {}", e)))
            })?;
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.is_connected.load(Ordering::SeqCst)
    }
}

/// In-process transport; [`ChannelTransport::pair`] returns two connected ends
pub struct ChannelTransport {
    sender: mpsc::UnboundedSender<MCPMessage>,
    receiver: mpsc::UnboundedReceiver<MCPMessage>,
    is_connected: bool,
}

impl ChannelTransport {
    pub fn pair() -> (Self, Self) {
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();
        (
            Self {
                sender: a_tx,
                receiver: b_rx,
                is_connected: true,
            },
            Self {
                sender: b_tx,
                receiver: a_rx,
                is_connected: true,
            },
        )
    }
}

#[async_trait]
impl MCPTransport for ChannelTransport {
    async fn send(&mut self, message: MCPMessage) -> MCPResult<()> {
        if !self.is_connected {
            return Err(MCPError::Transport(TransportError::Closed));
        }
        self.sender.send(message).map_err(|_| {
            MCPError::Transport(TransportError::ConnectionLost(
                "Peer dropped".to_string(),
            ))
        })
    }

    async fn receive(&mut self) -> MCPResult<MCPMessage> {
        self.receiver
            .recv()
            .await
            .ok_or(MCPError::Transport(TransportError::Closed))
    }

    async fn close(&mut self) -> MCPResult<()> {
        self.is_connected = false;
        self.receiver.close();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.is_connected
    }
}
