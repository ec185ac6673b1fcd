//! WebSocket gateway for downstream cluster agents.
//!
//! # Connection lifecycle
//!
//! 1. The handshake's `Authorization` header is resolved to a cluster; unknown
//!    tokens are refused with `401 Unauthorized`.
//! 2. The connection gets a fresh session ID and a bounded command queue, and
//!    is registered with the [`ClusterSessionRegistry`].
//! 3. A writer task serializes queued [`AgentCommand`]s as JSON text frames
//!    while the connection task reads [`AgentMessage`] result frames.
//! 4. A close frame, a read error or a writer failure unregisters the session
//!    immediately.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};
use tracing::{debug, info, trace, warn};

use crate::application::session::ClusterSessionRegistry;
use crate::domain::command::{AgentCommand, AgentMessage};
use crate::domain::id::{ClusterId, SessionId};
use crate::error::Result;
use crate::port::inbound::callback::ResultHandler;

type AgentSocket = WebSocketStream<TcpStream>;

/// Default depth of a session's command queue.
pub const DEFAULT_COMMAND_BUFFER: usize = 64;

/// Accepts agent connections and bridges them to the session registry.
pub struct AgentGateway {
    registry: Arc<ClusterSessionRegistry>,
    handler: Arc<dyn ResultHandler>,
    tokens: HashMap<String, ClusterId>,
    command_buffer: usize,
}

impl AgentGateway {
    /// Create a gateway accepting the given token → cluster mapping.
    pub fn new(
        registry: Arc<ClusterSessionRegistry>,
        handler: Arc<dyn ResultHandler>,
        tokens: HashMap<String, ClusterId>,
    ) -> Self {
        Self {
            registry,
            handler,
            tokens,
            command_buffer: DEFAULT_COMMAND_BUFFER,
        }
    }

    /// Resolve an `Authorization` header value. A `Bearer ` prefix is optional.
    #[must_use]
    pub fn resolve_token(&self, header: Option<&str>) -> Option<ClusterId> {
        let raw = header?.trim();
        let token = raw.strip_prefix("Bearer ").unwrap_or(raw).trim();
        self.tokens.get(token).cloned()
    }

    /// Accept connections until `shutdown` flips to true.
    pub async fn serve(
        self: Arc<Self>,
        listener: TcpListener,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        info!(addr = %listener.local_addr()?, "Agent gateway listening");

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let gateway = Arc::clone(&self);
                        tokio::spawn(async move {
                            if let Err(e) = gateway.handle_connection(stream, peer).await {
                                debug!(peer = %peer, error = %e, "Agent connection ended with error");
                            }
                        });
                    }
                    Err(e) => warn!(error = %e, "Failed to accept agent connection"),
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Agent gateway stopped");
        Ok(())
    }

    async fn handle_connection(&self, stream: TcpStream, peer: SocketAddr) -> Result<()> {
        let mut cluster = None;
        let socket = accept_hdr_async(stream, |request: &Request, response: Response| {
            let header = request
                .headers()
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok());
            match self.resolve_token(header) {
                Some(cluster_id) => {
                    cluster = Some(cluster_id);
                    Ok(response)
                }
                None => Err(unauthorized()),
            }
        })
        .await;

        let socket = match socket {
            Ok(socket) => socket,
            Err(e) => {
                warn!(peer = %peer, error = %e, "Agent handshake rejected");
                return Ok(());
            }
        };
        let Some(cluster_id) = cluster else {
            return Ok(());
        };

        let session_id = SessionId::generate();
        let (tx, rx) = mpsc::channel(self.command_buffer);
        self.registry
            .on_connect(session_id.clone(), cluster_id.clone(), tx);

        let (sink, source) = socket.split();
        let mut writer = tokio::spawn(write_commands(session_id.clone(), sink, rx));

        let outcome = tokio::select! {
            read = self.read_results(&cluster_id, &session_id, source) => read,
            written = &mut writer => written.unwrap_or(Ok(())),
        };
        writer.abort();
        self.registry.on_disconnect(&session_id);
        outcome
    }

    async fn read_results(
        &self,
        cluster_id: &ClusterId,
        session_id: &SessionId,
        mut source: SplitStream<AgentSocket>,
    ) -> Result<()> {
        while let Some(frame) = source.next().await {
            let payload = match frame? {
                Message::Text(text) => text.into_bytes(),
                Message::Binary(bytes) => bytes,
                Message::Close(_) => {
                    debug!(session = %session_id, "Agent closed the connection");
                    break;
                }
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            };

            let message: AgentMessage = match serde_json::from_slice(&payload) {
                Ok(message) => message,
                Err(e) => {
                    warn!(session = %session_id, error = %e, "Ignoring malformed agent frame");
                    continue;
                }
            };
            trace!(session = %session_id, ?message, "Agent message");

            if let Err(e) = self.handler.handle(cluster_id, message).await {
                warn!(cluster = %cluster_id, session = %session_id, error = %e, "Failed to apply agent result");
            }
        }
        Ok(())
    }
}

async fn write_commands(
    session_id: SessionId,
    mut sink: SplitSink<AgentSocket, Message>,
    mut commands: mpsc::Receiver<AgentCommand>,
) -> Result<()> {
    while let Some(command) = commands.recv().await {
        let text = serde_json::to_string(&command)?;
        trace!(session = %session_id, kind = command.kind(), "Sending command");
        sink.send(Message::Text(text)).await?;
    }
    let _ = sink.close().await;
    Ok(())
}

fn unauthorized() -> ErrorResponse {
    let mut response = ErrorResponse::new(Some("unauthorized".to_string()));
    *response.status_mut() = StatusCode::UNAUTHORIZED;
    response
}
