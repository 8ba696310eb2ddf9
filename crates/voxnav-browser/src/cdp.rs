//! CDP (Chrome DevTools Protocol) WebSocket client.
//!
//! Commands carry auto-incrementing ids; a background reader matches each
//! response to the waiting caller. Events are not consumed; the document
//! host only issues request/response commands.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::error::BrowserError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<CdpReply>>>>;

/// Default per-command timeout.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Something that can run CDP commands against one page.
#[async_trait]
pub trait CdpSession: Send + Sync {
    /// Send `method` with `params` and return the `result` object.
    async fn call(&self, method: &str, params: Value) -> Result<Value, BrowserError>;
}

#[derive(Debug, Serialize)]
struct CdpRequest<'a> {
    id: u64,
    method: &'a str,
    params: Value,
}

/// Error object in a CDP response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CdpReplyError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<String>,
}

/// A response correlated to a command id.
#[derive(Debug, Clone, PartialEq)]
pub enum CdpReply {
    Ok(Value),
    Err(CdpReplyError),
    /// The connection dropped before a response arrived.
    Closed,
}

/// WebSocket connection to one page target.
pub struct CdpClient {
    next_id: AtomicU64,
    pending: Pending,
    writer: Mutex<SplitSink<WsStream, Message>>,
    closed: Arc<AtomicBool>,
    timeout: Duration,
    reader: tokio::task::JoinHandle<()>,
}

impl CdpClient {
    /// Connect to `ws://host:port/devtools/page/<id>`.
    pub async fn connect(ws_url: &str) -> Result<Self, BrowserError> {
        tracing::info!(url = ws_url, "connecting to Chrome DevTools");

        let (stream, _) = tokio_tungstenite::connect_async(ws_url)
            .await
            .map_err(|e| BrowserError::ConnectionFailed {
                url: ws_url.to_string(),
                reason: e.to_string(),
            })?;
        let (writer, reader) = stream.split();

        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let reader = tokio::spawn(read_loop(reader, pending.clone(), closed.clone()));

        Ok(Self {
            next_id: AtomicU64::new(1),
            pending,
            writer: Mutex::new(writer),
            closed,
            timeout: DEFAULT_COMMAND_TIMEOUT,
            reader,
        })
    }

    /// Per-command response timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Send a command and wait for its result.
    pub async fn send_command(&self, method: &str, params: Value) -> Result<Value, BrowserError> {
        if self.is_closed() {
            return Err(BrowserError::Disconnected);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let json = serde_json::to_string(&CdpRequest { id, method, params })
            .map_err(|e| BrowserError::protocol(format!("failed to serialize command: {e}")))?;

        let rx = register(&self.pending, &self.closed, id).await?;

        tracing::debug!(id, method, "sending CDP command");
        let sent = self.writer.lock().await.send(Message::Text(json.into())).await;
        if let Err(e) = sent {
            self.pending.lock().await.remove(&id);
            return Err(BrowserError::protocol(format!(
                "failed to send WebSocket message: {e}"
            )));
        }

        let reply = match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => CdpReply::Closed,
            Err(_) => {
                self.pending.lock().await.remove(&id);
                return Err(BrowserError::Timeout {
                    method: method.to_string(),
                    duration: self.timeout,
                });
            }
        };

        match reply {
            CdpReply::Ok(result) => Ok(result),
            CdpReply::Err(err) => Err(BrowserError::CdpError {
                code: err.code,
                message: err.message,
                data: err.data,
            }),
            CdpReply::Closed => Err(BrowserError::Disconnected),
        }
    }

    /// Enable a CDP domain such as `Page` or `DOM`.
    pub async fn enable_domain(&self, domain: &str) -> Result<(), BrowserError> {
        self.send_command(&format!("{domain}.enable"), serde_json::json!({}))
            .await
            .map(|_| ())
    }
}

impl Drop for CdpClient {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

#[async_trait]
impl CdpSession for CdpClient {
    async fn call(&self, method: &str, params: Value) -> Result<Value, BrowserError> {
        self.send_command(method, params).await
    }
}

async fn read_loop(mut reader: SplitStream<WsStream>, pending: Pending, closed: Arc<AtomicBool>) {
    while let Some(frame) = reader.next().await {
        let text = match frame {
            Ok(Message::Text(t)) => t.to_string(),
            Ok(Message::Binary(b)) => match String::from_utf8(b.to_vec()) {
                Ok(s) => s,
                Err(_) => continue,
            },
            Ok(Message::Close(_)) => {
                tracing::info!("CDP WebSocket closed by browser");
                break;
            }
            Ok(_) => continue,
            Err(e) => {
                tracing::warn!(error = %e, "CDP WebSocket read failed");
                break;
            }
        };

        let Some((id, reply)) = parse_reply(&text) else {
            continue;
        };
        match pending.lock().await.remove(&id) {
            Some(tx) => {
                let _ = tx.send(reply);
            }
            None => tracing::debug!(id, "response for unknown command id"),
        }
    }

    close_pending(&pending, &closed).await;
}

/// Add a waiter for `id`. The closed flag is checked under the `pending`
/// lock, so a waiter is either refused here or drained by [`close_pending`].
async fn register(
    pending: &Pending,
    closed: &AtomicBool,
    id: u64,
) -> Result<oneshot::Receiver<CdpReply>, BrowserError> {
    let mut waiters = pending.lock().await;
    if closed.load(Ordering::SeqCst) {
        return Err(BrowserError::Disconnected);
    }
    let (tx, rx) = oneshot::channel();
    waiters.insert(id, tx);
    Ok(rx)
}

/// Mark the connection closed and fail every waiter.
async fn close_pending(pending: &Pending, closed: &AtomicBool) {
    closed.store(true, Ordering::SeqCst);
    for (_, tx) in pending.lock().await.drain() {
        let _ = tx.send(CdpReply::Closed);
    }
}

/// Parse a response frame. Events and malformed frames yield `None`.
pub fn parse_reply(text: &str) -> Option<(u64, CdpReply)> {
    let json: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "CDP frame is not JSON");
            return None;
        }
    };
    let id = json.get("id")?.as_u64()?;
    let reply = match json.get("error") {
        Some(err) => match serde_json::from_value::<CdpReplyError>(err.clone()) {
            Ok(err) => CdpReply::Err(err),
            Err(_) => CdpReply::Err(CdpReplyError {
                code: -1,
                message: err.to_string(),
                data: None,
            }),
        },
        None => CdpReply::Ok(json.get("result").cloned().unwrap_or(Value::Null)),
    };
    Some((id, reply))
}
