use anyhow::{anyhow, Context, Result};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info, warn};
use url::Url;

use common::ChatConfig;

/// Lifecycle and data signals emitted by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Open,
    Message(String),
    Closed,
    Error(String),
}

/// Outbound half of a live chat connection.
pub trait Transport: Send {
    /// Queue a text frame. Fire-and-forget: no acknowledgment is awaited.
    fn send(&mut self, payload: String) -> Result<()>;

    /// Close the connection. Further sends fail.
    fn close(&mut self);
}

/// A freshly constructed transport together with its event stream.
pub struct TransportHandle {
    pub transport: Box<dyn Transport>,
    pub events: UnboundedReceiver<TransportEvent>,
}

/// Builds transports for a session. Construction also starts the connection attempt.
pub trait TransportFactory: Send + Sync {
    /// Returns `None` when no transport can be built; never panics.
    fn create_chat_transport(&self, credential: Option<&str>) -> Option<TransportHandle>;
}

/// Resolve the socket target, appending the bearer token as a `token` query parameter.
pub fn build_chat_url(base: &str, credential: Option<&str>) -> Result<Url> {
    let mut url = Url::parse(base).with_context(|| format!("Invalid chat socket url: {}", base))?;
    match url.scheme() {
        "ws" | "wss" => {}
        other => return Err(anyhow!("Unsupported chat socket scheme: {}", other)),
    }
    if let Some(token) = credential {
        url.query_pairs_mut().append_pair("token", token);
    }
    Ok(url)
}

/// WebSocket transport factory driving each socket on a tokio task.
#[derive(Debug, Clone)]
pub struct WsTransportFactory {
    socket_url: String,
}

impl WsTransportFactory {
    pub fn new(socket_url: impl Into<String>) -> Self {
        Self {
            socket_url: socket_url.into(),
        }
    }

    pub fn from_config(config: &ChatConfig) -> Self {
        Self::new(config.socket_url.clone())
    }
}

impl TransportFactory for WsTransportFactory {
    fn create_chat_transport(&self, credential: Option<&str>) -> Option<TransportHandle> {
        let url = match build_chat_url(&self.socket_url, credential) {
            Ok(url) => url,
            Err(e) => {
                error!(error = %e, "failed to build chat transport");
                return None;
            }
        };

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                error!(error = %e, "no async runtime available for chat transport");
                return None;
            }
        };

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        info!(
            endpoint = %self.socket_url,
            authenticated = credential.is_some(),
            "opening chat socket"
        );
        runtime.spawn(run_socket(url, event_tx, outbound_rx));

        Some(TransportHandle {
            transport: Box::new(WsTransport {
                outbound: Some(outbound_tx),
            }),
            events: event_rx,
        })
    }
}

struct WsTransport {
    outbound: Option<UnboundedSender<String>>,
}

impl Transport for WsTransport {
    fn send(&mut self, payload: String) -> Result<()> {
        let outbound = self
            .outbound
            .as_ref()
            .ok_or_else(|| anyhow!("chat transport is closed"))?;
        outbound
            .send(payload)
            .map_err(|_| anyhow!("chat socket task has stopped"))
    }

    fn close(&mut self) {
        // Dropping the sender tells the socket task to send a close frame and exit.
        self.outbound.take();
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.close();
    }
}

/// Socket task: connects, then relays frames both ways until either side closes.
async fn run_socket(
    url: Url,
    events: UnboundedSender<TransportEvent>,
    mut outbound: UnboundedReceiver<String>,
) {
    let connected = tokio::select! {
        res = connect_async(url.as_str()) => res,
        // Closed before the handshake finished; nobody is listening any more.
        _ = outbound.recv() => {
            debug!("chat transport closed while connecting");
            return;
        }
    };

    let stream = match connected {
        Ok((stream, _response)) => stream,
        Err(e) => {
            warn!(error = %e, "chat socket connection failed");
            let _ = events.send(TransportEvent::Error(e.to_string()));
            return;
        }
    };

    let _ = events.send(TransportEvent::Open);
    let (mut sink, mut source) = stream.split();

    loop {
        tokio::select! {
            outgoing = outbound.recv() => match outgoing {
                Some(text) => {
                    if let Err(e) = sink.send(WsMessage::Text(text)).await {
                        error!(error = %e, "failed to send chat frame");
                        let _ = events.send(TransportEvent::Error(e.to_string()));
                        return;
                    }
                }
                None => {
                    let _ = sink.send(WsMessage::Close(None)).await;
                    let _ = events.send(TransportEvent::Closed);
                    debug!("chat socket closed locally");
                    return;
                }
            },
            incoming = source.next() => match incoming {
                Some(Ok(WsMessage::Text(text))) => {
                    let _ = events.send(TransportEvent::Message(text));
                }
                Some(Ok(WsMessage::Binary(bytes))) => {
                    let text = String::from_utf8_lossy(&bytes).into_owned();
                    let _ = events.send(TransportEvent::Message(text));
                }
                Some(Ok(WsMessage::Close(_))) | None => {
                    info!("chat socket closed by server");
                    let _ = events.send(TransportEvent::Closed);
                    return;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    error!(error = %e, "chat socket error");
                    let _ = events.send(TransportEvent::Error(e.to_string()));
                    return;
                }
            },
        }
    }
}
