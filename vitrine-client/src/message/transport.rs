use async_trait::async_trait;
use futures::channel::mpsc;
use futures::{Sink, SinkExt, Stream, StreamExt, future};
use shared::Frame;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio_tungstenite::tungstenite::Message;

use crate::error::{ClientError, ClientResult};

/// Frame going to the relay
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Text(String),
    /// Keepalive; transports without a ping concept drop it
    Ping,
}

pub type FrameSink = Pin<Box<dyn Sink<Outbound, Error = ClientError> + Send>>;
pub type FrameStream = Pin<Box<dyn Stream<Item = ClientResult<String>> + Send>>;

/// One live connection to the relay, split so reads and writes can be
/// driven from the same select loop
pub struct Connection {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

/// Transport abstraction: opens fresh connections on demand
#[async_trait]
pub trait Connector: Send + Sync + fmt::Debug {
    async fn connect(&self) -> ClientResult<Connection>;
}

/// WebSocket transport (`ws://` or `wss://`)
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self) -> ClientResult<Connection> {
        let (ws, _) = tokio_tungstenite::connect_async(self.url.as_str()).await?;
        let (sink, stream) = ws.split();

        let sink = sink.with(|out: Outbound| {
            future::ready(Ok::<_, ClientError>(match out {
                Outbound::Text(text) => Message::text(text),
                Outbound::Ping => Message::Ping(Vec::new().into()),
            }))
        });

        // Control frames are answered by tungstenite itself; only text surfaces
        let stream = stream.filter_map(|msg| {
            future::ready(match msg {
                Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
                Ok(_) => None,
                Err(e) => Some(Err(ClientError::from(e))),
            })
        });

        Ok(Connection {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        })
    }
}

/// In-process transport for tests: every `connect` hands the far end of a
/// fresh channel pair to whoever plays the relay
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    peers: mpsc::UnboundedSender<MemoryPeer>,
    refuse: Arc<AtomicU32>,
}

/// Relay side of a memory connection
pub struct MemoryPeer {
    pub to_client: mpsc::UnboundedSender<String>,
    pub from_client: mpsc::UnboundedReceiver<Outbound>,
}

impl MemoryConnector {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MemoryPeer>) {
        let (peers, rx) = mpsc::unbounded();
        (
            Self {
                peers,
                refuse: Arc::new(AtomicU32::new(0)),
            },
            rx,
        )
    }

    /// Fail the next `n` connection attempts
    pub fn refuse_next(&self, n: u32) {
        self.refuse.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self) -> ClientResult<Connection> {
        let refused = self
            .refuse
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(ClientError::Transport("connection refused".into()));
        }

        let (to_client, client_rx) = mpsc::unbounded::<String>();
        let (client_tx, from_client) = mpsc::unbounded::<Outbound>();
        self.peers
            .unbounded_send(MemoryPeer {
                to_client,
                from_client,
            })
            .map_err(|_| ClientError::Transport("memory relay gone".into()))?;

        let sink = client_tx.sink_map_err(|e| ClientError::Transport(e.to_string()));
        Ok(Connection {
            sink: Box::pin(sink),
            stream: Box::pin(client_rx.map(Ok)),
        })
    }
}

impl MemoryPeer {
    pub fn send_frame(&self, frame: &Frame) {
        if let Ok(text) = frame.to_text() {
            let _ = self.to_client.unbounded_send(text);
        }
    }

    pub fn send_raw(&self, text: &str) {
        let _ = self.to_client.unbounded_send(text.to_owned());
    }

    /// Next frame from the client, skipping pings. `None` once the client
    /// side is gone.
    pub async fn recv_frame(&mut self) -> Option<Frame> {
        while let Some(out) = self.from_client.next().await {
            if let Outbound::Text(text) = out
                && let Ok(frame) = Frame::parse(&text)
            {
                return Some(frame);
            }
        }
        None
    }
}
