//! Wire Transport
//!
//! The seam between the session and the underlying pub/sub connection.
//! A [`Connector`] opens one [`Connection`]; the returned future resolves
//! only after the remote endpoint has acknowledged the handshake, so a
//! `Connection` that exists is always valid for subscribe/send. Inbound
//! traffic flows to the session through an event channel.
//!
//! # Wire format
//!
//! Frames are JSON envelopes over a WebSocket. Outbound:
//!
//! ```json
//! {"type":"connect"}
//! {"type":"subscribe","topic":"/topic/chat.42"}
//! {"type":"unsubscribe","topic":"/topic/chat.42"}
//! {"type":"send","destination":"/app/chat.sendMessage","body":{..}}
//! ```
//!
//! Inbound:
//!
//! ```json
//! {"type":"connected"}
//! {"type":"message","topic":"/topic/chat.42","body":{..}}
//! ```
//!
//! The `body` of an inbound message is kept as raw JSON text; parsing it
//! is the subscription registry's responsibility, so one malformed payload
//! can be dropped without touching the connection.

use crate::shared::error::RealtimeError;
use crate::shared::RealtimeConfig;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

/// One inbound message as delivered by the transport
#[derive(Debug, Clone)]
pub struct InboundFrame {
    /// Wire name of the topic the frame arrived on
    pub topic: String,
    /// Raw JSON payload text, unparsed
    pub body: String,
}

/// Events surfaced by a live connection
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A message arrived on a subscribed topic
    Frame(InboundFrame),
    /// A transport-level error occurred; usually followed by `Closed`
    Error { message: String },
    /// The connection dropped
    Closed { reason: Option<String> },
}

/// Sending half of the event channel a connection reports into
pub type TransportEventSender = mpsc::UnboundedSender<TransportEvent>;
/// Receiving half consumed by the session's event task
pub type TransportEventReceiver = mpsc::UnboundedReceiver<TransportEvent>;

/// A live, acknowledged connection to the realtime endpoint
pub trait Connection: Send + Sync {
    /// Transmit a command body to an `/app/..` destination
    fn send(&self, destination: &str, body: serde_json::Value) -> Result<(), RealtimeError>;

    /// Open a wire subscription for a topic
    fn subscribe(&self, topic: &str) -> Result<(), RealtimeError>;

    /// Release the wire subscription for a topic
    fn unsubscribe(&self, topic: &str) -> Result<(), RealtimeError>;

    /// Close the connection
    fn close(&self);
}

/// Opens connections to the realtime endpoint
#[async_trait]
pub trait Connector: Send + Sync {
    /// Establish a connection, resolving after the remote handshake ack
    ///
    /// Events for the connection's whole lifetime flow into `events`.
    async fn connect(
        &self,
        events: TransportEventSender,
    ) -> Result<Arc<dyn Connection>, RealtimeError>;
}

// ── Wire envelope ───────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum WireOut<'a> {
    Connect,
    Subscribe { topic: &'a str },
    Unsubscribe { topic: &'a str },
    Send {
        destination: &'a str,
        body: &'a serde_json::Value,
    },
}

/// Inbound envelope; `body` stays raw so payload parsing happens downstream
#[derive(Deserialize)]
struct WireInEnvelope<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    topic: Option<String>,
    #[serde(borrow)]
    body: Option<&'a serde_json::value::RawValue>,
}

/// A decoded inbound wire frame
#[derive(Debug, PartialEq)]
enum ParsedInbound {
    /// Handshake acknowledgment
    Ack,
    /// A topic message
    Message(InboundFrameParts),
}

#[derive(Debug, PartialEq)]
struct InboundFrameParts {
    topic: String,
    body: String,
}

/// Decode one inbound text frame; `None` for unknown or invalid envelopes
fn parse_inbound(text: &str) -> Option<ParsedInbound> {
    let envelope: WireInEnvelope<'_> = match serde_json::from_str(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!("[Transport] Dropping invalid wire envelope: {}", e);
            return None;
        }
    };
    match envelope.kind {
        "connected" => Some(ParsedInbound::Ack),
        "message" => match (envelope.topic, envelope.body) {
            (Some(topic), Some(body)) => Some(ParsedInbound::Message(InboundFrameParts {
                topic,
                body: body.get().to_string(),
            })),
            _ => {
                warn!("[Transport] Dropping message envelope without topic or body");
                None
            }
        },
        other => {
            debug!("[Transport] Ignoring unknown wire frame type '{}'", other);
            None
        }
    }
}

// ── WebSocket implementation ────────────────────────────────────────────────

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Commands handed to the writer task owning the sink half
enum WriterCommand {
    Frame(String),
    Pong(Vec<u8>),
    Close,
}

/// WebSocket-based [`Connector`]
pub struct WsConnector {
    url: String,
    handshake_timeout: std::time::Duration,
}

impl WsConnector {
    /// Create a connector for the configured realtime endpoint
    pub fn new(config: &RealtimeConfig) -> Self {
        Self {
            url: config.ws_url.clone(),
            handshake_timeout: config.handshake_timeout,
        }
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(
        &self,
        events: TransportEventSender,
    ) -> Result<Arc<dyn Connection>, RealtimeError> {
        let (stream, _response) = connect_async(self.url.as_str())
            .await
            .map_err(|e| RealtimeError::connection(format!("connect to {} failed: {}", self.url, e)))?;
        let (mut sink, mut stream) = stream.split();

        // Handshake: announce ourselves, then wait for the remote ack.
        let connect_frame = serde_json::to_string(&WireOut::Connect)
            .map_err(|e| RealtimeError::connection(e.to_string()))?;
        sink.send(Message::Text(connect_frame))
            .await
            .map_err(|e| RealtimeError::connection(format!("handshake send failed: {}", e)))?;
        tokio::time::timeout(self.handshake_timeout, wait_for_ack(&mut stream))
            .await
            .map_err(|_| RealtimeError::connection("handshake timed out"))??;

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<WriterCommand>();

        // Writer task owns the sink half.
        tokio::spawn(async move {
            while let Some(command) = out_rx.recv().await {
                let result = match command {
                    WriterCommand::Frame(text) => sink.send(Message::Text(text)).await,
                    WriterCommand::Pong(payload) => sink.send(Message::Pong(payload)).await,
                    WriterCommand::Close => {
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    }
                };
                if let Err(e) = result {
                    // The reader half surfaces the drop; nothing more to do here.
                    debug!("[Transport] Write failed, stopping writer: {}", e);
                    break;
                }
            }
        });

        // Reader task owns the stream half and feeds the event channel.
        let pong_tx = out_tx.clone();
        tokio::spawn(async move {
            loop {
                match stream.next().await {
                    Some(Ok(Message::Text(text))) => match parse_inbound(&text) {
                        Some(ParsedInbound::Message(parts)) => {
                            if events
                                .send(TransportEvent::Frame(InboundFrame {
                                    topic: parts.topic,
                                    body: parts.body,
                                }))
                                .is_err()
                            {
                                // Session went away; stop reading.
                                return;
                            }
                        }
                        Some(ParsedInbound::Ack) | None => {}
                    },
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = pong_tx.send(WriterCommand::Pong(payload));
                    }
                    Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => {}
                    Some(Ok(Message::Binary(_))) => {
                        warn!("[Transport] Ignoring unexpected binary frame");
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let reason = frame.map(|f| f.reason.to_string());
                        let _ = events.send(TransportEvent::Closed { reason });
                        return;
                    }
                    Some(Err(e)) => {
                        let _ = events.send(TransportEvent::Error {
                            message: e.to_string(),
                        });
                        let _ = events.send(TransportEvent::Closed {
                            reason: Some(e.to_string()),
                        });
                        return;
                    }
                    None => {
                        let _ = events.send(TransportEvent::Closed { reason: None });
                        return;
                    }
                }
            }
        });

        Ok(Arc::new(WsConnection { out_tx }))
    }
}

/// Read frames until the handshake ack arrives
async fn wait_for_ack(
    stream: &mut futures_util::stream::SplitStream<WsStream>,
) -> Result<(), RealtimeError> {
    loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => {
                if let Some(ParsedInbound::Ack) = parse_inbound(&text) {
                    return Ok(());
                }
            }
            Some(Ok(Message::Close(_))) | None => {
                return Err(RealtimeError::connection("closed during handshake"));
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                return Err(RealtimeError::connection(format!(
                    "handshake read failed: {}",
                    e
                )));
            }
        }
    }
}

/// WebSocket-based [`Connection`]
struct WsConnection {
    out_tx: mpsc::UnboundedSender<WriterCommand>,
}

impl WsConnection {
    fn enqueue(&self, frame: WireOut<'_>) -> Result<(), RealtimeError> {
        let text = serde_json::to_string(&frame)
            .map_err(|e| RealtimeError::connection(e.to_string()))?;
        self.out_tx
            .send(WriterCommand::Frame(text))
            .map_err(|_| RealtimeError::connection("connection closed"))
    }
}

impl Connection for WsConnection {
    fn send(&self, destination: &str, body: serde_json::Value) -> Result<(), RealtimeError> {
        self.enqueue(WireOut::Send {
            destination,
            body: &body,
        })
    }

    fn subscribe(&self, topic: &str) -> Result<(), RealtimeError> {
        self.enqueue(WireOut::Subscribe { topic })
    }

    fn unsubscribe(&self, topic: &str) -> Result<(), RealtimeError> {
        self.enqueue(WireOut::Unsubscribe { topic })
    }

    fn close(&self) {
        let _ = self.out_tx.send(WriterCommand::Close);
    }
}
