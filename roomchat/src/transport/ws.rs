//! WebSocket transport to the chat server.
//!
//! At most one connection is live per [`WsTransport`]. Opening spawns two
//! tasks: a writer draining an unbounded queue into the socket, and a reader
//! decoding inbound JSON frames into [`TransportEvent`]s. Frames that fail
//! to decode are logged and dropped; the connection stays up.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

use roomchat_proto::codec;
use roomchat_proto::frame::OutboundFrame;

use super::{ConnectIdentity, FrameSender, TransportError, TransportEvent};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;
type WsSink = futures_util::stream::SplitSink<WsStream, Message>;
type WsReader = futures_util::stream::SplitStream<WsStream>;

/// Result of [`WsTransport::open`].
#[derive(Debug)]
pub enum OpenOutcome {
    /// A new connection was opened. Its lifecycle events arrive on the
    /// receiver, starting with [`TransportEvent::Opened`].
    Opened(mpsc::Receiver<TransportEvent>),
    /// A connection was already live; nothing changed.
    AlreadyOpen,
}

struct LiveConnection {
    generation: u64,
    outgoing: mpsc::UnboundedSender<Message>,
}

type Slot = Arc<Mutex<Option<LiveConnection>>>;

/// Single WebSocket connection to the chat server.
pub struct WsTransport {
    base_url: String,
    event_capacity: usize,
    live: Slot,
    generations: AtomicU64,
}

impl std::fmt::Debug for WsTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsTransport")
            .field("base_url", &self.base_url)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

impl WsTransport {
    /// Create a transport for the socket endpoint at `base_url`
    /// (e.g. `ws://localhost:8070/v1/api/ws`). Nothing is opened yet.
    ///
    /// `event_capacity` bounds the event channel handed out by
    /// [`open`](Self::open); the reader waits when it is full.
    #[must_use]
    pub fn new(base_url: impl Into<String>, event_capacity: usize) -> Self {
        Self {
            base_url: base_url.into(),
            event_capacity: event_capacity.max(1),
            live: Arc::new(Mutex::new(None)),
            generations: AtomicU64::new(0),
        }
    }

    /// Socket endpoint this transport connects to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Open the connection as `identity`.
    ///
    /// If a connection is already live this is a no-op returning
    /// [`OpenOutcome::AlreadyOpen`]. No timeout is applied to the handshake.
    ///
    /// # Errors
    ///
    /// - [`TransportError::InvalidUrl`] if the base URL is not `ws://` or `wss://`.
    /// - [`TransportError::Connect`] if the handshake fails.
    pub async fn open(&self, identity: &ConnectIdentity) -> Result<OpenOutcome, TransportError> {
        if self.is_connected() {
            tracing::info!(url = %self.base_url, "connection already open");
            return Ok(OpenOutcome::AlreadyOpen);
        }

        let url = connect_url(&self.base_url, identity)?;
        let (ws_stream, _response) = connect_async(url.as_str()).await.map_err(|e| {
            tracing::warn!(url = %self.base_url, err = %e, "WebSocket connect failed");
            map_ws_connect_error(e)
        })?;
        let (ws_sink, ws_reader) = ws_stream.split();

        let (events_tx, events_rx) = mpsc::channel(self.event_capacity);
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;

        {
            let mut slot = self.live.lock();
            if slot.is_some() {
                // A concurrent open won; the new socket drops here.
                tracing::info!("connection opened concurrently, discarding duplicate");
                return Ok(OpenOutcome::AlreadyOpen);
            }
            if events_tx.try_send(TransportEvent::Opened).is_err() {
                return Err(TransportError::Unavailable);
            }
            *slot = Some(LiveConnection {
                generation,
                outgoing: outgoing_tx,
            });
            tokio::spawn(writer_loop(ws_sink, outgoing_rx));
            tokio::spawn(reader_loop(
                ws_reader,
                events_tx,
                Arc::clone(&self.live),
                generation,
            ));
        }

        tracing::info!(
            url = %self.base_url,
            user = %identity.user_id,
            device = %identity.device_id,
            "connection opened"
        );
        Ok(OpenOutcome::Opened(events_rx))
    }
}

impl FrameSender for WsTransport {
    fn send(&self, frame: &OutboundFrame) -> Result<(), TransportError> {
        let text = codec::encode(frame)?;
        let slot = self.live.lock();
        let Some(conn) = slot.as_ref() else {
            tracing::error!(to = %frame.to, "send without a live connection");
            return Err(TransportError::Unavailable);
        };
        conn.outgoing.send(Message::Text(text.into())).map_err(|_| {
            tracing::error!(to = %frame.to, "connection writer has stopped");
            TransportError::Unavailable
        })
    }

    fn is_connected(&self) -> bool {
        self.live.lock().is_some()
    }

    fn close(&self) {
        let Some(conn) = self.live.lock().take() else {
            return;
        };
        tracing::info!(generation = conn.generation, "closing connection");
        // The writer sends the close frame, then exits once `outgoing` drops.
        let _ = conn.outgoing.send(Message::Close(None));
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.close();
    }
}

/// Build the socket URL carrying the identity query parameters.
///
/// # Errors
///
/// Returns [`TransportError::InvalidUrl`] if `base` does not parse or is not
/// a `ws://`/`wss://` URL.
pub fn connect_url(base: &str, identity: &ConnectIdentity) -> Result<Url, TransportError> {
    let invalid = |reason: String| TransportError::InvalidUrl {
        url: base.to_string(),
        reason,
    };
    let mut url = Url::parse(base).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "ws" | "wss") {
        return Err(invalid(format!("unsupported scheme {}", url.scheme())));
    }
    url.query_pairs_mut()
        .append_pair("token", &identity.user_id)
        .append_pair("deviceId", &identity.device_id)
        .append_pair("username", &identity.display_name);
    Ok(url)
}

async fn writer_loop(mut ws_sink: WsSink, mut outgoing: mpsc::UnboundedReceiver<Message>) {
    while let Some(msg) = outgoing.recv().await {
        let closing = matches!(msg, Message::Close(_));
        if let Err(e) = ws_sink.send(msg).await {
            tracing::warn!(err = %e, "WebSocket write failed");
            break;
        }
        if closing {
            break;
        }
    }
    let _ = ws_sink.close().await;
    tracing::debug!("writer task exiting");
}

/// Read frames until the socket closes, then clear the slot if it still
/// holds this connection and report [`TransportEvent::Closed`].
async fn reader_loop(
    mut ws_reader: WsReader,
    events: mpsc::Sender<TransportEvent>,
    live: Slot,
    generation: u64,
) {
    while let Some(msg_result) = ws_reader.next().await {
        let bytes: &[u8] = match &msg_result {
            Ok(Message::Text(text)) => text.as_bytes(),
            Ok(Message::Binary(data)) => &data[..],
            Ok(Message::Close(_)) => {
                tracing::info!("WebSocket closed by server");
                break;
            }
            Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => continue,
            Err(e) => {
                tracing::warn!(err = %e, "WebSocket read error");
                let _ = events.send(TransportEvent::Error(e.to_string())).await;
                break;
            }
        };
        match codec::decode_inbound(bytes) {
            Ok(frame) => {
                tracing::trace!(kind = ?frame.kind, from = %frame.from, to = %frame.to, "frame received");
                if events.send(TransportEvent::Frame(frame)).await.is_err() {
                    // Receiver dropped.
                    break;
                }
            }
            Err(e) => {
                tracing::warn!(err = %e, "malformed frame, dropping");
            }
        }
    }

    {
        let mut slot = live.lock();
        if slot.as_ref().is_some_and(|c| c.generation == generation) {
            slot.take();
        }
    }
    let _ = events.send(TransportEvent::Closed).await;
    tracing::info!(generation, "reader task exiting");
}

fn map_ws_connect_error(err: tokio_tungstenite::tungstenite::Error) -> TransportError {
    use tokio_tungstenite::tungstenite::Error as WsError;
    match err {
        WsError::Http(response) => {
            TransportError::Connect(format!("HTTP error: status {}", response.status()))
        }
        WsError::Url(e) => TransportError::Connect(format!("bad url: {e}")),
        other => TransportError::Connect(other.to_string()),
    }
}
