// WebSocket relay session: decode each frame and hand it to the message sink

use futures_util::stream::StreamExt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use warp::ws::{Message, WebSocket};

use crate::message_store::MessageSink;
use crate::models::{MessageRecord, MonotonicClock, RelayEnvelope};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// What to do with a frame that is not a valid envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodePolicy {
    /// Log the frame and keep reading
    #[default]
    Drop,
    /// Close the connection
    Disconnect,
}

impl FromStr for DecodePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drop" => Ok(DecodePolicy::Drop),
            "disconnect" | "strict" => Ok(DecodePolicy::Disconnect),
            other => Err(format!("unknown decode policy '{}'", other)),
        }
    }
}

/// Everything a relay session needs, shared by all sessions
#[derive(Clone)]
pub struct RelayContext {
    pub sink: Arc<dyn MessageSink>,
    pub clock: Arc<MonotonicClock>,
    pub idle_timeout: Duration,
    pub decode_policy: DecodePolicy,
    pub shutdown: CancellationToken,
}

impl RelayContext {
    pub fn new(sink: Arc<dyn MessageSink>) -> Self {
        Self {
            sink,
            clock: Arc::new(MonotonicClock::new()),
            idle_timeout: Duration::from_secs(300),
            decode_policy: DecodePolicy::default(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn with_decode_policy(mut self, decode_policy: DecodePolicy) -> Self {
        self.decode_policy = decode_policy;
        self
    }

    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }
}

/// Why a session's receive loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    PeerClosed,
    IdleTimeout,
    Shutdown,
    DecodeFault,
    Transport(String),
}

/// Run one relay connection until the peer leaves, goes idle, sends a bad
/// frame under [`DecodePolicy::Disconnect`], or the server shuts down.
///
/// Frames are forwarded one at a time, so a connection's messages reach the
/// sink in the order they were received. Nothing is ever written back.
pub async fn relay_session(ws: WebSocket, ctx: RelayContext) -> SessionEnd {
    let session = NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed);
    info!(session, "Relay connection opened");

    // The outbound half stays alive so the socket is not half-closed early.
    let (_tx, mut rx) = ws.split();

    let end = loop {
        let next = tokio::select! {
            biased;
            _ = ctx.shutdown.cancelled() => break SessionEnd::Shutdown,
            next = timeout(ctx.idle_timeout, rx.next()) => next,
        };

        let frame = match next {
            Err(_) => break SessionEnd::IdleTimeout,
            Ok(None) => break SessionEnd::PeerClosed,
            Ok(Some(Err(e))) => break SessionEnd::Transport(e.to_string()),
            Ok(Some(Ok(frame))) => frame,
        };

        if frame.is_close() {
            break SessionEnd::PeerClosed;
        }

        if let Err(end) = handle_frame(session, &frame, &ctx).await {
            break end;
        }
    };

    match &end {
        SessionEnd::PeerClosed | SessionEnd::Shutdown => {
            info!(session, reason = ?end, "Relay connection closed")
        }
        _ => warn!(session, reason = ?end, "Relay connection closed"),
    }
    end
}

async fn handle_frame(
    session: u64,
    frame: &Message,
    ctx: &RelayContext,
) -> Result<(), SessionEnd> {
    if !(frame.is_text() || frame.is_binary()) {
        // ping / pong
        return Ok(());
    }

    let envelope = match RelayEnvelope::decode(frame.as_bytes()) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(session, error = %e, policy = ?ctx.decode_policy, "Malformed relay frame");
            return match ctx.decode_policy {
                DecodePolicy::Drop => Ok(()),
                DecodePolicy::Disconnect => Err(SessionEnd::DecodeFault),
            };
        }
    };

    let record = MessageRecord::new(ctx.clock.now(), envelope);
    debug!(session, username = %record.username, "Relaying message");

    if let Err(e) = ctx.sink.insert(record).await {
        warn!(session, error = %e, "Failed to store message, dropping it");
    }

    Ok(())
}
