//! # Streaming Module
//!
//! Streaming response plumbing and the handler base traits for
//! Server-Sent Events and WebSocket endpoints.
//!
//! Streaming bodies are lazy chunk sequences: the orchestrator returns the
//! envelope immediately and the transport drains the [`ChunkStream`] at its
//! own pace. Producer and consumer talk over a `may` channel, so producers
//! running in coroutines block (and yield) naturally when they outpace the
//! consumer's reads.
//!
//! SSE and WebSocket handlers are alternate invocation targets: they are
//! driven by the pumps below, not by the HTTP phase sequence of the
//! orchestrator.

use crate::response::{Body, ResponseEnvelope};
use may::sync::mpsc;
use tracing::debug;

/// Producer half of a chunk stream. Clone to feed one stream from several
/// coroutines.
#[derive(Clone)]
pub struct ChunkSender {
    tx: mpsc::Sender<String>,
}

impl ChunkSender {
    /// Queue a chunk. Sends after the consumer hung up are dropped.
    pub fn send(&self, chunk: impl Into<String>) {
        let _ = self.tx.send(chunk.into());
    }
}

/// Consumer half: the transport pulls chunks until the stream ends.
pub struct ChunkStream {
    rx: mpsc::Receiver<String>,
}

impl ChunkStream {
    /// Next chunk, or `None` once every sender is gone.
    #[must_use]
    pub fn recv(&self) -> Option<String> {
        self.rx.recv().ok()
    }

    /// Drain the stream into one string. Blocks until the producer side
    /// closes; intended for tests and buffered transports.
    #[must_use]
    pub fn drain(self) -> String {
        let mut out = String::new();
        while let Ok(chunk) = self.rx.recv() {
            out.push_str(&chunk);
        }
        out
    }
}

impl Iterator for ChunkStream {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.recv()
    }
}

/// Create a connected chunk channel pair.
#[must_use]
pub fn chunk_channel() -> (ChunkSender, ChunkStream) {
    let (tx, rx) = mpsc::channel();
    (ChunkSender { tx }, ChunkStream { rx })
}

/// Pull-based Server-Sent Events handler.
///
/// The pump calls `next_event` repeatedly; returning `None` ends the stream
/// and disconnects the client.
pub trait SseHandler: Send + 'static {
    fn on_connect(&mut self) {}
    fn on_disconnect(&mut self) {}
    fn next_event(&mut self) -> Option<String>;
}

/// Message-based WebSocket handler.
///
/// `handle_message` returns the reply for an inbound message, or `None` for
/// messages that need no reply.
pub trait WebSocketHandler: Send + 'static {
    fn on_connect(&mut self) {}
    fn on_disconnect(&mut self) {}
    fn handle_message(&mut self, msg: String) -> Option<String>;
}

/// Drive an SSE handler in its own coroutine and return the streaming
/// response envelope (`200`, `text/event-stream`).
///
/// Events are framed per the SSE specification (`data: <event>\n\n`).
///
/// # Safety
///
/// Spawns a coroutine via `may::coroutine::Builder::spawn()`, which is
/// unsafe in the `may` runtime. The caller must ensure the coroutine runtime
/// is initialized.
pub unsafe fn run_sse<H>(mut handler: H, stack_size: usize) -> ResponseEnvelope
where
    H: SseHandler,
{
    let (tx, stream) = chunk_channel();

    // SAFETY: spawn is unsafe per the may runtime contract; the pump owns
    // the handler and exits when the handler ends the stream.
    let spawned = unsafe {
        may::coroutine::Builder::new()
            .stack_size(stack_size)
            .spawn(move || {
                handler.on_connect();
                while let Some(event) = handler.next_event() {
                    tx.send(format!("data: {event}\n\n"));
                }
                handler.on_disconnect();
                debug!("sse stream ended");
            })
    };
    if let Err(err) = spawned {
        tracing::error!(error = %err, "failed to spawn sse pump");
    }

    let mut resp = ResponseEnvelope::new(200);
    resp.set_header("content-type", "text/event-stream");
    resp.set_header("cache-control", "no-cache");
    resp.body = Body::Stream(stream);
    resp
}

/// Drive a WebSocket handler in its own coroutine.
///
/// Inbound messages arrive on `inbound`; replies go out on the returned
/// stream. The pump exits (and the outbound stream ends) when the transport
/// drops the inbound sender.
///
/// # Safety
///
/// Spawns a coroutine via `may::coroutine::Builder::spawn()`, which is
/// unsafe in the `may` runtime. The caller must ensure the coroutine runtime
/// is initialized.
pub unsafe fn run_websocket<H>(
    mut handler: H,
    inbound: mpsc::Receiver<String>,
    stack_size: usize,
) -> ChunkStream
where
    H: WebSocketHandler,
{
    let (tx, stream) = chunk_channel();

    // SAFETY: spawn is unsafe per the may runtime contract; the pump owns
    // the handler and exits when the inbound channel closes.
    let spawned = unsafe {
        may::coroutine::Builder::new()
            .stack_size(stack_size)
            .spawn(move || {
                handler.on_connect();
                while let Ok(msg) = inbound.recv() {
                    if let Some(reply) = handler.handle_message(msg) {
                        tx.send(reply);
                    }
                }
                handler.on_disconnect();
                debug!("websocket session ended");
            })
    };
    if let Err(err) = spawned {
        tracing::error!(error = %err, "failed to spawn websocket pump");
    }

    stream
}
