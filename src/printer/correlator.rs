//! # Command/Reply Correlation
//!
//! The printer protocol has no request ids: a reply is simply whatever
//! arrives after a command. The [`Correlator`] turns that into
//! request/response calls by letting exactly one exchange run at a time.
//!
//! ## Exchange
//!
//! ```text
//! take token ─► clear buffer ─► write ─► wait (signal | timeout | closed)
//!                                              │
//!                                   settle ◄───┘
//!                                      │
//!                               return buffer
//! ```
//!
//! The inbound callback only appends to the buffer and raises the signal.
//! It never touches the token, so a slow caller cannot stall the
//! transport's reader.
//!
//! ## Bulk Transfer
//!
//! [`Correlator::send_chunked`] holds the same token while streaming a
//! raster, so no query can interleave with image data.
//!
//! | Link | Chunk | Gap |
//! |------|-------|-----|
//! | RFCOMM (stream) | 16384 B | none |
//! | BLE (fragments) | 200 B | 20 ms |

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{debug, info};
use tokio::sync::Notify;

use crate::error::{FicheroError, Result};
use crate::printer::config::Timing;
use crate::protocol::commands::{Command, ReplyPolicy};
use crate::transport::{Notification, NotifyCallback, Transport, TransportKind};

/// Chunk size for stream-oriented links.
pub const STREAM_CHUNK: usize = 16384;

/// Chunk size for fragment-oriented links.
pub const FRAGMENT_CHUNK: usize = 200;

#[derive(Default)]
struct InboxState {
    buf: Vec<u8>,
    ready: bool,
    closed: bool,
}

/// Reply buffer shared with the transport's callback.
#[derive(Default)]
struct Inbox {
    state: Mutex<InboxState>,
    signal: Notify,
}

impl Inbox {
    fn lock(&self) -> MutexGuard<'_, InboxState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn deliver(&self, notification: Notification) {
        {
            let mut state = self.lock();
            match notification {
                Notification::Data(fragment) => {
                    debug!("RX {}", Hex(&fragment));
                    state.buf.extend_from_slice(&fragment);
                    state.ready = true;
                }
                Notification::Closed => {
                    debug!("RX <closed>");
                    state.closed = true;
                }
                Notification::Error(e) => {
                    debug!("RX <error: {}>", e);
                    state.closed = true;
                }
            }
        }
        self.signal.notify_waiters();
    }

    fn reset(&self) -> Result<()> {
        let mut state = self.lock();
        if state.closed {
            return Err(FicheroError::TransportClosed);
        }
        state.buf.clear();
        state.ready = false;
        Ok(())
    }

    async fn wait(&self) -> Result<()> {
        loop {
            let notified = self.signal.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            {
                let state = self.lock();
                if state.ready {
                    return Ok(());
                }
                if state.closed {
                    return Err(FicheroError::TransportClosed);
                }
            }
            notified.await;
        }
    }

    fn take(&self) -> Vec<u8> {
        std::mem::take(&mut self.lock().buf)
    }
}

/// Hex formatting for TX/RX debug logs, evaluated only when logged.
struct Hex<'a>(&'a [u8]);

impl fmt::Display for Hex<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().take(32).enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{:02X}", byte)?;
        }
        if self.0.len() > 32 {
            write!(f, " … ({} bytes)", self.0.len())?;
        }
        Ok(())
    }
}

/// Serialises all traffic on one transport.
pub struct Correlator {
    transport: Box<dyn Transport>,
    inbox: Arc<Inbox>,
    token: tokio::sync::Mutex<()>,
    settle: Duration,
    chunk_gap: Duration,
}

impl Correlator {
    pub fn new(transport: Box<dyn Transport>, timing: Timing) -> Self {
        Self {
            transport,
            inbox: Arc::new(Inbox::default()),
            token: tokio::sync::Mutex::new(()),
            settle: timing.notify_settle,
            chunk_gap: timing.chunk_gap,
        }
    }

    /// Subscribe to the transport. Must run before the first command.
    pub async fn start(&self) -> Result<()> {
        let inbox = Arc::clone(&self.inbox);
        let callback: NotifyCallback = Arc::new(move |n| inbox.deliver(n));
        self.transport.subscribe(callback).await
    }

    pub fn kind(&self) -> TransportKind {
        self.transport.kind()
    }

    /// Send a command and, if it expects one, return its reply.
    pub async fn send(&self, command: &Command) -> Result<Vec<u8>> {
        self.send_raw(command.bytes(), command.reply()).await
    }

    /// Send raw bytes.
    ///
    /// With [`ReplyPolicy::Await`] the buffer is cleared before writing, so
    /// anything left over from an earlier timed-out exchange is discarded.
    /// A timeout leaves whatever arrived late in the buffer until the next
    /// awaited send clears it.
    pub async fn send_raw(&self, bytes: &[u8], reply: ReplyPolicy) -> Result<Vec<u8>> {
        let _token = self.token.lock().await;

        let timeout = match reply {
            ReplyPolicy::None => {
                debug!("TX {}", Hex(bytes));
                self.transport.write(bytes).await?;
                return Ok(Vec::new());
            }
            ReplyPolicy::Await(timeout) => timeout,
        };

        self.inbox.reset()?;
        debug!("TX {}", Hex(bytes));
        self.transport.write(bytes).await?;

        match tokio::time::timeout(timeout, self.inbox.wait()).await {
            Err(_) => return Err(FicheroError::Timeout(timeout)),
            Ok(result) => result?,
        }

        // Later fragments of the same reply land during this pause.
        if !self.settle.is_zero() {
            tokio::time::sleep(self.settle).await;
        }
        Ok(self.inbox.take())
    }

    /// Stream `payload` in chunks without waiting for acknowledgements.
    ///
    /// `chunk_size` overrides the link default; the link's pacing still
    /// applies. Zero is rejected.
    pub async fn send_chunked(&self, payload: &[u8], chunk_size: Option<usize>) -> Result<()> {
        let stream = self.kind().is_stream_oriented();
        let (default_size, gap) = if stream {
            (STREAM_CHUNK, Duration::ZERO)
        } else {
            (FRAGMENT_CHUNK, self.chunk_gap)
        };
        let size = chunk_size.unwrap_or(default_size);
        if size == 0 {
            return Err(FicheroError::InvalidCommand(
                "chunk size must be at least 1".to_string(),
            ));
        }

        let _token = self.token.lock().await;
        debug!(
            "TX {} bytes in {} chunks of {}",
            payload.len(),
            payload.len().div_ceil(size),
            size
        );
        for chunk in payload.chunks(size) {
            self.transport.write(chunk).await?;
            if !gap.is_zero() {
                tokio::time::sleep(gap).await;
            }
        }
        Ok(())
    }

    /// Close the transport. Any exchange still waiting ends with
    /// `TransportClosed`.
    pub async fn close(&self) -> Result<()> {
        info!("Closing connection");
        self.transport.close().await?;
        // Transports deliver Closed themselves; this covers one that does not.
        self.inbox.deliver(Notification::Closed);
        Ok(())
    }
}
