//! # Scripted Transport
//!
//! An in-process stand-in for a printer. Every write is recorded; writes
//! that start with a scripted prefix are answered with a sequence of
//! `(delay, fragment)` notifications from a spawned task, the way a BLE
//! printer splits a reply across several notifications.
//!
//! ```
//! use std::time::Duration;
//! use fichero::transport::{ScriptedTransport, TransportKind};
//!
//! let transport = ScriptedTransport::new(TransportKind::Ble)
//!     .respond(&[0x10, 0xFF, 0x84], b"OK")
//!     .reply(&[0x10, 0xFF, 0x20, 0xF0], vec![
//!         (Duration::ZERO, b"D1".to_vec()),
//!         (Duration::from_millis(5), b"1s".to_vec()),
//!     ]);
//! let handle = transport.handle();
//! assert!(handle.writes().is_empty());
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use super::{Notification, NotifyCallback, Transport, TransportKind};
use crate::error::{FicheroError, Result};

struct Script {
    prefix: Vec<u8>,
    fragments: Vec<(Duration, Vec<u8>)>,
    once: bool,
}

#[derive(Default)]
struct Shared {
    writes: Mutex<Vec<Vec<u8>>>,
    scripts: Mutex<Vec<Script>>,
    subscriber: Mutex<Option<NotifyCallback>>,
    refuse_subscribe: AtomicBool,
    closed: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fake printer link for tests.
pub struct ScriptedTransport {
    kind: TransportKind,
    shared: Arc<Shared>,
}

/// Inspection handle that stays valid after the transport is moved into a
/// correlator.
#[derive(Clone)]
pub struct ScriptHandle {
    shared: Arc<Shared>,
}

impl ScriptedTransport {
    pub fn new(kind: TransportKind) -> Self {
        Self {
            kind,
            shared: Arc::new(Shared::default()),
        }
    }

    /// Answer every write starting with `prefix` with these fragments.
    /// Scripts are tried in the order they were added.
    pub fn reply(self, prefix: &[u8], fragments: Vec<(Duration, Vec<u8>)>) -> Self {
        self.add(prefix, fragments, false)
    }

    /// Like [`reply`](Self::reply) but used for one matching write only.
    pub fn reply_once(self, prefix: &[u8], fragments: Vec<(Duration, Vec<u8>)>) -> Self {
        self.add(prefix, fragments, true)
    }

    /// Single-fragment reply delivered immediately.
    pub fn respond(self, prefix: &[u8], reply: &[u8]) -> Self {
        self.reply(prefix, vec![(Duration::ZERO, reply.to_vec())])
    }

    /// Make `subscribe` fail, as a printer that rejects notifications would.
    pub fn refuse_subscribe(self) -> Self {
        self.shared.refuse_subscribe.store(true, Ordering::Release);
        self
    }

    pub fn handle(&self) -> ScriptHandle {
        ScriptHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    fn add(self, prefix: &[u8], fragments: Vec<(Duration, Vec<u8>)>, once: bool) -> Self {
        lock(&self.shared.scripts).push(Script {
            prefix: prefix.to_vec(),
            fragments,
            once,
        });
        self
    }

    fn script_for(&self, data: &[u8]) -> Option<Vec<(Duration, Vec<u8>)>> {
        let mut scripts = lock(&self.shared.scripts);
        let index = scripts.iter().position(|s| data.starts_with(&s.prefix))?;
        if scripts[index].once {
            Some(scripts.remove(index).fragments)
        } else {
            Some(scripts[index].fragments.clone())
        }
    }
}

impl ScriptHandle {
    /// Every write so far, one entry per call.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        lock(&self.shared.writes).clone()
    }

    /// All written bytes concatenated.
    pub fn written(&self) -> Vec<u8> {
        lock(&self.shared.writes).concat()
    }

    /// Deliver an unsolicited notification, as a printer would.
    pub fn push(&self, notification: Notification) {
        let subscriber = lock(&self.shared.subscriber).clone();
        if let Some(callback) = subscriber {
            callback(notification);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn write(&self, data: &[u8]) -> Result<()> {
        if self.shared.closed.load(Ordering::Acquire) {
            return Err(FicheroError::TransportClosed);
        }
        lock(&self.shared.writes).push(data.to_vec());

        let Some(fragments) = self.script_for(data) else {
            return Ok(());
        };
        let Some(callback) = lock(&self.shared.subscriber).clone() else {
            return Ok(());
        };
        tokio::spawn(async move {
            for (delay, fragment) in fragments {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                callback(Notification::Data(fragment));
            }
        });
        Ok(())
    }

    async fn subscribe(&self, callback: NotifyCallback) -> Result<()> {
        if self.shared.closed.load(Ordering::Acquire) {
            return Err(FicheroError::TransportClosed);
        }
        if self.shared.refuse_subscribe.load(Ordering::Acquire) {
            return Err(FicheroError::Transport("subscribe refused".to_string()));
        }
        *lock(&self.shared.subscriber) = Some(callback);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let subscriber = lock(&self.shared.subscriber).take();
        if let Some(callback) = subscriber {
            callback(Notification::Closed);
        }
        Ok(())
    }

    fn kind(&self) -> TransportKind {
        self.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collector() -> (NotifyCallback, Arc<Mutex<Vec<Notification>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback: NotifyCallback = Arc::new(move |n| sink.lock().unwrap().push(n));
        (callback, seen)
    }

    #[tokio::test]
    async fn test_records_writes() {
        let transport = ScriptedTransport::new(TransportKind::Rfcomm);
        let handle = transport.handle();
        transport.write(&[1, 2]).await.unwrap();
        transport.write(&[3]).await.unwrap();
        assert_eq!(handle.writes(), vec![vec![1, 2], vec![3]]);
        assert_eq!(handle.written(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_once_script_falls_through() {
        let transport = ScriptedTransport::new(TransportKind::Ble)
            .reply_once(&[0x40], vec![(Duration::ZERO, vec![0x02])])
            .respond(&[0x40], &[0x00]);
        let (callback, seen) = collector();
        transport.subscribe(callback).await.unwrap();

        transport.write(&[0x40]).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        transport.write(&[0x40]).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(
            *seen.lock().unwrap(),
            vec![Notification::Data(vec![0x02]), Notification::Data(vec![0x00])]
        );
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let transport = ScriptedTransport::new(TransportKind::Ble);
        let handle = transport.handle();
        let (callback, seen) = collector();
        transport.subscribe(callback).await.unwrap();

        transport.close().await.unwrap();
        transport.close().await.unwrap();

        assert!(handle.is_closed());
        assert_eq!(*seen.lock().unwrap(), vec![Notification::Closed]);
        assert!(matches!(
            transport.write(&[0]).await,
            Err(FicheroError::TransportClosed)
        ));
    }
}
