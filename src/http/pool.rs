//! Bounded client pool
//!
//! A fixed number of [`ClientHandle`]s circulate through a bounded channel;
//! `acquire` waits while the pool is exhausted, which is what caps scenario
//! concurrency at the configured size. Released handles get a fresh cookie
//! jar before they recirculate.

use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::http::client::{ClientHandle, TransportError};

/// Fixed-size pool of independent HTTP sessions.
pub struct ClientPool {
    tx: mpsc::Sender<ClientHandle>,
    rx: Mutex<mpsc::Receiver<ClientHandle>>,
    size: usize,
}

impl ClientPool {
    /// Build a pool of `size` handles (minimum 1), each with its own
    /// cookie jar and the given request timeout.
    pub fn new(size: usize, timeout_secs: u64) -> Result<Self, TransportError> {
        let size = size.max(1);
        let (tx, rx) = mpsc::channel(size);

        for id in 0..size {
            let handle = ClientHandle::new(id, timeout_secs)?;
            // Capacity equals the handle count, so this never fails.
            tx.try_send(handle)
                .expect("pool capacity equals handle count");
        }

        Ok(Self {
            tx,
            rx: Mutex::new(rx),
            size,
        })
    }

    /// Number of handles in circulation.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Take ownership of a free handle, waiting while none is available.
    /// Never errors; a deadlock here is a caller bug (acquire without
    /// release).
    pub async fn acquire(&self) -> ClientHandle {
        let handle = self
            .rx
            .lock()
            .await
            .recv()
            .await
            .expect("pool sender lives as long as the pool");
        debug!(client = handle.id(), "Acquired client handle");
        handle
    }

    /// Return a handle to the pool, waking one waiting acquirer. The
    /// handle's cookie jar is replaced so the next scenario starts clean.
    pub fn release(&self, mut handle: ClientHandle) {
        debug!(client = handle.id(), "Released client handle");
        if let Err(e) = handle.reset() {
            warn!(client = handle.id(), "Failed to reset client session: {e}");
        }
        self.tx
            .try_send(handle)
            .expect("pool capacity equals handle count");
    }
}
