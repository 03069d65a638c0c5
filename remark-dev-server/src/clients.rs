//! Registry of connected hot-reload sockets.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

const CLIENT_QUEUE: usize = 32;

/// Outgoing queues of every connected client, keyed by connection id.
///
/// Dropping a client's sender ends its socket task, which closes the socket.
#[derive(Debug, Clone, Default)]
pub struct ClientRegistry {
    clients: Arc<RwLock<HashMap<usize, mpsc::Sender<String>>>>,
    next_id: Arc<AtomicUsize>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self) -> (usize, mpsc::Receiver<String>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(CLIENT_QUEUE);
        self.clients.write().insert(id, tx);
        (id, rx)
    }

    pub fn unregister(&self, id: usize) {
        self.clients.write().remove(&id);
    }

    pub fn len(&self) -> usize {
        self.clients.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.read().is_empty()
    }

    /// Queue `message` for every client without waiting on any of them.
    /// Returns how many clients it was queued for.
    pub fn broadcast(&self, message: &str) -> usize {
        let mut closed = Vec::new();
        let mut delivered = 0;

        for (id, tx) in self.clients.read().iter() {
            match tx.try_send(message.to_string()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => warn!(client = id, "client is not keeping up, dropping update"),
                Err(TrySendError::Closed(_)) => closed.push(*id),
            }
        }

        if !closed.is_empty() {
            let mut clients = self.clients.write();
            for id in closed {
                debug!(client = id, "removing closed client");
                clients.remove(&id);
            }
        }

        delivered
    }

    /// Disconnect everyone.
    pub fn close_all(&self) {
        self.clients.write().clear();
    }
}
