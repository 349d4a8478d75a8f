//! Packet registry: connection id → packet queue.
//!
//! Queried concurrently by push callbacks (lookup), reader threads
//! (unregister on failure) and the device façade (register / lookup /
//! unregister). One `RwLock` guards the map, so the three operations are
//! atomic with respect to each other.

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use crate::connection::ConnectionId;
use crate::error::{Error, Result};
use crate::packet::{Packet, PacketReceiver};

/// Both ends of one device's packet queue.
///
/// The registry keeps one handle per entry. Dropping the entry drops its
/// sender, so consumers see end-of-stream once every producer is gone.
#[derive(Debug, Clone)]
pub struct QueueHandle {
    sender: Sender<Packet>,
    receiver: Receiver<Packet>,
    closed: Receiver<()>,
    capacity: usize,
}

impl QueueHandle {
    pub fn sender(&self) -> &Sender<Packet> {
        &self.sender
    }

    pub fn receiver(&self) -> PacketReceiver {
        self.receiver.clone()
    }

    /// Disconnects once the entry is unregistered. Never carries a message.
    pub fn closed(&self) -> &Receiver<()> {
        &self.closed
    }

    /// 0 means synchronous hand-off.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

struct Entry {
    queue: QueueHandle,
    _closer: Sender<()>,
}

impl Entry {
    fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        let (closer, closed) = bounded(0);
        Self {
            queue: QueueHandle {
                sender,
                receiver,
                closed,
                capacity,
            },
            _closer: closer,
        }
    }
}

pub struct PacketRegistry {
    queues: RwLock<HashMap<ConnectionId, Entry>>,
    next_id: AtomicU64,
}

static GLOBAL: OnceLock<Arc<PacketRegistry>> = OnceLock::new();

impl PacketRegistry {
    pub fn new() -> Self {
        Self {
            queues: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// The process-wide registry used unless a system is built with its own.
    pub fn global() -> Arc<PacketRegistry> {
        GLOBAL.get_or_init(|| Arc::new(PacketRegistry::new())).clone()
    }

    pub fn allocate_id(&self) -> ConnectionId {
        ConnectionId::from_raw(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Bind a fresh, empty queue to `id`. Never overwrites an existing entry.
    pub fn register(&self, id: ConnectionId, capacity: usize) -> Result<QueueHandle> {
        let mut queues = self.queues.write();
        if queues.contains_key(&id) {
            return Err(Error::AlreadyRegistered(id));
        }
        let entry = Entry::new(capacity);
        let queue = entry.queue.clone();
        queues.insert(id, entry);
        tracing::debug!("Registered {} (queue size {})", id, capacity);
        Ok(queue)
    }

    pub fn lookup(&self, id: ConnectionId) -> Result<QueueHandle> {
        self.queues
            .read()
            .get(&id)
            .map(|entry| entry.queue.clone())
            .ok_or(Error::DeviceNotFound(id))
    }

    /// Remove the binding for `id`. Unregistering an absent id is a no-op;
    /// returns whether an entry was removed.
    pub fn unregister(&self, id: ConnectionId) -> bool {
        let removed = self.queues.write().remove(&id).is_some();
        if removed {
            tracing::debug!("Unregistered {}", id);
        }
        removed
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.queues.read().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.queues.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.read().is_empty()
    }
}

impl Default for PacketRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PacketRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketRegistry")
            .field("open_devices", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_register_lookup_unregister() {
        let registry = PacketRegistry::new();
        let id = registry.allocate_id();

        let queue = registry.register(id, 4).unwrap();
        assert_eq!(queue.capacity(), 4);
        assert!(registry.contains(id));
        assert_eq!(registry.len(), 1);

        let found = registry.lookup(id).unwrap();
        found.sender().send(Packet::new([0x90, 60, 100])).unwrap();
        assert_eq!(queue.receiver().recv().unwrap().data, [0x90, 60, 100]);

        assert!(registry.unregister(id));
        assert!(registry.is_empty());
        assert_eq!(registry.lookup(id).unwrap_err(), Error::DeviceNotFound(id));
    }

    #[test]
    fn test_double_register_keeps_original_binding() {
        let registry = PacketRegistry::new();
        let id = registry.allocate_id();

        let original = registry.register(id, 8).unwrap();
        assert_eq!(registry.register(id, 1).unwrap_err(), Error::AlreadyRegistered(id));

        let still = registry.lookup(id).unwrap();
        assert_eq!(still.capacity(), 8);
        still.sender().send(Packet::new([0x80, 1, 2])).unwrap();
        assert_eq!(original.receiver().try_recv().unwrap().data, [0x80, 1, 2]);
    }

    #[test]
    fn test_unregister_absent_is_noop() {
        let registry = PacketRegistry::new();
        let id = registry.allocate_id();
        assert!(!registry.unregister(id));

        registry.register(id, 1).unwrap();
        assert!(registry.unregister(id));
        assert!(!registry.unregister(id));
    }

    #[test]
    fn test_closed_signal_fires_on_unregister() {
        let registry = PacketRegistry::new();
        let id = registry.allocate_id();
        let queue = registry.register(id, 1).unwrap();
        assert_eq!(
            queue.closed().try_recv(),
            Err(crossbeam_channel::TryRecvError::Empty)
        );

        registry.unregister(id);
        assert_eq!(
            queue.closed().try_recv(),
            Err(crossbeam_channel::TryRecvError::Disconnected)
        );
    }

    #[test]
    fn test_ids_are_unique() {
        let registry = PacketRegistry::new();
        let a = registry.allocate_id();
        let b = registry.allocate_id();
        assert_ne!(a, b);
    }

    #[test]
    fn test_end_of_stream_after_unregister() {
        let registry = PacketRegistry::new();
        let id = registry.allocate_id();
        let rx = registry.register(id, 4).unwrap().receiver();

        registry
            .lookup(id)
            .unwrap()
            .sender()
            .send(Packet::new([0x90, 1, 1]))
            .unwrap();
        registry.unregister(id);

        assert_eq!(rx.recv().unwrap().data, [0x90, 1, 1]);
        assert!(rx.recv().is_err());
    }

    #[test]
    fn test_concurrent_register_and_lookup() {
        let registry = Arc::new(PacketRegistry::new());
        let ids: Vec<_> = (0..16).map(|_| registry.allocate_id()).collect();

        let handles: Vec<_> = ids
            .iter()
            .map(|&id| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    registry.register(id, 1).unwrap();
                    assert!(registry.lookup(id).is_ok());
                    registry.unregister(id);
                    assert!(registry.lookup(id).is_err());
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn test_global_is_shared() {
        let a = PacketRegistry::global();
        let b = PacketRegistry::global();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
