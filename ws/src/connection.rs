use axum::extract::ws::Utf8Bytes;
use dashmap::DashMap;
use events::Id;
use log::*;
use std::collections::HashSet;
use std::fmt;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Unique identifier for a connection (server-generated)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(uuid::Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Why a frame could not be queued for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    /// The connection's outbound queue is at capacity.
    Full,
    /// The connection's writer task is gone.
    Closed,
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendError::Full => write!(f, "outbound queue full"),
            SendError::Closed => write!(f, "transport closed"),
        }
    }
}

impl std::error::Error for SendError {}

/// The subject that opened a connection and the queue feeding its writer task.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub subject_id: Id,
    pub sender: mpsc::Sender<Utf8Bytes>,
}

impl ConnectionInfo {
    /// Never waits: a full queue is reported instead of applying backpressure
    /// to the caller.
    pub fn try_send(&self, frame: Utf8Bytes) -> Result<(), SendError> {
        self.sender.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => SendError::Full,
            TrySendError::Closed(_) => SendError::Closed,
        })
    }
}

/// Live connections with a secondary index by subject.
///
/// Callers only ever see clones of the entries, so iteration never holds a
/// shard lock while sending.
pub struct ConnectionRegistry {
    /// Primary storage: lookup by connection_id for registration/cleanup - O(1)
    connections: DashMap<ConnectionId, ConnectionInfo>,

    /// Secondary index: fast lookup by subject for message routing - O(1)
    user_index: DashMap<Id, HashSet<ConnectionId>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            user_index: DashMap::new(),
        }
    }

    /// Register a new connection - O(1)
    pub fn register(&self, subject_id: Id, sender: mpsc::Sender<Utf8Bytes>) -> ConnectionId {
        let connection_id = ConnectionId::new();

        self.connections
            .insert(connection_id, ConnectionInfo { subject_id, sender });

        self.user_index
            .entry(subject_id)
            .or_default()
            .insert(connection_id);

        connection_id
    }

    /// Unregister a connection - O(1). Returns whether an entry was removed;
    /// removing an unknown or already removed connection is a no-op.
    pub fn unregister(&self, connection_id: &ConnectionId) -> bool {
        let Some((_, info)) = self.connections.remove(connection_id) else {
            return false;
        };

        // Drop the guard before removing an emptied subject entry.
        let now_empty = match self.user_index.get_mut(&info.subject_id) {
            Some(mut entry) => {
                entry.remove(connection_id);
                entry.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.user_index
                .remove_if(&info.subject_id, |_, ids| ids.is_empty());
        }
        true
    }

    /// Point-in-time copy of every live entry.
    pub fn snapshot(&self) -> Vec<(ConnectionId, ConnectionInfo)> {
        self.connections
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }

    /// Point-in-time copy of the entries opened by `subject_id`.
    pub fn connections_for(&self, subject_id: &Id) -> Vec<(ConnectionId, ConnectionInfo)> {
        let ids: Vec<ConnectionId> = match self.user_index.get(subject_id) {
            Some(ids) => ids.iter().copied().collect(),
            None => return Vec::new(),
        };
        ids.into_iter()
            .filter_map(|id| self.connections.get(&id).map(|info| (id, info.clone())))
            .collect()
    }

    /// Visits a snapshot, so the visitor may freely register or unregister.
    pub fn for_each<F>(&self, mut visitor: F)
    where
        F: FnMut(&ConnectionId, &ConnectionInfo),
    {
        for (connection_id, info) in self.snapshot() {
            visitor(&connection_id, &info);
        }
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Drops every entry, and with it every outbound sender. Returns how many
    /// connections were dropped.
    pub fn clear(&self) -> usize {
        let count = self.connections.len();
        self.connections.clear();
        self.user_index.clear();
        debug!("Cleared {count} connection(s) from the registry");
        count
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use uuid::Uuid;

    fn channel() -> (mpsc::Sender<Utf8Bytes>, mpsc::Receiver<Utf8Bytes>) {
        mpsc::channel(8)
    }

    #[test]
    fn unregister_is_idempotent_and_hides_the_entry() {
        let registry = ConnectionRegistry::new();
        let subject = Uuid::new_v4();
        let (tx, _rx) = channel();

        let id = registry.register(subject, tx);
        assert_eq!(registry.len(), 1);

        assert!(registry.unregister(&id));
        assert!(!registry.unregister(&id));

        let mut visited = Vec::new();
        registry.for_each(|id, _| visited.push(*id));
        assert!(visited.is_empty());
        assert!(registry.connections_for(&subject).is_empty());
        assert!(registry.user_index.is_empty());
    }

    #[test]
    fn a_subject_may_hold_several_connections() {
        let registry = ConnectionRegistry::new();
        let subject = Uuid::new_v4();
        let (tx1, _rx1) = channel();
        let (tx2, _rx2) = channel();

        let first = registry.register(subject, tx1);
        let second = registry.register(subject, tx2);
        assert_ne!(first, second);
        assert_eq!(registry.connections_for(&subject).len(), 2);

        registry.unregister(&first);
        let remaining = registry.connections_for(&subject);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].0, second);
    }

    #[test]
    fn for_each_tolerates_mutation_from_the_visitor() {
        let registry = ConnectionRegistry::new();
        let mut receivers = Vec::new();
        for _ in 0..4 {
            let (tx, rx) = channel();
            registry.register(Uuid::new_v4(), tx);
            receivers.push(rx);
        }

        let mut visits = 0;
        registry.for_each(|id, _| {
            visits += 1;
            registry.unregister(id);
            let (tx, _rx) = channel();
            registry.register(Uuid::new_v4(), tx);
        });

        assert_eq!(visits, 4);
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn try_send_reports_full_and_closed_queues() {
        let (tx, rx) = mpsc::channel(1);
        let info = ConnectionInfo {
            subject_id: Uuid::new_v4(),
            sender: tx,
        };

        assert_eq!(info.try_send(Utf8Bytes::from_static("one")), Ok(()));
        assert_eq!(
            info.try_send(Utf8Bytes::from_static("two")),
            Err(SendError::Full)
        );

        drop(rx);
        assert_eq!(
            info.try_send(Utf8Bytes::from_static("three")),
            Err(SendError::Closed)
        );
    }

    #[test]
    fn clear_drops_every_sender() {
        let registry = ConnectionRegistry::new();
        let (tx, mut rx) = channel();
        registry.register(Uuid::new_v4(), tx);

        assert_eq!(registry.clear(), 1);
        assert!(registry.is_empty());
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_register_and_unregister_leave_a_consistent_registry() {
        let registry = Arc::new(ConnectionRegistry::new());
        let subject = Uuid::new_v4();

        let tasks: Vec<_> = (0..64)
            .map(|i| {
                let registry = registry.clone();
                tokio::spawn(async move {
                    let (tx, _rx) = mpsc::channel(1);
                    let id = registry.register(subject, tx);
                    let _ = registry.snapshot();
                    if i % 2 == 0 {
                        registry.unregister(&id);
                        registry.unregister(&id);
                    }
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(registry.len(), 32);
        assert_eq!(registry.connections_for(&subject).len(), 32);
    }
}
