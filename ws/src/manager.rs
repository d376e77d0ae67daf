use crate::connection::{ConnectionId, ConnectionInfo, ConnectionRegistry};
use crate::message::{EventKind, Message as WsMessage, MessageScope};
use axum::extract::ws::Utf8Bytes;
use domain::directory::Directory;
use domain::user::Role;
use events::Id;
use futures::future::join_all;
use log::*;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Outcome of one publish call.
///
/// `targeted` connections each got exactly one delivery attempt, which either
/// `delivered` or `failed`. `skipped` connections were never attempted because
/// their subject's current role could not be resolved.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    pub targeted: usize,
    pub delivered: usize,
    pub failed: usize,
    pub skipped: usize,
}

enum Resolution {
    Matches,
    Differs,
    Unresolved,
}

pub struct Manager {
    registry: Arc<ConnectionRegistry>,
    directory: Arc<dyn Directory>,
    lookup_timeout: Duration,
}

impl Manager {
    pub fn new(directory: Arc<dyn Directory>, lookup_timeout: Duration) -> Self {
        Self {
            registry: Arc::new(ConnectionRegistry::new()),
            directory,
            lookup_timeout,
        }
    }

    /// Register a new connection and return its unique ID
    pub fn register_connection(
        &self,
        subject_id: Id,
        sender: mpsc::Sender<Utf8Bytes>,
    ) -> ConnectionId {
        let connection_id = self.registry.register(subject_id, sender);
        info!(
            "Registered WebSocket connection {connection_id} for {subject_id} ({} open)",
            self.registry.len()
        );
        connection_id
    }

    /// Unregister a connection by ID. Safe to call more than once.
    pub fn unregister_connection(&self, connection_id: &ConnectionId) {
        if self.registry.unregister(connection_id) {
            info!(
                "Unregistered WebSocket connection {connection_id} ({} open)",
                self.registry.len()
            );
        }
    }

    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    /// Serializes `payload` once and queues it on every open connection.
    pub fn broadcast_all<T: Serialize + ?Sized>(&self, payload: &T) -> DeliveryReport {
        let Some(frame) = serialize(payload) else {
            return DeliveryReport::default();
        };
        let report = deliver(&frame, self.registry.snapshot());
        debug!("Broadcast to all: {report:?}");
        report
    }

    /// Queues `payload` on the connections whose subject holds `role` right
    /// now, according to the directory. Each distinct subject is looked up
    /// once, concurrently, and bounded by the lookup timeout. A subject whose
    /// lookup fails, times out or finds nothing is skipped.
    pub async fn broadcast_to_role<T: Serialize + ?Sized>(
        &self,
        role: Role,
        payload: &T,
    ) -> DeliveryReport {
        let Some(frame) = serialize(payload) else {
            return DeliveryReport::default();
        };

        let snapshot = self.registry.snapshot();
        let subjects: HashSet<Id> = snapshot.iter().map(|(_, info)| info.subject_id).collect();

        let resolutions: HashMap<Id, Resolution> = join_all(
            subjects
                .into_iter()
                .map(|subject_id| async move { (subject_id, self.resolve(subject_id, role).await) }),
        )
        .await
        .into_iter()
        .collect();

        let mut skipped = 0;
        let targets: Vec<(ConnectionId, ConnectionInfo)> = snapshot
            .into_iter()
            .filter(|(_, info)| match resolutions.get(&info.subject_id) {
                Some(Resolution::Matches) => true,
                Some(Resolution::Differs) => false,
                Some(Resolution::Unresolved) | None => {
                    skipped += 1;
                    false
                }
            })
            .collect();

        let report = DeliveryReport {
            skipped,
            ..deliver(&frame, targets)
        };
        debug!("Broadcast to role {role}: {report:?}");
        report
    }

    /// Queues `payload` on every connection opened by `subject_id`.
    pub fn send_to_user<T: Serialize + ?Sized>(&self, subject_id: Id, payload: &T) -> DeliveryReport {
        let Some(frame) = serialize(payload) else {
            return DeliveryReport::default();
        };
        let report = deliver(&frame, self.registry.connections_for(&subject_id));
        debug!("Sent to user {subject_id}: {report:?}");
        report
    }

    /// Send a message based on its scope
    pub async fn send_message(&self, message: WsMessage) -> DeliveryReport {
        trace!("Sending {} to {:?}", message.event.kind(), message.scope);

        match message.scope {
            MessageScope::All => self.broadcast_all(&message.event),
            MessageScope::Role(role) => self.broadcast_to_role(role, &message.event).await,
            MessageScope::User(subject_id) => self.send_to_user(subject_id, &message.event),
        }
    }

    /// Drops every registered connection. Each writer task sees its queue
    /// close, sends a Close frame and exits.
    pub fn shutdown(&self) -> usize {
        let closed = self.registry.clear();
        info!("Closed {closed} WebSocket connection(s) on shutdown");
        closed
    }

    async fn resolve(&self, subject_id: Id, role: Role) -> Resolution {
        match tokio::time::timeout(self.lookup_timeout, self.directory.lookup_role(subject_id))
            .await
        {
            Ok(Ok(Some(current))) if current == role => Resolution::Matches,
            Ok(Ok(Some(_))) => Resolution::Differs,
            Ok(Ok(None)) => {
                debug!("Subject {subject_id} is no longer in the directory, skipping");
                Resolution::Unresolved
            }
            Ok(Err(e)) => {
                warn!("Role lookup for {subject_id} failed, skipping: {e}");
                Resolution::Unresolved
            }
            Err(_) => {
                warn!(
                    "Role lookup for {subject_id} timed out after {:?}, skipping",
                    self.lookup_timeout
                );
                Resolution::Unresolved
            }
        }
    }
}

fn serialize<T: Serialize + ?Sized>(payload: &T) -> Option<Utf8Bytes> {
    match serde_json::to_string(payload) {
        Ok(json) => Some(Utf8Bytes::from(json)),
        Err(e) => {
            error!("Failed to serialize WebSocket payload: {e}");
            None
        }
    }
}

/// One attempt per target. Failures are logged and counted; the dead entry is
/// removed when its own connection task ends.
fn deliver(frame: &Utf8Bytes, targets: Vec<(ConnectionId, ConnectionInfo)>) -> DeliveryReport {
    let mut report = DeliveryReport {
        targeted: targets.len(),
        ..Default::default()
    };

    for (connection_id, info) in targets {
        match info.try_send(frame.clone()) {
            Ok(()) => report.delivered += 1,
            Err(e) => {
                report.failed += 1;
                warn!(
                    "Failed to send to connection {connection_id} of {}: {e}",
                    info.subject_id
                );
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Event;
    use async_trait::async_trait;
    use domain::auth::Identity;
    use domain::error::Error;
    use domain::jwt::CredentialCodec;
    use domain::user::{MemoryDirectory, NewUser};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    const LOOKUP_TIMEOUT: Duration = Duration::from_millis(500);

    #[derive(Default)]
    struct ScriptedDirectory {
        roles: HashMap<Id, Role>,
        slow: HashSet<Id>,
        failing: HashSet<Id>,
        lookups: AtomicUsize,
    }

    #[async_trait]
    impl Directory for ScriptedDirectory {
        async fn lookup_role(&self, subject_id: Id) -> Result<Option<Role>, Error> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            if self.slow.contains(&subject_id) {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            if self.failing.contains(&subject_id) {
                return Err(Error::directory_unavailable());
            }
            Ok(self.roles.get(&subject_id).copied())
        }

        async fn list_subjects_with_role(&self, role: Role) -> Result<Vec<Id>, Error> {
            Ok(self
                .roles
                .iter()
                .filter(|(_, r)| **r == role)
                .map(|(id, _)| *id)
                .collect())
        }
    }

    fn manager(directory: impl Directory + 'static) -> Manager {
        Manager::new(Arc::new(directory), LOOKUP_TIMEOUT)
    }

    fn connect(manager: &Manager, subject_id: Id) -> (ConnectionId, mpsc::Receiver<Utf8Bytes>) {
        let (tx, rx) = mpsc::channel(8);
        (manager.register_connection(subject_id, tx), rx)
    }

    fn received(rx: &mut mpsc::Receiver<Utf8Bytes>) -> Vec<Value> {
        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(serde_json::from_str(frame.as_str()).unwrap());
        }
        frames
    }

    #[test]
    fn broadcast_all_attempts_every_connection_despite_a_failure() {
        let manager = manager(ScriptedDirectory::default());
        let mut receivers: Vec<_> = (0..5).map(|_| connect(&manager, Uuid::new_v4()).1).collect();

        // One transport already gone.
        drop(receivers.remove(2));

        let report = manager.broadcast_all(&json!({"kind": "ping"}));

        assert_eq!(
            report,
            DeliveryReport {
                targeted: 5,
                delivered: 4,
                failed: 1,
                skipped: 0
            }
        );
        for rx in receivers.iter_mut() {
            assert_eq!(received(rx), vec![json!({"kind": "ping"})]);
        }
    }

    #[test]
    fn a_full_queue_fails_only_its_own_connection() {
        let manager = manager(ScriptedDirectory::default());
        let (tx, _stalled) = mpsc::channel(1);
        manager.register_connection(Uuid::new_v4(), tx);
        let (_, mut healthy) = connect(&manager, Uuid::new_v4());

        manager.broadcast_all(&json!({"n": 1}));
        let report = manager.broadcast_all(&json!({"n": 2}));

        assert_eq!(report.targeted, 2);
        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(received(&mut healthy), vec![json!({"n": 1}), json!({"n": 2})]);
    }

    #[test]
    fn only_connected_subjects_receive_broadcasts() {
        let manager = manager(ScriptedDirectory::default());
        let (u1, mut u1_rx) = connect(&manager, Uuid::new_v4());
        let (_u2, mut u2_rx) = connect(&manager, Uuid::new_v4());

        manager.broadcast_all(&json!({"kind": "ping"}));
        assert_eq!(received(&mut u1_rx), vec![json!({"kind": "ping"})]);
        assert_eq!(received(&mut u2_rx), vec![json!({"kind": "ping"})]);

        manager.unregister_connection(&u1);
        manager.unregister_connection(&u1);

        let report = manager.broadcast_all(&json!({"kind": "pong"}));
        assert_eq!(report.targeted, 1);
        assert!(received(&mut u1_rx).is_empty());
        assert_eq!(received(&mut u2_rx), vec![json!({"kind": "pong"})]);
    }

    #[tokio::test]
    async fn role_broadcasts_follow_the_directory_not_the_credential() {
        let directory = Arc::new(MemoryDirectory::new());
        let jane = directory
            .create(NewUser {
                email: "jane@doe.ch".to_string(),
                password: "password123".to_string(),
                display_name: "Jane".to_string(),
                role: None,
            })
            .unwrap();
        let codec = CredentialCodec::new(b"secret", Duration::from_secs(3600));
        let credential = codec.issue(jane.id, jane.role).unwrap();

        let manager = Manager::new(directory.clone(), LOOKUP_TIMEOUT);
        let (_, mut rx) = connect(&manager, jane.id);

        let before = manager.broadcast_to_role(Role::Admin, &json!({"kind": "admins"})).await;
        assert_eq!(before.targeted, 0);
        assert!(received(&mut rx).is_empty());

        directory.set_role(jane.id, Role::Admin).unwrap();

        let after = manager.broadcast_to_role(Role::Admin, &json!({"kind": "admins"})).await;
        assert_eq!(after.delivered, 1);
        assert_eq!(received(&mut rx), vec![json!({"kind": "admins"})]);

        // The credential still carries the role it was issued with.
        assert_eq!(
            codec.verify(&credential.token).unwrap(),
            Identity {
                subject_id: jane.id,
                role: Role::User
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn slow_and_failing_lookups_skip_only_their_subject() {
        let admin = Uuid::new_v4();
        let slow = Uuid::new_v4();
        let failing = Uuid::new_v4();
        let gone = Uuid::new_v4();
        let manager = manager(ScriptedDirectory {
            roles: HashMap::from([(admin, Role::Admin), (slow, Role::Admin)]),
            slow: HashSet::from([slow]),
            failing: HashSet::from([failing]),
            ..Default::default()
        });

        let (_, mut admin_rx) = connect(&manager, admin);
        let (_, mut slow_rx) = connect(&manager, slow);
        let (_, mut failing_rx) = connect(&manager, failing);
        let (_, mut gone_rx) = connect(&manager, gone);

        let report = manager
            .broadcast_to_role(Role::Admin, &json!({"kind": "admins"}))
            .await;

        assert_eq!(
            report,
            DeliveryReport {
                targeted: 1,
                delivered: 1,
                failed: 0,
                skipped: 3
            }
        );
        assert_eq!(received(&mut admin_rx), vec![json!({"kind": "admins"})]);
        assert!(received(&mut slow_rx).is_empty());
        assert!(received(&mut failing_rx).is_empty());
        assert!(received(&mut gone_rx).is_empty());
    }

    #[tokio::test]
    async fn each_subject_is_looked_up_once_per_broadcast() {
        let admin = Uuid::new_v4();
        let directory = Arc::new(ScriptedDirectory {
            roles: HashMap::from([(admin, Role::Admin)]),
            ..Default::default()
        });
        let manager = Manager::new(directory.clone(), LOOKUP_TIMEOUT);
        let (_, mut first) = connect(&manager, admin);
        let (_, mut second) = connect(&manager, admin);

        let report = manager.broadcast_to_role(Role::Admin, &json!({"n": 1})).await;

        assert_eq!(report.delivered, 2);
        assert_eq!(directory.lookups.load(Ordering::SeqCst), 1);
        assert_eq!(received(&mut first).len(), 1);
        assert_eq!(received(&mut second).len(), 1);
    }

    #[tokio::test]
    async fn send_message_routes_by_scope() {
        let jane = Uuid::new_v4();
        let john = Uuid::new_v4();
        let manager = manager(ScriptedDirectory {
            roles: HashMap::from([(jane, Role::User), (john, Role::Admin)]),
            ..Default::default()
        });
        let (_, mut jane_rx) = connect(&manager, jane);
        let (_, mut john_rx) = connect(&manager, john);
        let location_id = Uuid::new_v4();

        manager
            .send_message(WsMessage {
                event: Event::LocationDeleted { location_id },
                scope: MessageScope::User(jane),
            })
            .await;
        assert_eq!(
            received(&mut jane_rx),
            vec![json!({"kind": "location_deleted", "data": {"location_id": location_id}})]
        );
        assert!(received(&mut john_rx).is_empty());

        manager
            .send_message(WsMessage {
                event: Event::UserCreated { user: json!({"id": jane}) },
                scope: MessageScope::Role(Role::Admin),
            })
            .await;
        assert!(received(&mut jane_rx).is_empty());
        assert_eq!(received(&mut john_rx)[0]["kind"], "user_created");

        let report = manager
            .send_message(WsMessage {
                event: Event::LocationDeleted { location_id },
                scope: MessageScope::All,
            })
            .await;
        assert_eq!(report.delivered, 2);
    }

    #[test]
    fn shutdown_closes_every_queue() {
        let manager = manager(ScriptedDirectory::default());
        let (_, mut first) = connect(&manager, Uuid::new_v4());
        let (second_id, mut second) = connect(&manager, Uuid::new_v4());

        assert_eq!(manager.shutdown(), 2);
        assert_eq!(manager.connection_count(), 0);
        assert!(matches!(first.try_recv(), Err(mpsc::error::TryRecvError::Disconnected)));
        assert!(matches!(second.try_recv(), Err(mpsc::error::TryRecvError::Disconnected)));

        // Connection tasks still unregister after shutdown.
        manager.unregister_connection(&second_id);
        assert_eq!(manager.broadcast_all(&json!({})).targeted, 0);
    }
}
