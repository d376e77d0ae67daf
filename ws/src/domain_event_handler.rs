use crate::message::{Event as WsEvent, Message as WsMessage, MessageScope};
use crate::Manager;
use async_trait::async_trait;
use domain::user::Role;
use events::{DomainEvent, EventHandler};
use log::*;
use std::sync::Arc;

/// Turns domain events into WebSocket broadcasts.
///
/// Owns the audience rules: location and animal changes go to every connection, user
/// changes go to whoever is an admin at send time, and a role change also goes
/// to the affected user.
pub struct WsDomainEventHandler {
    ws_manager: Arc<Manager>,
}

impl WsDomainEventHandler {
    pub fn new(ws_manager: Arc<Manager>) -> Self {
        Self { ws_manager }
    }

    async fn send(&self, event: WsEvent, scope: MessageScope) {
        let report = self
            .ws_manager
            .send_message(WsMessage { event, scope })
            .await;
        if report.failed > 0 || report.skipped > 0 {
            debug!("Delivery to {scope:?} was partial: {report:?}");
        }
    }
}

#[async_trait]
impl EventHandler for WsDomainEventHandler {
    async fn handle(&self, event: &DomainEvent) {
        debug!("Handling {} event", event.name());

        match event {
            DomainEvent::LocationCreated { location, owner_id } => {
                let ws_event = WsEvent::LocationCreated {
                    location: location.clone(),
                    owner_id: *owner_id,
                };
                self.send(ws_event, MessageScope::All).await;
            }

            DomainEvent::LocationUpdated { location } => {
                let ws_event = WsEvent::LocationUpdated {
                    location: location.clone(),
                };
                self.send(ws_event, MessageScope::All).await;
            }

            DomainEvent::LocationDeleted { location_id } => {
                let ws_event = WsEvent::LocationDeleted {
                    location_id: *location_id,
                };
                self.send(ws_event, MessageScope::All).await;
            }

            DomainEvent::AnimalCreated { animal, owner_id } => {
                let ws_event = WsEvent::AnimalCreated {
                    animal: animal.clone(),
                    owner_id: *owner_id,
                };
                self.send(ws_event, MessageScope::All).await;
            }

            DomainEvent::AnimalUpdated { animal } => {
                let ws_event = WsEvent::AnimalUpdated {
                    animal: animal.clone(),
                };
                self.send(ws_event, MessageScope::All).await;
            }

            DomainEvent::AnimalDeleted { animal_id } => {
                let ws_event = WsEvent::AnimalDeleted {
                    animal_id: *animal_id,
                };
                self.send(ws_event, MessageScope::All).await;
            }

            DomainEvent::UserCreated { user } => {
                let ws_event = WsEvent::UserCreated { user: user.clone() };
                self.send(ws_event, MessageScope::Role(Role::Admin)).await;
            }

            DomainEvent::UserRoleChanged { user_id, role } => {
                let ws_event = WsEvent::UserRoleChanged {
                    user_id: *user_id,
                    role: role.clone(),
                };
                self.send(ws_event.clone(), MessageScope::Role(Role::Admin))
                    .await;

                // A promoted user was already reached as an admin.
                if *role != Role::Admin.to_string() {
                    self.send(ws_event, MessageScope::User(*user_id)).await;
                }
            }
        }
    }
}
