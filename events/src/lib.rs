//! Event system infrastructure for the Qroket platform.
//!
//! This crate provides the event system that decouples the request handlers that
//! write resources from the infrastructure that notifies observers (the
//! WebSocket broadcaster).
//!
//! # Architecture
//!
//! - **DomainEvent**: Enum representing all business events in the system
//! - **EventHandler**: Trait for implementing event handlers
//! - **EventPublisher**: Publishes events to registered handlers
//!
//! This crate has no dependencies on internal crates (domain, ws, etc.),
//! avoiding circular dependencies. Resource data is carried as serialized JSON values.

use async_trait::async_trait;
use log::*;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

/// A type alias that represents any resource's id field data type.
pub type Id = Uuid;

/// Domain events that represent business-level changes in the system.
/// These events are emitted after a write has completed successfully.
///
/// Events never decide who receives them; the handler that turns them into
/// broadcasts owns the audience rules.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    /// Emitted when a new location is stored.
    LocationCreated {
        /// Complete serialized location (id, npa, city, owner_id).
        location: Value,
        /// The subject that created the location and now owns it.
        owner_id: Id,
    },
    /// Emitted when a location's fields change.
    LocationUpdated {
        /// Complete location with all current field values.
        location: Value,
    },
    /// Emitted when a location is removed. The entity no longer exists so only its id travels.
    LocationDeleted { location_id: Id },
    /// Emitted when a lost or found animal is reported.
    AnimalCreated {
        /// Complete serialized animal report.
        animal: Value,
        /// The subject that filed the report and now owns it.
        owner_id: Id,
    },
    AnimalUpdated { animal: Value },
    AnimalDeleted { animal_id: Id },
    /// Emitted when a new user registers.
    UserCreated {
        /// Serialized user without the password hash.
        user: Value,
    },
    /// Emitted when an admin changes a user's role in the directory.
    UserRoleChanged { user_id: Id, role: String },
}

impl DomainEvent {
    /// Short, stable name used in log lines.
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::LocationCreated { .. } => "LocationCreated",
            DomainEvent::LocationUpdated { .. } => "LocationUpdated",
            DomainEvent::LocationDeleted { .. } => "LocationDeleted",
            DomainEvent::AnimalCreated { .. } => "AnimalCreated",
            DomainEvent::AnimalUpdated { .. } => "AnimalUpdated",
            DomainEvent::AnimalDeleted { .. } => "AnimalDeleted",
            DomainEvent::UserCreated { .. } => "UserCreated",
            DomainEvent::UserRoleChanged { .. } => "UserRoleChanged",
        }
    }
}

/// Trait for handling domain events.
/// Implementations can perform side effects like pushing notifications,
/// updating caches, logging, etc.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &DomainEvent);
}

/// Publishes domain events to registered handlers.
/// Handlers are called sequentially in registration order.
#[derive(Clone)]
pub struct EventPublisher {
    handlers: Arc<Vec<Arc<dyn EventHandler>>>,
}

impl EventPublisher {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(Vec::new()),
        }
    }

    /// Register a new event handler.
    /// Note: This creates a new publisher instance with the additional handler.
    /// Store the returned publisher in your application state.
    pub fn with_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        let mut handlers = (*self.handlers).clone();
        handlers.push(handler);
        self.handlers = Arc::new(handlers);
        self
    }

    /// Publish an event to all registered handlers and wait for them to finish.
    pub async fn publish(&self, event: DomainEvent) {
        trace!("Publishing {} to {} handler(s)", event.name(), self.handlers.len());
        for handler in self.handlers.iter() {
            handler.handle(&event).await;
        }
    }

    /// Publish without waiting. The caller's response is never delayed by
    /// slow handlers; must be called from within a tokio runtime.
    pub fn spawn_publish(&self, event: DomainEvent) {
        let publisher = self.clone();
        tokio::spawn(async move {
            publisher.publish(event).await;
        });
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}
