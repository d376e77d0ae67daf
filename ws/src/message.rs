use domain::user::Role;
use events::Id;
use serde::Serialize;
use serde_json::Value;

/// Trait for getting the wire kind of an outbound event
pub trait EventKind {
    fn kind(&self) -> &'static str;
}

/// Frames pushed to clients, serialized as `{"kind": "...", "data": {...}}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Event {
    LocationCreated { location: Value, owner_id: Id },
    LocationUpdated { location: Value },
    LocationDeleted { location_id: Id },
    AnimalCreated { animal: Value, owner_id: Id },
    AnimalUpdated { animal: Value },
    AnimalDeleted { animal_id: Id },

    // Admin-facing
    UserCreated { user: Value },
    UserRoleChanged { user_id: Id, role: String },
}

impl EventKind for Event {
    fn kind(&self) -> &'static str {
        match self {
            Event::LocationCreated { .. } => "location_created",
            Event::LocationUpdated { .. } => "location_updated",
            Event::LocationDeleted { .. } => "location_deleted",
            Event::AnimalCreated { .. } => "animal_created",
            Event::AnimalUpdated { .. } => "animal_updated",
            Event::AnimalDeleted { .. } => "animal_deleted",
            Event::UserCreated { .. } => "user_created",
            Event::UserRoleChanged { .. } => "user_role_changed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Message {
    pub event: Event,
    pub scope: MessageScope,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MessageScope {
    /// Every open connection
    All,
    /// Connections whose subject currently holds the role, resolved at send time
    Role(Role),
    /// Every connection opened by one subject
    User(Id),
}
