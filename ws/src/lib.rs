//! WebSocket infrastructure for real-time updates.
//!
//! This crate keeps the registry of open WebSocket connections and pushes
//! domain events to them.
//!
//! # Architecture
//!
//! - **Many connections per user**: every tab opens its own connection; each is
//!   registered under the subject id its credential authenticated.
//! - **Dual-index registry**: O(1) lookups for both connection management and
//!   user-scoped message routing via separate DashMap indices.
//! - **Snapshot broadcasts**: a publish call copies the live entries first and
//!   then sends, so connections coming and going never disturb it.
//! - **Fresh roles**: role-scoped messages ask the directory for each
//!   subject's current role at send time, never the role in its credential.
//! - **Ephemeral messages**: nothing is persisted or replayed. A connection
//!   only sees what is published while it is open.
//! - **Isolated failures**: each connection has a bounded outbound queue. A
//!   full or closed queue fails that one delivery and nothing else.
//!
//! # Message Flow
//!
//! 1. Client opens `/ws` presenting its bearer credential
//! 2. The web layer authenticates it before accepting the upgrade
//! 3. Connection registered in ConnectionRegistry with dual indices
//! 4. A handler writes a resource and publishes a `DomainEvent`
//! 5. `WsDomainEventHandler` picks the audience and calls `Manager::send_message()`
//! 6. The connection's writer task drains its queue into the socket
//!
//! # Example: Sending an event
//!
//! ```rust,ignore
//! use ws::message::{Event as WsEvent, Message as WsMessage, MessageScope};
//!
//! app_state.ws_manager.send_message(WsMessage {
//!     event: WsEvent::LocationDeleted { location_id },
//!     scope: MessageScope::All,
//! }).await;
//! ```
//!
//! # Modules
//!
//! - `connection`: ConnectionRegistry with dual-index architecture and type-safe ConnectionId
//! - `manager`: the broadcaster (delegates bookkeeping to ConnectionRegistry)
//! - `message`: Type-safe event and scope definitions
//! - `domain_event_handler`: audience rules for each `DomainEvent`

pub mod connection;
pub mod domain_event_handler;
pub mod manager;
pub mod message;

pub use manager::{DeliveryReport, Manager};
