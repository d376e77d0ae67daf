//! Business rules of the Qroket platform.
//!
//! The domain layer owns users, locations and animal reports, the credential codec and the
//! auth gate. It knows nothing about HTTP or WebSockets: writes publish
//! [`events::DomainEvent`]s and the `ws` crate turns those into broadcasts.

pub use events::Id;

pub mod animal;
pub mod auth;
pub mod directory;
pub mod error;
pub mod jwt;
pub mod location;
pub mod user;
