//! WebSocket HTTP handler for the web layer.
//!
//! This module contains only the Axum handler for the `/ws` endpoint.
//! The core infrastructure (Manager, ConnectionRegistry, Message types)
//! lives in the `ws` crate to avoid circular dependencies.

pub mod handler;
