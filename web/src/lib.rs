//! HTTP and WebSocket surface of the Qroket platform.
//!
//! Builds the shared [`AppState`], the axum router and serves it until the
//! shutdown signal fires.

use axum::http::{header, HeaderValue, Method};
use domain::animal::MemoryAnimals;
use domain::auth::AuthGate;
use domain::error::Error as DomainError;
use domain::jwt::CredentialCodec;
use domain::location::MemoryLocations;
use domain::user::MemoryDirectory;
use events::EventPublisher;
use log::*;
use service::config::Config;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use ws::domain_event_handler::WsDomainEventHandler;

mod controller;
mod error;
mod extractors;
mod params;
mod protect;
pub mod router;
mod websocket;

pub use error::{Error, Result};

// Needs to implement Clone to be able to be passed into Router as State
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub directory: Arc<MemoryDirectory>,
    pub locations: Arc<MemoryLocations>,
    pub animals: Arc<MemoryAnimals>,
    pub auth_gate: AuthGate,
    pub ws_manager: Arc<ws::Manager>,
    pub event_publisher: EventPublisher,
}

impl AppState {
    /// Wires the directory, credential codec, auth gate and broadcaster
    /// together, and subscribes the broadcaster to domain events.
    pub fn new(config: Config) -> core::result::Result<Self, DomainError> {
        let directory = Arc::new(match config.directory_seed_file() {
            Some(path) => MemoryDirectory::from_seed_file(path)?,
            None => MemoryDirectory::new(),
        });
        let codec = Arc::new(CredentialCodec::from_config(&config)?);
        let auth_gate = AuthGate::new(codec, directory.clone(), config.role_check);

        let ws_manager = Arc::new(ws::Manager::new(
            directory.clone(),
            config.directory_lookup_timeout(),
        ));
        let event_publisher = EventPublisher::new()
            .with_handler(Arc::new(WsDomainEventHandler::new(ws_manager.clone())));

        info!(
            "Application state ready: role check {}, directory lookup timeout {:?}",
            config.role_check,
            config.directory_lookup_timeout()
        );

        Ok(Self {
            config,
            directory,
            locations: Arc::new(MemoryLocations::new()),
            animals: Arc::new(MemoryAnimals::new()),
            auth_gate,
            ws_manager,
            event_publisher,
        })
    }
}

/// Serves the API on `listener` until `shutdown` resolves, then closes every
/// open WebSocket connection.
pub async fn serve<F>(
    app_state: AppState,
    listener: TcpListener,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let cors_layer = cors_layer(&app_state.config);
    let ws_manager = app_state.ws_manager.clone();
    let app = router::define_routes(app_state).layer(cors_layer);

    info!("Server starting... listening for connections on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            info!("Shutdown signal received, closing WebSocket connections");
            ws_manager.shutdown();
        })
        .await
}

/// Binds to the configured interface and port, then serves.
pub async fn init_server<F>(app_state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let interface = app_state.config.interface.as_deref().unwrap_or("127.0.0.1");
    let listener = TcpListener::bind((interface, app_state.config.port)).await?;
    serve(app_state, listener, shutdown).await
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring invalid allowed origin {origin:?}: {e}");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_origin(origins)
}
