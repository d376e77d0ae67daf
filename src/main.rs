use log::*;
use service::{config::Config, logging::Logger};

#[tokio::main]
async fn main() {
    let config = Config::new();
    Logger::init_logger(&config);

    info!(
        "Starting qroket platform [{}] on port {}",
        config.runtime_env(),
        config.port
    );

    let app_state = match web::AppState::new(config) {
        Ok(app_state) => app_state,
        Err(e) => {
            error!("Failed to build application state: {e} ({:?})", e.source);
            std::process::exit(1);
        }
    };

    if let Err(e) = web::init_server(app_state, shutdown_signal()).await {
        error!("Server stopped with an error: {e}");
        std::process::exit(1);
    }

    info!("Server stopped");
}

/// Resolves on Ctrl-C, or on SIGTERM where the platform has it.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
