//! HTTP server command

use std::time::Duration;

use roster_api::{build_router, AppState};
use roster_core::Config;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::oneshot;
use tracing::{info, warn};

use super::open_services;

/// Run the HTTP server until Ctrl-C or SIGTERM
pub async fn execute(config: &Config) -> anyhow::Result<()> {
    let (db, services) = open_services(config).await?;

    let state = AppState::with_request_timeout(services, config.server.request_timeout);
    let app = build_router(state);

    let listener = TcpListener::bind(&config.server.listen).await?;
    info!(
        listen = %listener.local_addr()?,
        max_reviewers = config.review.max_reviewers,
        "Roster server listening"
    );

    serve_until_shutdown(listener, app, config.server.shutdown_timeout).await?;

    db.close().await;
    info!("Roster server stopped");
    Ok(())
}

/// Serve until a shutdown signal, then give in-flight requests
/// `shutdown_timeout` to finish before dropping them
async fn serve_until_shutdown(
    listener: TcpListener,
    app: axum::Router,
    shutdown_timeout: Duration,
) -> anyhow::Result<()> {
    let (signalled_tx, signalled_rx) = oneshot::channel();

    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown_signal().await;
                let _ = signalled_tx.send(());
            })
            .await
    });

    tokio::select! {
        result = &mut server => return Ok(result??),
        _ = signalled_rx => {}
    }

    match tokio::time::timeout(shutdown_timeout, &mut server).await {
        Ok(result) => result??,
        Err(_) => {
            warn!(
                timeout = ?shutdown_timeout,
                "In-flight requests did not finish in time, dropping them"
            );
            server.abort();
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully");
        },
        () = terminate => {
            info!("Received SIGTERM, shutting down gracefully");
        },
    }
}
