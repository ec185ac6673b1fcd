//! Process runtime: starts the gateway and background loops and stops them
//! when the shutdown signal fires.

use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

use super::bootstrap::{build, Services};
use crate::error::Result;
use crate::infrastructure::config::settings::Config;

/// Run until `shutdown` flips to true.
pub async fn run(config: Config, shutdown: watch::Receiver<bool>) -> Result<()> {
    let services = build(&config)?;
    let listener = TcpListener::bind(&config.server.listen_addr).await?;
    run_with_listener(services, listener, shutdown).await
}

/// Run prebuilt services on an already bound listener.
pub async fn run_with_listener(
    services: Services,
    listener: TcpListener,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let gateway = tokio::spawn(
        services
            .gateway
            .clone()
            .serve(listener, shutdown.clone()),
    );

    services.scanner.start_all().await?;
    let dispatcher = services.dispatcher.clone().start();
    let restore = services.restore.clone().start();
    info!("Harbormaster running");

    while !*shutdown.borrow() {
        if shutdown.changed().await.is_err() {
            break;
        }
    }
    info!("Shutting down");

    dispatcher.shutdown().await;
    restore.shutdown().await;
    services.scanner.shutdown().await;
    match gateway.await {
        Ok(result) => result?,
        Err(e) => warn!(error = %e, "Gateway task ended abnormally"),
    }

    info!(sessions = services.registry.len(), "Harbormaster stopped");
    Ok(())
}
