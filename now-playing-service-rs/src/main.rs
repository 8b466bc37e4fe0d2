use std::env;

use anyhow::Context;
use now_playing_service::{
    app_state::AppState,
    config::Config,
    cycle::Coordinator,
    http,
    logging::init_logger,
    registry::Registry,
    snapshot::SnapshotStore,
};
use serde_json::json;
use tokio::sync::watch;

async fn wait_for_shutdown(mut receiver: watch::Receiver<bool>) {
    let _ = receiver.wait_for(|stop| *stop).await;
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let logger = init_logger("now-playing-service-rs");

    let config = Config::load().context("failed to load configuration")?;
    let command = env::args().nth(1);

    if matches!(command.as_deref(), Some("check-config")) {
        logger.info(
            "config.check_passed",
            serde_json::to_value(&config).unwrap_or_else(|_| json!({ "status": "ok" })),
        );
        return Ok(());
    }

    let registry = Registry::load(config.stations_file.as_deref(), &config.logo_base_url)
        .context("failed to load station registry")?;
    let initial = SnapshotStore::new(&config.snapshot_path).load().await;
    let state = AppState::new(initial.clone()).context("failed to encode stored snapshot")?;

    logger.info(
        "server.initialized",
        json!({
            "port": config.port,
            "stations": registry.len(),
            "storedStations": initial.len(),
            "notifier": if config.notifier.is_some() { "smtp" } else { "log" },
            "renderer": config.index_html_path.is_some(),
        }),
    );

    let mut coordinator = Coordinator::from_config(&config, registry, state.clone(), initial)
        .context("failed to initialize aggregation cycle")?;

    if matches!(command.as_deref(), Some("once")) {
        let summary = coordinator.run_once().await?;
        logger.info("once.completed", &summary);
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        http::shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let mut server = tokio::spawn(http::serve(
        state,
        config.port,
        wait_for_shutdown(shutdown_rx.clone()),
    ));
    tokio::select! {
        _ = coordinator.run_forever(wait_for_shutdown(shutdown_rx)) => {}
        result = &mut server => {
            return result
                .context("http server task panicked")?
                .context("http server failed");
        }
    }

    server
        .await
        .context("http server task panicked")?
        .context("http server failed")
}
