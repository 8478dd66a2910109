//! fleet-control - Delivery Robot Control Plane
//!
//! HTTP control plane orchestrating a fleet of autonomous delivery
//! robots against a FIWARE-style world model.
//!
//! # Usage
//!
//! ```bash
//! ORION_ENDPOINT=http://orion:1026 \
//! FIWARE_SERVICE=delivery \
//! DELIVERY_ROBOT_SERVICEPATH=/robot \
//! DELIVERY_ROBOT_TYPE=delivery_robot \
//! DELIVERY_ROBOT_LIST='["robot_01","robot_02"]' \
//! ID_TABLE='{"robot_01":"ui_01","robot_02":"ui_02"}' \
//! ROBOT_UI_SERVICEPATH=/ui ROBOT_UI_TYPE=robot_ui \
//! TOKEN_SERVICEPATH=/token TOKEN_TYPE=token \
//! cargo run --release
//! ```
//!
//! # Environment Variables
//!
//! See `Config::from_env` for the full list; `LISTEN_PORT`, `TIMEZONE`,
//! `LOG_LEVEL` and the throttle/poll intervals all have defaults.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use fleet_control::{create_app, Config, RobotOrchestrator, ThrottleStore, WorldModelClient};

#[derive(Parser, Debug)]
#[command(name = "fleet-control")]
#[command(about = "Delivery robot fleet control plane")]
#[command(version)]
struct CliArgs {
    /// Override the listen port (default: LISTEN_PORT env or 3000)
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging. LOG_LEVEL mirrors the deployment manifests;
    // RUST_LOG still wins when set.
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| {
            tracing_subscriber::EnvFilter::try_new(
                std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            )
        })
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let args = CliArgs::parse();
    let mut config = Config::from_env().context("can not load configuration")?;
    if let Some(port) = args.port {
        config.listen_port = port;
    }
    let config = Arc::new(config);

    info!("starting fleet-control");
    info!(
        "fleet: {:?}, world model: {}",
        config.robot_list, config.orion_endpoint
    );

    let throttle = ThrottleStore::open(
        &config.throttle_db_path,
        config.notification_throttling_msec,
    )
    .context("can not open throttle store")?;
    throttle
        .init_fleet(&config.robot_list)
        .context("can not seed throttle records")?;

    let store = Arc::new(WorldModelClient::new(
        &config.orion_endpoint,
        config.orion_token.as_deref(),
    )?);

    let orchestrator = Arc::new(RobotOrchestrator::new(config.clone(), store, throttle));
    let app = create_app(orchestrator);

    let addr = format!("0.0.0.0:{}", config.listen_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("can not bind {addr}"))?;
    info!("listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("received Ctrl+C, shutting down");
        })
        .await
        .context("server error")?;

    info!("fleet-control shutdown complete");
    Ok(())
}
