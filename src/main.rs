//! Replays a scripted toggle session against the engagement API.

use std::{env, path::PathBuf, sync::Arc};

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use engagement_sync::{
    config::SyncConfig,
    engine::{ToggleCoordinator, ViewScope},
    remote::http::{HttpRemoteSync, RemoteConfig},
    replay::ReplayScript,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let script_path = env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .context("usage: engagement-sync <script.json>")?;
    let script = ReplayScript::load(&script_path)?;

    let config = SyncConfig::load();
    let remote_config = RemoteConfig::from_env().context("configuring engagement API")?;
    let authenticated = remote_config.token.is_some();
    let remote = HttpRemoteSync::new(remote_config).context("building engagement API client")?;

    let coordinator = ToggleCoordinator::new(Arc::new(remote), config);
    coordinator.set_authenticated(authenticated);
    if !authenticated {
        warn!("ENGAGEMENT_API_TOKEN not set; toggles will be ignored");
    }

    let mut scope = ViewScope::new(coordinator, script.context.clone());
    tokio::select! {
        summary = script.play(&mut scope) => {
            info!(
                applied = summary.toggles_applied,
                ignored = summary.toggles_ignored,
                settled = summary.flushed.settled,
                rolled_back = summary.flushed.rolled_back,
                "replay finished"
            );
        }
        _ = shutdown_signal() => {
            warn!("interrupted; flushing pending engagements");
        }
    }

    let report = scope.on_unmount().await;
    info!(
        settled = report.settled,
        rolled_back = report.rolled_back,
        "view unmounted"
    );

    Ok(())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,engagement_sync=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
