//! waypointd — Waypoint session registry daemon.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use waypoint_core::config::WaypointConfig;
use waypoint_services::{
    CountryResolver, FixedResolver, GeoDbResolver, ProbeSettings, Prober, RelayDirectory,
    SessionRegistry, SessionSettings, SessionValidator,
};

mod store;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = WaypointConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = WaypointConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        WaypointConfig::default()
    });

    // Session store
    let store = Arc::new(
        store::SqliteStore::open(&config.database.path)
            .context("failed to open session database")?,
    );
    tracing::info!(path = %config.database.path.display(), "session database ready");

    // Country resolution
    let country: Arc<dyn CountryResolver> = if config.geoip.database_path.as_os_str().is_empty() {
        tracing::warn!("no geoip database configured — country resolution disabled");
        Arc::new(FixedResolver::empty())
    } else {
        let resolver = GeoDbResolver::open(&config.geoip.database_path)
            .context("failed to open geoip database")?;
        tracing::info!(path = %config.geoip.database_path.display(), "geoip database loaded");
        Arc::new(resolver)
    };

    // Blacklists
    let validator = Arc::new(
        SessionValidator::new(&config.blacklist.strings, &config.blacklist.ips)
            .context("failed to compile blacklists")?,
    );
    tracing::info!(
        string_rules = config.blacklist.strings.len(),
        ip_rules = config.blacklist.ips.len(),
        "blacklists compiled"
    );

    // Relay directory
    let relays = Arc::new(RelayDirectory::with_timeout(
        config.relays.clone(),
        Duration::from_secs(config.session.relay_timeout_secs),
    ));
    if !config.relays.is_empty() {
        tracing::info!(count = config.relays.len(), "relay handles configured");
    }

    let prober = Prober::new(ProbeSettings {
        connect_timeout: Duration::from_secs(config.session.probe_connect_timeout_secs),
        read_timeout: Duration::from_secs(config.session.probe_read_timeout_secs),
    });

    let registry = Arc::new(SessionRegistry::new(
        store,
        country,
        validator,
        relays,
        prober,
        SessionSettings {
            deadline_secs: config.session.deadline_secs,
            rate_limit_secs: config.session.rate_limit_secs,
        },
    ));

    // ── Shutdown channel ─────────────────────────────────────────────────────
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
            let _ = shutdown.send(());
        });
    }

    // ── Spawn tasks ──────────────────────────────────────────────────────────

    let purge_task = {
        let registry = registry.clone();
        let every = Duration::from_secs(config.session.purge_interval_secs);
        tokio::spawn(purge_loop(registry, every))
    };

    let api_task = {
        let state = waypoint_api::ApiState {
            registry: registry.clone(),
        };
        let bind_addr = config.server.bind_addr.clone();
        let port = config.server.api_port;
        tokio::spawn(async move {
            if let Err(e) = waypoint_api::serve(state, &bind_addr, port).await {
                tracing::error!(error = %e, "API server failed");
            }
        })
    };

    // ── Wait for exit ────────────────────────────────────────────────────────

    let mut shutdown_rx = shutdown_tx.subscribe();

    tokio::select! {
        _ = shutdown_rx.recv() => tracing::info!("shutting down"),
        r = purge_task          => tracing::error!("purge task exited: {:?}", r),
        r = api_task            => tracing::error!("API server exited: {:?}", r),
    }

    Ok(())
}

/// Remove stale sessions on a fixed cadence.
///
/// Runs forever — cancel by dropping the task handle. A failed purge is
/// logged and retried on the next tick; it never takes the loop down.
async fn purge_loop(registry: Arc<SessionRegistry>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        match registry.purge_old().await {
            Ok(0) => {}
            Ok(removed) => tracing::debug!(removed, "purged stale sessions"),
            Err(e) => tracing::warn!(error = %e, "session purge failed"),
        }
    }
}
