// SPDX-FileCopyrightText: 2026 Prospect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `prospect serve` command implementation.
//!
//! Opens storage, then runs the dispatcher, the outbox relay and (when
//! enabled) the HTTP gateway until SIGINT or SIGTERM. On shutdown each task
//! gets `dispatch.shutdown_grace_secs` to finish its in-flight work.

use std::sync::Arc;
use std::time::Duration;

use prospect_config::ProspectConfig;
use prospect_core::ProspectError;
use prospect_dispatch::{DispatchSettings, Dispatcher};
use prospect_gateway::{AuthConfig, GatewayState, HealthState, ServerConfig};
use prospect_queue::{LoggingOutboxHandler, OutboxRelay};
use prospect_webhook::WebhookProvider;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::app::App;

/// Runs the `prospect serve` command.
pub async fn run_serve(config: ProspectConfig) -> Result<(), ProspectError> {
    init_tracing(&config.service.log_level);
    info!(service = config.service.name.as_str(), "starting prospect serve");

    if config.gateway.enabled && config.gateway.bearer_token.is_none() {
        return Err(ProspectError::Config(
            "gateway enabled but no gateway.bearer_token configured".to_string(),
        ));
    }

    let provider = Arc::new(WebhookProvider::from_config(&config.provider).inspect_err(|e| {
        error!(error = %e, "failed to initialize send provider");
    })?);

    let app = App::open(config).await?;

    let prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>> =
        match prospect_prometheus::PrometheusAdapter::new() {
            Ok(adapter) => {
                info!("prometheus metrics enabled");
                let handle = adapter.handle().clone();
                Some(Arc::new(move || handle.render()) as Arc<dyn Fn() -> String + Send + Sync>)
            }
            Err(e) => {
                warn!(error = %e, "prometheus initialization failed, continuing without metrics");
                None
            }
        };

    let cancel = install_signal_handler();
    let mut tasks: Vec<(&'static str, JoinHandle<Result<(), ProspectError>>)> = Vec::new();

    let mut dispatcher = Dispatcher::new(
        app.queue.clone(),
        app.control.clone(),
        provider,
        DispatchSettings::from_config(&app.config.dispatch, &app.config.queue),
    );
    if let Some(signer) = &app.unsubscribe {
        dispatcher = dispatcher.with_unsubscribe(Arc::clone(signer));
    }
    {
        let cancel = cancel.clone();
        tasks.push((
            "dispatcher",
            tokio::spawn(async move { dispatcher.run(cancel).await }),
        ));
    }

    let relay = OutboxRelay::new(
        app.db.clone(),
        Arc::new(LoggingOutboxHandler),
        &app.config.outbox,
    );
    {
        let cancel = cancel.clone();
        tasks.push((
            "outbox relay",
            tokio::spawn(async move { relay.run(cancel).await }),
        ));
    }

    if app.config.gateway.enabled {
        let state = GatewayState {
            control: app.control.clone(),
            analytics: app.analytics.clone(),
            contacts: app.sync.clone(),
            auth: AuthConfig {
                bearer_token: app.config.gateway.bearer_token.clone(),
                default_admin_id: app.config.service.admin_id.clone(),
            },
            health: HealthState {
                start_time: std::time::Instant::now(),
                prometheus_render,
            },
        };
        let server = ServerConfig {
            host: app.config.gateway.host.clone(),
            port: app.config.gateway.port,
        };
        let cancel = cancel.clone();
        tasks.push((
            "gateway",
            tokio::spawn(async move { prospect_gateway::start_server(&server, state, cancel).await }),
        ));
    } else {
        debug!("gateway disabled by configuration");
    }

    cancel.cancelled().await;
    let grace = Duration::from_secs(app.config.dispatch.shutdown_grace_secs);
    info!(grace_secs = grace.as_secs(), "draining background tasks");
    drain_tasks(tasks, grace).await;

    if let Err(e) = app.close().await {
        warn!(error = %e, "storage checkpoint on shutdown failed");
    }
    info!("prospect serve shutdown complete");
    Ok(())
}

/// Waits for each task, aborting whatever is still running after `grace`.
async fn drain_tasks(
    tasks: Vec<(&'static str, JoinHandle<Result<(), ProspectError>>)>,
    grace: Duration,
) {
    let deadline = tokio::time::Instant::now() + grace;
    for (name, mut handle) in tasks {
        match tokio::time::timeout_at(deadline, &mut handle).await {
            Ok(Ok(Ok(()))) => debug!(task = name, "task stopped"),
            Ok(Ok(Err(e))) => error!(task = name, error = %e, "task exited with error"),
            Ok(Err(e)) => error!(task = name, error = %e, "task panicked"),
            Err(_) => {
                warn!(task = name, "grace period elapsed, aborting task");
                handle.abort();
            }
        }
    }
}

/// Installs handlers for SIGTERM and SIGINT.
///
/// Returns a [`CancellationToken`] that is cancelled when either signal is received.
pub fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => {
                            info!("received SIGINT (Ctrl+C), initiating shutdown");
                        }
                        _ = sigterm.recv() => {
                            info!("received SIGTERM, initiating shutdown");
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "cannot install SIGTERM handler, listening for Ctrl+C only");
                    let _ = ctrl_c.await;
                    info!("received SIGINT (Ctrl+C), initiating shutdown");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("received Ctrl+C, initiating shutdown");
        }

        token_clone.cancel();
        debug!("shutdown signal handler completed");
    });

    token
}

/// Initializes the tracing subscriber with the given log level.
pub fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("prospect={log_level},warn")));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn install_signal_handler_returns_token() {
        let token = install_signal_handler();
        assert!(!token.is_cancelled());
        token.cancel();
    }

    #[tokio::test]
    async fn drain_aborts_tasks_past_grace() {
        let stuck: JoinHandle<Result<(), ProspectError>> = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        });
        let done: JoinHandle<Result<(), ProspectError>> = tokio::spawn(async { Ok(()) });
        let started = std::time::Instant::now();
        drain_tasks(vec![("done", done), ("stuck", stuck)], Duration::from_millis(50)).await;
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn gateway_without_token_refuses_to_start() {
        let mut config = ProspectConfig::default();
        config.gateway.enabled = true;
        config.gateway.bearer_token = None;
        let err = run_serve(config).await.unwrap_err();
        assert!(matches!(err, ProspectError::Config(_)));
    }

    #[tokio::test]
    async fn serve_requires_a_webhook_url() {
        let mut config = ProspectConfig::default();
        config.gateway.enabled = false;
        let err = run_serve(config).await.unwrap_err();
        assert!(matches!(err, ProspectError::Config(_)));
    }
}
