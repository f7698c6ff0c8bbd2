//! Main Entrypoint for the Call Bridge
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Initializing logging.
//! 3. Wiring the orchestrator, authorizer, and call initiator together.
//! 4. Starting the webhook listener and handling graceful shutdown.

use anyhow::Context;
use callbridge::{
    audio::{AudioCapabilities, AudioTransport},
    authorize::RealtimeAuthorizer,
    config::Config,
    orchestrator::{Orchestrator, RealtimeStreamLauncher},
    router::create_router,
    sip::{CallInitiator, CallOutcome, LoopbackBackend, TransportHint, sip_target},
    state::AppState,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Listens for `Ctrl+C` and fires the process-wide cancellation signal.
async fn shutdown_signal(cancel: CancellationToken) {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Received shutdown signal. Shutting down gracefully...");
    cancel.cancel();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing bridge...");
    let config = Arc::new(config);

    // --- 3. Process-wide cancellation ---
    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    // --- 4. Orchestrator ---
    let (notify_tx, notify_rx) = mpsc::channel(32);
    let app_state = Arc::new(AppState {
        notifications: notify_tx,
    });

    let authorizer = Arc::new(RealtimeAuthorizer::new(&config)?);
    let launcher = Arc::new(RealtimeStreamLauncher::new(config.clone()));
    let orchestrator = Arc::new(Orchestrator::new(authorizer, launcher, cancel.clone()));
    let orchestrator_task = tokio::spawn(orchestrator.run(notify_rx));

    // --- 5. Outbound call ---
    // Runs independently of webhook handling: the remote signals readiness
    // out of band, so neither path waits for the other. The in-flight call
    // is not force-terminated on shutdown; process exit tears it down.
    let target = sip_target(&config.project_id, &config.sip_domain, TransportHint::Tls);
    let (device_end, call_end) = AudioTransport::pair(AudioCapabilities::default());
    let initiator = CallInitiator::new(Arc::new(LoopbackBackend), config.dial_timeout);
    tokio::spawn(async move {
        match initiator
            .place_call(&target, TransportHint::Tls, call_end)
            .await
        {
            CallOutcome::Connected => info!("outbound call established"),
            CallOutcome::Failed(reason) => warn!(%reason, "outbound call failed"),
        }
    });
    // Local render/capture hardware is out of scope; drain the device end so
    // the media path never backs up.
    tokio::spawn(async move {
        let mut device_end = device_end;
        while let Some(frame) = device_end.recv().await {
            debug!(bytes = frame.len(), "audio frame at device end");
        }
    });

    // --- 6. Start Webhook Listener ---
    let app = create_router(app_state);
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;
    info!(
        bind_address = %config.bind_address,
        sip_domain = %config.sip_domain,
        model = %config.model,
        "Bridge configured. Starting webhook listener..."
    );

    let serve_cancel = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { serve_cancel.cancelled().await })
        .await?;

    // The orchestrator joins every stream session before returning.
    orchestrator_task
        .await
        .context("Orchestrator task failed")?;

    info!("Bridge has shut down.");
    Ok(())
}
