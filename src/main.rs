//! Doorman - Matrix puppeting bridge for Messenger-style chat networks
//!
//! One worker thread polls the remote messenger; a current-thread
//! tokio runtime owns all Matrix I/O. The two meet in the
//! cross-runtime bridge and the outbound channel, nowhere else.

mod bridge;
mod common;
mod config;
mod directory;
mod identity;
mod matrix;
mod messenger;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};

use bridge::commands::CommandHandler;
use bridge::{ChannelBundle, CrossRuntimeBridge, MessageRouter, NamespaceMatcher, Orchestrator};
use config::env::get_config_path;
use config::load_and_validate;
use directory::{LocalDirectory, RemoteDirectory};
use identity::{IdScheme, IdentityResolver, IdentityStore};
use matrix::{ensure_protocol_room, forward_to_room, InviteAcceptor, MatrixDirectory, RoomLogger};
use messenger::{MessengerDirectory, MessengerListener, MessengerSession};

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Doorman v{} starting...", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_path = get_config_path();
    info!("Loading configuration from {}...", config_path);

    let config = load_and_validate(&config_path).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        error!(
            "Please ensure {} exists and is properly formatted.",
            config_path
        );
        e
    })?;

    info!("Configuration loaded successfully");
    info!("  Matrix homeserver: {}", config.matrix.base_url);
    info!("  Matrix domain: {}", config.matrix.domain);
    info!("  Linked user: {}", config.linked_user_id());
    info!("  Messenger account: {}", config.messenger.owner_id);

    let scheme = IdScheme::new(
        config.prefix(),
        &config.messenger.owner_id,
        &config.matrix.domain,
    );
    let linked_user = config.linked_user_id();

    // ============================================================
    // Channels and directories
    // ============================================================
    let channels = ChannelBundle::new();
    let intake = channels.intake.clone();

    let local: Arc<dyn LocalDirectory> = Arc::new(MatrixDirectory::new(
        &config.matrix.base_url,
        &config.matrix.as_token,
    )?);
    let remote: Arc<dyn RemoteDirectory> = Arc::new(MessengerDirectory::new(
        &config.messenger.base_url,
        &config.messenger.session_token,
        intake.outbound_tx.clone(),
    )?);

    let store = Arc::new(IdentityStore::new());
    let resolver = Arc::new(IdentityResolver::new(
        store.clone(),
        remote.clone(),
        local.clone(),
        scheme.clone(),
        linked_user.clone(),
    ));

    // Namespace patterns: config wins, otherwise derived from the scheme.
    let (default_users, default_aliases) =
        NamespaceMatcher::default_patterns(&scheme, &linked_user);
    let (users, aliases) = match &config.namespaces {
        Some(ns) => (
            ns.users.clone().unwrap_or(default_users),
            ns.aliases.clone().unwrap_or(default_aliases),
        ),
        None => (default_users, default_aliases),
    };
    let namespaces = Arc::new(NamespaceMatcher::new(users, aliases));

    let router = Arc::new(MessageRouter::new(
        resolver,
        local.clone(),
        remote.clone(),
        namespaces.clone(),
        linked_user.clone(),
    ));
    let acceptor = InviteAcceptor::new(local.clone(), namespaces, scheme.bot_user_id());

    // ============================================================
    // The event loop: a current-thread runtime driven by this thread.
    // Captured thread id is what lets the cross-runtime bridge detect
    // re-entrant calls.
    // ============================================================
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build event loop runtime")?;
    let loop_thread = thread::current().id();

    let mut cross = CrossRuntimeBridge::new(
        runtime.handle().clone(),
        loop_thread,
        channels.worker.shutdown_rx.clone(),
    );
    if let Some(secs) = config.bridge.as_ref().and_then(|b| b.call_timeout_secs) {
        cross = cross.with_default_timeout(Duration::from_secs(secs));
    }
    let cross = Arc::new(cross);

    // ============================================================
    // Remote worker thread
    // ============================================================
    let session = MessengerSession::new(
        &config.messenger.base_url,
        &config.messenger.session_token,
        config.messenger.poll_timeout_secs.map(Duration::from_secs),
    )?;
    let listener = MessengerListener::new(
        Box::new(session),
        cross.clone(),
        router.clone(),
        channels.worker.outbound_rx,
        channels.worker.shutdown_rx,
    );
    let worker = thread::spawn(move || listener.run());

    // ============================================================
    // Run the loop
    // ============================================================
    let shutdown_tx = channels.control.shutdown_tx;
    let loop_channels = channels.loop_side;
    let room_logger = RoomLogger::new(intake.proto_tx.clone());
    let protocol_room_enabled = config.protocol_room_enabled();

    runtime.block_on(async move {
        // The appservice HTTP transport hands inbound Matrix events in
        // through this sender; keep it alive for the process lifetime.
        let _local_intake = intake.local_tx.clone();

        // Protocol room + forwarder, before anything else worth logging
        // happens.
        let protocol_room_id = if protocol_room_enabled {
            match ensure_protocol_room(&local, &scheme, &linked_user).await {
                Ok(room_id) => Some(room_id),
                Err(err) => {
                    warn!(
                        error = %err,
                        "protocol room unavailable; continuing without it"
                    );
                    None
                }
            }
        } else {
            None
        };

        let proto_rx = loop_channels.proto_rx;
        let forwarder = protocol_room_id.as_ref().map(|room_id| {
            tokio::spawn(forward_to_room(local.clone(), room_id.clone(), proto_rx))
        });

        let commands = protocol_room_id
            .as_ref()
            .map(|room_id| CommandHandler::new(local.clone(), store.clone(), room_id.clone()));
        let orchestrator = Orchestrator::new(
            router,
            acceptor,
            commands,
            protocol_room_id,
            linked_user.clone(),
        );
        let orchestrate = tokio::spawn(
            orchestrator.run(loop_channels.local_rx, loop_channels.shutdown_rx.clone()),
        );

        room_logger.post("Ready!");
        info!("Ready!");

        shutdown_signal().await;
        info!("Shutdown signal received - stopping...");
        if shutdown_tx.send(true).is_err() {
            warn!("shutdown channel closed before signal");
        }

        match tokio::time::timeout(Duration::from_secs(5), orchestrate).await {
            Ok(Ok(())) => info!("orchestrator stopped cleanly"),
            Ok(Err(err)) => warn!("orchestrator task panicked: {}", err),
            Err(_) => warn!("orchestrator stop timed out"),
        }
        if let Some(forwarder) = forwarder {
            forwarder.abort();
        }
    });

    // The worker notices shutdown between polls; a long poll in flight
    // bounds how long this join can take.
    info!("Waiting for remote listener to stop...");
    if worker.join().is_err() {
        warn!("remote listener thread panicked");
    }

    info!("Exiting...");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
