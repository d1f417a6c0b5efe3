//! dubline-worker — the process that owns a `StageDispatcher` and drives
//! tasks through `extract_audio -> asr -> translate -> tts* -> mux_video`.
//!
//! Reads configuration (file + `DUBLINE_*` env overlay, see
//! `dubline_config::load`), builds the object-store, message-bus, segment
//! store, and provider handles once at startup, then runs a configurable
//! number of concurrent dispatcher loops against the same queue binding
//! until SIGTERM/SIGINT or Ctrl-C is observed.

use clap::Parser;
use dubline_config::Settings;
use dubline_pipeline::context::HandlerContext;
use dubline_pipeline::dispatcher::StageDispatcher;
use dubline_pipeline::retry::RetryConfig;
use dubline_segments::{PgSegmentStore, PgTaskStore};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "dubline-worker", about = "Video-dubbing pipeline worker")]
struct Args {
    /// Path to a TOML/YAML/JSON config file. Env vars (`DUBLINE_*`) always
    /// take precedence over file values.
    #[arg(long, env = "DUBLINE_CONFIG_FILE")]
    config: Option<String>,

    /// Number of concurrent dispatcher loops to run in this process.
    #[arg(long, env = "DUBLINE_WORKER_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("dubline=info".parse()?))
        .init();

    let args = Args::parse();
    let settings: Settings = dubline_config::load(args.config.as_deref())?;
    settings.validate()?;

    tracing::info!(
        storage_backend = ?settings.storage.backend,
        asr_backend = ?settings.asr.backend,
        tts_backend = ?settings.tts.backend,
        concurrency = args.concurrency,
        "dubline-worker starting"
    );

    let storage = dubline_storage::build(&settings.storage).await?;
    let bus = Arc::new(dubline_bus::AmqpBus::connect(&settings.bus.url, settings.bus.prefetch).await?);
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(settings.database.max_connections)
        .connect(&settings.database.url)
        .await?;
    sqlx::migrate!("../dubline-segments/migrations").run(&pool).await?;

    let segments: Arc<dyn dubline_segments::SegmentStore> = Arc::new(PgSegmentStore::from_pool(pool.clone()));
    let tasks: Arc<dyn dubline_segments::TaskStore> = Arc::new(PgTaskStore::from_pool(pool));
    let asr = Arc::new(dubline_providers::asr::build(&settings.asr));
    let tts = Arc::new(dubline_providers::tts::build(&settings.tts));
    let translation = Arc::new(dubline_providers::HttpTranslationProvider::new(settings.translation.clone()));

    let cancel = CancellationToken::new();
    spawn_shutdown_listener(cancel.clone());

    let ctx = Arc::new(HandlerContext {
        storage,
        bus: bus as Arc<dyn dubline_bus::MessageBus>,
        segments,
        tasks,
        asr,
        tts,
        translation,
        ffmpeg_path: settings.ffmpeg_path.clone(),
        cancel,
    });

    let mut handles = Vec::with_capacity(args.concurrency);
    for worker_id in 0..args.concurrency.max(1) {
        let dispatcher = StageDispatcher::new(ctx.clone(), RetryConfig::default());
        handles.push(tokio::spawn(async move {
            if let Err(e) = dispatcher.run().await {
                tracing::error!(worker_id, error = %e, "dispatcher loop exited with error");
            }
        }));
    }

    for handle in handles {
        let _ = handle.await;
    }

    tracing::info!("dubline-worker shut down cleanly");
    Ok(())
}

/// Cancels every dispatcher loop on SIGTERM (containers) or Ctrl-C (local
/// runs), letting in-flight handlers finish their current suspension point
/// before the delivery is requeued (§5 cancellation semantics).
fn spawn_shutdown_listener(cancel: CancellationToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!(error = %e, "failed to install SIGTERM handler");
                    return;
                }
            };
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }
        tracing::info!("shutdown signal received, cancelling dispatcher loops");
        cancel.cancel();
    });
}
