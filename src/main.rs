//! Unloader demo - loading / success / failure states in the terminal
//!
//! # Overview
//!
//! This binary drives the library end to end and logs what a UI would draw. It initializes:
//! - Configuration loading ([`ConfigManager`], `Unloader Data/Unloader.yaml` + `UNLOADER_*`)
//! - Logging infrastructure (file rotation + console output)
//! - Tokio async runtime (auto-hide timers, renderer tasks, async actions)
//! - Three [`LoadingManager`]s fanned into one [`GlobalStateAggregator`]
//!
//! # Execution Flow
//!
//! 1. Load configuration, then initialize logging from its `logging` section
//! 2. Create tokio runtime with 2 worker threads
//! 3. Attach a [`TracingRenderer`] to each manager and to the aggregator
//! 4. "sync" succeeds; "upload" runs a flaky action through `Action::retry` and succeeds late
//! 5. "report" exhausts its retries and shows a failure with Retry and Close controls
//! 6. Wait for auto-hide, log metrics, shut down

use anyhow::Result;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use unloader::action::{Action, ActionValue};
use unloader::models::{DebugOptions, NetworkError};
use unloader::ui::{RenderBridge, TracingRenderer, close_action};
use unloader::{
    APP_NAME, ConfigManager, GlobalStateAggregator, LoadingManager, LoadingManagerSettings,
    Metrics, VERSION,
};

fn main() -> Result<()> {
    let config_manager = ConfigManager::new("Unloader Data")?;
    let config = config_manager.load_layered()?;

    let _guard = unloader::logging::setup_logging_from_config(&config.logging)?;
    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(2)
        .thread_name("unloader-worker")
        .build()?;

    let settings = LoadingManagerSettings::from(config.loading_manager);
    let result = runtime.block_on(run(settings, config.debug));

    runtime.shutdown_timeout(Duration::from_secs(5));
    tracing::info!("Demo finished");

    result
}

async fn run(settings: LoadingManagerSettings, debug: DebugOptions) -> Result<()> {
    let metrics = Arc::new(Metrics::new());
    let manager = |name: &str| {
        tracing::info!("Creating manager '{}'", name);
        LoadingManager::builder()
            .settings(settings)
            .metrics(Arc::clone(&metrics))
            .build()
    };

    let sync = manager("sync");
    let upload = manager("upload");
    let report = manager("report");

    let overlay = GlobalStateAggregator::with_metrics(Arc::clone(&metrics));
    overlay.subscribe([&sync, &upload, &report]);

    let bridge = RenderBridge::new(tokio::runtime::Handle::current(), Arc::clone(&metrics));
    let renderers = vec![
        bridge.attach_manager(&sync, TracingRenderer::new("sync", debug)),
        bridge.attach_manager(&upload, TracingRenderer::new("upload", debug)),
        bridge.attach_manager(&report, TracingRenderer::new("report", debug)),
        bridge.attach_aggregator(&overlay, TracingRenderer::new("overlay", debug)),
    ];

    sync.show_loading();
    tokio::time::sleep(Duration::from_millis(100)).await;
    sync.show_success("3 items synced");

    upload.show_loading();
    tracing::info!("Overlay blocking: {}", overlay.is_loading());

    match flaky_upload(2).retry(3).run().await {
        Ok(value) => {
            let attempt = value.attempt_count().unwrap_or_default();
            let files = value.downcast_ref::<String>()?;
            upload.show_success(format!("{} (attempt {})", files, attempt));
        }
        Err(error) => {
            upload.show_failure(error.into_error(), None);
        }
    }

    report.show_loading();
    if let Err(error) = flaky_upload(u32::MAX).retry(1).run().await {
        tracing::warn!("Report gave up: {}", error);
        let weak = report.downgrade();
        let retry = Action::from_fn(move || {
            if let Some(report) = weak.upgrade() {
                report.show_loading();
            }
        });
        report.show_failure(error.into_error(), Some(retry));
        tracing::info!("Close control wired to action {}", close_action(&report).id());
    }

    tracing::info!("Overlay state: {}", overlay.state());

    tokio::time::sleep(settings.auto_hide_delay + Duration::from_millis(100)).await;
    tracing::info!(
        "After auto-hide: sync={}, upload={}, report={}, overlay={}",
        sync.state(),
        upload.state(),
        report.state(),
        overlay.state()
    );

    for renderer in renderers {
        renderer.detach();
    }
    metrics.log_summary();
    Ok(())
}

/// An upload that fails until it has been called more than `failures` times.
fn flaky_upload(failures: u32) -> Action {
    let calls = Arc::new(AtomicU32::new(0));
    Action::from_async(move || {
        let calls = Arc::clone(&calls);
        async move {
            let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(Duration::from_millis(50)).await;
            if call <= failures {
                tracing::debug!("Upload call {} failed", call);
                Err(anyhow::Error::from(NetworkError::NoResponse))
            } else {
                Ok(ActionValue::new(format!("{} files uploaded", call)))
            }
        }
    })
}
