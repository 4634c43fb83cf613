//! Drives one headless run and translates its events to the line protocol.

use std::io::Write;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use t7md_media::{ProgressEvent, ProgressReporter, RenderEngine, RunSummary};
use t7md_ml_client::{HttpDepthEstimator, HttpDetector, MlClient};
use t7md_models::{ConfigStore, SharedConfig};

use crate::cli::HeadlessArgs;
use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::protocol::ProtocolWriter;

/// Resolve the config tree: `--config`, then `T7MD_CONFIG`, then the
/// per-user default location.
pub fn load_config(args: &HeadlessArgs, worker: &WorkerConfig) -> WorkerResult<ConfigStore> {
    let store = match args.config.as_ref().or(worker.config_path.as_ref()) {
        Some(path) => ConfigStore::load(path)?,
        None => ConfigStore::load_default()?,
    };
    Ok(store)
}

/// Build the engine for one run against the recognition service.
pub fn build_engine(args: &HeadlessArgs, worker: &WorkerConfig, config: SharedConfig) -> WorkerResult<RenderEngine> {
    let mut ml = worker.ml.clone();
    if let Some(url) = &args.ml_url {
        ml = ml.with_base_url(url.clone());
    }
    let client = Arc::new(MlClient::new(ml)?);
    info!(ml_url = %client.base_url(), "Using recognition service");

    let use_depth = config.snapshot().models.use_depth;
    let mut engine = RenderEngine::new(config, Arc::new(HttpDetector::new(client.clone())));
    if use_depth {
        engine = engine.with_depth_estimator(Arc::new(HttpDepthEstimator::new(client)));
    }
    Ok(engine)
}

/// Process `args.input` to completion, writing the protocol to `out`.
///
/// Ctrl-C stops the run; the partial metadata log is still flushed.
pub async fn run_headless<W: Write>(
    args: &HeadlessArgs,
    worker: &WorkerConfig,
    protocol: &mut ProtocolWriter<W>,
) -> WorkerResult<RunSummary> {
    let config = SharedConfig::new(load_config(args, worker)?);
    args.apply_overrides(&config)?;
    let engine = build_engine(args, worker, config)?;

    let (tx, rx) = mpsc::channel(worker.progress_capacity);
    let handle = engine.spawn(args.input.clone(), ProgressReporter::new(tx));

    let controller = handle.controller();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping run");
            controller.stop();
        }
    });

    let forwarded = forward_events(rx, protocol).await;
    interrupt.abort();
    if forwarded.is_err() {
        // Nobody is listening any more.
        handle.stop();
    }

    let joined = handle.join().await;
    finish(forwarded?, joined, protocol)
}

/// Copy run events to `protocol` until the engine drops its sender.
/// Returns the terminal event, if one arrived.
pub async fn forward_events<W: Write>(
    mut rx: mpsc::Receiver<ProgressEvent>,
    protocol: &mut ProtocolWriter<W>,
) -> WorkerResult<Option<ProgressEvent>> {
    let mut terminal = None;
    while let Some(event) = rx.recv().await {
        match &event {
            ProgressEvent::Frame { percent, .. } => protocol.progress(*percent)?,
            ProgressEvent::Completed(summary) => {
                protocol.progress(100)?;
                protocol.success(&summary.metadata_path)?;
            }
            ProgressEvent::Stopped(summary) => protocol.error(&stopped_message(summary))?,
            ProgressEvent::Failed { error } => protocol.error(error)?,
            ProgressEvent::Started { .. } | ProgressEvent::Paused | ProgressEvent::Resumed => {}
        }
        if event.is_terminal() {
            terminal = Some(event);
        }
    }
    Ok(terminal)
}

fn stopped_message(summary: &RunSummary) -> String {
    format!(
        "stopped after {} frames, partial log at {}",
        summary.frames_processed,
        summary.metadata_path.display()
    )
}

fn finish<W: Write>(
    terminal: Option<ProgressEvent>,
    joined: t7md_media::MediaResult<RunSummary>,
    protocol: &mut ProtocolWriter<W>,
) -> WorkerResult<RunSummary> {
    match joined {
        Ok(summary) if summary.stopped_early => {
            if terminal.is_none() {
                protocol.error(&stopped_message(&summary))?;
            }
            Err(WorkerError::Interrupted)
        }
        Ok(summary) => {
            if terminal.is_none() {
                protocol.success(&summary.metadata_path)?;
            }
            Ok(summary)
        }
        Err(e) => {
            if terminal.is_none() {
                protocol.error(&e.to_string())?;
            }
            Err(e.into())
        }
    }
}
