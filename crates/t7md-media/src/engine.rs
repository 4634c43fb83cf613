//! Output orchestrator.
//!
//! A run is one dedicated tokio task driving a strictly sequential loop:
//! decode, detect, render, write, then the next frame. CPU-heavy rendering
//! and PNG/JPEG encoding run on the blocking pool so the runtime stays
//! responsive to control requests.
//!
//! Control goes through [`RunHandle`]. Pause and stop are flags the loop
//! reads once per iteration, so a stop always lands on a frame boundary
//! and every artifact written so far is closed cleanly.

use image::RgbImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use t7md_models::{
    Category, Detection, DetectorFlags, FrameRecord, FrameResult, OutputProfile, RenderConfig,
    RunMetadata, RunStats, SharedConfig, VideoMeta,
};

use crate::depth::{DepthEstimator, DepthStage};
use crate::detector::{DetectionRequest, Detector};
use crate::error::{MediaError, MediaResult};
use crate::hud::{HudCompositor, LayerKind};
use crate::output::{MetadataWriter, OutputLayout};
use crate::progress::{ProgressEvent, ProgressReporter, RunState, RunSummary};
use crate::sink::{FfmpegSinkFactory, FrameSink, SinkFactory, StreamSpec};
use crate::source::{FfmpegSource, FrameSource};

/// Sleep between pause-flag checks.
pub const PAUSE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Decode errors in a row after which the stream is treated as ended.
pub const MAX_CONSECUTIVE_DECODE_ERRORS: u32 = 8;

#[derive(Debug)]
struct RunControl {
    stop: watch::Sender<bool>,
    pause: watch::Sender<bool>,
    state: watch::Sender<RunState>,
}

impl RunControl {
    fn new() -> Arc<Self> {
        let (stop, _) = watch::channel(false);
        let (pause, _) = watch::channel(false);
        let (state, _) = watch::channel(RunState::Idle);
        Arc::new(Self { stop, pause, state })
    }

    fn stop_requested(&self) -> bool {
        *self.stop.borrow()
    }

    fn pause_requested(&self) -> bool {
        *self.pause.borrow()
    }

    fn set_state(&self, state: RunState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(from = %previous, to = %state, "Run state changed");
        }
    }
}

/// Cloneable control surface of a run.
#[derive(Debug, Clone)]
pub struct RunController {
    control: Arc<RunControl>,
}

impl RunController {
    pub fn pause(&self) {
        self.control.pause.send_replace(true);
    }

    pub fn resume(&self) {
        self.control.pause.send_replace(false);
    }

    /// Flip the pause flag and return the new value.
    pub fn toggle_pause(&self) -> bool {
        let mut paused = false;
        self.control.pause.send_modify(|p| {
            *p = !*p;
            paused = *p;
        });
        paused
    }

    /// Request a stop at the next frame boundary. Also releases a pause.
    pub fn stop(&self) {
        self.control.stop.send_replace(true);
    }

    pub fn state(&self) -> RunState {
        *self.control.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<RunState> {
        self.control.state.subscribe()
    }
}

/// Handle to a spawned run.
#[derive(Debug)]
pub struct RunHandle {
    controller: RunController,
    task: JoinHandle<MediaResult<RunSummary>>,
}

impl RunHandle {
    pub fn controller(&self) -> RunController {
        self.controller.clone()
    }

    pub fn pause(&self) {
        self.controller.pause();
    }

    pub fn resume(&self) {
        self.controller.resume();
    }

    pub fn toggle_pause(&self) -> bool {
        self.controller.toggle_pause()
    }

    pub fn stop(&self) {
        self.controller.stop();
    }

    pub fn state(&self) -> RunState {
        self.controller.state()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<RunState> {
        self.controller.subscribe_state()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the run to end.
    pub async fn join(self) -> MediaResult<RunSummary> {
        self.task
            .await
            .map_err(|e| MediaError::internal(format!("Run task failed: {}", e)))?
    }
}

/// Drives runs against a shared configuration and a set of collaborators.
#[derive(Clone)]
pub struct RenderEngine {
    config: SharedConfig,
    detector: Arc<dyn Detector>,
    depth: Option<Arc<dyn DepthEstimator>>,
    sinks: Arc<dyn SinkFactory>,
}

impl RenderEngine {
    pub fn new(config: SharedConfig, detector: Arc<dyn Detector>) -> Self {
        Self {
            config,
            detector,
            depth: None,
            sinks: Arc::new(FfmpegSinkFactory),
        }
    }

    pub fn with_depth_estimator(mut self, estimator: Arc<dyn DepthEstimator>) -> Self {
        self.depth = Some(estimator);
        self
    }

    pub fn with_sink_factory(mut self, sinks: Arc<dyn SinkFactory>) -> Self {
        self.sinks = sinks;
        self
    }

    pub fn config(&self) -> &SharedConfig {
        &self.config
    }

    /// Decode `source_path` with FFmpeg and process it on a new task.
    pub fn spawn(&self, source_path: impl Into<PathBuf>, reporter: ProgressReporter) -> RunHandle {
        let source_path = source_path.into();
        let engine = self.clone();
        self.spawn_task(move |control| async move {
            control.set_state(RunState::Running);
            let source = match FfmpegSource::open(&source_path).await {
                Ok(source) => source,
                Err(e) => return report_failure(e, &control, &reporter).await,
            };
            engine
                .run(Box::new(source), &source_path, &control, &reporter)
                .await
        })
    }

    /// Process frames from an already opened source on a new task.
    /// `source_path` names the run and its output directory.
    pub fn spawn_with_source(
        &self,
        source: Box<dyn FrameSource>,
        source_path: impl Into<PathBuf>,
        reporter: ProgressReporter,
    ) -> RunHandle {
        let source_path = source_path.into();
        let engine = self.clone();
        self.spawn_task(move |control| async move {
            control.set_state(RunState::Running);
            engine.run(source, &source_path, &control, &reporter).await
        })
    }

    fn spawn_task<F, Fut>(&self, body: F) -> RunHandle
    where
        F: FnOnce(Arc<RunControl>) -> Fut,
        Fut: std::future::Future<Output = MediaResult<RunSummary>> + Send + 'static,
    {
        let control = RunControl::new();
        let task = tokio::spawn(body(control.clone()));
        RunHandle {
            controller: RunController { control },
            task,
        }
    }

    async fn run(
        &self,
        mut source: Box<dyn FrameSource>,
        source_path: &Path,
        control: &RunControl,
        reporter: &ProgressReporter,
    ) -> MediaResult<RunSummary> {
        let meta = *source.meta();
        let source_name = source.name().to_string();
        let mut run = match self.setup(meta, &source_name, source_path).await {
            Ok(run) => run,
            Err(e) => return report_failure(e, control, reporter).await,
        };

        info!(
            source = %source_path.display(),
            output_dir = %run.layout.run_dir().display(),
            profile = %run.profile,
            total_frames = run.meta.total_frames,
            "Run started"
        );
        reporter
            .emit(ProgressEvent::Started {
                total_frames: run.meta.total_frames,
                fps: run.meta.effective_fps(),
                output_dir: run.layout.run_dir().to_path_buf(),
            })
            .await;

        let stopped_early = match run.drive(source.as_mut(), control, reporter).await {
            Ok(stopped_early) => stopped_early,
            Err(e) => {
                run.abort().await;
                return report_failure(e, control, reporter).await;
            }
        };

        match run.finish(stopped_early).await {
            Ok(summary) => {
                info!(
                    frames_processed = summary.frames_processed,
                    frames_dropped = summary.frames_dropped,
                    stopped_early,
                    "Run finished"
                );
                if stopped_early {
                    control.set_state(RunState::Stopped);
                    reporter.emit(ProgressEvent::Stopped(summary.clone())).await;
                } else {
                    control.set_state(RunState::Completed);
                    reporter.emit(ProgressEvent::Completed(summary.clone())).await;
                }
                Ok(summary)
            }
            Err(e) => report_failure(e, control, reporter).await,
        }
    }

    /// Resolve paths, create directories and open every writer. Nothing is
    /// decoded before this succeeds.
    async fn setup(
        &self,
        meta: VideoMeta,
        source_name: &str,
        source_path: &Path,
    ) -> MediaResult<ActiveRun> {
        let config = self.config.snapshot();
        let profile = config.output.effective_profile();
        if meta.width == 0 || meta.height == 0 {
            return Err(MediaError::InvalidVideo(format!(
                "{} reports a {}x{} frame",
                source_name,
                meta.width,
                meta.height
            )));
        }

        let layout = OutputLayout::resolve(source_path, &config.output)?;
        let save_crops = config.output.save_crops;
        let layer_dirs = layout.prepare(profile, save_crops).await?;

        let spec = StreamSpec {
            width: meta.width,
            height: meta.height,
            fps: meta.effective_fps(),
            codec: config.output.codec,
        };

        let mut videos = Vec::new();
        let primary = if profile.writes_video() {
            let path = layout.render_path();
            let sink = self.open_sink(&path, &spec).await?;
            videos.push(path);
            Some(sink)
        } else {
            None
        };

        let depth = match self.init_depth(&config, profile, &meta).await {
            Some(stage) => {
                let path = layout.depth_path();
                let sink = self.open_sink(&path, &spec).await?;
                videos.push(path);
                Some((stage, sink))
            }
            None => None,
        };

        let flags = DetectorFlags {
            faces: config.models.use_faces,
            persons: config.models.use_persons,
            objects: config.models.use_objects,
            depth: depth.is_some(),
        };
        let metadata = MetadataWriter::new(
            layout.metadata_path(),
            RunMetadata::new(
                source_path.display().to_string(),
                &meta,
                profile,
                config.output.codec,
                flags,
            ),
        );

        Ok(ActiveRun {
            config: self.config.clone(),
            detector: self.detector.clone(),
            compositor: HudCompositor::new(&config.style),
            layout,
            profile,
            save_crops,
            meta,
            primary,
            depth,
            metadata,
            artifacts: videos.into_iter().chain(layer_dirs).collect(),
            processed: 0,
            dropped: 0,
        })
    }

    async fn open_sink(&self, path: &Path, spec: &StreamSpec) -> MediaResult<Box<dyn FrameSink>> {
        self.sinks.open(path, spec).await.map_err(|e| match e {
            MediaError::OutputSetup { .. } => e,
            other => MediaError::output_setup(path, other.to_string()),
        })
    }

    async fn init_depth(
        &self,
        config: &RenderConfig,
        profile: OutputProfile,
        meta: &VideoMeta,
    ) -> Option<DepthStage> {
        if !config.models.use_depth {
            return None;
        }
        if !profile.writes_video() {
            debug!("Depth stream skipped: profile {} writes no video", profile);
            return None;
        }
        let Some(estimator) = self.depth.clone() else {
            warn!("Depth requested but no depth estimator is configured");
            return None;
        };
        DepthStage::try_init(estimator, config.depth.alpha as f32, meta.width, meta.height).await
    }
}

async fn report_failure(
    error: MediaError,
    control: &RunControl,
    reporter: &ProgressReporter,
) -> MediaResult<RunSummary> {
    error!("Run failed: {}", error);
    control.set_state(RunState::Failed);
    reporter
        .emit(ProgressEvent::Failed {
            error: error.to_string(),
        })
        .await;
    Err(error)
}

/// Detections for one frame. A detector failure yields none.
async fn detect(
    detector: &dyn Detector,
    frame: &RgbImage,
    config: &RenderConfig,
    frame_index: u64,
) -> Vec<Detection> {
    let request = DetectionRequest::from(&config.models);
    if request.is_empty() {
        return Vec::new();
    }

    match detector.detect(frame, &request).await {
        Ok(raw) => raw.into_detections(&config.models.thresholds()),
        Err(e) => {
            warn!(
                frame_index,
                detector = detector.name(),
                "Detection failed, frame left undecorated: {}",
                e
            );
            Vec::new()
        }
    }
}

/// Everything one frame's blocking render step needs.
struct FrameJob {
    compositor: HudCompositor,
    layout: OutputLayout,
    profile: OutputProfile,
    save_crops: bool,
    meta: VideoMeta,
    config: RenderConfig,
    frame: RgbImage,
    result: FrameResult,
}

struct RenderedFrame {
    /// Un-annotated source, handed back for the depth stage
    source: RgbImage,
    annotated: Option<RgbImage>,
}

impl FrameJob {
    fn render(self) -> MediaResult<RenderedFrame> {
        let FrameJob {
            compositor,
            layout,
            profile,
            save_crops,
            meta,
            config,
            frame,
            result,
        } = self;
        let index = result.frame_index;

        let annotated = profile
            .writes_video()
            .then(|| compositor.composite(&frame, &result, &meta, &config));

        if profile.writes_layers() {
            compositor
                .render_layer(&frame, &result, &meta, &config, LayerKind::Bbox)
                .save(layout.bbox_frame(index))?;
            compositor
                .render_layer(&frame, &result, &meta, &config, LayerKind::Hud)
                .save(layout.hud_frame(index))?;

            if save_crops {
                let faces: Vec<_> = result
                    .of_category(Category::Face)
                    .filter_map(|d| {
                        d.bbox
                            .clamp_to(frame.width(), frame.height())
                            .map(|rect| (rect, d.confidence))
                    })
                    .collect();
                layout.save_face_crops(&frame, index, &faces)?;
            }
        }

        Ok(RenderedFrame {
            source: frame,
            annotated,
        })
    }
}

/// State of a run between setup and finalization.
struct ActiveRun {
    config: SharedConfig,
    detector: Arc<dyn Detector>,
    compositor: HudCompositor,
    layout: OutputLayout,
    profile: OutputProfile,
    save_crops: bool,
    meta: VideoMeta,
    primary: Option<Box<dyn FrameSink>>,
    depth: Option<(DepthStage, Box<dyn FrameSink>)>,
    metadata: MetadataWriter,
    artifacts: Vec<PathBuf>,
    processed: u64,
    dropped: u64,
}

impl ActiveRun {
    /// Frame loop. Returns whether a stop request ended it.
    async fn drive(
        &mut self,
        source: &mut dyn FrameSource,
        control: &RunControl,
        reporter: &ProgressReporter,
    ) -> MediaResult<bool> {
        let mut consecutive_errors = 0u32;

        loop {
            if control.stop_requested() {
                info!(frames_processed = self.processed, "Stop requested");
                return Ok(true);
            }

            if control.pause_requested() {
                control.set_state(RunState::Paused);
                reporter.emit(ProgressEvent::Paused).await;
                info!(frame_index = self.processed, "Run paused");

                while control.pause_requested() && !control.stop_requested() {
                    tokio::time::sleep(PAUSE_POLL_INTERVAL).await;
                }
                if control.stop_requested() {
                    info!(frames_processed = self.processed, "Stop requested while paused");
                    return Ok(true);
                }

                control.set_state(RunState::Running);
                reporter.emit(ProgressEvent::Resumed).await;
                info!(frame_index = self.processed, "Run resumed");
            }

            let decoded = match source.next_frame().await {
                Ok(Some(frame)) if frame.dimensions() != (self.meta.width, self.meta.height) => {
                    Err(MediaError::decode_failed(format!(
                        "frame is {}x{}, stream is {}x{}",
                        frame.width(),
                        frame.height(),
                        self.meta.width,
                        self.meta.height
                    )))
                }
                other => other,
            };
            let frame = match decoded {
                Ok(Some(frame)) => {
                    consecutive_errors = 0;
                    frame
                }
                Ok(None) => {
                    debug!(frames_processed = self.processed, "End of stream");
                    return Ok(false);
                }
                Err(e) => {
                    self.dropped += 1;
                    consecutive_errors += 1;
                    warn!(
                        after_frame = self.processed,
                        consecutive = consecutive_errors,
                        "Dropped undecodable frame: {}",
                        e
                    );
                    if consecutive_errors > MAX_CONSECUTIVE_DECODE_ERRORS {
                        warn!("Too many consecutive decode errors, ending stream");
                        return Ok(false);
                    }
                    continue;
                }
            };

            let frame_index = self.processed;
            self.process_frame(frame).await?;

            reporter.frame(ProgressEvent::Frame {
                percent: self.meta.percent(self.processed),
                frame_index,
                total_frames: self.meta.total_frames,
                fps: self.meta.effective_fps(),
            });
        }
    }

    async fn process_frame(&mut self, frame: RgbImage) -> MediaResult<()> {
        let frame_index = self.processed;

        // Read once; live edits apply from the next frame on.
        let config = self.config.snapshot();
        self.compositor.refresh_font(&config.style);

        let detections = detect(self.detector.as_ref(), &frame, &config, frame_index).await;
        let result = FrameResult::new(frame_index, detections);
        self.metadata
            .push(FrameRecord::from_result(&result, &self.meta));

        let job = FrameJob {
            compositor: self.compositor.clone(),
            layout: self.layout.clone(),
            profile: self.profile,
            save_crops: self.save_crops,
            meta: self.meta,
            config,
            frame,
            result,
        };
        let rendered = tokio::task::spawn_blocking(move || job.render())
            .await
            .map_err(|e| MediaError::internal(format!("Render task failed: {}", e)))??;

        if let (Some(sink), Some(annotated)) = (self.primary.as_mut(), rendered.annotated.as_ref()) {
            sink.write_frame(annotated).await?;
        }
        if let Some((stage, sink)) = self.depth.as_mut() {
            let depth = stage.process(&rendered.source, frame_index).await;
            sink.write_frame(&depth).await?;
        }

        self.processed += 1;
        debug!(frame_index, "Frame processed");
        Ok(())
    }

    fn stats(&self, stopped_early: bool) -> RunStats {
        RunStats {
            frames_processed: self.processed,
            frames_dropped: self.dropped,
            stopped_early,
        }
    }

    async fn close_sinks(&mut self) -> MediaResult<()> {
        if let Some(mut sink) = self.primary.take() {
            sink.finish().await?;
        }
        if let Some((stage, mut sink)) = self.depth.take() {
            if stage.failures() > 0 {
                warn!(failures = stage.failures(), "Depth stream reused stale maps");
            }
            sink.finish().await?;
        }
        Ok(())
    }

    /// Close writers and flush the metadata log.
    async fn finish(mut self, stopped_early: bool) -> MediaResult<RunSummary> {
        self.close_sinks().await?;
        self.metadata.flush(Some(self.stats(stopped_early))).await?;

        let metadata_path = self.metadata.path().to_path_buf();
        let mut artifacts = std::mem::take(&mut self.artifacts);
        artifacts.push(metadata_path.clone());

        Ok(RunSummary {
            output_dir: self.layout.run_dir().to_path_buf(),
            metadata_path,
            artifacts,
            frames_processed: self.processed,
            frames_dropped: self.dropped,
            stopped_early,
        })
    }

    /// Best-effort cleanup after a mid-run failure: keep whatever was
    /// produced readable.
    async fn abort(&mut self) {
        if let Err(e) = self.close_sinks().await {
            warn!("Failed to close writers after error: {}", e);
        }
        let stats = self.stats(true);
        if let Err(e) = self.metadata.flush(Some(stats)).await {
            warn!("Failed to write partial metadata log: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::PROGRESS_CHANNEL_CAPACITY;
    use async_trait::async_trait;
    use image::{GrayImage, Luma, Rgb};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;
    use t7md_models::{MetadataLog, RawDetection, RawDetections};
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    const W: u32 = 64;
    const H: u32 = 36;

    /// Generates `frames` solid frames; reads listed in `errors_at` fail.
    struct MemorySource {
        meta: VideoMeta,
        frames: u64,
        produced: u64,
        reads: u64,
        errors_at: HashSet<u64>,
        odd_size_at: HashSet<u64>,
    }

    impl MemorySource {
        fn new(frames: u64) -> Self {
            Self {
                meta: VideoMeta::new(W, H, 30.0, frames),
                frames,
                produced: 0,
                reads: 0,
                errors_at: HashSet::new(),
                odd_size_at: HashSet::new(),
            }
        }

        fn failing_reads(mut self, reads: impl IntoIterator<Item = u64>) -> Self {
            self.errors_at = reads.into_iter().collect();
            self
        }

        /// Reads listed in `reads` yield a frame two pixels too wide.
        fn odd_sized_reads(mut self, reads: impl IntoIterator<Item = u64>) -> Self {
            self.odd_size_at = reads.into_iter().collect();
            self
        }
    }

    #[async_trait]
    impl FrameSource for MemorySource {
        fn meta(&self) -> &VideoMeta {
            &self.meta
        }

        async fn next_frame(&mut self) -> MediaResult<Option<RgbImage>> {
            let read = self.reads;
            self.reads += 1;
            if self.errors_at.contains(&read) {
                return Err(MediaError::decode_failed(format!("corrupt packet at read {}", read)));
            }
            if self.produced >= self.frames {
                return Ok(None);
            }
            if self.odd_size_at.contains(&read) {
                return Ok(Some(RgbImage::new(W + 2, H)));
            }
            self.produced += 1;
            Ok(Some(RgbImage::from_pixel(W, H, Rgb([40, 80, 120]))))
        }

        fn name(&self) -> &str {
            "memory"
        }
    }

    /// One face and one person per frame; fails on the listed calls.
    #[derive(Default)]
    struct ScriptedDetector {
        calls: AtomicU64,
        fail_on: HashSet<u64>,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl Detector for ScriptedDetector {
        async fn detect(&self, _frame: &RgbImage, request: &DetectionRequest) -> MediaResult<RawDetections> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_on.contains(&call) {
                return Err(MediaError::detection_failed("model crashed"));
            }
            let mut raw = RawDetections::default();
            if request.faces {
                raw.faces.push(RawDetection::new([4.0, 4.0, 20.0, 20.0], "face", 0.91));
            }
            if request.persons {
                raw.persons.push(RawDetection::new([2.0, 2.0, 40.0, 34.0], "person", 0.8));
            }
            Ok(raw)
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    struct FlatDepth;

    #[async_trait]
    impl DepthEstimator for FlatDepth {
        async fn ready(&self) -> MediaResult<()> {
            Ok(())
        }

        async fn estimate(&self, _frame: &RgbImage) -> MediaResult<GrayImage> {
            Ok(GrayImage::from_pixel(W / 2, H / 2, Luma([200])))
        }

        fn name(&self) -> &'static str {
            "flat"
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    struct StreamRecord {
        path: PathBuf,
        frames: u64,
        finished: bool,
    }

    /// Sink factory keeping frame counts in memory.
    #[derive(Default)]
    struct RecordingSinks {
        streams: Arc<Mutex<Vec<StreamRecord>>>,
        fail_open: bool,
    }

    impl RecordingSinks {
        fn streams(&self) -> Vec<StreamRecord> {
            self.streams.lock().unwrap().clone()
        }
    }

    struct RecordingSink {
        slot: usize,
        path: PathBuf,
        streams: Arc<Mutex<Vec<StreamRecord>>>,
    }

    #[async_trait]
    impl FrameSink for RecordingSink {
        async fn write_frame(&mut self, frame: &RgbImage) -> MediaResult<()> {
            assert_eq!(frame.dimensions(), (W, H));
            self.streams.lock().unwrap()[self.slot].frames += 1;
            Ok(())
        }

        async fn finish(&mut self) -> MediaResult<()> {
            self.streams.lock().unwrap()[self.slot].finished = true;
            Ok(())
        }

        fn path(&self) -> &Path {
            &self.path
        }
    }

    #[async_trait]
    impl SinkFactory for RecordingSinks {
        async fn open(&self, path: &Path, _spec: &StreamSpec) -> MediaResult<Box<dyn FrameSink>> {
            if self.fail_open {
                return Err(MediaError::ffmpeg_failed("encoder missing", None, None));
            }
            let mut streams = self.streams.lock().unwrap();
            streams.push(StreamRecord {
                path: path.to_path_buf(),
                frames: 0,
                finished: false,
            });
            Ok(Box::new(RecordingSink {
                slot: streams.len() - 1,
                path: path.to_path_buf(),
                streams: self.streams.clone(),
            }))
        }
    }

    fn shared_config(dir: &TempDir, profile: &str) -> SharedConfig {
        let config = SharedConfig::default();
        config
            .set("output.output_dir", dir.path().display().to_string())
            .unwrap();
        config.set("output.custom_filename", "run").unwrap();
        config.set("output.profile", profile).unwrap();
        config
    }

    fn engine(config: SharedConfig, detector: ScriptedDetector, sinks: Arc<RecordingSinks>) -> RenderEngine {
        RenderEngine::new(config, Arc::new(detector)).with_sink_factory(sinks)
    }

    fn reporter() -> (ProgressReporter, mpsc::Receiver<ProgressEvent>) {
        let (tx, rx) = mpsc::channel(PROGRESS_CHANNEL_CAPACITY);
        (ProgressReporter::new(tx), rx)
    }

    async fn drain(mut rx: mpsc::Receiver<ProgressEvent>) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    fn read_log(path: &Path) -> MetadataLog {
        serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
    }

    fn file_count(dir: &Path) -> usize {
        std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }

    #[tokio::test]
    async fn test_final_render_run() {
        let dir = TempDir::new().unwrap();
        let sinks = Arc::new(RecordingSinks::default());
        let engine = engine(shared_config(&dir, "Final Render"), ScriptedDetector::default(), sinks.clone());
        let (reporter, rx) = reporter();

        let handle = engine.spawn_with_source(Box::new(MemorySource::new(5)), "/videos/clip.mp4", reporter);
        let summary = handle.join().await.unwrap();
        let events = drain(rx).await;

        let run_dir = dir.path().join("run");
        assert_eq!(summary.output_dir, run_dir);
        assert_eq!(summary.frames_processed, 5);
        assert!(!summary.stopped_early);
        assert_eq!(
            sinks.streams(),
            vec![StreamRecord {
                path: run_dir.join("render_final.mp4"),
                frames: 5,
                finished: true,
            }]
        );
        assert!(!run_dir.join("seq_bbox").exists());
        assert!(!run_dir.join("crops_faces").exists());

        let log = read_log(&summary.metadata_path);
        assert_eq!(log.frames.len(), 5);
        assert!(log.is_contiguous());
        assert_eq!(log.frames[0].detections.len(), 2);
        assert_eq!(log.metadata.source, "/videos/clip.mp4");
        assert_eq!(log.metadata.profile, OutputProfile::FinalRender);

        assert!(matches!(events.first(), Some(ProgressEvent::Started { total_frames: 5, .. })));
        let frames: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::Frame { frame_index, percent, .. } => Some((*frame_index, *percent)),
                _ => None,
            })
            .collect();
        assert_eq!(frames, vec![(0, 20), (1, 40), (2, 60), (3, 80), (4, 100)]);
        assert!(matches!(events.last(), Some(ProgressEvent::Completed(s)) if s.frames_processed == 5));
    }

    #[tokio::test]
    async fn test_compositing_sequences_share_indices() {
        let dir = TempDir::new().unwrap();
        let sinks = Arc::new(RecordingSinks::default());
        let engine = engine(shared_config(&dir, "Compositing"), ScriptedDetector::default(), sinks.clone());

        let handle = engine.spawn_with_source(
            Box::new(MemorySource::new(3)),
            "/videos/clip.mp4",
            ProgressReporter::disabled(),
        );
        let summary = handle.join().await.unwrap();
        let run_dir = summary.output_dir.clone();

        assert_eq!(sinks.streams().len(), 1);
        for i in 0..3u64 {
            assert!(run_dir.join(format!("seq_bbox/bbox_{:05}.png", i)).is_file());
            assert!(run_dir.join(format!("seq_hud/hud_{:05}.png", i)).is_file());
            assert!(run_dir.join(format!("crops_faces/face_{:05}_91.jpg", i)).is_file());
        }
        assert_eq!(file_count(&run_dir.join("seq_bbox")), 3);
        assert_eq!(file_count(&run_dir.join("seq_hud")), 3);
        assert_eq!(file_count(&run_dir.join("crops_faces")), 3);

        let layer = image::open(run_dir.join("seq_bbox/bbox_00000.png")).unwrap();
        assert_eq!((layer.width(), layer.height()), (W, H));
        assert!(summary.artifacts.contains(&run_dir.join("seq_hud")));
        assert_eq!(read_log(&summary.metadata_path).frames.len(), 3);
    }

    #[tokio::test]
    async fn test_compositing_without_crops() {
        let dir = TempDir::new().unwrap();
        let config = shared_config(&dir, "Compositing");
        config.set("output.save_crops", false).unwrap();
        let engine = engine(config, ScriptedDetector::default(), Arc::new(RecordingSinks::default()));

        let summary = engine
            .spawn_with_source(Box::new(MemorySource::new(2)), "/v/a.mp4", ProgressReporter::disabled())
            .join()
            .await
            .unwrap();
        assert!(!summary.output_dir.join("crops_faces").exists());
        assert_eq!(file_count(&summary.output_dir.join("seq_bbox")), 2);
    }

    #[tokio::test]
    async fn test_json_only_writes_metadata_only() {
        let dir = TempDir::new().unwrap();
        let sinks = Arc::new(RecordingSinks::default());
        let config = shared_config(&dir, "JSON Only");
        config.set("models.use_depth", true).unwrap();
        let engine = engine(config, ScriptedDetector::default(), sinks.clone())
            .with_depth_estimator(Arc::new(FlatDepth));

        let summary = engine
            .spawn_with_source(Box::new(MemorySource::new(4)), "/v/a.mp4", ProgressReporter::disabled())
            .join()
            .await
            .unwrap();

        assert!(sinks.streams().is_empty());
        assert_eq!(summary.artifacts, vec![summary.metadata_path.clone()]);
        assert_eq!(file_count(&summary.output_dir), 1);
        let log = read_log(&summary.metadata_path);
        assert_eq!(log.frames.len(), 4);
        assert!(!log.metadata.detectors.depth);
    }

    #[tokio::test]
    async fn test_skip_video_forces_json_only() {
        let dir = TempDir::new().unwrap();
        let sinks = Arc::new(RecordingSinks::default());
        let config = shared_config(&dir, "Compositing");
        config.set("output.skip_video", true).unwrap();

        let summary = engine(config, ScriptedDetector::default(), sinks.clone())
            .spawn_with_source(Box::new(MemorySource::new(2)), "/v/a.mp4", ProgressReporter::disabled())
            .join()
            .await
            .unwrap();
        assert!(sinks.streams().is_empty());
        assert_eq!(read_log(&summary.metadata_path).metadata.profile, OutputProfile::JsonOnly);
    }

    #[tokio::test]
    async fn test_detector_failure_keeps_frame() {
        let dir = TempDir::new().unwrap();
        let sinks = Arc::new(RecordingSinks::default());
        let detector = ScriptedDetector {
            fail_on: [1].into_iter().collect(),
            ..Default::default()
        };

        let summary = engine(shared_config(&dir, "Compositing"), detector, sinks.clone())
            .spawn_with_source(Box::new(MemorySource::new(3)), "/v/a.mp4", ProgressReporter::disabled())
            .join()
            .await
            .unwrap();

        let log = read_log(&summary.metadata_path);
        assert!(log.is_contiguous());
        assert!(log.frames[1].detections.is_empty());
        assert_eq!(log.frames[2].detections.len(), 2);
        assert_eq!(sinks.streams()[0].frames, 3);
        assert!(summary.output_dir.join("seq_bbox/bbox_00001.png").is_file());
        assert!(!summary.output_dir.join("crops_faces/face_00001_91.jpg").exists());
    }

    #[tokio::test]
    async fn test_thresholds_filter_detections() {
        let dir = TempDir::new().unwrap();
        let config = shared_config(&dir, "JSON Only");
        config.set("models.face_confidence", 0.95).unwrap();

        let summary = engine(config, ScriptedDetector::default(), Arc::new(RecordingSinks::default()))
            .spawn_with_source(Box::new(MemorySource::new(1)), "/v/a.mp4", ProgressReporter::disabled())
            .join()
            .await
            .unwrap();

        let log = read_log(&summary.metadata_path);
        assert_eq!(log.frames[0].detections.len(), 1);
        assert_eq!(log.frames[0].detections[0].category, Category::Person);
    }

    #[tokio::test]
    async fn test_decode_errors_are_skipped() {
        let dir = TempDir::new().unwrap();
        let source = MemorySource::new(4).failing_reads([1, 2]);

        let summary = engine(shared_config(&dir, "JSON Only"), ScriptedDetector::default(), Arc::new(RecordingSinks::default()))
            .spawn_with_source(Box::new(source), "/v/a.mp4", ProgressReporter::disabled())
            .join()
            .await
            .unwrap();

        assert_eq!(summary.frames_processed, 4);
        assert_eq!(summary.frames_dropped, 2);
        let log = read_log(&summary.metadata_path);
        assert!(log.is_contiguous());
        assert_eq!(log.summary.unwrap().frames_dropped, 2);
    }

    #[tokio::test]
    async fn test_wrong_size_frame_is_dropped() {
        let dir = TempDir::new().unwrap();
        let sinks = Arc::new(RecordingSinks::default());
        let source = MemorySource::new(5).odd_sized_reads([1]);

        let summary = engine(shared_config(&dir, "Final Render"), ScriptedDetector::default(), sinks.clone())
            .spawn_with_source(Box::new(source), "/v/a.mp4", ProgressReporter::disabled())
            .join()
            .await
            .unwrap();

        assert_eq!(summary.frames_processed, 5);
        assert_eq!(summary.frames_dropped, 1);
        assert_eq!(sinks.streams()[0].frames, 5);
        let log = read_log(&summary.metadata_path);
        assert_eq!(log.frames.len(), 5);
        assert!(log.is_contiguous());
    }

    #[tokio::test]
    async fn test_too_many_decode_errors_end_stream() {
        let dir = TempDir::new().unwrap();
        let source = MemorySource::new(10).failing_reads(2..2 + u64::from(MAX_CONSECUTIVE_DECODE_ERRORS) + 1);

        let summary = engine(shared_config(&dir, "JSON Only"), ScriptedDetector::default(), Arc::new(RecordingSinks::default()))
            .spawn_with_source(Box::new(source), "/v/a.mp4", ProgressReporter::disabled())
            .join()
            .await
            .unwrap();

        assert_eq!(summary.frames_processed, 2);
        assert_eq!(summary.frames_dropped, u64::from(MAX_CONSECUTIVE_DECODE_ERRORS) + 1);
        assert!(!summary.stopped_early);
    }

    #[tokio::test]
    async fn test_depth_stream_matches_primary() {
        let dir = TempDir::new().unwrap();
        let sinks = Arc::new(RecordingSinks::default());
        let config = shared_config(&dir, "Final Render");
        config.set("models.use_depth", true).unwrap();

        let summary = engine(config, ScriptedDetector::default(), sinks.clone())
            .with_depth_estimator(Arc::new(FlatDepth))
            .spawn_with_source(Box::new(MemorySource::new(6)), "/v/a.mp4", ProgressReporter::disabled())
            .join()
            .await
            .unwrap();

        let streams = sinks.streams();
        assert_eq!(streams.len(), 2);
        assert_eq!(streams[1].path, summary.output_dir.join("depth_map.mp4"));
        assert_eq!(streams[0].frames, 6);
        assert_eq!(streams[1].frames, 6);
        assert!(streams.iter().all(|s| s.finished));
        assert!(read_log(&summary.metadata_path).metadata.detectors.depth);
    }

    #[tokio::test]
    async fn test_stop_mid_run() {
        let dir = TempDir::new().unwrap();
        let sinks = Arc::new(RecordingSinks::default());
        let detector = ScriptedDetector {
            delay: Some(Duration::from_millis(2)),
            ..Default::default()
        };
        let total = 10_000;
        let (reporter, mut rx) = reporter();

        let handle = engine(shared_config(&dir, "Final Render"), detector, sinks.clone())
            .spawn_with_source(Box::new(MemorySource::new(total)), "/v/a.mp4", reporter);

        let mut terminal = None;
        while let Some(event) = rx.recv().await {
            match event {
                ProgressEvent::Frame { frame_index: 2, .. } => handle.stop(),
                event if event.is_terminal() => terminal = Some(event),
                _ => {}
            }
        }

        assert_eq!(handle.state(), RunState::Stopped);
        let summary = handle.join().await.unwrap();
        assert!(summary.stopped_early);
        assert!(summary.frames_processed >= 3 && summary.frames_processed < total);
        assert!(matches!(terminal, Some(ProgressEvent::Stopped(_))));

        let log = read_log(&summary.metadata_path);
        assert!(log.is_contiguous());
        assert_eq!(log.frames.len() as u64, summary.frames_processed);
        assert!(log.summary.unwrap().stopped_early);
        let stream = &sinks.streams()[0];
        assert!(stream.finished);
        assert_eq!(stream.frames, summary.frames_processed);
    }

    #[tokio::test]
    async fn test_pause_and_resume() {
        let dir = TempDir::new().unwrap();
        let (reporter, rx) = reporter();
        let handle = engine(shared_config(&dir, "JSON Only"), ScriptedDetector::default(), Arc::new(RecordingSinks::default()))
            .spawn_with_source(Box::new(MemorySource::new(3)), "/v/a.mp4", reporter);

        handle.pause();
        let mut state = handle.subscribe_state();
        state.wait_for(|s| *s == RunState::Paused).await.unwrap();
        assert!(!handle.is_finished());

        assert!(!handle.toggle_pause());
        let summary = handle.join().await.unwrap();
        assert_eq!(summary.frames_processed, 3);

        let events = drain(rx).await;
        let paused = events.iter().position(|e| *e == ProgressEvent::Paused).unwrap();
        let resumed = events.iter().position(|e| *e == ProgressEvent::Resumed).unwrap();
        let first_frame = events
            .iter()
            .position(|e| matches!(e, ProgressEvent::Frame { .. }))
            .unwrap();
        assert!(paused < resumed && resumed < first_frame);
    }

    #[tokio::test]
    async fn test_stop_releases_pause() {
        let dir = TempDir::new().unwrap();
        let handle = engine(shared_config(&dir, "JSON Only"), ScriptedDetector::default(), Arc::new(RecordingSinks::default()))
            .spawn_with_source(Box::new(MemorySource::new(3)), "/v/a.mp4", ProgressReporter::disabled());

        handle.pause();
        handle
            .subscribe_state()
            .wait_for(|s| *s == RunState::Paused)
            .await
            .unwrap();
        handle.stop();

        let summary = handle.join().await.unwrap();
        assert!(summary.stopped_early);
        assert_eq!(summary.frames_processed, 0);
        assert!(summary.metadata_path.is_file());
    }

    #[tokio::test]
    async fn test_writer_failure_is_fatal_before_decoding() {
        let dir = TempDir::new().unwrap();
        let sinks = Arc::new(RecordingSinks {
            fail_open: true,
            ..Default::default()
        });
        let (reporter, rx) = reporter();

        let handle = engine(shared_config(&dir, "Final Render"), ScriptedDetector::default(), sinks)
            .spawn_with_source(Box::new(MemorySource::new(3)), "/v/a.mp4", reporter);
        let controller = handle.controller();
        let err = handle.join().await.unwrap_err();

        assert!(matches!(err, MediaError::OutputSetup { .. }));
        assert!(err.is_fatal_setup());
        assert_eq!(controller.state(), RunState::Failed);
        let events = drain(rx).await;
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], ProgressEvent::Failed { .. }));
    }

    #[tokio::test]
    async fn test_missing_source_fails_without_output() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.mp4");
        let (reporter, rx) = reporter();

        let handle = engine(shared_config(&dir, "Final Render"), ScriptedDetector::default(), Arc::new(RecordingSinks::default()))
            .spawn(&missing, reporter);
        let err = handle.join().await.unwrap_err();

        assert!(matches!(err, MediaError::FileNotFound(_)));
        assert!(!dir.path().join("run").exists());
        assert!(matches!(drain(rx).await.as_slice(), [ProgressEvent::Failed { .. }]));
    }
}
