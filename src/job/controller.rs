// Top-level state machine: engine init, file acceptance, job execution

use chrono::Local;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};
use uuid::Uuid;

use super::log_buffer::{LogBuffer, LogRetention};
use super::publish::ArtifactPublisher;
use super::types::{
    Job, JobPhase, MetadataState, OutputArtifact, SourceArtifact, SourceId, SourceMetadata,
    is_video_file, mime_for,
};
use crate::engine::{
    EngineEvent, EngineResources, EngineSession, FilterPlan, FilterPlanner, PlanMode,
    ProgressTracker,
};
use crate::error::{ControllerError, EngineError, Violation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ControllerState {
    Idle,
    EngineLoading,
    EngineReady,
    FileSelected,
    Running,
    Succeeded,
    Failed,
}

impl ControllerState {
    /// States from which a file may be accepted or a job re-run.
    fn has_ready_engine(self) -> bool {
        matches!(
            self,
            Self::EngineReady | Self::FileSelected | Self::Succeeded | Self::Failed
        )
    }
}

/// Everything that reaches the controller from other threads, in arrival order.
#[derive(Debug)]
pub enum ControllerEvent {
    Engine(EngineEvent),
    EngineLoaded(Result<(), EngineError>),
    JobFinished {
        job_id: Uuid,
        result: Result<Vec<u8>, EngineError>,
    },
    Metadata {
        source_id: SourceId,
        result: Result<SourceMetadata, String>,
    },
}

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub retention: LogRetention,
    pub output_file_name: String,
    pub max_log_lines: Option<usize>,
    pub near_bottom_threshold: f64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            retention: LogRetention::default(),
            output_file_name: "output.mp4".to_string(),
            max_log_lines: Some(super::log_buffer::DEFAULT_MAX_LINES),
            near_bottom_threshold: super::log_buffer::DEFAULT_NEAR_BOTTOM_THRESHOLD,
        }
    }
}

/// Handle for delivering decoded metadata from a probe thread.
#[derive(Debug, Clone)]
pub struct MetadataSender {
    tx: Sender<ControllerEvent>,
}

impl MetadataSender {
    pub fn send(&self, source_id: SourceId, result: Result<SourceMetadata, String>) {
        let _ = self.tx.send(ControllerEvent::Metadata { source_id, result });
    }
}

/// Sends its event when dropped, so a worker reports even if it unwinds.
struct Completion {
    tx: Sender<ControllerEvent>,
    event: Option<ControllerEvent>,
}

impl Completion {
    fn new(tx: Sender<ControllerEvent>, fallback: ControllerEvent) -> Self {
        Self {
            tx,
            event: Some(fallback),
        }
    }

    fn resolve(mut self, event: ControllerEvent) {
        self.event = Some(event);
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if let Some(event) = self.event.take() {
            let _ = self.tx.send(event);
        }
    }
}

pub struct JobController {
    state: ControllerState,
    session: EngineSession,
    planner: FilterPlanner,
    publisher: Box<dyn ArtifactPublisher>,
    config: ControllerConfig,
    logs: LogBuffer,
    mode: PlanMode,
    source: Option<SourceArtifact>,
    job: Option<Job>,
    progress: ProgressTracker,
    error: Option<ControllerError>,
    next_source_id: u64,
    tx: Sender<ControllerEvent>,
    rx: Receiver<ControllerEvent>,
}

impl JobController {
    pub fn new(
        session: EngineSession,
        planner: FilterPlanner,
        publisher: Box<dyn ArtifactPublisher>,
        config: ControllerConfig,
    ) -> Self {
        let (tx, rx) = mpsc::channel();
        let logs = LogBuffer::new(config.max_log_lines, config.near_bottom_threshold);
        Self {
            state: ControllerState::Idle,
            session,
            planner,
            publisher,
            config,
            logs,
            mode: PlanMode::Normal,
            source: None,
            job: None,
            progress: ProgressTracker::new(),
            error: None,
            next_source_id: 1,
            tx,
            rx,
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn mode(&self) -> PlanMode {
        self.mode
    }

    pub fn logs(&self) -> &LogBuffer {
        &self.logs
    }

    pub fn logs_mut(&mut self) -> &mut LogBuffer {
        &mut self.logs
    }

    pub fn source(&self) -> Option<&SourceArtifact> {
        self.source.as_ref()
    }

    pub fn job(&self) -> Option<&Job> {
        self.job.as_ref()
    }

    pub fn output(&self) -> Option<&OutputArtifact> {
        self.job.as_ref().and_then(|j| j.output.as_ref())
    }

    pub fn error(&self) -> Option<&ControllerError> {
        self.error.as_ref()
    }

    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ControllerError::user_message)
    }

    pub fn session(&self) -> &EngineSession {
        &self.session
    }

    pub fn planner(&self) -> &FilterPlanner {
        &self.planner
    }

    /// Progress of the current job, 0 when there is none.
    pub fn progress_pct(&self) -> f64 {
        self.job.as_ref().map(|j| j.progress_pct).unwrap_or(0.0)
    }

    pub fn is_busy(&self) -> bool {
        matches!(
            self.state,
            ControllerState::EngineLoading | ControllerState::Running
        )
    }

    pub fn can_transcode(&self) -> bool {
        self.state != ControllerState::Running
            && self.session.is_ready()
            && self
                .source
                .as_ref()
                .is_some_and(|s| !matches!(s.metadata, MetadataState::Failed(_)))
    }

    pub fn metadata_sender(&self) -> MetadataSender {
        MetadataSender {
            tx: self.tx.clone(),
        }
    }

    /// Plan the next job would run with, if a file is selected.
    pub fn plan_preview(&self) -> Option<FilterPlan> {
        self.source.as_ref().map(|s| self.planner.plan(s, self.mode))
    }

    /// Start loading the engine on a worker thread.
    pub fn initialize_engine(&mut self, resources: EngineResources) -> Result<(), ControllerError> {
        match self.state {
            ControllerState::EngineLoading => return Err(Violation::AlreadyLoading.into()),
            ControllerState::Idle => {}
            other => {
                tracing::debug!(state = ?other, "engine already initialized");
                return Ok(());
            }
        }

        self.state = ControllerState::EngineLoading;
        self.error = None;
        tracing::info!("initializing engine");

        let session = self.session.clone();
        let listener_tx = self.tx.clone();
        let completion = Completion::new(
            self.tx.clone(),
            ControllerEvent::EngineLoaded(Err(EngineError::LoadFailed {
                message: "engine loader exited unexpectedly".to_string(),
            })),
        );

        thread::Builder::new()
            .name("engine-loader".to_string())
            .spawn(move || {
                let result = session.initialize(
                    &resources,
                    Box::new(move |event| {
                        let _ = listener_tx.send(ControllerEvent::Engine(event));
                    }),
                );
                completion.resolve(ControllerEvent::EngineLoaded(result));
            })?;
        Ok(())
    }

    /// Take a new source file. Returns the id metadata must be attached under.
    pub fn accept_file(
        &mut self,
        name: &str,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Result<SourceId, ControllerError> {
        if self.state == ControllerState::Running {
            return Err(Violation::JobAlreadyRunning.into());
        }
        if !self.state.has_ready_engine() {
            return Err(Violation::EngineNotReady.into());
        }
        if !is_video_file(name) {
            return Err(ControllerError::invalid_input("Please select a video file."));
        }

        let bytes: Arc<[u8]> = bytes.into();
        let display_url = self
            .publisher
            .publish(name, mime_for(name), &bytes)
            .map_err(|e| std::io::Error::other(format!("{:#}", e)))?;

        if let Some(previous) = self.source.take() {
            self.publisher.revoke(&previous.display_url);
        }
        self.retire_job();
        self.progress = ProgressTracker::new();
        self.error = None;
        if self.config.retention == LogRetention::ClearOnNewFile {
            self.logs.clear();
        }

        let id = SourceId(self.next_source_id);
        self.next_source_id += 1;
        tracing::info!(source = id.0, name, size = bytes.len(), "file accepted");

        self.source = Some(SourceArtifact {
            id,
            name: name.to_string(),
            bytes,
            display_url,
            metadata: MetadataState::Pending,
        });
        self.state = ControllerState::FileSelected;
        Ok(id)
    }

    /// Record decoded metadata. Results for superseded sources are dropped.
    pub fn attach_metadata(&mut self, source_id: SourceId, result: Result<SourceMetadata, String>) {
        let Some(source) = self.source.as_mut().filter(|s| s.id == source_id) else {
            tracing::debug!(source = source_id.0, "discarding metadata for superseded file");
            return;
        };

        match result {
            Ok(metadata) => {
                tracing::debug!(
                    source = source_id.0,
                    duration = ?metadata.duration_s,
                    width = metadata.width,
                    height = metadata.height,
                    "metadata decoded"
                );
                source.metadata = MetadataState::Decoded(metadata);
            }
            Err(reason) => {
                tracing::warn!(source = source_id.0, reason = %reason, "metadata decode failed");
                self.logs.append(format!("Could not read video metadata: {}", reason));
                source.metadata = MetadataState::Failed(reason);
                self.error = Some(ControllerError::invalid_input(
                    "Could not read this video. Please try another file.",
                ));
            }
        }
    }

    pub fn set_mode(&mut self, mode: PlanMode) {
        if self.mode != mode {
            tracing::info!(mode = mode.label(), "mode changed");
        }
        self.mode = mode;
    }

    /// Plan and start a job for the selected file.
    pub fn transcode(&mut self) -> Result<Uuid, ControllerError> {
        if self.state == ControllerState::Running {
            return Err(Violation::JobAlreadyRunning.into());
        }
        let Some(source) = self.source.as_ref() else {
            return Err(ControllerError::invalid_input("Please select a video first."));
        };
        if let MetadataState::Failed(_) = source.metadata {
            return Err(ControllerError::invalid_input(
                "Could not read this video. Please try another file.",
            ));
        }
        if !self.session.is_ready() {
            return Err(Violation::EngineNotReady.into());
        }

        let plan = self.planner.plan(source, self.mode);
        let input = Arc::clone(&source.bytes);
        let mut job = Job::new(source.id, plan.clone());
        job.phase = JobPhase::Running;
        job.started_at = Some(Local::now());
        let job_id = job.id;

        tracing::info!(
            job = %job_id,
            mode = self.mode.label(),
            target = ?plan.target,
            "starting job"
        );

        let completion = Completion::new(
            self.tx.clone(),
            ControllerEvent::JobFinished {
                job_id,
                result: Err(EngineError::ExecutionFailed {
                    message: "worker exited unexpectedly".to_string(),
                    tail: Vec::new(),
                }),
            },
        );
        let session = self.session.clone();
        thread::Builder::new()
            .name("transcode".to_string())
            .spawn(move || {
                let result = session.run_job(&input, &plan);
                completion.resolve(ControllerEvent::JobFinished { job_id, result });
            })?;

        self.retire_job();
        self.job = Some(job);
        self.progress = ProgressTracker::new();
        self.error = None;
        self.state = ControllerState::Running;
        Ok(job_id)
    }

    /// Apply every queued event. Returns how many were applied.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.rx.try_recv() {
            self.apply(event);
            applied += 1;
        }
        applied
    }

    /// Block until neither a load nor a job is in flight, applying events as
    /// they arrive. Returns false on timeout.
    pub fn wait_until_settled(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.pump();
            if !self.is_busy() {
                return true;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            match self.rx.recv_timeout(remaining) {
                Ok(event) => self.apply(event),
                Err(RecvTimeoutError::Timeout) => return false,
                // The controller holds a sender, so this cannot happen
                Err(RecvTimeoutError::Disconnected) => return !self.is_busy(),
            }
        }
    }

    /// Write the output artifact into `dir` under its fixed file name.
    pub fn save_output(&self, dir: &Path) -> Result<PathBuf, ControllerError> {
        let output = self
            .output()
            .ok_or_else(|| ControllerError::invalid_input("Nothing to save yet."))?;
        let path = dir.join(&output.file_name);
        fs::write(&path, &output.bytes)?;
        tracing::info!(path = %path.display(), bytes = output.bytes.len(), "output saved");
        Ok(path)
    }

    fn apply(&mut self, event: ControllerEvent) {
        match event {
            ControllerEvent::Engine(EngineEvent::Log(line)) => self.on_log_line(line),
            ControllerEvent::Engine(EngineEvent::Progress { ratio, .. }) => {
                if self.state == ControllerState::Running {
                    if let Some(pct) = self.progress.observe_ratio(ratio) {
                        self.set_job_progress(pct);
                    }
                }
            }
            ControllerEvent::EngineLoaded(result) => self.on_engine_loaded(result),
            ControllerEvent::JobFinished { job_id, result } => self.on_job_finished(job_id, result),
            ControllerEvent::Metadata { source_id, result } => {
                self.attach_metadata(source_id, result)
            }
        }
    }

    fn on_log_line(&mut self, line: String) {
        if self.state == ControllerState::Running {
            let duration = self.source.as_ref().and_then(SourceArtifact::duration_seconds);
            if let Some(pct) = self.progress.observe_line(&line, duration) {
                self.set_job_progress(pct);
            }
        }
        self.logs.append(line);
    }

    fn set_job_progress(&mut self, pct: f64) {
        if let Some(job) = self.job.as_mut() {
            job.progress_pct = pct;
        }
    }

    fn on_engine_loaded(&mut self, result: Result<(), EngineError>) {
        if self.state != ControllerState::EngineLoading {
            tracing::debug!(state = ?self.state, "ignoring stale engine load result");
            return;
        }
        match result {
            Ok(()) => {
                tracing::info!("engine ready");
                self.state = ControllerState::EngineReady;
            }
            Err(e) => {
                let err = ControllerError::from(e);
                tracing::warn!(error = %err, "engine load failed");
                self.logs.append(err.to_string());
                self.error = Some(err);
                self.state = ControllerState::Idle;
            }
        }
    }

    fn on_job_finished(&mut self, job_id: Uuid, result: Result<Vec<u8>, EngineError>) {
        let Some(job) = self.job.as_mut().filter(|j| j.id == job_id) else {
            tracing::debug!(job = %job_id, "ignoring result for superseded job");
            return;
        };
        job.finished_at = Some(Local::now());

        let outcome = result.map_err(ControllerError::from).and_then(|bytes| {
            let bytes: Arc<[u8]> = bytes.into();
            let display_url = self
                .publisher
                .publish(&self.config.output_file_name, "video/mp4", &bytes)
                .map_err(|e| std::io::Error::other(format!("{:#}", e)))?;
            Ok(OutputArtifact {
                file_name: self.config.output_file_name.clone(),
                bytes,
                display_url,
            })
        });

        match outcome {
            Ok(output) => {
                self.progress.complete();
                job.progress_pct = 100.0;
                job.phase = JobPhase::Succeeded;
                tracing::info!(
                    job = %job_id,
                    bytes = output.bytes.len(),
                    elapsed_s = ?job.elapsed_s(),
                    "job succeeded"
                );
                job.output = Some(output);
                self.state = ControllerState::Succeeded;
            }
            Err(err) => {
                tracing::warn!(job = %job_id, error = %err, "job failed");
                job.phase = JobPhase::Failed;
                job.error = Some(err.user_message());
                self.logs.append(format!("Error: {}", err));
                self.error = Some(err);
                self.state = ControllerState::Failed;
            }
        }
    }

    /// Drop the current job, revoking its output locator.
    fn retire_job(&mut self) {
        if let Some(output) = self.job.take().and_then(|j| j.output) {
            self.publisher.revoke(&output.display_url);
        }
    }
}
