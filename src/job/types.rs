use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use crate::engine::FilterPlan;

/// Containers accepted by the file-acceptance surface.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv", "webm", "m4v"];

pub fn is_video_file(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| VIDEO_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

pub fn mime_for(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("mov") => "video/quicktime",
        Some("avi") => "video/x-msvideo",
        Some("mkv") => "video/x-matroska",
        Some("webm") => "video/webm",
        _ => "video/mp4",
    }
}

/// Revocable locator for a published byte buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DisplayUrl(pub String);

impl std::fmt::Display for DisplayUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifies one accepted file. Increases with every acceptance so late
/// metadata for a superseded file can be discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SourceMetadata {
    pub duration_s: Option<f64>,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MetadataState {
    Pending,
    Decoded(SourceMetadata),
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct SourceArtifact {
    pub id: SourceId,
    pub name: String,
    pub bytes: Arc<[u8]>,
    pub display_url: DisplayUrl,
    pub metadata: MetadataState,
}

impl SourceArtifact {
    pub fn metadata(&self) -> Option<&SourceMetadata> {
        match &self.metadata {
            MetadataState::Decoded(m) => Some(m),
            _ => None,
        }
    }

    /// Decoded duration; `None` until metadata arrives or when unknown.
    pub fn duration_seconds(&self) -> Option<f64> {
        self.metadata().and_then(|m| m.duration_s)
    }

    pub fn width(&self) -> u32 {
        self.metadata().map(|m| m.width).unwrap_or(0)
    }

    pub fn height(&self) -> u32 {
        self.metadata().map(|m| m.height).unwrap_or(0)
    }
}

#[derive(Debug, Clone)]
pub struct OutputArtifact {
    pub file_name: String,
    pub bytes: Arc<[u8]>,
    pub display_url: DisplayUrl,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum JobPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone)]
pub struct Job {
    pub id: Uuid,
    pub source_id: SourceId,
    pub plan: FilterPlan,
    pub phase: JobPhase,
    pub progress_pct: f64,
    pub output: Option<OutputArtifact>,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Local>>,
    pub finished_at: Option<DateTime<Local>>,
}

impl Job {
    /// Create a new pending job
    pub fn new(source_id: SourceId, plan: FilterPlan) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_id,
            plan,
            phase: JobPhase::Pending,
            progress_pct: 0.0,
            output: None,
            error: None,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn elapsed_s(&self) -> Option<f64> {
        let start = self.started_at?;
        let end = self.finished_at.unwrap_or_else(Local::now);
        Some((end - start).num_milliseconds() as f64 / 1000.0)
    }

    pub fn summary(&self) -> JobSummary {
        JobSummary {
            id: self.id,
            phase: self.phase,
            progress_pct: self.progress_pct,
            arguments: self.plan.engine_arguments.clone(),
            target: self.plan.target,
            output_url: self.output.as_ref().map(|o| o.display_url.clone()),
            output_bytes: self.output.as_ref().map(|o| o.bytes.len()),
            error: self.error.clone(),
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }
}

/// Serializable view of a job, printed by `convert --json`.
#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub id: Uuid,
    pub phase: JobPhase,
    pub progress_pct: f64,
    pub arguments: Vec<String>,
    pub target: Option<(u32, u32)>,
    pub output_url: Option<DisplayUrl>,
    pub output_bytes: Option<usize>,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Local>>,
    pub finished_at: Option<DateTime<Local>>,
}
