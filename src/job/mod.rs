// Job orchestration: controller state machine, log buffer, artifacts

pub mod controller;
pub mod log_buffer;
pub mod publish;
pub mod types;

pub use controller::{ControllerConfig, ControllerEvent, ControllerState, JobController, MetadataSender};
pub use log_buffer::{
    DEFAULT_MAX_LINES, DEFAULT_NEAR_BOTTOM_THRESHOLD, LogBuffer, LogLine, LogRetention,
    ScrollPosition,
};
pub use publish::{ArtifactPublisher, BlobRegistry, TempDirPublisher};
pub use types::{
    DisplayUrl, Job, JobPhase, JobSummary, MetadataState, OutputArtifact, SourceArtifact,
    SourceId, SourceMetadata, VIDEO_EXTENSIONS, is_video_file, mime_for,
};
