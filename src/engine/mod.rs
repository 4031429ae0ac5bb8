// Transcoding engine boundary - independent of UI

pub mod native;
pub mod planner;
pub mod probe;
pub mod progress;
pub mod session;

pub use native::{NativeEngine, engine_version};
pub use planner::{FilterPlan, FilterPlanner, INPUT_NAME, OUTPUT_NAME, PlanMode, PlannerConfig};
pub use probe::{parse_probe_json, probe_source};
pub use progress::{ProgressTracker, estimate, estimate_from_ratio, extract_elapsed};
pub use session::{EnginePhase, EngineSession, SessionConfig};

use anyhow::Result;

/// Telemetry emitted while the engine executes.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// One free-text diagnostic line
    Log(String),
    /// Engine-computed completion ratio (0.0..=1.0) and elapsed media time
    Progress { ratio: f64, elapsed_s: f64 },
}

/// Locators of the resources an engine needs before it can run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineResources {
    /// Primary engine module (for the native engine: the ffmpeg binary)
    pub core: String,
    /// Supporting resources, engine specific
    pub extras: Vec<String>,
}

impl EngineResources {
    pub fn new(core: impl Into<String>) -> Self {
        Self {
            core: core.into(),
            extras: Vec::new(),
        }
    }
}

/// A black-box transcoder with a named virtual working storage.
pub trait Engine: Send {
    /// Fetch/instantiate the engine. Called at most once per successful load.
    fn load(&mut self, resources: &EngineResources) -> Result<()>;

    fn write_file(&mut self, name: &str, data: &[u8]) -> Result<()>;

    fn read_file(&mut self, name: &str) -> Result<Vec<u8>>;

    /// Remove an entry. Missing entries are not an error.
    fn delete_file(&mut self, name: &str) -> Result<()>;

    /// Run with the given argument tokens, reporting events in emission order.
    /// Returns the engine's exit code; non-zero means failure.
    fn exec(&mut self, args: &[String], on_event: &mut dyn FnMut(EngineEvent)) -> Result<i32>;
}
