pub mod config;
pub mod engine;
pub mod error;
pub mod job;
pub mod logging;
pub mod ui;

use engine::{EngineSession, FilterPlanner, NativeEngine};
use job::{ArtifactPublisher, JobController};

/// Controller wired to the local ffmpeg engine with settings from `config`.
pub fn native_controller(
    config: &config::Config,
    publisher: Box<dyn ArtifactPublisher>,
) -> JobController {
    let session = EngineSession::new(Box::new(NativeEngine::new()), config.session_config());
    let mut controller = JobController::new(
        session,
        FilterPlanner::new(config.planner_config()),
        publisher,
        config.controller_config(),
    );
    controller.set_mode(config.initial_mode());
    controller
}
