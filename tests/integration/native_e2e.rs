// End-to-end runs through the real ffmpeg binary

use lightmode::engine::{
    EngineResources, EngineSession, FilterPlanner, NativeEngine, SessionConfig,
    probe_source,
};
use lightmode::job::{BlobRegistry, ControllerConfig, ControllerState, JobController};
use std::time::Duration;
use tempfile::TempDir;

use crate::common::helpers::*;

macro_rules! require_ffmpeg {
    () => {
        if !is_ffmpeg_available() {
            eprintln!("Skipping test: FFmpeg not available");
            return;
        }
    };
}

fn native_controller() -> JobController {
    JobController::new(
        EngineSession::new(Box::new(NativeEngine::new()), SessionConfig::default()),
        FilterPlanner::default(),
        Box::new(BlobRegistry::new()),
        ControllerConfig::default(),
    )
}

#[test]
fn e2e_probe_reads_generated_clip() {
    require_ffmpeg!();

    let dir = TempDir::new().unwrap();
    let input = dir.path().join("clip.mp4");
    generate_test_video(&input, 1.0, 320, 240).unwrap();

    let meta = probe_source("ffprobe", &input).unwrap();
    assert_eq!((meta.width, meta.height), (320, 240));
    let duration = meta.duration_s.unwrap();
    assert!((duration - 1.0).abs() < 0.2, "duration {}", duration);
}

#[test]
fn e2e_convert_with_native_engine() {
    require_ffmpeg!();

    let dir = TempDir::new().unwrap();
    let input = dir.path().join("clip.mp4");
    generate_test_video(&input, 1.0, 320, 240).unwrap();

    let mut controller = native_controller();
    controller
        .initialize_engine(EngineResources::new("ffmpeg"))
        .unwrap();
    assert!(controller.wait_until_settled(Duration::from_secs(30)));
    assert_eq!(controller.state(), ControllerState::EngineReady);

    let id = controller
        .accept_file("clip.mp4", std::fs::read(&input).unwrap())
        .unwrap();
    controller.attach_metadata(id, probe_source("ffprobe", &input).map_err(|e| e.to_string()));
    controller.transcode().unwrap();
    assert!(controller.wait_until_settled(Duration::from_secs(120)));

    assert_eq!(
        controller.state(),
        ControllerState::Succeeded,
        "logs: {:?}",
        controller.logs().tail(20)
    );
    assert_eq!(controller.progress_pct(), 100.0);
    assert!(!controller.logs().is_empty());

    let saved = controller.save_output(dir.path()).unwrap();
    let meta = probe_source("ffprobe", &saved).unwrap();
    assert_eq!((meta.width, meta.height), (320, 240));
}

#[test]
fn e2e_bad_input_fails_with_diagnostics() {
    require_ffmpeg!();

    let mut controller = native_controller();
    controller
        .initialize_engine(EngineResources::new("ffmpeg"))
        .unwrap();
    assert!(controller.wait_until_settled(Duration::from_secs(30)));

    controller
        .accept_file("broken.mp4", b"definitely not a video".to_vec())
        .unwrap();
    controller.transcode().unwrap();
    assert!(controller.wait_until_settled(Duration::from_secs(30)));

    assert_eq!(controller.state(), ControllerState::Failed);
    assert!(!controller.logs().is_empty());
    assert!(controller.error_message().is_some());
}
