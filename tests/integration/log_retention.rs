// Log history across files and re-runs

use lightmode::job::{ControllerConfig, LogRetention};

use crate::common::helpers::*;
use crate::common::scripted::ScriptedEngine;

fn run_once(controller: &mut lightmode::job::JobController) {
    controller.transcode().unwrap();
    assert!(controller.wait_until_settled(SETTLE));
}

#[test]
fn test_rerun_same_file_never_clears() {
    let (mut controller, _registry) =
        controller_with(ScriptedEngine::new(ffmpeg_log_15s()), ControllerConfig::default());
    make_ready(&mut controller);
    let per_run = ffmpeg_log_15s().len();

    controller.accept_file("clip.mp4", vec![1u8]).unwrap();
    run_once(&mut controller);
    run_once(&mut controller);
    assert_eq!(controller.logs().len(), per_run * 2);

    // Sequence indices keep increasing across runs
    let snapshot = controller.logs().snapshot();
    assert!(snapshot.windows(2).all(|w| w[0].sequence_index < w[1].sequence_index));
}

#[test]
fn test_clear_on_new_file() {
    let (mut controller, _registry) =
        controller_with(ScriptedEngine::new(ffmpeg_log_15s()), ControllerConfig::default());
    make_ready(&mut controller);

    controller.accept_file("a.mp4", vec![1u8]).unwrap();
    run_once(&mut controller);
    assert!(!controller.logs().is_empty());

    controller.accept_file("b.mp4", vec![2u8]).unwrap();
    assert!(controller.logs().is_empty());
}

#[test]
fn test_preserve_across_files() {
    let config = ControllerConfig {
        retention: LogRetention::Preserve,
        ..ControllerConfig::default()
    };
    let (mut controller, _registry) = controller_with(ScriptedEngine::new(ffmpeg_log_15s()), config);
    make_ready(&mut controller);
    let per_run = ffmpeg_log_15s().len();

    controller.accept_file("a.mp4", vec![1u8]).unwrap();
    run_once(&mut controller);
    controller.accept_file("b.mp4", vec![2u8]).unwrap();
    assert_eq!(controller.logs().len(), per_run);
    run_once(&mut controller);
    assert_eq!(controller.logs().len(), per_run * 2);
}

#[test]
fn test_log_capacity_drops_oldest() {
    let config = ControllerConfig {
        max_log_lines: Some(5),
        ..ControllerConfig::default()
    };
    let (mut controller, _registry) = controller_with(ScriptedEngine::new(ffmpeg_log_15s()), config);
    make_ready(&mut controller);

    controller.accept_file("a.mp4", vec![1u8]).unwrap();
    run_once(&mut controller);
    assert_eq!(controller.logs().len(), 5);
    assert!(controller.logs().tail(1)[0].starts_with("video:"));
}
