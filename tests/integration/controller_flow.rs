// Full controller lifecycle against the scripted engine

use lightmode::engine::{INPUT_NAME, OUTPUT_NAME, PlanMode};
use lightmode::error::ControllerError;
use lightmode::job::{ControllerConfig, ControllerState, JobPhase};

use crate::common::helpers::*;
use crate::common::scripted::{ExecFault, ScriptedEngine, transform};

#[test]
fn test_happy_path_publishes_output() {
    let engine = ScriptedEngine::new(ffmpeg_log_15s());
    let recorder = engine.recorder();
    let (mut controller, registry) = controller_with(engine, ControllerConfig::default());
    make_ready(&mut controller);

    let input = vec![1u8, 2, 3, 4];
    let source_id = controller.accept_file("night.mp4", input.clone()).unwrap();
    assert_eq!(controller.state(), ControllerState::FileSelected);
    assert_eq!(registry.live_count(), 1, "source preview is published");

    controller.attach_metadata(source_id, Ok(metadata_15s()));
    controller.transcode().unwrap();
    assert_eq!(controller.state(), ControllerState::Running);
    assert!(controller.wait_until_settled(SETTLE));

    assert_eq!(controller.state(), ControllerState::Succeeded);
    let job = controller.job().unwrap();
    assert_eq!(job.phase, JobPhase::Succeeded);
    assert_eq!(job.progress_pct, 100.0);
    assert!(job.finished_at.is_some());

    let output = controller.output().unwrap();
    assert_eq!(output.file_name, "output.mp4");
    assert_eq!(&output.bytes[..], &transform(&input)[..]);
    assert!(registry.is_live(&output.display_url));

    // Working storage is released after the job
    assert!(recorder.stored_names().is_empty());
    assert!(controller.error().is_none());
}

#[test]
fn test_engine_receives_planned_arguments() {
    let engine = ScriptedEngine::new(Vec::new());
    let recorder = engine.recorder();
    let (mut controller, _registry) = controller_with(engine, ControllerConfig::default());
    make_ready(&mut controller);

    let id = controller.accept_file("clip.mov", vec![0u8; 8]).unwrap();
    controller.attach_metadata(id, Ok(metadata_15s()));
    controller.set_mode(PlanMode::Fast);
    controller.transcode().unwrap();
    assert!(controller.wait_until_settled(SETTLE));

    let args = recorder.last_args().unwrap();
    assert_eq!(args.first().map(String::as_str), Some("-i"));
    assert_eq!(args.get(1).map(String::as_str), Some(INPUT_NAME));
    assert_eq!(args.last().map(String::as_str), Some(OUTPUT_NAME));
    assert!(args.iter().any(|a| a == "-preset"));
    assert_eq!(args, controller.job().unwrap().plan.engine_arguments);
}

#[test]
fn test_execution_failure_keeps_logs_and_sets_message() {
    let engine = ScriptedEngine::new(ffmpeg_log_15s()).failing_with(1);
    let recorder = engine.recorder();
    let (mut controller, _registry) = controller_with(engine, ControllerConfig::default());
    make_ready(&mut controller);

    let id = controller.accept_file("clip.mp4", vec![9u8; 4]).unwrap();
    controller.attach_metadata(id, Ok(metadata_15s()));
    controller.transcode().unwrap();
    assert!(controller.wait_until_settled(SETTLE));

    assert_eq!(controller.state(), ControllerState::Failed);
    assert_eq!(
        controller.error_message().as_deref(),
        Some("Failed to process video. Please try another video.")
    );
    match controller.error() {
        Some(ControllerError::EngineExecutionFailure { tail, .. }) => {
            assert!(tail.last().unwrap().starts_with("video:"));
        }
        other => panic!("unexpected error {:?}", other),
    }

    // Every engine line is still there, followed by the diagnostic
    assert_eq!(controller.logs().len(), ffmpeg_log_15s().len() + 1);
    assert!(controller.output().is_none());
    assert_eq!(controller.job().unwrap().phase, JobPhase::Failed);
    assert!(recorder.stored_names().is_empty());

    // Failed behaves like FileSelected: the job can be re-run
    assert!(controller.can_transcode());
}

#[test]
fn test_missing_output_is_an_execution_failure() {
    let mut engine = ScriptedEngine::new(Vec::new());
    engine.omit_output = true;
    let (mut controller, _registry) = controller_with(engine, ControllerConfig::default());
    make_ready(&mut controller);

    controller.accept_file("clip.mp4", vec![1u8]).unwrap();
    controller.transcode().unwrap();
    assert!(controller.wait_until_settled(SETTLE));

    assert_eq!(controller.state(), ControllerState::Failed);
    assert!(matches!(
        controller.error(),
        Some(ControllerError::EngineExecutionFailure { .. })
    ));
}

#[test]
fn test_load_failure_then_retry() {
    let mut engine = ScriptedEngine::new(Vec::new());
    engine.load_failures = 1;
    let recorder = engine.recorder();
    let (mut controller, _registry) = controller_with(engine, ControllerConfig::default());

    controller
        .initialize_engine(lightmode::engine::EngineResources::new("scripted"))
        .unwrap();
    assert!(controller.wait_until_settled(SETTLE));
    assert_eq!(controller.state(), ControllerState::Idle);
    assert_eq!(
        controller.error_message().as_deref(),
        Some("Failed to load converter. Please check your connection.")
    );
    assert_eq!(controller.logs().len(), 1, "load diagnostic is logged");

    make_ready(&mut controller);
    assert!(controller.error().is_none());
    assert_eq!(recorder.load_count(), 1);

    // Initializing again once ready changes nothing
    controller
        .initialize_engine(lightmode::engine::EngineResources::new("scripted"))
        .unwrap();
    assert_eq!(controller.state(), ControllerState::EngineReady);
    assert_eq!(recorder.load_count(), 1);
}

#[test]
fn test_transcode_without_file_creates_no_job() {
    let engine = ScriptedEngine::new(Vec::new());
    let recorder = engine.recorder();
    let (mut controller, _registry) = controller_with(engine, ControllerConfig::default());
    make_ready(&mut controller);

    let err = controller.transcode().unwrap_err();
    assert!(matches!(err, ControllerError::InvalidInput { .. }));
    assert!(controller.job().is_none());
    assert_eq!(recorder.exec_count(), 0);
}

#[test]
fn test_new_file_revokes_previous_urls() {
    let engine = ScriptedEngine::new(Vec::new());
    let (mut controller, registry) = controller_with(engine, ControllerConfig::default());
    make_ready(&mut controller);

    controller.accept_file("a.mp4", vec![1u8]).unwrap();
    let first_preview = controller.source().unwrap().display_url.clone();
    controller.transcode().unwrap();
    assert!(controller.wait_until_settled(SETTLE));
    let first_output = controller.output().unwrap().display_url.clone();
    assert_eq!(registry.live_count(), 2);

    controller.accept_file("b.webm", vec![2u8]).unwrap();
    assert!(!registry.is_live(&first_preview));
    assert!(!registry.is_live(&first_output));
    assert_eq!(registry.live_count(), 1);
    assert!(controller.output().is_none());
    assert_eq!(controller.progress_pct(), 0.0);
    assert_eq!(controller.state(), ControllerState::FileSelected);
}

#[test]
fn test_rerun_revokes_previous_output() {
    let engine = ScriptedEngine::new(Vec::new());
    let (mut controller, registry) = controller_with(engine, ControllerConfig::default());
    make_ready(&mut controller);

    controller.accept_file("a.mp4", vec![1u8]).unwrap();
    controller.transcode().unwrap();
    assert!(controller.wait_until_settled(SETTLE));
    let first_output = controller.output().unwrap().display_url.clone();

    controller.transcode().unwrap();
    assert!(!registry.is_live(&first_output));
    assert!(controller.wait_until_settled(SETTLE));
    assert_eq!(controller.state(), ControllerState::Succeeded);
    assert_ne!(controller.output().unwrap().display_url, first_output);
}

#[test]
fn test_save_output_writes_fixed_name() {
    let engine = ScriptedEngine::new(Vec::new());
    let (mut controller, _registry) = controller_with(
        engine,
        ControllerConfig {
            output_file_name: "light.mp4".to_string(),
            ..ControllerConfig::default()
        },
    );
    make_ready(&mut controller);

    controller.accept_file("a.mp4", vec![0u8, 255]).unwrap();
    controller.transcode().unwrap();
    assert!(controller.wait_until_settled(SETTLE));

    let dir = tempfile::tempdir().unwrap();
    let path = controller.save_output(dir.path()).unwrap();
    assert_eq!(path, dir.path().join("light.mp4"));
    assert_eq!(std::fs::read(&path).unwrap(), vec![255u8, 0]);
}

#[test]
fn test_job_summary_serializes() {
    let engine = ScriptedEngine::new(Vec::new());
    let (mut controller, _registry) = controller_with(engine, ControllerConfig::default());
    make_ready(&mut controller);

    controller.accept_file("a.mp4", vec![0u8; 3]).unwrap();
    controller.transcode().unwrap();
    assert!(controller.wait_until_settled(SETTLE));

    let value = serde_json::to_value(controller.job().unwrap().summary()).unwrap();
    assert_eq!(value["phase"], "Succeeded");
    assert_eq!(value["progress_pct"], 100.0);
    assert_eq!(value["output_bytes"], 3);
    assert!(value["output_url"].as_str().unwrap().starts_with("blob:lightmode/"));
}

/// Run one job that ends with `fault`, then check that a re-run succeeds.
fn run_with_fault(fault: ExecFault) -> lightmode::job::JobController {
    let engine = ScriptedEngine::new(ffmpeg_log_15s()).with_fault(fault);
    let recorder = engine.recorder();
    let (mut controller, _registry) = controller_with(engine, ControllerConfig::default());
    make_ready(&mut controller);

    let id = controller.accept_file("clip.mp4", vec![7u8; 4]).unwrap();
    controller.attach_metadata(id, Ok(metadata_15s()));
    controller.transcode().unwrap();
    assert!(controller.wait_until_settled(SETTLE));

    assert_eq!(controller.state(), ControllerState::Failed);
    assert!(!controller.session().is_running());
    assert!(recorder.stored_names().is_empty());
    assert_eq!(controller.job().unwrap().phase, JobPhase::Failed);
    assert_eq!(
        controller.error_message().as_deref(),
        Some("Failed to process video. Please try another video.")
    );
    assert!(controller.can_transcode());
    controller
}

#[test]
fn test_exec_error_releases_job_and_storage() {
    let mut controller = run_with_fault(ExecFault::Error);
    match controller.error() {
        Some(ControllerError::EngineExecutionFailure { message, tail }) => {
            assert!(message.contains("memory access out of bounds"));
            assert_eq!(tail.len(), ffmpeg_log_15s().len());
        }
        other => panic!("unexpected error {:?}", other),
    }

    controller.transcode().unwrap();
    assert!(controller.wait_until_settled(SETTLE));
    assert_eq!(controller.state(), ControllerState::Succeeded);
    assert!(controller.error().is_none());
}

#[test]
fn test_unwinding_worker_still_reports_completion() {
    let mut controller = run_with_fault(ExecFault::Panic);
    assert!(matches!(
        controller.error(),
        Some(ControllerError::EngineExecutionFailure { .. })
    ));

    controller.transcode().unwrap();
    assert!(controller.wait_until_settled(SETTLE));
    assert_eq!(controller.state(), ControllerState::Succeeded);
    assert_eq!(controller.progress_pct(), 100.0);
}
