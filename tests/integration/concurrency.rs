// Single-flight guarantees while loads and jobs are in flight

use lightmode::engine::EngineResources;
use lightmode::error::{ControllerError, Violation};
use lightmode::job::{ControllerConfig, ControllerState};
use std::sync::mpsc;

use crate::common::helpers::*;
use crate::common::scripted::ScriptedEngine;

#[test]
fn test_second_initialize_while_loading_is_rejected() {
    let (release, gate) = mpsc::channel();
    let mut engine = ScriptedEngine::new(Vec::new());
    engine.load_gate = Some(gate);
    let recorder = engine.recorder();
    let (mut controller, _registry) = controller_with(engine, ControllerConfig::default());

    controller
        .initialize_engine(EngineResources::new("scripted"))
        .unwrap();
    assert_eq!(controller.state(), ControllerState::EngineLoading);

    let err = controller
        .initialize_engine(EngineResources::new("scripted"))
        .unwrap_err();
    assert!(matches!(
        err,
        ControllerError::ConcurrencyViolation(Violation::AlreadyLoading)
    ));

    release.send(()).unwrap();
    assert!(controller.wait_until_settled(SETTLE));
    assert_eq!(controller.state(), ControllerState::EngineReady);
    assert_eq!(recorder.load_count(), 1);
}

#[test]
fn test_second_transcode_while_running_is_rejected() {
    let (release, gate) = mpsc::channel();
    let mut engine = ScriptedEngine::new(ffmpeg_log_15s());
    engine.exec_gate = Some(gate);
    let recorder = engine.recorder();
    let (mut controller, _registry) = controller_with(engine, ControllerConfig::default());
    make_ready(&mut controller);

    controller.accept_file("clip.mp4", vec![1u8, 2]).unwrap();
    let first = controller.transcode().unwrap();

    let err = controller.transcode().unwrap_err();
    assert!(matches!(
        err,
        ControllerError::ConcurrencyViolation(Violation::JobAlreadyRunning)
    ));
    // The running job is untouched
    assert_eq!(controller.job().unwrap().id, first);
    assert_eq!(controller.state(), ControllerState::Running);

    release.send(()).unwrap();
    assert!(controller.wait_until_settled(SETTLE));
    assert_eq!(controller.state(), ControllerState::Succeeded);
    assert_eq!(recorder.exec_count(), 1);
    assert!(!controller.session().is_running());
}

#[test]
fn test_accept_file_while_running_is_rejected() {
    let (release, gate) = mpsc::channel();
    let mut engine = ScriptedEngine::new(Vec::new());
    engine.exec_gate = Some(gate);
    let (mut controller, _registry) = controller_with(engine, ControllerConfig::default());
    make_ready(&mut controller);

    controller.accept_file("a.mp4", vec![1u8]).unwrap();
    controller.transcode().unwrap();

    let err = controller.accept_file("b.mp4", vec![2u8]).unwrap_err();
    assert!(matches!(
        err,
        ControllerError::ConcurrencyViolation(Violation::JobAlreadyRunning)
    ));
    assert_eq!(controller.source().unwrap().name, "a.mp4");

    release.send(()).unwrap();
    assert!(controller.wait_until_settled(SETTLE));
}

#[test]
fn test_session_rejects_direct_second_job() {
    let (release, gate) = mpsc::channel();
    let mut engine = ScriptedEngine::new(Vec::new());
    engine.exec_gate = Some(gate);
    let (mut controller, _registry) = controller_with(engine, ControllerConfig::default());
    make_ready(&mut controller);

    controller.accept_file("a.mp4", vec![1u8]).unwrap();
    controller.transcode().unwrap();
    assert!(pump_until(&mut controller, |c| c.session().is_running()));

    // Bypassing the controller still hits the session's in-flight guard
    let plan = controller.plan_preview().unwrap();
    let err = controller.session().run_job(b"x", &plan).unwrap_err();
    assert!(matches!(
        err,
        lightmode::error::EngineError::JobAlreadyRunning
    ));

    release.send(()).unwrap();
    assert!(controller.wait_until_settled(SETTLE));
    assert_eq!(controller.state(), ControllerState::Succeeded);
}

#[test]
fn test_settle_times_out_while_job_blocks() {
    let (release, gate) = mpsc::channel();
    let mut engine = ScriptedEngine::new(Vec::new());
    engine.exec_gate = Some(gate);
    let (mut controller, _registry) = controller_with(engine, ControllerConfig::default());
    make_ready(&mut controller);

    controller.accept_file("a.mp4", vec![1u8]).unwrap();
    controller.transcode().unwrap();
    assert!(!controller.wait_until_settled(std::time::Duration::from_millis(50)));
    assert!(controller.is_busy());

    release.send(()).unwrap();
    assert!(controller.wait_until_settled(SETTLE));
    assert!(!controller.is_busy());
}
