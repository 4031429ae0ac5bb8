use lightmode::engine::{
    EngineEvent, EngineResources, EngineSession, FilterPlanner, SessionConfig,
};
use lightmode::job::{BlobRegistry, ControllerConfig, ControllerState, JobController, SourceMetadata};
use std::process::Command;
use std::time::{Duration, Instant};

use super::scripted::ScriptedEngine;

pub const SETTLE: Duration = Duration::from_secs(5);

/// ffmpeg-style stderr for a 15 second clip: a Duration header, one stats
/// line per second, then the trailer.
pub fn ffmpeg_log_15s() -> Vec<EngineEvent> {
    let mut events = vec![
        EngineEvent::Log("Input #0, mov,mp4,m4a,3gp,3g2,mj2, from 'input.mp4':".to_string()),
        EngineEvent::Log("  Duration: 00:00:15.00, start: 0.000000, bitrate: 1205 kb/s".to_string()),
        EngineEvent::Log("Stream mapping:".to_string()),
    ];
    for sec in 1..=15 {
        events.push(EngineEvent::Log(format!(
            "frame={:5} fps= 60 q=28.0 size={:6}kB time=00:00:{:02}.00 bitrate= 812.3kbits/s speed=2.01x",
            sec * 30,
            sec * 90,
            sec
        )));
    }
    events.push(EngineEvent::Log(
        "video:1320kB audio:0kB subtitle:0kB other streams:0kB global headers:0kB muxing overhead: 0.5%"
            .to_string(),
    ));
    events
}

pub fn metadata_15s() -> SourceMetadata {
    SourceMetadata {
        duration_s: Some(15.0),
        width: 1280,
        height: 720,
    }
}

pub fn controller_with(engine: ScriptedEngine, config: ControllerConfig) -> (JobController, BlobRegistry) {
    let registry = BlobRegistry::new();
    let session = EngineSession::new(Box::new(engine), SessionConfig::default());
    let controller = JobController::new(
        session,
        FilterPlanner::default(),
        Box::new(registry.clone()),
        config,
    );
    (controller, registry)
}

/// Initialize and wait for the engine to become ready.
pub fn make_ready(controller: &mut JobController) {
    controller
        .initialize_engine(EngineResources::new("scripted"))
        .expect("initialize");
    assert!(controller.wait_until_settled(SETTLE), "engine load timed out");
    assert_eq!(controller.state(), ControllerState::EngineReady);
}

/// Pump until `done` holds or the deadline passes.
pub fn pump_until(controller: &mut JobController, mut done: impl FnMut(&JobController) -> bool) -> bool {
    let deadline = Instant::now() + SETTLE;
    while Instant::now() < deadline {
        controller.pump();
        if done(controller) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    false
}

pub fn is_ffmpeg_available() -> bool {
    ["ffmpeg", "ffprobe"].iter().all(|bin| {
        Command::new(bin)
            .arg("-version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    })
}

/// Render a small synthetic clip with ffmpeg's lavfi test source.
pub fn generate_test_video(path: &std::path::Path, seconds: f64, width: u32, height: u32) -> anyhow::Result<()> {
    let status = Command::new("ffmpeg")
        .args(["-hide_banner", "-loglevel", "error", "-y", "-f", "lavfi", "-i"])
        .arg(format!(
            "testsrc=duration={}:size={}x{}:rate=10",
            seconds, width, height
        ))
        .args(["-pix_fmt", "yuv420p"])
        .arg(path)
        .status()?;
    anyhow::ensure!(status.success(), "ffmpeg exited with {}", status);
    Ok(())
}
