// Engine backed by a local ffmpeg binary and a private scratch directory

use anyhow::{Context, Result, bail};
use std::fs;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStderr, ChildStdout, Command, Stdio};
use std::sync::mpsc;
use tempfile::TempDir;

use super::progress::parse_timestamp;
use super::{Engine, EngineEvent, EngineResources};

/// Runs ffmpeg as a child process. Working storage is a temporary directory
/// created on load and removed when the engine is dropped.
#[derive(Debug, Default)]
pub struct NativeEngine {
    binary: Option<PathBuf>,
    version: Option<String>,
    workdir: Option<TempDir>,
}

impl NativeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// First line of `ffmpeg -version`, once loaded.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    fn storage(&self) -> Result<&Path> {
        self.workdir
            .as_ref()
            .map(|d| d.path())
            .context("Engine not loaded")
    }

    fn entry_path(&self, name: &str) -> Result<PathBuf> {
        validate_entry_name(name)?;
        Ok(self.storage()?.join(name))
    }
}

/// Check that the binary runs and report its version line.
pub fn engine_version(binary: &str) -> Result<String> {
    let output = Command::new(binary)
        .arg("-version")
        .output()
        .with_context(|| format!("Failed to execute {}. Is it installed and in PATH?", binary))?;

    if !output.status.success() {
        bail!("{} -version failed with status: {}", binary, output.status);
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(stdout.lines().next().unwrap_or("Unknown version").to_string())
}

fn validate_entry_name(name: &str) -> Result<()> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
    {
        bail!("Invalid working storage name: {:?}", name);
    }
    Ok(())
}

impl Engine for NativeEngine {
    fn load(&mut self, resources: &EngineResources) -> Result<()> {
        let version = engine_version(&resources.core)?;
        let workdir = tempfile::Builder::new()
            .prefix("lightmode-engine-")
            .tempdir()
            .context("Failed to create engine working storage")?;

        tracing::info!(version = %version, storage = %workdir.path().display(), "native engine loaded");
        self.binary = Some(PathBuf::from(&resources.core));
        self.version = Some(version);
        self.workdir = Some(workdir);
        Ok(())
    }

    fn write_file(&mut self, name: &str, data: &[u8]) -> Result<()> {
        let path = self.entry_path(name)?;
        fs::write(&path, data).with_context(|| format!("Failed to write {}", name))
    }

    fn read_file(&mut self, name: &str) -> Result<Vec<u8>> {
        let path = self.entry_path(name)?;
        fs::read(&path).with_context(|| format!("Failed to read {}", name))
    }

    fn delete_file(&mut self, name: &str) -> Result<()> {
        let path = self.entry_path(name)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to delete {}", name)),
        }
    }

    fn exec(&mut self, args: &[String], on_event: &mut dyn FnMut(EngineEvent)) -> Result<i32> {
        let binary = self.binary.clone().context("Engine not loaded")?;
        let storage = self.storage()?.to_path_buf();

        let mut cmd = Command::new(&binary);
        cmd.current_dir(&storage)
            .args(["-hide_banner", "-nostdin", "-y", "-progress", "pipe:1"])
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().context("Failed to spawn ffmpeg")?;

        let (stderr, stdout) = take_pipes(&mut child)?;
        let (tx, rx) = mpsc::channel::<Output>();

        let log_tx = tx.clone();
        let stderr_thread = std::thread::spawn(move || {
            read_segments(stderr, |line| {
                let _ = log_tx.send(Output::Log(line));
            })
        });

        let stdout_thread = std::thread::spawn(move || {
            let mut report = ProgressReport::default();
            read_segments(stdout, |line| {
                if report.parse_line(&line) {
                    let _ = tx.send(Output::Progress(report.out_time_s()));
                }
            })
        });

        // Both senders drop when the pipes close
        let mut duration_s: Option<f64> = None;
        for output in rx {
            match output {
                Output::Log(line) => {
                    if duration_s.is_none() {
                        duration_s = parse_duration_line(&line);
                    }
                    on_event(EngineEvent::Log(line));
                }
                Output::Progress(elapsed_s) => {
                    if let Some(total) = duration_s.filter(|d| *d > 0.0) {
                        on_event(EngineEvent::Progress {
                            ratio: (elapsed_s / total).clamp(0.0, 1.0),
                            elapsed_s,
                        });
                    }
                }
            }
        }

        let status = child.wait().context("Failed to wait for ffmpeg")?;
        for handle in [stderr_thread, stdout_thread] {
            if let Ok(Err(e)) = handle.join() {
                tracing::debug!(error = %e, "engine pipe closed with error");
            }
        }

        // Killed by a signal: no exit code, report as generic failure
        Ok(status.code().unwrap_or(-1))
    }
}

/// Detach both output pipes. On failure the child is killed and reaped.
fn take_pipes(child: &mut Child) -> Result<(ChildStderr, ChildStdout)> {
    match (child.stderr.take(), child.stdout.take()) {
        (Some(stderr), Some(stdout)) => Ok((stderr, stdout)),
        (stderr, stdout) => {
            let _ = child.kill();
            let _ = child.wait();
            bail!(
                "Failed to capture ffmpeg output (stderr: {}, stdout: {})",
                if stderr.is_some() { "ok" } else { "missing" },
                if stdout.is_some() { "ok" } else { "missing" }
            );
        }
    }
}

enum Output {
    Log(String),
    Progress(f64),
}

/// Split a stream on `\n` or `\r` and hand over each non-empty segment.
/// ffmpeg rewrites its stats line with carriage returns.
fn read_segments<R: Read>(source: R, mut on_line: impl FnMut(String)) -> std::io::Result<()> {
    let mut reader = BufReader::new(source);
    let mut pending: Vec<u8> = Vec::new();
    loop {
        let buf = reader.fill_buf()?;
        if buf.is_empty() {
            break;
        }
        let consumed = buf.len();
        for &byte in buf {
            if byte == b'\n' || byte == b'\r' {
                flush_segment(&mut pending, &mut on_line);
            } else {
                pending.push(byte);
            }
        }
        reader.consume(consumed);
    }
    flush_segment(&mut pending, &mut on_line);
    Ok(())
}

fn flush_segment(pending: &mut Vec<u8>, on_line: &mut impl FnMut(String)) {
    if pending.is_empty() {
        return;
    }
    let line = String::from_utf8_lossy(pending).trim_end().to_string();
    pending.clear();
    if !line.is_empty() {
        on_line(line);
    }
}

/// Extract the input duration from ffmpeg's `Duration: 00:00:15.00, start: ...` line.
pub(crate) fn parse_duration_line(line: &str) -> Option<f64> {
    let rest = line.trim_start().strip_prefix("Duration:")?;
    let value = rest.trim_start().split(',').next()?.trim();
    parse_timestamp(value)
}

/// Accumulates ffmpeg `-progress` key=value blocks.
#[derive(Debug, Default, Clone)]
struct ProgressReport {
    out_time_us: u64,
}

impl ProgressReport {
    /// Returns true when a block is complete (`progress=continue|end`).
    fn parse_line(&mut self, line: &str) -> bool {
        let Some((key, value)) = line.split_once('=') else {
            return false;
        };
        match key.trim() {
            "out_time_us" | "out_time_ms" => {
                // Both keys carry microseconds
                if let Ok(us) = value.trim().parse::<u64>() {
                    self.out_time_us = us;
                }
                false
            }
            "progress" => true,
            _ => false,
        }
    }

    fn out_time_s(&self) -> f64 {
        self.out_time_us as f64 / 1_000_000.0
    }
}
