// Source metadata decoding using ffprobe

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::Path;
use std::process::Command;

use crate::job::SourceMetadata;

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Probe a file for its first video stream's geometry and the container duration.
pub fn probe_source(probe_bin: &str, path: &Path) -> Result<SourceMetadata> {
    let output = Command::new(probe_bin)
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
            "-select_streams",
            "v:0",
        ])
        .arg(path)
        .output()
        .with_context(|| format!("Failed to execute {}. Is it installed and in PATH?", probe_bin))?;

    if !output.status.success() {
        bail!(
            "{} failed: {}",
            probe_bin,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    parse_probe_json(&String::from_utf8_lossy(&output.stdout))
        .with_context(|| format!("Failed to decode metadata for {}", path.display()))
}

/// Decode ffprobe's JSON report.
///
/// A missing or unparsable duration is not an error; a missing video stream is.
pub fn parse_probe_json(json: &str) -> Result<SourceMetadata> {
    let parsed: ProbeOutput = serde_json::from_str(json).context("Failed to parse ffprobe JSON")?;

    let stream = parsed.streams.first().context("No video stream found")?;
    let width = stream.width.unwrap_or(0);
    let height = stream.height.unwrap_or(0);

    let duration_s = parsed
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .or(stream.duration.as_deref())
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0);

    Ok(SourceMetadata {
        duration_s,
        width,
        height,
    })
}
