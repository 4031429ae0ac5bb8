// Progress estimation from engine output

/// Parse a `HH:MM:SS[.ff]` timestamp into seconds.
///
/// Hours may have any number of digits; minutes and seconds must be exactly two.
/// Anything else (`N/A`, negative values, missing groups) yields `None`.
pub fn parse_timestamp(value: &str) -> Option<f64> {
    let mut parts = value.split(':');
    let hours = parts.next()?;
    let minutes = parts.next()?;
    let seconds = parts.next()?;
    if parts.next().is_some() {
        return None;
    }

    if hours.is_empty() || !hours.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if minutes.len() != 2 || !minutes.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let (whole, fraction) = match seconds.split_once('.') {
        Some((w, f)) => (w, Some(f)),
        None => (seconds, None),
    };
    if whole.len() != 2 || !whole.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if let Some(f) = fraction {
        if f.is_empty() || !f.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
    }

    let h: f64 = hours.parse().ok()?;
    let m: f64 = minutes.parse().ok()?;
    let s: f64 = seconds.parse().ok()?;
    Some(h * 3600.0 + m * 60.0 + s)
}

/// Find the elapsed encode time reported by a log line.
///
/// Two conventions are recognized: the `time=` key of ffmpeg's stats line and a
/// `progress=` trailer whose value is itself a timestamp.
pub fn extract_elapsed(line: &str) -> Option<f64> {
    keyed_timestamp(line, "time=").or_else(|| keyed_timestamp(line, "progress="))
}

fn keyed_timestamp(line: &str, key: &str) -> Option<f64> {
    let mut rest = line;
    while let Some(pos) = rest.find(key) {
        let after = &rest[pos + key.len()..];
        let value = after.split_whitespace().next().unwrap_or("");
        if let Some(secs) = parse_timestamp(value) {
            return Some(secs);
        }
        rest = after;
    }
    None
}

/// Estimate completion percentage from one log line.
///
/// Returns `None` when the line carries no timestamp or the duration is unknown,
/// in which case the caller keeps the previously displayed value.
///
/// The result is never below `previous_percent`, which is stronger than the
/// `[0, 100]` clamp alone: a stats line carrying an earlier timestamp than one
/// already seen cannot pull the value back. Callers reset `previous_percent`
/// to 0 at job start. [`ProgressTracker`] feeds its own last value here.
pub fn estimate(line: &str, known_duration_s: Option<f64>, previous_percent: f64) -> Option<f64> {
    let elapsed = extract_elapsed(line)?;
    let duration = known_duration_s.filter(|d| d.is_finite() && *d > 0.0)?;
    let pct = clamp_percent(elapsed / duration * 100.0)?;
    let floor = clamp_percent(previous_percent).unwrap_or(0.0);
    Some(pct.max(floor))
}

/// Percentage from an engine-computed ratio. Exact, so it takes precedence
/// over text-derived estimates.
pub fn estimate_from_ratio(ratio: f64) -> Option<f64> {
    clamp_percent(ratio * 100.0)
}

fn clamp_percent(pct: f64) -> Option<f64> {
    if !pct.is_finite() {
        return None;
    }
    Some(pct.clamp(0.0, 100.0))
}

/// Per-job progress state: applies estimates in arrival order and keeps the
/// percentage non-decreasing.
#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    percent: f64,
    structured: bool,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn percent(&self) -> f64 {
        self.percent
    }

    /// Feed a log line. Ignored once the engine has produced a structured ratio.
    pub fn observe_line(&mut self, line: &str, known_duration_s: Option<f64>) -> Option<f64> {
        if self.structured {
            return None;
        }
        let pct = estimate(line, known_duration_s, self.percent)?;
        self.percent = pct;
        Some(pct)
    }

    pub fn observe_ratio(&mut self, ratio: f64) -> Option<f64> {
        let pct = estimate_from_ratio(ratio)?;
        self.structured = true;
        self.percent = self.percent.max(pct);
        Some(self.percent)
    }

    pub fn complete(&mut self) {
        self.percent = 100.0;
    }
}
