// Ordered diagnostic log with auto-follow tracking

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Distance from the bottom (in display units) still treated as "following".
pub const DEFAULT_NEAR_BOTTOM_THRESHOLD: f64 = 50.0;
pub const DEFAULT_MAX_LINES: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub sequence_index: u64,
    pub text: String,
}

/// Whether accepting a new file wipes the log history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogRetention {
    #[default]
    ClearOnNewFile,
    Preserve,
}

/// Viewport geometry reported by a scroll event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollPosition {
    /// Distance from the top of the content to the top of the viewport
    pub offset: f64,
    pub content_height: f64,
    pub viewport_height: f64,
}

impl ScrollPosition {
    pub fn distance_from_bottom(&self) -> f64 {
        (self.content_height - self.offset - self.viewport_height).max(0.0)
    }
}

#[derive(Debug, Clone)]
pub struct LogBuffer {
    lines: VecDeque<LogLine>,
    next_index: u64,
    max_lines: Option<usize>,
    threshold: f64,
    following: bool,
    scroll_request: bool,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new(Some(DEFAULT_MAX_LINES), DEFAULT_NEAR_BOTTOM_THRESHOLD)
    }
}

impl LogBuffer {
    pub fn new(max_lines: Option<usize>, near_bottom_threshold: f64) -> Self {
        Self {
            lines: VecDeque::new(),
            next_index: 0,
            max_lines: max_lines.filter(|n| *n > 0),
            threshold: near_bottom_threshold,
            following: true,
            scroll_request: false,
        }
    }

    /// Append a line, returning its sequence index.
    pub fn append(&mut self, text: impl Into<String>) -> u64 {
        let sequence_index = self.next_index;
        self.next_index += 1;

        if let Some(max) = self.max_lines {
            while self.lines.len() >= max {
                self.lines.pop_front();
            }
        }
        self.lines.push_back(LogLine {
            sequence_index,
            text: text.into(),
        });

        if self.following {
            self.scroll_request = true;
        }
        sequence_index
    }

    pub fn snapshot(&self) -> Vec<LogLine> {
        self.lines.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &LogLine> + ExactSizeIterator {
        self.lines.iter()
    }

    /// Lines with `sequence_index >= from`, for incremental rendering.
    pub fn lines_since(&self, from: u64) -> impl Iterator<Item = &LogLine> {
        let skip = match self.lines.front() {
            Some(first) if from > first.sequence_index => {
                (from - first.sequence_index).min(self.lines.len() as u64) as usize
            }
            _ => 0,
        };
        self.lines.iter().skip(skip)
    }

    /// The last `n` lines in order.
    pub fn tail(&self, n: usize) -> Vec<String> {
        let skip = self.lines.len().saturating_sub(n);
        self.lines.iter().skip(skip).map(|l| l.text.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.scroll_request = false;
    }

    /// Re-evaluate the follow flag from a user-driven scroll.
    pub fn on_scroll(&mut self, position: ScrollPosition) {
        self.following = position.distance_from_bottom() < self.threshold;
        if !self.following {
            self.scroll_request = false;
        }
    }

    pub fn is_following(&self) -> bool {
        self.following
    }

    /// Consume the pending scroll request: true when new lines arrived while
    /// following and the view should jump to the bottom.
    pub fn take_scroll_request(&mut self) -> bool {
        std::mem::take(&mut self.scroll_request)
    }
}
