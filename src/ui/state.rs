// Application state management

use std::path::PathBuf;

use crate::engine::EngineResources;
use crate::job::{JobController, ScrollPosition};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,  // Global shortcuts active
    Editing, // Path prompt active, shortcuts inactive
}

/// Scroll geometry of the log panel, in rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogView {
    pub offset: usize,
    pub content: usize,
    pub viewport: usize,
}

impl LogView {
    pub fn max_offset(&self) -> usize {
        self.content.saturating_sub(self.viewport)
    }

    pub fn scroll_by(&mut self, delta: isize) {
        let next = self.offset as isize + delta;
        self.offset = next.clamp(0, self.max_offset() as isize) as usize;
    }

    pub fn scroll_to_top(&mut self) {
        self.offset = 0;
    }

    pub fn scroll_to_bottom(&mut self) {
        self.offset = self.max_offset();
    }

    /// Update geometry after a render; keeps the offset in range.
    pub fn resize(&mut self, content: usize, viewport: usize) {
        self.content = content;
        self.viewport = viewport;
        self.offset = self.offset.min(self.max_offset());
    }

    pub fn position(&self) -> ScrollPosition {
        ScrollPosition {
            offset: self.offset as f64,
            content_height: self.content as f64,
            viewport_height: self.viewport as f64,
        }
    }
}

pub struct AppState {
    pub controller: JobController,
    pub resources: EngineResources,
    pub probe_bin: String,
    pub save_dir: PathBuf,
    pub input_mode: InputMode,
    pub path_input: String,
    /// Accepted automatically once the engine is ready
    pub pending_file: Option<PathBuf>,
    pub logs_expanded: bool,
    pub log_view: LogView,
    /// Transient status line ("Saved: ...")
    pub notice: Option<String>,
}

impl AppState {
    pub fn new(controller: JobController, resources: EngineResources, probe_bin: String) -> Self {
        Self {
            controller,
            resources,
            probe_bin,
            save_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            input_mode: InputMode::Normal,
            path_input: String::new(),
            pending_file: None,
            logs_expanded: true,
            log_view: LogView::default(),
            notice: None,
        }
    }

    /// Apply a user scroll to the view and re-evaluate auto-follow.
    pub fn scroll_logs(&mut self, apply: impl FnOnce(&mut LogView)) {
        apply(&mut self.log_view);
        let position = self.log_view.position();
        self.controller.logs_mut().on_scroll(position);
    }
}
