// Progress bar with per-phase styling

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::Widget,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressState {
    Idle,
    Running,
    Done,
    Failed,
}

pub struct EnhancedProgress {
    percent: f64,
    state: ProgressState,
}

impl EnhancedProgress {
    pub fn new(percent: f64, state: ProgressState) -> Self {
        Self {
            percent: percent.clamp(0.0, 100.0),
            state,
        }
    }

    fn filled_width(&self, width: u16) -> u16 {
        ((width as f64 * self.percent / 100.0).round() as u16).min(width)
    }
}

impl Widget for EnhancedProgress {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width == 0 || area.height == 0 {
            return;
        }
        let filled_width = self.filled_width(area.width);

        let (filled_symbol, unfilled_symbol, filled_fg, unfilled_fg) = match self.state {
            ProgressState::Running => ("█", "░", Color::White, Color::DarkGray),
            ProgressState::Done => ("█", " ", Color::Green, Color::Black),
            ProgressState::Failed => ("█", "░", Color::Red, Color::DarkGray),
            ProgressState::Idle => ("░", "░", Color::DarkGray, Color::Black),
        };

        for x in 0..area.width {
            let (symbol, fg) = if x < filled_width {
                (filled_symbol, filled_fg)
            } else {
                (unfilled_symbol, unfilled_fg)
            };
            buf.set_string(area.x + x, area.y, symbol, Style::default().fg(fg));
        }
    }
}
