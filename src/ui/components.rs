// Reusable UI components

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget},
};

/// One hotkey hint; disabled controls render dimmed.
#[derive(Debug, Clone, Copy)]
pub struct Control {
    pub hotkey: &'static str,
    pub label: &'static str,
    pub enabled: bool,
}

impl Control {
    pub const fn new(hotkey: &'static str, label: &'static str, enabled: bool) -> Self {
        Self {
            hotkey,
            label,
            enabled,
        }
    }
}

pub struct Footer {
    content: Line<'static>,
}

impl Footer {
    pub fn with_controls(prefix: &str, controls: &[Control]) -> Self {
        let mut spans = vec![Span::raw(prefix.to_string())];

        for (i, control) in controls.iter().enumerate() {
            if i > 0 {
                spans.push(Span::raw("  "));
            }
            let (key_style, label_style) = if control.enabled {
                (Style::default().fg(Color::Yellow), Style::default())
            } else {
                (
                    Style::default().fg(Color::Gray),
                    Style::default().fg(Color::Gray),
                )
            };
            spans.push(Span::styled(control.hotkey, key_style));
            spans.push(Span::styled(control.label, label_style));
        }

        Self {
            content: Line::from(spans),
        }
    }

    pub fn prompt() -> Self {
        Self::with_controls(
            "PATH: ",
            &[
                Control::new("[Enter]", " Open", true),
                Control::new("[Esc]", " Cancel", true),
            ],
        )
    }

    pub fn text(&self) -> String {
        self.content
            .spans
            .iter()
            .map(|s| s.content.as_ref())
            .collect()
    }
}

impl Widget for Footer {
    fn render(self, area: Rect, buf: &mut Buffer) {
        Paragraph::new(self.content)
            .style(Style::default().bg(Color::DarkGray))
            .render(area, buf);
    }
}
