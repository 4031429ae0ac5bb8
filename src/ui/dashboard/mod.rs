// Main screen: engine/file status, progress, logs, controls

use crate::engine::EnginePhase;
use crate::job::{ControllerState, MetadataState};
use crate::ui::components::{Control, Footer};
use crate::ui::state::{AppState, InputMode};
use crate::ui::widgets::{EnhancedProgress, ProgressState};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
};

pub struct Dashboard;

impl Dashboard {
    pub fn render(frame: &mut Frame, state: &mut AppState) {
        let area = frame.area();

        let log_constraint = if state.logs_expanded {
            Constraint::Min(5)
        } else {
            Constraint::Length(3)
        };

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1), // Header
                Constraint::Length(6), // Source / output
                Constraint::Length(3), // Progress
                Constraint::Length(3), // Status or path prompt
                log_constraint,        // Logs
                Constraint::Length(1), // Footer
            ])
            .split(area);

        Self::render_header(frame, chunks[0], state);
        Self::render_source(frame, chunks[1], state);
        Self::render_progress(frame, chunks[2], state);
        if state.input_mode == InputMode::Editing {
            Self::render_prompt(frame, chunks[3], state);
        } else {
            Self::render_status(frame, chunks[3], state);
        }
        Self::render_logs(frame, chunks[4], state);
        Self::footer(state).render(chunks[5], frame.buffer_mut());
    }

    fn render_header(frame: &mut Frame, area: Rect, state: &AppState) {
        let controller = &state.controller;
        let phase = match controller.session().phase() {
            EnginePhase::Unloaded => ("not loaded", Color::Gray),
            EnginePhase::Loading => ("loading...", Color::Yellow),
            EnginePhase::Ready => ("ready", Color::Green),
            EnginePhase::LoadFailed => ("load failed", Color::Red),
        };
        let line = Line::from(vec![
            Span::styled(" lightmode ", Style::default().bold().fg(Color::Black).bg(Color::White)),
            Span::raw("  Engine: "),
            Span::styled(phase.0, Style::default().fg(phase.1)),
            Span::raw("  Mode: "),
            Span::styled(controller.mode().label(), Style::default().fg(Color::Cyan)),
            Span::raw(format!("  State: {:?}", controller.state())),
        ]);
        frame.render_widget(Paragraph::new(line), area);
    }

    fn render_source(frame: &mut Frame, area: Rect, state: &AppState) {
        let controller = &state.controller;
        let mut lines = Vec::new();

        match controller.source() {
            Some(source) => {
                lines.push(Line::from(format!(
                    "File:     {} ({})",
                    source.name,
                    format_size(source.bytes.len())
                )));
                let meta = match &source.metadata {
                    MetadataState::Pending => "reading metadata...".to_string(),
                    MetadataState::Decoded(m) => {
                        let duration = m
                            .duration_s
                            .map(|d| format!("{:.1}s", d))
                            .unwrap_or_else(|| "unknown duration".to_string());
                        format!("{}x{}, {}", m.width, m.height, duration)
                    }
                    MetadataState::Failed(reason) => format!("unreadable ({})", reason),
                };
                lines.push(Line::from(format!("Video:    {}", meta)));
                lines.push(Line::from(format!("Preview:  {}", source.display_url)));
            }
            None => lines.push(Line::from("No video selected.".dark_gray())),
        }

        if let Some(output) = controller.output() {
            lines.push(Line::from(vec![
                Span::raw("Output:   "),
                Span::styled(
                    format!("{} ({})", output.display_url, format_size(output.bytes.len())),
                    Style::default().fg(Color::Green),
                ),
            ]));
        }

        let block = Block::default().borders(Borders::ALL).title(" Video ");
        frame.render_widget(Paragraph::new(lines).block(block), area);
    }

    fn render_progress(frame: &mut Frame, area: Rect, state: &AppState) {
        let controller = &state.controller;
        let pct = controller.progress_pct();
        let progress_state = match controller.state() {
            ControllerState::Running => ProgressState::Running,
            ControllerState::Succeeded => ProgressState::Done,
            ControllerState::Failed => ProgressState::Failed,
            _ => ProgressState::Idle,
        };

        let block = Block::default().borders(Borders::ALL).title(" Progress ");
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let label = format!(" {:>5.1}%", pct);
        let bar_width = inner.width.saturating_sub(label.len() as u16);
        let bar = Rect::new(inner.x, inner.y, bar_width, inner.height.min(1));
        let text = Rect::new(inner.x + bar_width, inner.y, inner.width - bar_width, inner.height.min(1));

        EnhancedProgress::new(pct, progress_state).render(bar, frame.buffer_mut());
        frame.render_widget(Paragraph::new(label), text);
    }

    fn render_status(frame: &mut Frame, area: Rect, state: &AppState) {
        let line = if let Some(message) = state.controller.error_message() {
            Line::from(Span::styled(message, Style::default().fg(Color::Red)))
        } else if let Some(notice) = &state.notice {
            Line::from(Span::styled(notice.clone(), Style::default().fg(Color::Green)))
        } else {
            Line::from(hint(state).dark_gray())
        };
        let block = Block::default().borders(Borders::ALL).title(" Status ");
        frame.render_widget(Paragraph::new(line).block(block), area);
    }

    fn render_prompt(frame: &mut Frame, area: Rect, state: &AppState) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(" Open video ")
            .border_style(Style::default().fg(Color::Yellow));
        let line = Line::from(vec![
            Span::raw(state.path_input.clone()),
            Span::styled("_", Style::default().add_modifier(Modifier::SLOW_BLINK)),
        ]);
        frame.render_widget(Paragraph::new(line).block(block), area);
    }

    fn render_logs(frame: &mut Frame, area: Rect, state: &mut AppState) {
        let following = state.controller.logs().is_following();
        let title = format!(
            " Logs ({}{}) ",
            state.controller.logs().len(),
            if following { ", following" } else { ", paused" }
        );
        let block = Block::default().borders(Borders::ALL).title(title);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let logs = state.controller.logs();
        if !state.logs_expanded {
            let last = logs.tail(1).pop().unwrap_or_default();
            frame.render_widget(Paragraph::new(last).dark_gray(), inner);
            return;
        }

        let content = logs.len();
        state.log_view.resize(content, inner.height as usize);
        if state.controller.logs_mut().take_scroll_request() {
            state.log_view.scroll_to_bottom();
        }

        let lines: Vec<Line> = state
            .controller
            .logs()
            .iter()
            .skip(state.log_view.offset)
            .take(inner.height as usize)
            .map(|l| Line::from(l.text.clone()))
            .collect();
        frame.render_widget(Paragraph::new(lines), inner);
    }

    fn footer(state: &AppState) -> Footer {
        if state.input_mode == InputMode::Editing {
            return Footer::prompt();
        }
        let controller = &state.controller;
        let c_state = controller.state();
        Footer::with_controls(
            "",
            &[
                Control::new("[I]", "nit engine", c_state == ControllerState::Idle),
                Control::new(
                    "[O]",
                    "pen",
                    controller.session().is_ready() && c_state != ControllerState::Running,
                ),
                Control::new("[F]", "ast mode", true),
                Control::new("[T]", "ranscode", controller.can_transcode()),
                Control::new("[S]", "ave", controller.output().is_some()),
                Control::new("[L]", "ogs", true),
                Control::new("[Q]", "uit", true),
            ],
        )
    }
}

fn hint(state: &AppState) -> String {
    match state.controller.state() {
        ControllerState::Idle => "Press I to load the converter.".to_string(),
        ControllerState::EngineLoading => "Loading converter...".to_string(),
        ControllerState::EngineReady => "Press O to open a video.".to_string(),
        ControllerState::FileSelected => "Press T to convert.".to_string(),
        ControllerState::Running => "Converting...".to_string(),
        ControllerState::Succeeded => "Done. Press S to save the result.".to_string(),
        ControllerState::Failed => "Conversion failed.".to_string(),
    }
}

pub fn format_size(bytes: usize) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    let b = bytes as f64;
    if b >= MB {
        format!("{:.1} MB", b / MB)
    } else if b >= KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{} B", bytes)
    }
}
