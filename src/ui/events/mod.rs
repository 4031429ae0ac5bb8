// Event handling and main UI loop

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::engine::{PlanMode, probe_source};
use crate::job::{ControllerState, MetadataSender, SourceId, TempDirPublisher};
use crate::ui::{
    Dashboard,
    state::{AppState, InputMode, LogView},
};

const PAGE_ROWS: isize = 10;

// Event types sent from dedicated event thread to main loop
enum UiEvent {
    Input(Event), // Keyboard, mouse, or other terminal events
    Tick,         // Periodic redraw so engine output shows up promptly
}

/// Spawn a dedicated thread for event polling.
fn spawn_event_thread(tx: mpsc::Sender<UiEvent>) {
    let tick_rate = Duration::from_millis(16); // ~60 FPS

    thread::spawn(move || {
        let mut last_tick = Instant::now();
        loop {
            let timeout = tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or(Duration::from_secs(0));

            if event::poll(timeout).unwrap_or(false) {
                if let Ok(evt) = event::read() {
                    if tx.send(UiEvent::Input(evt)).is_err() {
                        break; // Main thread dropped the receiver
                    }
                }
            }

            if last_tick.elapsed() >= tick_rate {
                if tx.send(UiEvent::Tick).is_err() {
                    break;
                }
                last_tick = Instant::now();
            }
        }
    });
}

/// Decode metadata off the UI thread; the result is routed through the controller.
fn spawn_probe_thread(probe_bin: String, path: PathBuf, source_id: SourceId, sender: MetadataSender) {
    thread::spawn(move || {
        let result = probe_source(&probe_bin, &path).map_err(|e| format!("{:#}", e));
        sender.send(source_id, result);
    });
}

pub fn run_ui_with_options(
    file: Option<PathBuf>,
    mode: Option<PlanMode>,
    config: &Config,
) -> io::Result<()> {
    let publisher = TempDirPublisher::new().map_err(|e| io::Error::other(format!("{:#}", e)))?;
    let mut controller = crate::native_controller(config, Box::new(publisher));
    if let Some(mode) = mode {
        controller.set_mode(mode);
    }

    let mut app_state = AppState::new(
        controller,
        config.engine_resources(),
        config.engine.probe.clone(),
    );
    app_state.pending_file = file;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let (event_tx, event_rx) = mpsc::channel();
    spawn_event_thread(event_tx);

    let result = run_app(&mut terminal, &mut app_state, event_rx);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    state: &mut AppState,
    event_rx: Receiver<UiEvent>,
) -> io::Result<()> {
    loop {
        let mut pending_inputs: Vec<Event> = Vec::new();

        // Always block for at least one event, then drain the queue
        match event_rx.recv() {
            Ok(UiEvent::Input(ev)) => pending_inputs.push(ev),
            Ok(UiEvent::Tick) => {}
            Err(_) => return Ok(()),
        }
        while let Ok(evt) = event_rx.try_recv() {
            if let UiEvent::Input(ev) = evt {
                pending_inputs.push(ev);
            }
        }

        // Process input first so commands are never stuck behind a tick backlog
        for input in pending_inputs {
            if let Event::Key(key) = input {
                if key.kind == KeyEventKind::Press && handle_key(key, state) {
                    return Ok(());
                }
            }
        }

        state.controller.pump();
        accept_pending_file(state);

        terminal.draw(|frame| Dashboard::render(frame, state))?;
    }
}

fn accept_pending_file(state: &mut AppState) {
    if !state.controller.session().is_ready() || state.controller.state() == ControllerState::Running {
        return;
    }
    if let Some(path) = state.pending_file.take() {
        open_file(state, &path);
    }
}

fn should_quit(key: &KeyEvent) -> bool {
    matches!(key.code, KeyCode::Char('q') | KeyCode::Char('Q'))
        || (key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL))
}

/// Returns true when the app should exit.
pub(crate) fn handle_key(key: KeyEvent, state: &mut AppState) -> bool {
    if state.input_mode == InputMode::Editing {
        handle_prompt_key(key, state);
        return false;
    }

    if should_quit(&key) {
        return true;
    }

    state.notice = None;
    match key.code {
        KeyCode::Char('i') | KeyCode::Char('I') => {
            let resources = state.resources.clone();
            if let Err(e) = state.controller.initialize_engine(resources) {
                state.notice = Some(e.user_message());
            }
        }
        KeyCode::Char('o') | KeyCode::Char('O') => {
            state.input_mode = InputMode::Editing;
        }
        KeyCode::Char('f') | KeyCode::Char('F') => {
            let mode = state.controller.mode().toggled();
            state.controller.set_mode(mode);
        }
        KeyCode::Char('t') | KeyCode::Char('T') | KeyCode::Enter => {
            if let Err(e) = state.controller.transcode() {
                state.notice = Some(e.user_message());
            }
        }
        KeyCode::Char('s') | KeyCode::Char('S') => {
            let dir = state.save_dir.clone();
            state.notice = Some(match state.controller.save_output(&dir) {
                Ok(path) => format!("Saved: {}", path.display()),
                Err(e) => e.user_message(),
            });
        }
        KeyCode::Char('l') | KeyCode::Char('L') => {
            state.logs_expanded = !state.logs_expanded;
        }
        KeyCode::Up => state.scroll_logs(|v| v.scroll_by(-1)),
        KeyCode::Down => state.scroll_logs(|v| v.scroll_by(1)),
        KeyCode::PageUp => state.scroll_logs(|v| v.scroll_by(-PAGE_ROWS)),
        KeyCode::PageDown => state.scroll_logs(|v| v.scroll_by(PAGE_ROWS)),
        KeyCode::Home => state.scroll_logs(|v| v.scroll_to_top()),
        KeyCode::End => state.scroll_logs(|v| v.scroll_to_bottom()),
        _ => {}
    }
    false
}

fn handle_prompt_key(key: KeyEvent, state: &mut AppState) {
    match key.code {
        KeyCode::Esc => {
            state.input_mode = InputMode::Normal;
        }
        KeyCode::Enter => {
            state.input_mode = InputMode::Normal;
            let input = std::mem::take(&mut state.path_input);
            let path = PathBuf::from(input.trim());
            if !path.as_os_str().is_empty() {
                open_file(state, &path);
            }
        }
        KeyCode::Backspace => {
            state.path_input.pop();
        }
        KeyCode::Char(c) => state.path_input.push(c),
        _ => {}
    }
}

fn open_file(state: &mut AppState, path: &Path) {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to read file");
            state.notice = Some(format!("Could not open {}: {}", path.display(), e));
            return;
        }
    };

    match state.controller.accept_file(&name, bytes) {
        Ok(source_id) => {
            // A fresh file starts at the top and following again
            state.scroll_logs(|v| *v = LogView::default());
            spawn_probe_thread(
                state.probe_bin.clone(),
                path.to_path_buf(),
                source_id,
                state.controller.metadata_sender(),
            );
        }
        Err(e) => state.notice = Some(e.user_message()),
    }
}
