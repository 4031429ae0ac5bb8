// Terminal UI using Ratatui

pub mod components;
pub mod dashboard;
pub mod events;
pub mod state;
pub mod widgets;

pub use dashboard::Dashboard;
pub use events::run_ui_with_options;
pub use state::AppState;
