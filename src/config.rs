// Global configuration management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::engine::{EngineResources, PlanMode, PlannerConfig, SessionConfig};
use crate::job::{ControllerConfig, LogRetention};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub planner: PlannerSection,

    #[serde(default)]
    pub logs: LogsConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// ffmpeg binary (name on PATH or absolute path)
    #[serde(default = "default_core")]
    pub core: String,

    /// ffprobe binary used to decode source metadata
    #[serde(default = "default_probe")]
    pub probe: String,

    /// Log lines attached to an execution failure
    #[serde(default = "default_tail_lines")]
    pub tail_lines: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerSection {
    #[serde(default = "default_budget_width")]
    pub budget_width: u32,

    #[serde(default = "default_budget_height")]
    pub budget_height: u32,

    #[serde(default = "default_fast_preset")]
    pub fast_preset: String,

    /// Start in fast mode
    #[serde(default)]
    pub fast_mode: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogsConfig {
    #[serde(default)]
    pub retention: LogRetention,

    /// 0 keeps every line
    #[serde(default = "default_max_lines")]
    pub max_lines: usize,

    /// Rows from the bottom of the log panel still treated as following
    #[serde(default = "default_near_bottom_threshold")]
    pub near_bottom_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_file_name")]
    pub file_name: String,
}

fn default_core() -> String {
    "ffmpeg".to_string()
}

fn default_probe() -> String {
    "ffprobe".to_string()
}

fn default_tail_lines() -> usize {
    20
}

fn default_budget_width() -> u32 {
    1920
}

fn default_budget_height() -> u32 {
    1080
}

fn default_fast_preset() -> String {
    "ultrafast".to_string()
}

fn default_max_lines() -> usize {
    crate::job::DEFAULT_MAX_LINES
}

fn default_near_bottom_threshold() -> f64 {
    3.0
}

fn default_output_file_name() -> String {
    "output.mp4".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            core: default_core(),
            probe: default_probe(),
            tail_lines: default_tail_lines(),
        }
    }
}

impl Default for PlannerSection {
    fn default() -> Self {
        Self {
            budget_width: default_budget_width(),
            budget_height: default_budget_height(),
            fast_preset: default_fast_preset(),
            fast_mode: false,
        }
    }
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            retention: LogRetention::default(),
            max_lines: default_max_lines(),
            near_bottom_threshold: default_near_bottom_threshold(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            file_name: default_output_file_name(),
        }
    }
}

impl Config {
    /// Get the path to the config file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = if cfg!(target_os = "macos") {
            dirs::home_dir()
                .context("Could not determine home directory")?
                .join(".config")
                .join("lightmode")
        } else {
            dirs::config_dir()
                .context("Could not determine config directory")?
                .join("lightmode")
        };

        Ok(config_dir.join("config.toml"))
    }

    /// Load config from disk, or create default if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Config::default();

            // A read-only config dir still leaves us with usable defaults
            if let Err(e) = config.save() {
                tracing::warn!(error = %e, "could not create default config file");
                eprintln!("Warning: Could not create default config file: {}", e);
                eprintln!(
                    "Using built-in defaults. Run 'lightmode init-config' to create a config file."
                );
            }

            Ok(config)
        }
    }

    /// Load, falling back to defaults. A load error is reported, never dropped.
    pub fn load_or_default() -> Self {
        Self::or_default_with_warning(Self::load())
    }

    fn or_default_with_warning(result: Result<Self>) -> Self {
        result.unwrap_or_else(|e| {
            tracing::warn!(error = %format!("{:#}", e), "config unusable, using defaults");
            eprintln!("Warning: {:#}", e);
            eprintln!("Using built-in defaults.");
            Config::default()
        })
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Save config to disk
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }

    /// Check if config file exists
    pub fn exists() -> bool {
        Self::config_path().map(|p| p.exists()).unwrap_or(false)
    }

    /// Create a default config file if it doesn't exist
    pub fn ensure_default() -> Result<()> {
        if !Self::exists() {
            Config::default().save()?;
        }
        Ok(())
    }

    pub fn engine_resources(&self) -> EngineResources {
        EngineResources::new(&self.engine.core)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            tail_lines: self.engine.tail_lines,
        }
    }

    pub fn planner_config(&self) -> PlannerConfig {
        PlannerConfig {
            budget_width: self.planner.budget_width,
            budget_height: self.planner.budget_height,
            fast_preset: self.planner.fast_preset.clone(),
        }
    }

    pub fn initial_mode(&self) -> PlanMode {
        if self.planner.fast_mode {
            PlanMode::Fast
        } else {
            PlanMode::Normal
        }
    }

    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            retention: self.logs.retention,
            output_file_name: self.output.file_name.clone(),
            max_log_lines: Some(self.logs.max_lines).filter(|n| *n > 0),
            near_bottom_threshold: self.logs.near_bottom_threshold,
        }
    }
}
