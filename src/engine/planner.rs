// Filter plan construction for the dark-to-light transform

use serde::{Deserialize, Serialize};

use crate::job::SourceArtifact;

/// Name the input is written under in the engine's working storage.
pub const INPUT_NAME: &str = "input.mp4";
/// Name the engine writes its result to.
pub const OUTPUT_NAME: &str = "output.mp4";

/// Fixed tonal chain: invert, rotate hue back, then lift contrast and saturation.
pub const TONAL_CHAIN: &str = "negate,hue=h=180,eq=contrast=1.2:saturation=1.1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanMode {
    #[default]
    Normal,
    Fast,
}

impl PlanMode {
    pub fn toggled(self) -> Self {
        match self {
            Self::Normal => Self::Fast,
            Self::Fast => Self::Normal,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::Fast => "Fast",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterPlan {
    pub engine_arguments: Vec<String>,
    /// Planned output dimensions, when the source dimensions were known.
    pub target: Option<(u32, u32)>,
}

impl FilterPlan {
    pub fn target_dimensions(&self) -> Option<(u32, u32)> {
        self.target
    }

    /// Shell-quoted rendering for display and dry runs.
    pub fn to_command_line(&self, program: &str) -> String {
        let mut parts = Vec::with_capacity(self.engine_arguments.len() + 1);
        parts.push(program);
        parts.extend(self.engine_arguments.iter().map(String::as_str));
        shlex::try_join(parts.iter().copied()).unwrap_or_else(|_| parts.join(" "))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerConfig {
    pub budget_width: u32,
    pub budget_height: u32,
    pub fast_preset: String,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            budget_width: 1920,
            budget_height: 1080,
            fast_preset: "ultrafast".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FilterPlanner {
    config: PlannerConfig,
}

impl FilterPlanner {
    pub fn new(config: PlannerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn plan(&self, source: &SourceArtifact, mode: PlanMode) -> FilterPlan {
        self.plan_for_dimensions(source.width(), source.height(), mode)
    }

    /// Plan from raw dimensions. Zero means "not yet decoded".
    pub fn plan_for_dimensions(&self, width: u32, height: u32, mode: PlanMode) -> FilterPlan {
        let (geometry, target) = if width == 0 || height == 0 {
            (self.expression_geometry(mode), None)
        } else {
            let (content_w, content_h) = match mode {
                PlanMode::Normal => (width, height),
                PlanMode::Fast => self.fit_to_budget(width, height),
            };
            let target = (even_up(content_w), even_up(content_h));
            (
                format!(
                    "scale={}:{},pad={}:{}:(ow-iw)/2:(oh-ih)/2",
                    content_w, content_h, target.0, target.1
                ),
                Some(target),
            )
        };

        let mut args: Vec<String> = vec![
            "-i".into(),
            INPUT_NAME.into(),
            "-vf".into(),
            format!("{},{}", geometry, TONAL_CHAIN),
        ];
        if mode == PlanMode::Fast {
            args.push("-preset".into());
            args.push(self.config.fast_preset.clone());
        }
        args.push(OUTPUT_NAME.into());

        FilterPlan {
            engine_arguments: args,
            target,
        }
    }

    /// Downscale so neither edge exceeds the budget's corresponding edge,
    /// only when the pixel count is over budget.
    fn fit_to_budget(&self, width: u32, height: u32) -> (u32, u32) {
        let bw = self.config.budget_width.max(2);
        let bh = self.config.budget_height.max(2);
        let pixels = width as u64 * height as u64;
        if pixels <= bw as u64 * bh as u64 {
            return (width, height);
        }

        let factor = (bw as f64 / width as f64).min(bh as f64 / height as f64);
        let w = ((width as f64 * factor).floor() as u32).clamp(2, bw);
        let h = ((height as f64 * factor).floor() as u32).clamp(2, bh);
        // Keep the even round-up from pushing past an odd budget edge
        (fit_even(w, bw), fit_even(h, bh))
    }

    /// Dimension-agnostic geometry evaluated by the engine itself.
    fn expression_geometry(&self, mode: PlanMode) -> String {
        match mode {
            PlanMode::Normal => {
                "scale=ceil(iw/2)*2:ceil(ih/2)*2,pad=ceil(iw/2)*2:ceil(ih/2)*2:(ow-iw)/2:(oh-ih)/2"
                    .to_string()
            }
            PlanMode::Fast => format!(
                "scale='min({},iw)':'min({},ih)':force_original_aspect_ratio=decrease:force_divisible_by=2",
                self.config.budget_width, self.config.budget_height
            ),
        }
    }
}

/// Round up to the nearest even integer.
pub fn even_up(n: u32) -> u32 {
    n.saturating_add(n % 2)
}

fn fit_even(n: u32, limit: u32) -> u32 {
    if even_up(n) > limit { n - 1 } else { n }
}
