//! `[tokens]`: default response-mode budgets and the safety buffer
//! subtracted from them.

use serde::Deserialize;

const DEFAULT_SUMMARY_BUDGET: u64 = 5_000;
const DEFAULT_FULL_BUDGET: u64 = 24_000;

/// Mirrors `tokenizer::SafetyMode`'s three absolute buffers. Kept as a
/// separate enum here (rather than a dependency on `tokenizer`) so this
/// crate stays a plain description of the file format; the binary that
/// wires `Config` into the running framework maps this to
/// `tokenizer::SafetyMode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SafetyMode {
    #[default]
    Default,
    Conservative,
    Minimal,
}

/// Percentage-based alternative to `safety_mode`: `safety_percent` of the
/// total budget, clamped to `[min_buf, max_buf]`.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SafetyPercentConfig {
    pub percent: f64,
    pub min_buf: u64,
    pub max_buf: u64,
}

impl Default for SafetyPercentConfig {
    fn default() -> Self {
        Self { percent: 0.1, min_buf: 1_000, max_buf: 10_000 }
    }
}

/// Token-budget defaults for the response builder.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TokensConfig {
    /// Default budget for `response_mode = "summary"`.
    pub summary_budget: u64,
    /// Default budget for `response_mode = "full"`.
    pub full_budget: u64,
    /// Absolute safety buffer, used unless `safety_percent` is set.
    pub safety_mode: SafetyMode,
    /// Percentage-based safety buffer. Overrides `safety_mode` when present.
    pub safety_percent: Option<SafetyPercentConfig>,
}

impl Default for TokensConfig {
    fn default() -> Self {
        Self {
            summary_budget: DEFAULT_SUMMARY_BUDGET,
            full_budget: DEFAULT_FULL_BUDGET,
            safety_mode: SafetyMode::default(),
            safety_percent: None,
        }
    }
}
