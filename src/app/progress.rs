//! Progress extraction from fitter core log output
//!
//! The core prints status lines of the shape `Status: [stage] (3/10) detail`;
//! the counter in parentheses drives the per-step fraction and the trailing
//! text becomes the human-readable detail.

use once_cell::sync::Lazy;
use regex::Regex;

static STEP_COUNTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\((\d+)/(\d+)\)").expect("valid counter pattern"));

static STATUS_DETAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Status: \[.*\] \(\d+/\d+\) (.*)").expect("valid status pattern"));

/// What one log line contributed to progress, if anything
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressSample {
    pub has_update: bool,
    pub step_fraction: f32,
    pub detail: Option<String>,
}

/// Parse one log line for a progress counter and status detail
///
/// The counter and the detail are extracted independently: a zero total
/// suppresses the fraction (`has_update == false`) but not the detail. The
/// fraction is clamped to `[0, 1]`.
pub fn parse(line: &str) -> ProgressSample {
    let detail = STATUS_DETAIL
        .captures(line)
        .map(|c| c[1].trim().to_string())
        .filter(|d| !d.is_empty());

    let mut sample = ProgressSample {
        detail,
        ..ProgressSample::default()
    };

    if let Some(captures) = STEP_COUNTER.captures(line) {
        let current: u64 = captures[1].parse().unwrap_or(0);
        let total: u64 = captures[2].parse().unwrap_or(0);
        if total > 0 {
            sample.has_update = true;
            sample.step_fraction = (current as f32 / total as f32).clamp(0.0, 1.0);
        }
    }

    sample
}

/// Coarse lifecycle state derived from the runner's observable surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    Idle,
    Processing,
    Completed,
    Error,
}

impl ExecutionState {
    /// Classify from whether a run is active and the last summary text
    pub fn derive(is_fitting: bool, last_summary: Option<&str>) -> Self {
        if is_fitting {
            return Self::Processing;
        }
        match last_summary {
            None => Self::Idle,
            Some(summary) => {
                let lower = summary.to_lowercase();
                if lower.contains("success") || lower.contains("completed") {
                    Self::Completed
                } else if lower.contains("fail") || lower.contains("error") {
                    Self::Error
                } else {
                    Self::Idle
                }
            }
        }
    }
}
