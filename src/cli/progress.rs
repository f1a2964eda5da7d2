//! Terminal progress rendering for setup and fitting runs
//!
//! Thin indicatif wrappers fed by the orchestrator event channels. Log lines
//! are printed above the bar so streamed subprocess output stays readable
//! while the bar keeps redrawing.

use indicatif::{ProgressBar, ProgressStyle};

use crate::app::fitting::FitEvent;
use crate::app::setup::{SetupEvent, SetupPhase};
use crate::constants::ticks;

fn percent_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {percent:>3}% {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-")
}

/// Progress bar for the setup sequence
pub struct SetupProgress {
    bar: ProgressBar,
    quiet: bool,
    /// Last failure message seen, kept for the final report
    failure: Option<String>,
}

impl SetupProgress {
    pub fn new(quiet: bool) -> Self {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            let bar = ProgressBar::new(100);
            bar.set_style(percent_style());
            bar.enable_steady_tick(ticks::PROGRESS_REFRESH);
            bar
        };
        Self {
            bar,
            quiet,
            failure: None,
        }
    }

    /// Fold one coordinator event into the display
    pub fn handle(&mut self, event: &SetupEvent) {
        match event {
            SetupEvent::TaskStarted { name } => {
                self.bar.set_position(0);
                self.bar.set_message(name.clone());
                if !self.quiet {
                    self.bar.println(format!("→ {}", name));
                }
            }
            SetupEvent::TaskProgress {
                name,
                progress,
                detail,
            } => {
                self.bar.set_position((progress * 100.0) as u64);
                if detail.is_empty() {
                    self.bar.set_message(name.clone());
                } else {
                    self.bar.set_message(format!("{}: {}", name, detail));
                }
            }
            SetupEvent::TaskCompleted { name } => {
                self.bar.set_position(100);
                if !self.quiet {
                    self.bar.println(format!("✓ {}", name));
                }
            }
            SetupEvent::TaskFailed { name, message } => {
                self.failure = Some(message.clone());
                self.bar.println(format!("✗ {}: {}", name, message));
            }
            SetupEvent::SequenceFinished { phase } => {
                let message = match phase {
                    SetupPhase::Finished => "Setup complete",
                    SetupPhase::Cancelled => "Setup cancelled",
                    SetupPhase::Failed => "Setup failed",
                    _ => "Setup stopped",
                };
                self.bar.finish_with_message(message.to_string());
            }
            SetupEvent::StateChanged => {}
        }
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }
}

/// Progress bar for a fitting run
pub struct FitProgress {
    bar: ProgressBar,
    quiet: bool,
}

impl FitProgress {
    pub fn new(quiet: bool) -> Self {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            let bar = ProgressBar::new(100);
            bar.set_style(percent_style());
            bar.enable_steady_tick(ticks::PROGRESS_REFRESH);
            bar
        };
        Self { bar, quiet }
    }

    /// Fold one runner event into the display
    pub fn handle(&mut self, event: &FitEvent) {
        match event {
            FitEvent::Log(line) => {
                if !self.quiet {
                    self.bar.println(line.clone());
                }
            }
            FitEvent::Status(status) => {
                self.bar.set_message(status.clone());
            }
            FitEvent::StepChanged { current, total } => {
                if !self.quiet {
                    self.bar.println(format!("— step {}/{} —", current, total));
                }
            }
            FitEvent::Progress { overall, detail } => {
                self.bar.set_position((overall * 100.0) as u64);
                if let Some(detail) = detail {
                    self.bar.set_message(detail.clone());
                }
            }
            FitEvent::StateChanged => {}
        }
    }

    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}
