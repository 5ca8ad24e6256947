//! Operator-facing progress output: a spinner for the running step plus
//! decorated status lines.

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;

/// Spinner and status lines in the style of a terminal task runner
#[derive(Debug)]
pub struct StatusReporter {
    spinner: Mutex<Option<ProgressBar>>,
    quiet: bool,
}

impl StatusReporter {
    pub fn new() -> Self {
        Self {
            spinner: Mutex::new(None),
            quiet: false,
        }
    }

    /// Reporter that prints nothing
    pub fn hidden() -> Self {
        Self {
            spinner: Mutex::new(None),
            quiet: true,
        }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .map(|style| style.tick_strings(&["∙∙∙", "●∙∙", "∙●∙", "∙∙●", "∙∙∙"]))
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }

    /// Start a spinner for a long running step
    pub fn start(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!("{}", message);
        if self.quiet {
            return;
        }

        let bar = ProgressBar::new_spinner().with_style(Self::spinner_style());
        bar.set_message(message);
        bar.enable_steady_tick(Duration::from_millis(120));
        if let Ok(mut slot) = self.spinner.lock() {
            if let Some(previous) = slot.replace(bar) {
                previous.finish_and_clear();
            }
        }
    }

    fn stop_spinner(&self) {
        if let Ok(mut slot) = self.spinner.lock() {
            if let Some(bar) = slot.take() {
                bar.finish_and_clear();
            }
        }
    }

    fn line(&self, symbol: colored::ColoredString, message: &str) {
        if self.quiet {
            return;
        }
        self.stop_spinner();
        println!("{} {}", symbol, message);
    }

    pub fn succeed(&self, message: impl AsRef<str>) {
        self.line("✔".green(), &message.as_ref().bright_green().to_string());
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.line("ℹ".blue(), message.as_ref());
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        self.line("⚠".yellow(), message.as_ref());
    }

    pub fn fail(&self, message: impl AsRef<str>) {
        self.line("✖".red(), message.as_ref());
    }

    /// Print a free-form block, pausing the spinner
    pub fn println(&self, message: impl AsRef<str>) {
        if self.quiet {
            return;
        }
        self.stop_spinner();
        println!("{}", message.as_ref());
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet
    }
}

impl Default for StatusReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for StatusReporter {
    fn drop(&mut self) {
        self.stop_spinner();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_reporter_never_starts_spinner() {
        let reporter = StatusReporter::hidden();
        reporter.start("Deploying contracts");
        reporter.succeed("Contracts deployed");
        assert!(reporter.is_quiet());
        assert!(reporter.spinner.lock().unwrap().is_none());
    }
}
