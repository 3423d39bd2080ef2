//! Terminal progress for the install pipeline.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use gravity_pm::PipelineEvent;

const TICK: Duration = Duration::from_millis(100);

/// Renders [`PipelineEvent`]s as a spinner that turns into a download bar
/// once the artifact size is known.
pub struct PipelineProgress {
    bar: ProgressBar,
}

impl PipelineProgress {
    pub fn new(enabled: bool) -> Self {
        let bar = if enabled {
            let bar = ProgressBar::new_spinner();
            bar.set_style(spinner_style());
            bar.enable_steady_tick(TICK);
            bar
        } else {
            ProgressBar::hidden()
        };

        Self { bar }
    }

    pub fn handle(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::Stage(stage) => {
                log::trace!("Stage {}", stage);
            }
            PipelineEvent::Resolved { version, .. } => {
                self.bar.set_message(format!("Downloading Gravity {}", version));
            }
            PipelineEvent::Downloading { downloaded, total } => {
                if *total > 0 && self.bar.length() != Some(*total) {
                    self.bar.set_length(*total);
                    self.bar.set_style(download_style());
                }
                self.bar.set_position(*downloaded);
            }
            PipelineEvent::Extracting { .. } => {
                self.bar.set_style(spinner_style());
                self.bar.set_message("Extracting framework files");
            }
        }
    }

    /// Print a line to stdout, clearing the bar around it
    pub fn println(&self, message: impl AsRef<str>) {
        self.bar.suspend(|| println!("{}", message.as_ref()));
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn download_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}")
        .map(|style| style.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}
