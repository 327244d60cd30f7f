use std::{
    sync::Mutex,
    time::{Duration, Instant},
};

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use shortcast_core::{PipelineError, PipelineObserver, Stage, UploadProgress};

use crate::format_duration;

pub fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

const UPLOAD_TEMPLATE: &str =
    "{spinner:.cyan} Uploading [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({eta})";

fn create_upload_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(UPLOAD_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn stage_message(stage: Stage) -> &'static str {
    match stage {
        Stage::Content => "Writing script...",
        Stage::Assets => "Fetching background...",
        Stage::Narration => "Recording narration...",
        Stage::Render => "Rendering video...",
        Stage::Publish => "Uploading...",
    }
}

fn stage_done(stage: Stage) -> &'static str {
    match stage {
        Stage::Content => "Script",
        Stage::Assets => "Background",
        Stage::Narration => "Narration",
        Stage::Render => "Rendered",
        Stage::Publish => "Uploaded",
    }
}

/// Spinner per stage, byte progress bar while uploading.
#[derive(Default)]
pub struct CliObserver {
    current: Mutex<Option<(ProgressBar, Instant)>>,
}

impl CliObserver {
    fn take(&self) -> Option<(ProgressBar, Instant)> {
        self.current.lock().ok().and_then(|mut current| current.take())
    }

    fn replace(&self, bar: ProgressBar, started: Instant) {
        if let Ok(mut current) = self.current.lock() {
            *current = Some((bar, started));
        }
    }
}

impl PipelineObserver for CliObserver {
    fn stage_started(&self, stage: Stage) {
        self.replace(create_spinner(stage_message(stage)), Instant::now());
    }

    fn stage_finished(&self, stage: Stage, summary: &str) {
        if let Some((pb, started)) = self.take() {
            pb.finish_and_clear();
            println!(
                "{} {}: {} {}",
                style("✓").green().bold(),
                stage_done(stage),
                summary,
                style(format!("[{}]", format_duration(started.elapsed()))).dim()
            );
        }
    }

    fn stage_failed(&self, stage: Stage, _error: &PipelineError) {
        if let Some((pb, _)) = self.take() {
            pb.finish_and_clear();
            println!("{} {} failed", style("✗").red().bold(), stage_done(stage));
        }
    }

    fn upload_progress(&self, progress: UploadProgress) {
        let Ok(mut current) = self.current.lock() else {
            return;
        };
        match current.as_ref() {
            Some((pb, _)) if pb.length() == Some(progress.total_bytes) => {
                pb.set_position(progress.sent_bytes);
            }
            _ => {
                // swap the stage spinner for a byte bar on first progress
                let started = match current.take() {
                    Some((spinner, started)) => {
                        spinner.finish_and_clear();
                        started
                    }
                    None => Instant::now(),
                };
                let bar = create_upload_bar(progress.total_bytes);
                bar.set_position(progress.sent_bytes);
                *current = Some((bar, started));
            }
        }
    }
}
