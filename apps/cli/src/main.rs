use std::time::{Duration, Instant};

use anyhow::Result;
use clap::{Parser, ValueEnum};
use console::style;
use shortcast_core::{Pipeline, PipelineConfig, PipelineError, PrivacyStatus, RunOptions};
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

use crate::observer::CliObserver;

mod observer;

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        let whole = d.as_secs();
        format!("{}m {}s", whole / 60, whole % 60)
    }
}

/// CLI wrapper for PrivacyStatus (needed for clap ValueEnum)
#[derive(Clone, Copy, ValueEnum)]
enum CliPrivacy {
    Public,
    Unlisted,
    Private,
}

impl From<CliPrivacy> for PrivacyStatus {
    fn from(cli: CliPrivacy) -> Self {
        match cli {
            CliPrivacy::Public => PrivacyStatus::Public,
            CliPrivacy::Unlisted => PrivacyStatus::Unlisted,
            CliPrivacy::Private => PrivacyStatus::Private,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum CliTextSource {
    Quotes,
    Huggingface,
    Local,
}

impl CliTextSource {
    fn env_value(self) -> &'static str {
        match self {
            CliTextSource::Quotes => "quotes",
            CliTextSource::Huggingface => "huggingface",
            CliTextSource::Local => "local",
        }
    }
}

#[derive(Parser)]
#[command(name = "shortcast")]
#[command(about = "Script, render and upload a vertical short video")]
struct Cli {
    /// Topic for the script. Picked at random when omitted.
    #[arg(short, long)]
    topic: Option<String>,

    /// Use a stock video clip as background instead of a still image
    #[arg(long)]
    video: bool,

    /// Render only, keep the video and skip the upload
    #[arg(long)]
    skip_upload: bool,

    /// Keep the run directory after a successful upload
    #[arg(short, long)]
    keep_artifacts: bool,

    /// Seed for topic and stock media choice
    #[arg(long)]
    seed: Option<u64>,

    /// Privacy status of the uploaded video (overrides YT_PRIVACY)
    #[arg(short, long)]
    privacy: Option<CliPrivacy>,

    /// Where narration text comes from (overrides TEXT_SOURCE)
    #[arg(short, long)]
    source: Option<CliTextSource>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("shortcast=warn,shortcast_core=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn fail(err: impl std::fmt::Display) -> ! {
    eprintln!("{} {}", style("Error:").red().bold(), err);
    std::process::exit(1);
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let upload = !cli.skip_upload;

    // Validate configuration and credentials early
    let source_override = cli.source.map(CliTextSource::env_value);
    let config = PipelineConfig::from_lookup(
        |key| match (key, source_override) {
            ("TEXT_SOURCE", Some(source)) => Some(source.to_string()),
            _ => std::env::var(key).ok(),
        },
        upload,
    )
    .unwrap_or_else(|e| fail(e));

    println!(
        "\n{}  {}\n",
        style("shortcast").cyan().bold(),
        style("Short Video Generator").dim()
    );
    println!(
        "{} {} via {}, {}x{} @ {}fps",
        style("✓").green().bold(),
        style("Config").bold(),
        config.text_source.kind.name(),
        config.format.width,
        config.format.height,
        config.format.fps,
    );

    let mut pipeline = Pipeline::from_config(config, cli.seed).unwrap_or_else(|e| fail(e));

    let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!(
                "\n{} stopping after the current stage",
                style("Interrupted:").yellow().bold()
            );
            let _ = shutdown_tx.send(());
        }
    });

    println!("{}", style("─".repeat(60)).dim());

    let options = RunOptions {
        topic: cli.topic,
        want_video: cli.video,
        upload,
        keep_artifacts: cli.keep_artifacts,
        privacy: cli.privacy.map(PrivacyStatus::from),
    };

    let total_start = Instant::now();
    let observer = CliObserver::default();
    let report = match pipeline.run(&options, &observer, &mut shutdown_rx).await {
        Ok(report) => report,
        Err(PipelineError::Cancelled { after }) => {
            eprintln!(
                "{} after {} stage, run directory kept",
                style("Cancelled").yellow().bold(),
                after
            );
            std::process::exit(130);
        }
        Err(e) => fail(e),
    };

    println!("{}", style("─".repeat(60)).dim());
    println!("{} {}", style("Title:").bold(), report.title);
    println!("{} {}", style("Topic:").bold(), report.topic);
    println!(
        "{} {}",
        style("Length:").bold(),
        format_duration(Duration::from_secs_f64(report.duration_seconds.max(0.0)))
    );
    if let Some(video_id) = &report.video_id {
        println!(
            "{} {}",
            style("Video:").bold(),
            style(format!("https://youtube.com/shorts/{video_id}")).cyan()
        );
    }
    if let Some(path) = &report.video_path {
        println!("{} {}", style("File:").bold(), style(path.display()).dim());
    }
    println!(
        "\n{} {}",
        style("Done").green().bold(),
        style(format!("in {}", format_duration(total_start.elapsed()))).dim()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_short_and_long_durations() {
        assert_eq!(format_duration(Duration::from_millis(4200)), "4.2s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
    }

    #[test]
    fn parses_flags() {
        let cli = Cli::try_parse_from([
            "shortcast", "--topic", "css layout trick", "--video", "--skip-upload", "--seed", "7",
            "--privacy", "unlisted", "--source", "local",
        ])
        .unwrap();
        assert_eq!(cli.topic.as_deref(), Some("css layout trick"));
        assert!(cli.video && cli.skip_upload && !cli.keep_artifacts);
        assert_eq!(cli.seed, Some(7));
        assert_eq!(cli.privacy.map(PrivacyStatus::from), Some(PrivacyStatus::Unlisted));
        assert_eq!(cli.source.map(CliTextSource::env_value), Some("local"));
    }
}
