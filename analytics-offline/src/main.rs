use std::io::Write;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use analytics_core::{FramePipeline, TrackerConfig};
use analytics_types::{QualityTier, StreamId, StreamSettings};
use frame_source_rt::{FileSource, FrameEvent, FrameSource};
use kinematics::KinematicsConfig;
use vision_adapters::{MotionBlobDetector, TemplatePoseAdapter};

/// Replays a recorded frame file through the analytics pipeline without a
/// live HTTP server, for integration testing and batch re-analysis of a
/// recorded match. Supplements the original `braid-offline`/
/// `braid-process-video` batch-replay pattern for this pipeline.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Recorded frame file (see `frame_source_rt::FileSource` for the format)
    #[arg(short = 'd', long)]
    input: std::path::PathBuf,

    /// Stream identity to tag every emitted record with
    #[arg(long, default_value = "offline-replay")]
    stream_id: String,

    /// Write newline-delimited JSON records here instead of stdout
    #[arg(short = 'o', long)]
    output: Option<std::path::PathBuf>,

    #[arg(long, value_enum, default_value = "hd1080", ignore_case = true)]
    quality_tier: CliQualityTier,

    #[arg(long, default_value_t = 0.5)]
    conf_threshold: f64,

    #[arg(long, default_value_t = 0.3)]
    iou_threshold: f64,

    /// Disable display of progress indicator
    #[arg(long)]
    no_progress: bool,
}

/// Mirrors `analytics_types::QualityTier` for CLI parsing — kept separate so
/// the wire-schema crate doesn't need a `clap` dependency just for this.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliQualityTier {
    Hd720,
    Hd1080,
    Uhd4k,
}

impl From<CliQualityTier> for QualityTier {
    fn from(tier: CliQualityTier) -> Self {
        match tier {
            CliQualityTier::Hd720 => QualityTier::Hd720,
            CliQualityTier::Hd1080 => QualityTier::Hd1080,
            CliQualityTier::Uhd4k => QualityTier::Uhd4k,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let opt = Cli::parse();
    let stream_id = StreamId::from(opt.stream_id.as_str());

    let settings = StreamSettings {
        quality_tier: opt.quality_tier.into(),
        conf_threshold: opt.conf_threshold,
        iou_threshold: opt.iou_threshold,
        ..StreamSettings::default()
    };

    let mut source = FileSource::open(
        stream_id.clone(),
        opt.input.to_str().ok_or_else(|| anyhow::anyhow!("input path is not valid UTF-8"))?,
        settings.quality_tier,
    )?;

    let mut pipeline = FramePipeline::new(
        stream_id.clone(),
        Box::new(MotionBlobDetector::new(settings.conf_threshold)),
        Box::new(TemplatePoseAdapter::new()),
        TrackerConfig {
            iou_threshold: settings.iou_threshold,
            min_hits: settings.min_hits,
            max_age: settings.max_age,
            pixel_to_meter: settings.pixel_to_meter,
            smoothing_window: settings.smoothing_window,
            ..TrackerConfig::default()
        },
        KinematicsConfig {
            fps: settings.target_fps,
            ..KinematicsConfig::default()
        },
        settings.target_fps,
    );

    let mut out: Box<dyn Write> = match &opt.output {
        Some(path) => Box::new(std::fs::File::create(path)?),
        None => Box::new(std::io::stdout()),
    };

    let progress = if opt.no_progress {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new_spinner();
        bar.set_style(ProgressStyle::with_template("{spinner} {msg}").unwrap());
        bar
    };

    let mut frame_count = 0u64;
    loop {
        match source.next()? {
            FrameEvent::Frame(frame) => {
                let record = pipeline.process(&frame).await;
                serde_json::to_writer(&mut out, &record)?;
                out.write_all(b"\n")?;
                frame_count += 1;
                progress.set_message(format!("{frame_count} frames processed"));
                progress.tick();
            }
            FrameEvent::EndOfStream => break,
            FrameEvent::Transient(msg) => {
                tracing::warn!(msg, "transient frame source read failure");
            }
        }
    }
    source.close();
    progress.finish_with_message(format!("done: {frame_count} frames"));

    Ok(())
}
