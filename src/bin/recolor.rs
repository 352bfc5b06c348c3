use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pixel_recolor::io::{load_image, save_image};
use pixel_recolor::{ApplyMode, ProgressObserver, RasterBuffer, RecolorSession, SessionSettings};

/// Find clusters of similar pixels in an image and replace their color.
#[derive(Parser, Debug)]
#[command(name = "recolor", author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the most common color buckets
    Colors {
        /// Input image
        input: PathBuf,

        /// Number of buckets to show
        #[arg(short = 'n', long, default_value_t = 20)]
        top: usize,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        engine: EngineArgs,
    },
    /// Replace a color bucket (and optionally similar ones) with a new color
    Replace {
        /// Input image
        input: PathBuf,

        /// Output image path
        #[arg(short, long)]
        output: PathBuf,

        /// Bucket to replace, as quantized "R,G,B" (see `colors`)
        #[arg(long)]
        from: String,

        /// Replacement color as hex, e.g. "#00ff00"
        #[arg(long)]
        to: String,

        /// Only rewrite every Nth pixel (see --preview-stride)
        #[arg(long)]
        preview: bool,

        /// Run the rewrite on the session's worker thread
        #[arg(long, conflicts_with = "preview")]
        offload: bool,

        /// Scan every pixel for the bucket instead of using the color index
        /// (ignores --similar)
        #[arg(long, conflicts_with_all = ["preview", "offload"])]
        direct: bool,

        #[command(flatten)]
        engine: EngineArgs,
    },
}

#[derive(Args, Debug)]
struct EngineArgs {
    /// JSON settings file; flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Quantization levels per channel
    #[arg(short, long)]
    levels: Option<u16>,

    /// Include buckets within --threshold of the source color
    #[arg(short, long)]
    similar: bool,

    /// Similarity threshold (Euclidean RGB distance)
    #[arg(short, long)]
    threshold: Option<f32>,

    /// Pixels rewritten between yields
    #[arg(long)]
    batch_size: Option<usize>,

    /// Preview keeps every Nth pixel
    #[arg(long)]
    preview_stride: Option<usize>,
}

impl EngineArgs {
    fn settings(&self) -> Result<SessionSettings> {
        let mut settings = match &self.config {
            Some(path) => SessionSettings::from_json_file(path)
                .with_context(|| format!("failed to read settings from {}", path.display()))?,
            None => SessionSettings::default(),
        };

        if let Some(levels) = self.levels {
            settings.quantization_levels = levels;
        }
        if self.similar {
            settings.similarity.include_similar = true;
        }
        if let Some(threshold) = self.threshold {
            settings.similarity.threshold = threshold;
        }
        if let Some(batch_size) = self.batch_size {
            settings.batch_size = batch_size;
        }
        if let Some(stride) = self.preview_stride {
            settings.preview_stride = stride;
        }

        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplaceMode {
    Preview,
    Commit,
    Offload,
    Direct,
}

/// Logs progress every 10%
struct LogProgress {
    next: f32,
}

impl ProgressObserver for LogProgress {
    fn on_progress(&mut self, fraction: f32) {
        if fraction >= self.next || fraction >= 1.0 {
            tracing::info!(percent = (fraction * 100.0).round() as u32, "Recoloring");
            while self.next <= fraction {
                self.next += 0.1;
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pixel_recolor=info,recolor=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Colors {
            input,
            top,
            json,
            engine,
        } => run_colors(&input, top, json, &engine).await,
        Commands::Replace {
            input,
            output,
            from,
            to,
            preview,
            offload,
            direct,
            engine,
        } => {
            let mode = if direct {
                ReplaceMode::Direct
            } else if offload {
                ReplaceMode::Offload
            } else if preview {
                ReplaceMode::Preview
            } else {
                ReplaceMode::Commit
            };
            run_replace(&input, &output, &from, &to, mode, &engine).await
        }
    }
}

async fn open_session(input: &Path, engine: &EngineArgs) -> Result<RecolorSession> {
    let mut session = RecolorSession::new(engine.settings()?)?;

    let path = input.to_path_buf();
    let buffer = tokio::task::spawn_blocking(move || load_image(&path))
        .await
        .context("image decode task failed")??;
    session.load(buffer)?;
    Ok(session)
}

async fn run_colors(input: &Path, top: usize, json: bool, engine: &EngineArgs) -> Result<()> {
    let session = open_session(input, engine).await?;
    let colors: Vec<_> = session.colors().into_iter().take(top).collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&colors)?);
        return Ok(());
    }

    println!("{:<14} {:<8} {:>10}", "KEY", "HEX", "PIXELS");
    for c in &colors {
        println!("{:<14} {:<8} {:>10}", c.key.to_string(), c.hex_color, c.pixel_count);
    }
    Ok(())
}

async fn run_replace(
    input: &Path,
    output: &Path,
    from: &str,
    to: &str,
    mode: ReplaceMode,
    engine: &EngineArgs,
) -> Result<()> {
    let mut session = open_session(input, engine).await?;
    let pixels = session.resolve(from)?.len();
    tracing::info!(key = from, pixels, "Selected pixels");

    let mut progress = LogProgress { next: 0.1 };

    let result: RasterBuffer = match mode {
        ReplaceMode::Preview | ReplaceMode::Commit => {
            let apply = if mode == ReplaceMode::Preview {
                ApplyMode::Preview
            } else {
                ApplyMode::Commit
            };
            session
                .apply_color_change(from, to, apply, &mut progress)
                .await?
                .context("no image loaded")?
        }
        ReplaceMode::Offload => {
            session.start_color_change(from, to)?;
            session.finish_color_change(&mut progress).await?;
            session.current().cloned().context("session lost its image")?
        }
        ReplaceMode::Direct => {
            session.commit_direct_color_change(from, to, &mut progress).await?;
            session.current().cloned().context("session lost its image")?
        }
    };

    let path = output.to_path_buf();
    tokio::task::spawn_blocking(move || save_image(&result, &path))
        .await
        .context("image encode task failed")??;

    println!("Saved → {}", output.display());
    Ok(())
}
