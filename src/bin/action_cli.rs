use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use action_forest::config::AppConfig;
use action_forest::detection::{run_pipelined, run_sequential, PipelineStats, VoteBand};
use action_forest::features::{
    Extraction, ImageSequenceSource, LocalFeatureExtractor, ScaleFeatures,
};
use action_forest::forest::{DecisionForest, TrainingSample};
use action_forest::sampling::SampleSelector;
use action_forest::types::{Rect, SpatioTemporalVolume};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser, Debug)]
#[command(
    name = "action_cli",
    about = "Streaming Hough-forest action detection over image sequences"
)]
struct Cli {
    /// JSON configuration file (defaults are used when missing)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log at debug level
    #[arg(long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract descriptors and write one JSON line per window
    Extract {
        #[arg(long)]
        frames: PathBuf,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Select labeled training samples from annotated frames
    Samples {
        #[arg(long)]
        frames: PathBuf,
        /// JSON array of `{class, rect, start_t, end_t}` annotations
        #[arg(long)]
        annotations: PathBuf,
        #[arg(long)]
        output: PathBuf,
        #[arg(long, default_value_t = 20)]
        per_window: usize,
        #[arg(long, default_value_t = 1)]
        seed: u64,
    },
    /// Train a forest from a JSON array of training samples
    Train {
        #[arg(long)]
        samples: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Stream expiring vote bands as JSON lines
    Detect {
        #[arg(long)]
        frames: PathBuf,
        #[arg(long)]
        forest: PathBuf,
        /// Run extraction on its own thread
        #[arg(long)]
        pipelined: bool,
    },
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();

    let config = cli
        .config
        .as_deref()
        .map(AppConfig::load_from_file)
        .unwrap_or_default();
    config.validate().context("validating configuration")?;

    match cli.command {
        Commands::Extract { frames, output } => run_extract(&config, &frames, output),
        Commands::Samples {
            frames,
            annotations,
            output,
            per_window,
            seed,
        } => run_samples(&config, &frames, &annotations, &output, per_window, seed),
        Commands::Train { samples, output } => run_train(&config, &samples, &output),
        Commands::Detect {
            frames,
            forest,
            pipelined,
        } => run_detect(&config, &frames, &forest, pipelined),
    }
}

fn open_frames(dir: &Path) -> Result<ImageSequenceSource> {
    let source = ImageSequenceSource::open(dir)
        .with_context(|| format!("opening frame directory {}", dir.display()))?;
    if source.is_empty() {
        bail!("no image frames found under {}", dir.display());
    }
    Ok(source)
}

fn run_extract(config: &AppConfig, frames: &Path, output: Option<PathBuf>) -> Result<ExitCode> {
    let mut source = open_frames(frames)?;
    let mut extractor = LocalFeatureExtractor::new(&config.extractor)?;
    let mut writer: Box<dyn Write> = match output {
        Some(path) => Box::new(BufWriter::new(
            fs::File::create(&path).with_context(|| format!("creating {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout())),
    };

    let mut n_windows = 0;
    while let Extraction::Window(window) = extractor.extract(&mut source)? {
        let payload = WindowPayload {
            begin_t: window.begin_t,
            scales: &window.scales,
        };
        writeln!(writer, "{}", serde_json::to_string(&payload)?)?;
        n_windows += 1;
    }
    writer.flush()?;
    tracing::info!("[Extract] Wrote {} windows", n_windows);
    Ok(ExitCode::from(0))
}

fn run_samples(
    config: &AppConfig,
    frames: &Path,
    annotations: &Path,
    output: &Path,
    per_window: usize,
    seed: u64,
) -> Result<ExitCode> {
    let Some(negative_class) = config.forest.negative_class else {
        bail!("sample selection needs forest.negative_class to be set");
    };
    let json = fs::read_to_string(annotations)
        .with_context(|| format!("reading {}", annotations.display()))?;
    let annotations: Vec<Annotation> = serde_json::from_str(&json)
        .with_context(|| format!("parsing {}", annotations.display()))?;
    let volumes = annotations
        .iter()
        .map(|a| {
            SpatioTemporalVolume::new(a.rect, a.start_t, a.end_t)
                .map(|volume| (a.class, volume))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let all_volumes: Vec<SpatioTemporalVolume> = volumes.iter().map(|(_, v)| *v).collect();

    let mut source = open_frames(frames)?;
    let mut extractor = LocalFeatureExtractor::new(&config.extractor)?;
    let mut selector = SampleSelector::new(per_window, seed);
    let mut samples: Vec<TrainingSample> = Vec::new();
    while let Extraction::Window(window) = extractor.extract(&mut source)? {
        for (class, volume) in &volumes {
            samples.extend(selector.positives(&window, volume, *class));
        }
        samples.extend(selector.negatives(&window, &all_volumes, negative_class));
    }

    fs::write(output, serde_json::to_string(&samples)?)
        .with_context(|| format!("writing {}", output.display()))?;
    tracing::info!(
        "[Samples] Wrote {} samples to {}",
        samples.len(),
        output.display()
    );
    Ok(ExitCode::from(0))
}

fn run_train(config: &AppConfig, samples: &Path, output: &Path) -> Result<ExitCode> {
    let json =
        fs::read_to_string(samples).with_context(|| format!("reading {}", samples.display()))?;
    let samples: Vec<TrainingSample> = serde_json::from_str(&json)
        .with_context(|| format!("parsing {}", samples.display()))?;
    let forest = DecisionForest::train(&samples, &config.forest).context("training forest")?;
    forest
        .save(output)
        .with_context(|| format!("saving forest to {}", output.display()))?;
    Ok(ExitCode::from(0))
}

fn run_detect(config: &AppConfig, frames: &Path, forest: &Path, pipelined: bool) -> Result<ExitCode> {
    let forest = DecisionForest::load(forest)
        .with_context(|| format!("loading forest from {}", forest.display()))?;
    let mut source = open_frames(frames)?;
    let mut extractor = LocalFeatureExtractor::new(&config.extractor)?;

    let stdout = io::stdout();
    let mut writer = BufWriter::new(stdout.lock());
    let mut write_error: Option<anyhow::Error> = None;
    let on_band = |band: VoteBand| {
        if write_error.is_some() || band.is_empty() {
            return;
        }
        let line = serde_json::to_string(&band)
            .map_err(anyhow::Error::from)
            .and_then(|json| writeln!(writer, "{json}").map_err(anyhow::Error::from));
        if let Err(err) = line {
            write_error = Some(err);
        }
    };

    let stats: PipelineStats = if pipelined {
        run_pipelined(
            &mut source,
            &mut extractor,
            forest,
            &config.voting,
            &config.pipeline,
            on_band,
        )?
    } else {
        run_sequential(
            &mut source,
            &mut extractor,
            forest,
            &config.voting,
            on_band,
        )?
    };
    if let Some(err) = write_error {
        return Err(err.context("writing vote bands"));
    }
    writer.flush()?;
    tracing::info!(
        "[Detect] {} windows, {} descriptors, {} votes, {} bands",
        stats.windows,
        stats.descriptors,
        stats.votes,
        stats.bands
    );
    Ok(ExitCode::from(0))
}

#[derive(Serialize)]
struct WindowPayload<'a> {
    begin_t: usize,
    scales: &'a [ScaleFeatures],
}

#[derive(Deserialize, Debug)]
struct Annotation {
    class: usize,
    rect: Rect,
    start_t: i32,
    end_t: i32,
}
