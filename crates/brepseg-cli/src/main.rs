//! brepseg CLI - bind segmentation results to STEP faces
//!
//! Lists faces, exports per-face results, prints statistics and runs
//! batch segmentation without a viewer.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::warn;

use brepseg::inference::parse_labels;
use brepseg::{
    discover_cad_files, BatchRunner, CancelToken, Classification, CommandInference, EngineConfig, ExportFormat,
    FaceEnumerator, InferenceBackend, InferenceRequest, JobStatus, LabelCatalog, PaintBuffer, Session,
    SidecarInference, StepLoader,
};

mod logging;

#[derive(Parser)]
#[command(name = "brepseg")]
#[command(about = "Bind per-face segmentation results to B-rep models", long_about = None)]
struct Cli {
    /// Engine configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Default log level when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

/// Where per-face labels come from.
#[derive(Args)]
struct Predictions {
    /// Whitespace-separated label file (default: <stem>.seg next to the input)
    #[arg(short, long)]
    predictions: Option<PathBuf>,

    /// Inference program; prints labels on stdout
    #[arg(long, conflicts_with = "predictions")]
    command: Option<String>,

    /// Argument for --command; `{input}` and `{work_dir}` are substituted
    #[arg(long = "arg", allow_hyphen_values = true, requires = "command")]
    args: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the faces of a STEP file in traversal order
    Faces {
        /// Input STEP file
        input: PathBuf,
    },
    /// Bind labels to a STEP file and export the result
    Export {
        /// Input STEP file
        input: PathBuf,
        /// Label mapping (.json)
        #[arg(short, long)]
        labels: PathBuf,
        /// Output file (.json, .txt or .seg)
        #[arg(short, long)]
        output: PathBuf,
        /// Output format (default: from the output extension)
        #[arg(short, long)]
        format: Option<String>,
        /// Model file, recorded in report headers
        #[arg(short, long)]
        model: Option<PathBuf>,
        #[command(flatten)]
        predictions: Predictions,
    },
    /// Print per-category face counts
    Stats {
        /// Input STEP file
        input: PathBuf,
        /// Label mapping (.json)
        #[arg(short, long)]
        labels: PathBuf,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        predictions: Predictions,
    },
    /// Segment every STEP file in a directory
    Batch {
        /// Directory scanned recursively for CAD files
        input_dir: PathBuf,
        /// Label mapping (.json)
        #[arg(short, long)]
        labels: PathBuf,
        /// Directory receiving one .seg file per input
        #[arg(short, long)]
        output_dir: PathBuf,
        /// Directory holding precomputed <stem>.seg files
        #[arg(long, conflicts_with = "command")]
        predictions_dir: Option<PathBuf>,
        /// Inference program; prints labels on stdout
        #[arg(long)]
        command: Option<String>,
        /// Argument for --command
        #[arg(long = "arg", allow_hyphen_values = true, requires = "command")]
        args: Vec<String>,
    },
    /// Classify a whole solid from model logits
    Classify {
        /// Input STEP file
        input: PathBuf,
        /// Label mapping (.json)
        #[arg(short, long)]
        labels: PathBuf,
        /// Logits as a whitespace-separated string
        #[arg(long, conflicts_with = "command")]
        logits: Option<String>,
        /// Inference program; prints logits on stdout
        #[arg(long)]
        command: Option<String>,
        /// Argument for --command
        #[arg(long = "arg", allow_hyphen_values = true, requires = "command")]
        args: Vec<String>,
        /// Print JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log_level)?;

    let config = match &cli.config {
        Some(path) => EngineConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Commands::Faces { input } => list_faces(&input),
        Commands::Export {
            input,
            labels,
            output,
            format,
            model,
            predictions,
        } => {
            let format = match format {
                Some(f) => f.parse::<ExportFormat>()?,
                None => ExportFormat::from_path(&output)
                    .with_context(|| format!("cannot infer format from {}", output.display()))?,
            };
            let session = bind(&config, &input, &labels, model.as_deref(), &predictions)?;
            session.export(format, &output)?;
            println!("Exported {} faces to {}", session.records().len(), output.display());
            Ok(())
        }
        Commands::Stats {
            input,
            labels,
            json,
            predictions,
        } => {
            let session = bind(&config, &input, &labels, None, &predictions)?;
            print_stats(&session, json)
        }
        Commands::Batch {
            input_dir,
            labels,
            output_dir,
            predictions_dir,
            command,
            args,
        } => {
            let backend: Box<dyn InferenceBackend> = match (command, predictions_dir) {
                (Some(program), _) => Box::new(CommandInference::new(program, args)),
                (None, Some(dir)) => Box::new(SidecarInference::in_dir(dir)),
                (None, None) => Box::new(SidecarInference::new()),
            };
            run_batch(&config, &input_dir, &labels, &output_dir, backend.as_ref())
        }
        Commands::Classify {
            input,
            labels,
            logits,
            command,
            args,
            json,
        } => classify(&config, &input, &labels, logits, command, args, json),
    }
}

fn list_faces(input: &Path) -> Result<()> {
    let faces = FaceEnumerator::load(&StepLoader, input)?;
    println!(
        "{}: {} solid(s), {} face(s)",
        input.display(),
        faces.shape().solid_count,
        faces.face_count()
    );
    for (i, face) in faces.faces().enumerate() {
        println!("  Face {}: #{} {} (solid #{})", i + 1, face.entity_id, face.surface_type, face.solid_id);
    }
    Ok(())
}

/// Load labels and geometry into a session and display the predictions.
fn bind(
    config: &EngineConfig,
    input: &Path,
    labels: &Path,
    model: Option<&Path>,
    predictions: &Predictions,
) -> Result<Session<PaintBuffer>> {
    let mut session = Session::new(Box::new(StepLoader), PaintBuffer::new(), config.clone());
    if let Some(model) = model {
        session.load_model(model)?;
    }
    session.load_labels(labels)?;
    session.load_geometry(input)?;

    let work = WorkDir::new(config)?;
    let raw = match (&predictions.predictions, &predictions.command) {
        (Some(path), _) => {
            let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            parse_labels(&text).map_err(anyhow::Error::msg)?
        }
        (None, Some(program)) => CommandInference::new(program.as_str(), predictions.args.iter().cloned())
            .segment(&InferenceRequest {
                input,
                work_dir: work.path(),
            })?,
        (None, None) => SidecarInference::new().segment(&InferenceRequest {
            input,
            work_dir: work.path(),
        })?,
    };
    if raw.is_empty() {
        bail!("no labels for {}", input.display());
    }

    let report = session.display(&raw)?;
    if report.truncated > 0 {
        warn!(faces = report.truncated, "faces left unlabeled");
    }
    Ok(session)
}

fn print_stats(session: &Session<PaintBuffer>, json: bool) -> Result<()> {
    let stats = session.statistics();
    if json {
        let counts: serde_json::Map<String, serde_json::Value> = session
            .catalog()
            .categories()
            .iter()
            .zip(&stats.counts)
            .map(|(c, &n)| (c.name.clone(), n.into()))
            .collect();
        let value = serde_json::json!({ "total_faces": stats.total, "label_distribution": counts });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("Total faces: {}", stats.total);
    for row in stats.nonzero(session.catalog()) {
        println!("{}: {} ({:.1}%)", row.name, row.count, row.percentage);
    }
    Ok(())
}

fn run_batch(
    config: &EngineConfig,
    input_dir: &Path,
    labels: &Path,
    output_dir: &Path,
    backend: &dyn InferenceBackend,
) -> Result<()> {
    let catalog = LabelCatalog::load(labels, config.palette())?;
    let inputs = discover_cad_files(input_dir, &config.batch.extensions)?;
    if inputs.is_empty() {
        bail!("no CAD files found under {}", input_dir.display());
    }

    let work = WorkDir::new(config)?;
    let runner = BatchRunner::new(&StepLoader, &catalog, work.path());
    cancel_on_interrupt(runner.cancel_token())?;
    let report = runner.run_with(&inputs, output_dir, backend)?;

    for job in &report.jobs {
        if let JobStatus::Failed(msg) = &job.status {
            println!("FAILED {}: {msg}", job.input_path.display());
        }
        if let Some(later) = &job.overwritten_by {
            println!(
                "OVERWRITTEN {}: output replaced by {}",
                job.input_path.display(),
                later.display()
            );
        }
    }
    println!(
        "Processed {} file(s): {} done, {} failed, {} cancelled",
        report.jobs.len(),
        report.done(),
        report.failed(),
        report.cancelled()
    );
    if report.done() == 0 {
        bail!("no file was segmented");
    }
    Ok(())
}

/// Ctrl-C stops the batch before the next file; the file in progress finishes.
fn cancel_on_interrupt(token: CancelToken) -> Result<()> {
    ctrlc::set_handler(move || {
        warn!("interrupted, stopping after the current file");
        token.cancel();
    })
    .context("failed to install Ctrl-C handler")
}

fn classify(
    config: &EngineConfig,
    input: &Path,
    labels: &Path,
    logits: Option<String>,
    command: Option<String>,
    args: Vec<String>,
    json: bool,
) -> Result<()> {
    let catalog = LabelCatalog::load(labels, config.palette())?;
    let logits = match (logits, command) {
        (Some(text), _) => brepseg::inference::parse_logits(&text).map_err(anyhow::Error::msg)?,
        (None, Some(program)) => {
            // the solid must load before the model is asked about it
            FaceEnumerator::load(&StepLoader, input)?;
            let work = WorkDir::new(config)?;
            CommandInference::new(program, args).logits(&InferenceRequest {
                input,
                work_dir: work.path(),
            })?
        }
        (None, None) => bail!("either --logits or --command is required"),
    };

    let prediction = Classification::from_logits(&logits, &catalog)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&prediction)?);
    } else {
        println!("Prediction: {}", prediction.label);
        println!("Confidence: {:.1}% ({})", prediction.confidence, prediction.band());
    }
    Ok(())
}

/// Working directory for inference calls: the configured one, or a
/// temporary directory removed on drop.
enum WorkDir {
    Configured(PathBuf),
    Temporary(tempfile::TempDir),
}

impl WorkDir {
    fn new(config: &EngineConfig) -> Result<Self> {
        match &config.batch.work_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
                Ok(WorkDir::Configured(dir.clone()))
            }
            None => Ok(WorkDir::Temporary(
                tempfile::Builder::new().prefix("brepseg-").tempdir()?,
            )),
        }
    }

    fn path(&self) -> &Path {
        match self {
            WorkDir::Configured(p) => p.as_path(),
            WorkDir::Temporary(t) => t.path(),
        }
    }
}
