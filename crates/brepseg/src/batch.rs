//! Multi-file segmentation runs.
//!
//! A [`BatchRunner`] repeats load, infer, bind and write over a list of
//! files. Each file is an indivisible unit: failures are recorded on that
//! file's [`BatchJob`] and the loop moves on, and cancellation is only
//! observed between files.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

use crate::binder::{BindWarning, LabelBinder};
use crate::catalog::LabelCatalog;
use crate::error::{EngineError, EngineResult};
use crate::export::{render_seg, write_atomic};
use crate::geometry::{FaceEnumerator, GeometryLoader};
use crate::inference::{InferenceBackend, InferenceRequest};

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A token that has not been cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the run to stop before the next file.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether [`cancel`](Self::cancel) was called.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    /// Not processed yet.
    Pending,
    /// Output written completely.
    Done,
    /// Processing failed; the message says why.
    Failed(String),
    /// The run was cancelled before this file started.
    Cancelled,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Pending => f.write_str("pending"),
            JobStatus::Done => f.write_str("done"),
            JobStatus::Failed(msg) => write!(f, "failed: {msg}"),
            JobStatus::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// One input file of a batch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchJob {
    /// CAD file.
    pub input_path: PathBuf,
    /// `.seg` file written on success.
    pub output_path: PathBuf,
    /// Final status.
    pub status: JobStatus,
    /// Faces that received a label.
    pub bound_faces: usize,
    /// Binding warnings for this file.
    pub warnings: Vec<BindWarning>,
    /// A later input of the same run that replaced this job's output.
    pub overwritten_by: Option<PathBuf>,
}

/// Result of [`BatchRunner::run`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Jobs in input order.
    pub jobs: Vec<BatchJob>,
}

impl BatchReport {
    /// Jobs that completed.
    pub fn done(&self) -> usize {
        self.count(|s| matches!(s, JobStatus::Done))
    }

    /// Jobs that failed.
    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, JobStatus::Failed(_)))
    }

    /// Jobs skipped by cancellation.
    pub fn cancelled(&self) -> usize {
        self.count(|s| matches!(s, JobStatus::Cancelled))
    }

    /// Completed jobs whose output a later job replaced.
    pub fn overwritten(&self) -> usize {
        self.jobs.iter().filter(|j| j.overwritten_by.is_some()).count()
    }

    fn count(&self, pred: impl Fn(&JobStatus) -> bool) -> usize {
        self.jobs.iter().filter(|j| pred(&j.status)).count()
    }
}

/// Runs the binding pipeline over many files.
pub struct BatchRunner<'a> {
    loader: &'a dyn GeometryLoader,
    catalog: &'a LabelCatalog,
    work_dir: PathBuf,
    cancel: CancelToken,
}

impl<'a> BatchRunner<'a> {
    /// Create a runner. `work_dir` is handed to every inference call.
    pub fn new(
        loader: &'a dyn GeometryLoader,
        catalog: &'a LabelCatalog,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            loader,
            catalog,
            work_dir: work_dir.into(),
            cancel: CancelToken::new(),
        }
    }

    /// Use an existing cancellation token.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// A handle that cancels this runner.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run with an [`InferenceBackend`].
    pub fn run_with(
        &self,
        inputs: &[PathBuf],
        output_dir: &Path,
        backend: &dyn InferenceBackend,
    ) -> EngineResult<BatchReport> {
        self.run(inputs, output_dir, |req| backend.segment(req))
    }

    /// Process `inputs` in order, writing `output_dir/<stem>.seg` for each.
    ///
    /// Only failing to create `output_dir` or the work directory is an
    /// error; everything that goes wrong with a single file is recorded on
    /// its job.
    pub fn run<F, E>(&self, inputs: &[PathBuf], output_dir: &Path, mut infer: F) -> EngineResult<BatchReport>
    where
        F: FnMut(&InferenceRequest<'_>) -> Result<Vec<i64>, E>,
        E: fmt::Display,
    {
        std::fs::create_dir_all(output_dir).map_err(|e| EngineError::io(output_dir, e))?;
        std::fs::create_dir_all(&self.work_dir).map_err(|e| EngineError::io(&self.work_dir, e))?;

        let mut jobs: Vec<BatchJob> = inputs
            .iter()
            .map(|input| BatchJob {
                input_path: input.clone(),
                output_path: output_path(input, output_dir),
                status: JobStatus::Pending,
                bound_faces: 0,
                warnings: Vec::new(),
                overwritten_by: None,
            })
            .collect();
        warn_collisions(&jobs);

        let total = jobs.len();
        // output path -> index of the job whose file is currently there
        let mut written: HashMap<PathBuf, usize> = HashMap::new();
        for i in 0..total {
            if self.cancel.is_cancelled() {
                jobs[i].status = JobStatus::Cancelled;
                continue;
            }
            let job = &mut jobs[i];
            match self.process(job, &mut infer) {
                Ok(()) => {
                    job.status = JobStatus::Done;
                    info!(
                        file = i + 1,
                        total,
                        input = %job.input_path.display(),
                        faces = job.bound_faces,
                        "segmented"
                    );
                    let input = job.input_path.clone();
                    if let Some(prev) = written.insert(job.output_path.clone(), i) {
                        jobs[prev].overwritten_by = Some(input);
                    }
                }
                Err(e) => {
                    warn!(file = i + 1, total, input = %job.input_path.display(), error = %e, "batch file failed");
                    job.status = JobStatus::Failed(e.to_string());
                }
            }
        }

        let report = BatchReport { jobs };
        info!(
            done = report.done(),
            failed = report.failed(),
            cancelled = report.cancelled(),
            overwritten = report.overwritten(),
            "batch finished"
        );
        Ok(report)
    }

    fn process<F, E>(&self, job: &mut BatchJob, infer: &mut F) -> EngineResult<()>
    where
        F: FnMut(&InferenceRequest<'_>) -> Result<Vec<i64>, E>,
        E: fmt::Display,
    {
        let input = job.input_path.as_path();
        let faces = FaceEnumerator::load(self.loader, input)?;

        let request = InferenceRequest {
            input,
            work_dir: &self.work_dir,
        };
        let labels = infer(&request).map_err(|e| EngineError::inference(input, e.to_string()))?;
        if labels.is_empty() {
            return Err(EngineError::inference(input, "no labels produced"));
        }

        let report = LabelBinder::new(self.catalog).bind(faces.faces(), &labels)?;
        let contents = render_seg(report.records.iter().map(|r| r.category_id));
        write_atomic(&job.output_path, contents.as_bytes())?;

        job.bound_faces = report.records.len();
        job.warnings = report.warnings;
        Ok(())
    }
}

fn output_path(input: &Path, output_dir: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    output_dir.join(format!("{stem}.seg"))
}

fn warn_collisions(jobs: &[BatchJob]) {
    let mut seen: HashMap<&Path, &Path> = HashMap::new();
    for job in jobs {
        if let Some(first) = seen.insert(&job.output_path, &job.input_path) {
            warn!(
                output = %job.output_path.display(),
                first = %first.display(),
                second = %job.input_path.display(),
                "inputs share a base name, the later one overwrites the output"
            );
        }
    }
}

/// Recursively find files under `dir` whose extension is in `extensions`
/// (case-insensitive). Results are sorted so runs are reproducible.
///
/// Symlinks to files are reported; symlinks to directories are not descended.
pub fn discover_cad_files(dir: &Path, extensions: &[String]) -> EngineResult<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let entries = std::fs::read_dir(&current).map_err(|e| EngineError::io(&current, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| EngineError::io(&current, e))?;
            let file_type = entry.file_type().map_err(|e| EngineError::io(entry.path(), e))?;
            let path = entry.path();
            if file_type.is_dir() {
                pending.push(path);
            } else if file_type.is_symlink() && path.is_dir() {
                // directory links are not followed; they can form cycles
                continue;
            } else if has_extension(&path, extensions) {
                found.push(path);
            }
        }
    }
    found.sort();
    Ok(found)
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|want| want.eq_ignore_ascii_case(ext)))
}
