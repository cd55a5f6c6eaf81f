//! External inference collaborators.
//!
//! The engine never runs a model itself. It asks an [`InferenceBackend`] for
//! one raw label per face and binds whatever comes back.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::error::{EngineError, EngineResult};

/// One inference call: which file, and where scratch files may go.
#[derive(Debug, Clone, Copy)]
pub struct InferenceRequest<'a> {
    /// CAD file to infer.
    pub input: &'a Path,
    /// Working directory owned by the caller.
    pub work_dir: &'a Path,
}

/// Produces raw per-face labels for a CAD file.
pub trait InferenceBackend {
    /// Raw labels in face-enumeration order. Values are not validated.
    fn segment(&self, request: &InferenceRequest<'_>) -> EngineResult<Vec<i64>>;
}

/// Parse whitespace-separated integer labels, as found in `.seg` files and
/// on the stdout of inference programs.
pub fn parse_labels(text: &str) -> Result<Vec<i64>, String> {
    text.split_whitespace()
        .enumerate()
        .map(|(i, tok)| {
            tok.parse::<i64>()
                .map_err(|_| format!("token {} ('{tok}') is not an integer", i + 1))
        })
        .collect()
}

/// Parse whitespace-separated logits.
pub fn parse_logits(text: &str) -> Result<Vec<f64>, String> {
    text.split_whitespace()
        .enumerate()
        .map(|(i, tok)| {
            tok.parse::<f64>()
                .map_err(|_| format!("token {} ('{tok}') is not a number", i + 1))
        })
        .collect()
}

/// Reads precomputed labels from a `<stem>.seg` file.
///
/// The file is looked up in `labels_dir` when set, otherwise next to the
/// input.
#[derive(Debug, Clone, Default)]
pub struct SidecarInference {
    labels_dir: Option<PathBuf>,
}

impl SidecarInference {
    /// Look for sidecars next to each input.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look for sidecars in `dir`.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            labels_dir: Some(dir.into()),
        }
    }

    /// Where the sidecar for `input` is expected.
    pub fn sidecar_path(&self, input: &Path) -> PathBuf {
        let name = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let dir = match &self.labels_dir {
            Some(d) => d.as_path(),
            None => input.parent().unwrap_or_else(|| Path::new(".")),
        };
        dir.join(format!("{name}.seg"))
    }
}

impl InferenceBackend for SidecarInference {
    fn segment(&self, request: &InferenceRequest<'_>) -> EngineResult<Vec<i64>> {
        let path = self.sidecar_path(request.input);
        let text = std::fs::read_to_string(&path).map_err(|e| {
            EngineError::inference(request.input, format!("cannot read {}: {e}", path.display()))
        })?;
        parse_labels(&text).map_err(|m| EngineError::inference(request.input, m))
    }
}

fn absolute(path: &Path, input: &Path) -> EngineResult<PathBuf> {
    std::path::absolute(path).map_err(|e| {
        EngineError::inference(input, format!("cannot resolve {}: {e}", path.display()))
    })
}

/// Runs an external program and reads labels from its stdout.
///
/// `{input}` and `{work_dir}` in the arguments are replaced by the request's
/// paths. If no argument mentions `{input}`, the input path is appended. The
/// program runs with the work directory as its current directory, so relative
/// paths (input, work directory, and a program given as a path) are made
/// absolute against the caller's current directory first.
#[derive(Debug, Clone)]
pub struct CommandInference {
    program: String,
    args: Vec<String>,
}

impl CommandInference {
    /// Create a collaborator running `program` with `args`.
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Run the program and return its stdout.
    pub fn run(&self, request: &InferenceRequest<'_>) -> EngineResult<String> {
        let input_path = absolute(request.input, request.input)?;
        let work_dir_path = absolute(request.work_dir, request.input)?;
        let program = self.resolved_program(request.input)?;
        let input = input_path.to_string_lossy();
        let work_dir = work_dir_path.to_string_lossy();

        let mut args: Vec<String> = self
            .args
            .iter()
            .map(|a| a.replace("{input}", &input).replace("{work_dir}", &work_dir))
            .collect();
        if !self.args.iter().any(|a| a.contains("{input}")) {
            args.push(input.into_owned());
        }

        debug!(program = %program.display(), ?args, "running inference command");
        let output = Command::new(&program)
            .args(&args)
            .current_dir(&work_dir_path)
            .output()
            .map_err(|e| {
                EngineError::inference(request.input, format!("cannot run {}: {e}", self.program))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EngineError::inference(
                request.input,
                format!("{} exited with {}: {}", self.program, output.status, stderr.trim()),
            ));
        }

        String::from_utf8(output.stdout)
            .map_err(|_| EngineError::inference(request.input, "output is not valid UTF-8"))
    }

    /// The program to spawn. A bare name is left for `PATH` lookup; anything
    /// with a directory component is resolved against the current directory.
    fn resolved_program(&self, input: &Path) -> EngineResult<PathBuf> {
        let program = Path::new(&self.program);
        if program.components().count() > 1 {
            absolute(program, input)
        } else {
            Ok(program.to_path_buf())
        }
    }

    /// Run the program and parse logits for whole-solid classification.
    pub fn logits(&self, request: &InferenceRequest<'_>) -> EngineResult<Vec<f64>> {
        let stdout = self.run(request)?;
        parse_logits(&stdout).map_err(|m| EngineError::inference(request.input, m))
    }
}

impl InferenceBackend for CommandInference {
    fn segment(&self, request: &InferenceRequest<'_>) -> EngineResult<Vec<i64>> {
        let stdout = self.run(request)?;
        parse_labels(&stdout).map_err(|m| EngineError::inference(request.input, m))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_labels() {
        assert_eq!(parse_labels("0\n2\n-1\n").unwrap(), vec![0, 2, -1]);
        assert_eq!(parse_labels("  3 4\t5 ").unwrap(), vec![3, 4, 5]);
        assert!(parse_labels("").unwrap().is_empty());
        assert!(parse_labels("1 x").unwrap_err().contains("token 2"));
    }

    #[test]
    fn test_parse_logits() {
        assert_eq!(parse_logits("0.5 -1 2e0").unwrap(), vec![0.5, -1.0, 2.0]);
        assert!(parse_logits("nope").is_err());
    }

    #[test]
    fn test_sidecar_next_to_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("part.step");
        std::fs::write(dir.path().join("part.seg"), "1\n0\n").unwrap();
        let req = InferenceRequest {
            input: &input,
            work_dir: dir.path(),
        };
        assert_eq!(SidecarInference::new().segment(&req).unwrap(), vec![1, 0]);
    }

    #[test]
    fn test_sidecar_missing() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("part.step");
        let req = InferenceRequest {
            input: &input,
            work_dir: dir.path(),
        };
        let err = SidecarInference::in_dir(dir.path().join("labels")).segment(&req).unwrap_err();
        assert!(matches!(err, EngineError::Inference { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("a.step");
        let req = InferenceRequest {
            input: &input,
            work_dir: dir.path(),
        };
        let cmd = CommandInference::new("sh", ["-c", "echo 2 0 1", "{input}"]);
        assert_eq!(cmd.segment(&req).unwrap(), vec![2, 0, 1]);
    }

    #[cfg(unix)]
    #[test]
    fn test_command_sees_relative_input_from_caller_dir() {
        // tests run from the crate root, where Cargo.toml exists
        let work = tempfile::tempdir().unwrap();
        let input = Path::new("Cargo.toml");
        let req = InferenceRequest {
            input,
            work_dir: work.path(),
        };
        let cmd = CommandInference::new("sh", ["-c", r#"test -f "$0" && echo 1 0"#, "{input}"]);
        assert_eq!(cmd.segment(&req).unwrap(), vec![1, 0]);
    }

    #[cfg(unix)]
    #[test]
    fn test_relative_program_path_is_resolved() {
        let cmd = CommandInference::new("./scripts/infer.sh", Vec::<String>::new());
        let program = cmd.resolved_program(Path::new("a.step")).unwrap();
        assert!(program.is_absolute());
        assert!(program.ends_with("scripts/infer.sh"));
        let bare = CommandInference::new("sh", Vec::<String>::new());
        assert_eq!(bare.resolved_program(Path::new("a.step")).unwrap(), PathBuf::from("sh"));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_failure_reports_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("a.step");
        let req = InferenceRequest {
            input: &input,
            work_dir: dir.path(),
        };
        let cmd = CommandInference::new("sh", ["-c", "echo boom >&2; exit 3", "{input}"]);
        let err = cmd.segment(&req).unwrap_err();
        assert!(err.to_string().contains("boom"));
    }
}
