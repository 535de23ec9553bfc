//! Invocation of the external clustering tool.
//!
//! The tool reads [`STAGED_INPUT`] from its working directory and writes
//! [`CLUSTER_ARTIFACT`] next to it. Its exit status is reported but not
//! trusted: a run only succeeds when the artifact exists afterwards.

use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::{debug, info, warn};
use thiserror::Error;

/// File name the clustering tool reads its scores from.
pub const STAGED_INPUT: &str = "similarity-scores.txt";
/// File name the clustering tool writes its tree to.
pub const CLUSTER_ARTIFACT: &str = "clusters.json";

/// Errors raised while running the clustering tool.
#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("script not found: {}", .0.display())]
    MissingScript(PathBuf),
    #[error("failed to launch {program:?}: {source}")]
    Spawn {
        program: OsString,
        #[source]
        source: io::Error,
    },
    #[error("{} not found after clustering ({exit})", .artifact.display())]
    MissingArtifact { artifact: PathBuf, exit: EngineExit },
    #[error("failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// How a clustering run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineExit {
    /// Exit code, `None` when the process was killed by a signal.
    pub code: Option<i32>,
    pub success: bool,
    pub stderr: String,
}

#[cfg(test)]
impl EngineExit {
    pub fn ok() -> Self {
        EngineExit {
            code: Some(0),
            success: true,
            stderr: String::new(),
        }
    }
}

impl fmt::Display for EngineExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit status {}", code),
            None => write!(f, "terminated by signal"),
        }
    }
}

/// Something that turns a staged scores file into a `clusters.json` next to it.
pub trait ClusterEngine {
    /// Checks run before anything is staged.
    fn preflight(&self) -> Result<(), InvokeError> {
        Ok(())
    }

    /// Cluster `staged_input`, writing [`CLUSTER_ARTIFACT`] into its directory.
    fn run(&self, staged_input: &Path, threshold: f64) -> Result<EngineExit, InvokeError>;
}

/// Runs a clustering script as `<interpreter> <script> -t <threshold>`.
#[derive(Debug, Clone)]
pub struct ScriptEngine {
    interpreter: OsString,
    script: PathBuf,
}

impl ScriptEngine {
    pub fn new(interpreter: impl Into<OsString>, script: impl Into<PathBuf>) -> Self {
        ScriptEngine {
            interpreter: interpreter.into(),
            script: script.into(),
        }
    }
}

impl ClusterEngine for ScriptEngine {
    fn preflight(&self) -> Result<(), InvokeError> {
        if self.script.exists() {
            Ok(())
        } else {
            Err(InvokeError::MissingScript(self.script.clone()))
        }
    }

    fn run(&self, staged_input: &Path, threshold: f64) -> Result<EngineExit, InvokeError> {
        // The child runs elsewhere, so a relative script path must be resolved here.
        let script = fs::canonicalize(&self.script).map_err(|source| InvokeError::Io {
            path: self.script.clone(),
            source,
        })?;
        let work_dir = parent_dir(staged_input);

        debug!(
            "Running {:?} {} -t {} in {}",
            self.interpreter,
            script.display(),
            threshold,
            work_dir.display()
        );
        let output = Command::new(&self.interpreter)
            .arg(&script)
            .arg("-t")
            .arg(threshold.to_string())
            .current_dir(work_dir)
            .output()
            .map_err(|source| InvokeError::Spawn {
                program: self.interpreter.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            debug!("cluster tool stdout: {}", stdout.trim_end());
        }
        Ok(EngineExit {
            code: output.status.code(),
            success: output.status.success(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Scratch files in the working directory, removed when dropped.
struct Scratch {
    staged: Option<PathBuf>,
    artifact: PathBuf,
}

impl Drop for Scratch {
    fn drop(&mut self) {
        if let Some(staged) = &self.staged {
            remove_scratch(staged);
        }
        remove_scratch(&self.artifact);
    }
}

fn remove_scratch(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!("Removed {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove {}: {}", path.display(), e),
    }
}

/// Result of a successful clustering run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub output: PathBuf,
    pub exit: EngineExit,
}

/// Stage `input` in `work_dir`, run `engine` and copy its tree to `output`.
///
/// The staged copy (when one was made) and the working directory's
/// `clusters.json` are removed on every return path.
pub fn invoke<E>(
    engine: &E,
    work_dir: &Path,
    input: &Path,
    output: &Path,
    threshold: f64,
) -> Result<Invocation, InvokeError>
where
    E: ClusterEngine + ?Sized,
{
    engine.preflight()?;

    let staged = work_dir.join(STAGED_INPUT);
    let artifact = work_dir.join(CLUSTER_ARTIFACT);
    let copied = staged.as_path() != input;
    if copied {
        fs::copy(input, &staged).map_err(|source| InvokeError::Io {
            path: input.to_path_buf(),
            source,
        })?;
    }
    let _scratch = Scratch {
        staged: copied.then(|| staged.clone()),
        artifact: artifact.clone(),
    };

    let exit = engine.run(&staged, threshold)?;
    if !exit.success {
        warn!("Cluster tool returned {}", exit);
        if !exit.stderr.trim().is_empty() {
            warn!("STDERR: {}", exit.stderr.trim_end());
        }
    }

    if !artifact.exists() {
        return Err(InvokeError::MissingArtifact { artifact, exit });
    }
    fs::copy(&artifact, output).map_err(|source| InvokeError::Io {
        path: output.to_path_buf(),
        source,
    })?;
    info!("Generated {}", output.display());

    Ok(Invocation {
        output: output.to_path_buf(),
        exit,
    })
}
