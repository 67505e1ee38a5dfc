//! Build result types.
//!
//! A [`BuildResult`] reports what a full [`Composer::build`](crate::Composer::build)
//! did for each registered file. Failures are collected here instead of
//! failing the build.

use crate::pipeline::{Outcome, Settled};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

/// Status of a single file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "lowercase")]
pub enum BuildStatus {
    /// Contents were written
    Success,
    /// Nothing to write: no contents, or no output directory
    Skipped,
    /// Build failed with error
    Failed(String),
}

impl BuildStatus {
    /// Check if the status indicates success.
    pub fn is_success(&self) -> bool {
        matches!(self, BuildStatus::Success | BuildStatus::Skipped)
    }

    /// Check if the status indicates failure.
    pub fn is_failure(&self) -> bool {
        matches!(self, BuildStatus::Failed(_))
    }
}

impl std::fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildStatus::Success => write!(f, "success"),
            BuildStatus::Skipped => write!(f, "skipped"),
            BuildStatus::Failed(err) => write!(f, "failed: {}", err),
        }
    }
}

/// Result of building a single file.
#[derive(Debug, Clone, Serialize)]
pub struct FileResult {
    /// Input path of the pipeline
    pub input: PathBuf,
    /// Build status
    #[serde(flatten)]
    pub status: BuildStatus,
    /// Output files produced
    pub outputs: Vec<PathBuf>,
    /// Time spent waiting for the pipeline
    pub duration: Duration,
}

impl FileResult {
    /// Create a successful result.
    pub fn success(input: PathBuf, outputs: Vec<PathBuf>, duration: Duration) -> Self {
        Self { input, status: BuildStatus::Success, outputs, duration }
    }

    /// Create a skipped result.
    pub fn skipped(input: PathBuf, duration: Duration) -> Self {
        Self { input, status: BuildStatus::Skipped, outputs: vec![], duration }
    }

    /// Create a failed result.
    pub fn failed(input: PathBuf, error: String, duration: Duration) -> Self {
        Self { input, status: BuildStatus::Failed(error), outputs: vec![], duration }
    }

    /// Summarize a settled attempt for `input`.
    pub fn from_settled(input: PathBuf, settled: &Settled, duration: Duration) -> Self {
        if let Err(err) = &settled.result {
            return Self::failed(input, err.to_string(), duration);
        }

        match &settled.outcome {
            Outcome::Written(path) => Self::success(input, vec![path.clone()], duration),
            Outcome::Failed(err) => Self::failed(input, err.clone(), duration),
            Outcome::NoOutput => Self::skipped(input, duration),
        }
    }

    /// Check if this result is successful.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Result of a complete build run.
#[derive(Debug, Default, Serialize)]
pub struct BuildResult {
    /// Results for each file, ordered by input path
    pub files: Vec<FileResult>,
    /// Total build duration
    pub total_duration: Duration,
}

impl BuildResult {
    pub fn new(files: Vec<FileResult>, total_duration: Duration) -> Self {
        Self { files, total_duration }
    }

    /// Get the number of files written.
    pub fn built_count(&self) -> usize {
        self.files.iter().filter(|r| matches!(r.status, BuildStatus::Success)).count()
    }

    /// Get the number of skipped files.
    pub fn skipped_count(&self) -> usize {
        self.files.iter().filter(|r| matches!(r.status, BuildStatus::Skipped)).count()
    }

    /// Get the number of failed files.
    pub fn failed_count(&self) -> usize {
        self.files.iter().filter(|r| r.status.is_failure()).count()
    }

    /// Check if the overall build succeeded (no failures).
    pub fn is_success(&self) -> bool {
        self.failed_count() == 0
    }

    /// Get all outputs produced.
    pub fn all_outputs(&self) -> Vec<&PathBuf> {
        self.files.iter().flat_map(|r| r.outputs.iter()).collect()
    }

    /// Get failed file results.
    pub fn failures(&self) -> Vec<&FileResult> {
        self.files.iter().filter(|r| r.status.is_failure()).collect()
    }

    /// Format a summary of the build result.
    pub fn summary(&self) -> String {
        let built = self.built_count();
        let skipped = self.skipped_count();
        let failed = self.failed_count();
        let total = self.files.len();

        if failed == 0 {
            return format!(
                "Build succeeded: {} built, {} skipped ({} total) in {:?}",
                built, skipped, total, self.total_duration
            );
        }

        let mut lines = vec![format!(
            "Build failed: {} built, {} skipped, {} failed ({} total)",
            built, skipped, failed, total
        )];
        for file in self.failures() {
            lines.push(format!("  - {}: {}", file.input.display(), file.status));
        }
        lines.join("\n")
    }
}
