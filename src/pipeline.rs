//! Per-file build state machine.
//!
//! A [`Pipeline`] owns the build of one input file. It runs the composer's
//! plugin chain over a seed [`Target`], then writes the final target under its
//! output directory. Its result is a shared future: every caller of
//! [`Pipeline::build`] observes the same computation until something asks for
//! a [`Pipeline::rebuild`].
//!
//! # Restarts
//!
//! At most one attempt runs per file. Calling `rebuild` while an attempt is in
//! flight does not start a second one; it raises the attempt's stop token and
//! hands back the result future the caller already has. The attempt notices
//! the token (at the latest while materializing its output), throws its
//! progress away and starts over from a fresh seed, so the shared result is
//! always computed by an attempt that began after the most recent request.
//!
//! Stage work already in flight is not interrupted by a restart; only its
//! output is discarded. The discard is best-effort: a write already handed to
//! the blocking pool still lands on disk before the next attempt overwrites it.

use crate::composer::{Composer, WeakComposer};
use crate::error::{BuildError, Result};
use crate::paths;
use crate::scheme::Scheme;
use crate::target::{Contents, Target};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::fmt;
use std::ops::ControlFlow;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Shared handle on the result of a pipeline's current build.
pub type BuildFuture = Shared<BoxFuture<'static, Result<Target>>>;

/// Shared handle on a pipeline's current build, together with its outcome.
pub type SettledFuture = Shared<BoxFuture<'static, Settled>>;

/// Options used when registering a file with the composer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Base directory output paths are made relative to
    pub root: PathBuf,
    /// Output directory; nothing is written when absent or empty
    pub output: Option<PathBuf>,
    /// Initial scheme; derived from the file extension when absent
    pub scheme: Option<String>,
}

impl PipelineOptions {
    /// Options rooted at `root`, with no output directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), output: None, scheme: None }
    }

    /// Set the output directory.
    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }

    /// Set the initial scheme.
    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = Some(scheme.into());
        self
    }
}

/// Where a pipeline is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStatus {
    /// Never built, or the cached result is current
    Idle,
    /// An attempt is executing
    Running,
    /// An attempt is executing and a restart has been requested
    Restarting,
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineStatus::Idle => write!(f, "idle"),
            PipelineStatus::Running => write!(f, "running"),
            PipelineStatus::Restarting => write!(f, "restarting"),
        }
    }
}

/// What the last completed attempt did with its output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Contents were written to this path
    Written(PathBuf),
    /// No contents, or no output directory configured
    NoOutput,
    /// The attempt failed; nothing was written
    Failed(String),
}

/// A finished attempt: its result and what it did with its output.
#[derive(Debug, Clone)]
pub struct Settled {
    pub result: Result<Target>,
    pub outcome: Outcome,
}

impl Settled {
    fn aborted(err: BuildError) -> Self {
        Self { outcome: Outcome::Failed(err.to_string()), result: Err(err) }
    }
}

#[derive(Default)]
struct PipelineState {
    in_progress: bool,
    result: Option<BuildFuture>,
    settled: Option<SettledFuture>,
    stop: CancellationToken,
    last_outcome: Option<Outcome>,
}

enum Attempt {
    Done(Result<Target>, Outcome),
    Restart,
}

/// Build state machine for a single input file.
pub struct Pipeline {
    composer: WeakComposer,
    scheme: Scheme,
    input_path: PathBuf,
    root_path: PathBuf,
    output_path: Option<PathBuf>,
    state: Mutex<PipelineState>,
}

impl Pipeline {
    /// Create a pipeline for `input_path`. Paths are resolved here.
    pub(crate) fn new(
        composer: WeakComposer,
        input_path: &Path,
        options: &PipelineOptions,
    ) -> Self {
        let input_path = paths::resolve_path(input_path);
        let scheme = match &options.scheme {
            Some(scheme) => Scheme::new(scheme.as_str()),
            None => Scheme::from_extension(&input_path),
        };
        let output_path = options
            .output
            .as_ref()
            .filter(|out| !out.as_os_str().is_empty())
            .map(paths::resolve_path);

        Self {
            composer,
            scheme,
            root_path: paths::resolve_path(&options.root),
            input_path,
            output_path,
            state: Mutex::new(PipelineState::default()),
        }
    }

    /// Scheme of the seed target.
    pub fn scheme(&self) -> &Scheme {
        &self.scheme
    }

    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    pub fn output_path(&self) -> Option<&Path> {
        self.output_path.as_deref()
    }

    /// Current lifecycle state.
    pub fn status(&self) -> PipelineStatus {
        let state = self.state.lock();
        if !state.in_progress {
            PipelineStatus::Idle
        } else if state.stop.is_cancelled() {
            PipelineStatus::Restarting
        } else {
            PipelineStatus::Running
        }
    }

    /// Outcome of the most recently completed attempt.
    pub fn last_outcome(&self) -> Option<Outcome> {
        self.state.lock().last_outcome.clone()
    }

    /// The cached result, building first if this pipeline never ran.
    ///
    /// Must be called from within a tokio runtime.
    pub fn build(self: &Arc<Self>) -> BuildFuture {
        let mut state = self.state.lock();
        match &state.result {
            Some(result) => result.clone(),
            None => self.start(&mut state).0,
        }
    }

    /// Like [`build`](Self::build), but resolves to the result together with
    /// the outcome of the same attempt.
    pub fn build_settled(self: &Arc<Self>) -> SettledFuture {
        let mut state = self.state.lock();
        match &state.settled {
            Some(settled) => settled.clone(),
            None => self.start(&mut state).1,
        }
    }

    /// Build again, or restart the attempt already in flight.
    ///
    /// Must be called from within a tokio runtime.
    pub fn rebuild(self: &Arc<Self>) -> BuildFuture {
        let mut state = self.state.lock();
        if state.in_progress {
            if let Some(result) = &state.result {
                if self.is_verbose() {
                    info!(path = %self.input_path.display(), "restarting the pipeline");
                }
                state.stop.cancel();
                return result.clone();
            }
        }
        self.start(&mut state).0
    }

    fn is_verbose(&self) -> bool {
        self.composer.upgrade().is_some_and(|c| c.options().verbose)
    }

    fn start(self: &Arc<Self>, state: &mut PipelineState) -> (BuildFuture, SettledFuture) {
        let Some(composer) = self.composer.upgrade() else {
            let err = BuildError::Aborted("composer dropped".to_string());
            let settled = futures::future::ready(Settled::aborted(err)).boxed().shared();
            return (result_of(&settled), settled);
        };

        state.in_progress = true;
        state.stop = CancellationToken::new();

        let handle = tokio::spawn(Arc::clone(self).run(composer));
        let settled = async move {
            match handle.await {
                Ok(settled) => settled,
                Err(err) => Settled::aborted(BuildError::Aborted(err.to_string())),
            }
        }
        .boxed()
        .shared();
        let result = result_of(&settled);

        state.settled = Some(settled.clone());
        state.result = Some(result.clone());
        (result, settled)
    }

    async fn run(self: Arc<Self>, composer: Composer) -> Settled {
        let verbose = composer.options().verbose;
        if verbose {
            info!(path = %self.input_path.display(), "starting the pipeline");
        }

        let mut stop = self.state.lock().stop.clone();
        loop {
            composer.clear_dependencies_for(&self.input_path);
            let attempt = match AssertUnwindSafe(self.attempt(&composer, &stop))
                .catch_unwind()
                .await
            {
                Ok(attempt) => attempt,
                Err(_) => {
                    error!(path = %self.input_path.display(), "build attempt panicked");
                    let err = BuildError::Aborted("build attempt panicked".to_string());
                    let outcome = Outcome::Failed(err.to_string());
                    Attempt::Done(Err(err), outcome)
                }
            };

            let next = {
                let mut state = self.state.lock();
                match attempt {
                    Attempt::Done(result, outcome) if !stop.is_cancelled() => {
                        state.in_progress = false;
                        state.last_outcome = Some(outcome.clone());
                        ControlFlow::Break(Settled { result, outcome })
                    }
                    _ => {
                        state.stop = CancellationToken::new();
                        ControlFlow::Continue(state.stop.clone())
                    }
                }
            };

            match next {
                ControlFlow::Break(settled) => {
                    if verbose {
                        info!(path = %self.input_path.display(), "pipeline complete");
                    }
                    return settled;
                }
                ControlFlow::Continue(token) => {
                    if verbose {
                        info!(path = %self.input_path.display(), "pipeline restarted");
                    }
                    stop = token;
                }
            }
        }
    }

    async fn attempt(&self, composer: &Composer, stop: &CancellationToken) -> Attempt {
        let mut target = Target::new(
            self.scheme.clone(),
            self.input_path.clone(),
            self.root_path.clone(),
            Contents::failed(BuildError::NotLoaded(self.input_path.clone())),
        );

        for plugin in composer.plugins() {
            match plugin.transform(composer, target).await {
                Ok(next) => target = next,
                Err(err) if err.is_rebuild() => return Attempt::Restart,
                Err(err) => {
                    warn!(
                        path = %self.input_path.display(),
                        plugin = plugin.name(),
                        error = %err,
                        "build attempt failed"
                    );
                    let outcome = Outcome::Failed(err.to_string());
                    return Attempt::Done(Err(err), outcome);
                }
            }
        }

        // Dropping the output future abandons the write; one already running
        // on the blocking pool still completes.
        let output = tokio::select! {
            biased;
            _ = stop.cancelled() => None,
            output = self.output(composer, &target) => Some(output),
        };

        match output {
            Some(Ok(outcome)) => Attempt::Done(Ok(target), outcome),
            Some(Err(_)) | None => Attempt::Restart,
        }
    }

    /// Materialize `target` and write it out.
    ///
    /// Only a rebuild request is returned as an error; every other failure is
    /// logged and reported through the outcome.
    async fn output(&self, composer: &Composer, target: &Target) -> Result<Outcome> {
        let verbose = composer.options().verbose;
        let contents = match target.bytes().await {
            Ok(contents) => contents,
            Err(err) if err.is_rebuild() => return Err(err),
            Err(err) if err.is_unavailable() => {
                if verbose {
                    info!(path = %target.path().display(), reason = %err, "no contents to output");
                }
                return Ok(Outcome::NoOutput);
            }
            Err(err) => {
                error!(path = %target.path().display(), error = %err, "failed to build file");
                return Ok(Outcome::Failed(err.to_string()));
            }
        };

        let Some(out_dir) = &self.output_path else {
            return Ok(Outcome::NoOutput);
        };

        let output_path = target.output_path(out_dir);
        if verbose {
            info!(path = %output_path.display(), "outputting file");
        }

        match write_output(&output_path, &contents).await {
            Ok(()) => Ok(Outcome::Written(output_path)),
            Err(err) => {
                error!(path = %output_path.display(), error = %err, "failed to write output");
                Ok(Outcome::Failed(err.to_string()))
            }
        }
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("input_path", &self.input_path)
            .field("scheme", &self.scheme)
            .field("root_path", &self.root_path)
            .field("output_path", &self.output_path)
            .field("status", &self.status())
            .finish()
    }
}

fn result_of(settled: &SettledFuture) -> BuildFuture {
    settled.clone().map(|settled| settled.result).boxed().shared()
}

async fn write_output(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| BuildError::io(parent, &e))?;
    }
    tokio::fs::write(path, contents).await.map_err(|e| BuildError::io(path, &e))
}
