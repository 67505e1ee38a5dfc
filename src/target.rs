//! Artifact values flowing through a pipeline.
//!
//! A [`Target`] is what one stage hands to the next: the scheme still to be
//! applied, the file it stands for, the root its output is relative to, and
//! its contents. Targets are never modified; a stage builds a new one.
//!
//! Contents are a shared, lazily-polled future. A stage can chain onto the
//! previous contents ([`Contents::map`]) or ignore them and produce its own,
//! and nothing is read or computed until the output phase awaits it.

use crate::error::{BuildError, Result};
use crate::paths;
use crate::scheme::Scheme;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Immutable file contents.
pub type Bytes = Arc<[u8]>;

/// Lazily-resolved contents of a target.
///
/// Cloning is cheap and every clone observes the same single evaluation.
#[derive(Clone)]
pub struct Contents(Shared<BoxFuture<'static, Result<Bytes>>>);

impl Contents {
    /// Contents computed by `future` when first awaited.
    pub fn from_future<F>(future: F) -> Self
    where
        F: Future<Output = Result<Bytes>> + Send + 'static,
    {
        Self(future.boxed().shared())
    }

    /// Contents that are already known.
    pub fn ready(bytes: impl AsRef<[u8]>) -> Self {
        let bytes: Bytes = Arc::from(bytes.as_ref());
        Self::from_future(async move { Ok(bytes) })
    }

    /// Contents that resolve to `err`.
    pub fn failed(err: BuildError) -> Self {
        Self::from_future(async move { Err(err) })
    }

    /// Await the contents.
    pub async fn resolve(&self) -> Result<Bytes> {
        self.0.clone().await
    }

    /// Contents derived from these by `f`, evaluated lazily.
    pub fn map<F>(&self, f: F) -> Self
    where
        F: FnOnce(Bytes) -> Result<Bytes> + Send + 'static,
    {
        let prev = self.clone();
        Self::from_future(async move { f(prev.resolve().await?) })
    }
}

impl fmt::Debug for Contents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.peek() {
            Some(Ok(bytes)) => write!(f, "Contents({} bytes)", bytes.len()),
            Some(Err(err)) => write!(f, "Contents(error: {})", err),
            None => f.write_str("Contents(pending)"),
        }
    }
}

/// An artifact at one point of its transformation chain.
#[derive(Debug, Clone)]
pub struct Target {
    scheme: Scheme,
    path: PathBuf,
    root: PathBuf,
    contents: Contents,
}

impl Target {
    /// Create a new target.
    ///
    /// `path` and `root` are expected to be resolved already; the composer
    /// resolves every path it registers.
    pub fn new(
        scheme: impl Into<Scheme>,
        path: impl Into<PathBuf>,
        root: impl Into<PathBuf>,
        contents: Contents,
    ) -> Self {
        Self { scheme: scheme.into(), path: path.into(), root: root.into(), contents }
    }

    pub fn scheme(&self) -> &Scheme {
        &self.scheme
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn contents(&self) -> &Contents {
        &self.contents
    }

    /// Same target under a different scheme.
    pub fn with_scheme(&self, scheme: impl Into<Scheme>) -> Self {
        Self { scheme: scheme.into(), ..self.clone() }
    }

    /// Same target written to a different path.
    pub fn with_path(&self, path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), ..self.clone() }
    }

    /// Same target with different contents.
    pub fn with_contents(&self, contents: Contents) -> Self {
        Self { contents, ..self.clone() }
    }

    /// Await the raw contents.
    pub async fn bytes(&self) -> Result<Bytes> {
        self.contents.resolve().await
    }

    /// Await the contents as UTF-8 text.
    pub async fn text(&self) -> Result<String> {
        let bytes = self.bytes().await?;
        String::from_utf8(bytes.to_vec()).map_err(|e| BuildError::Io {
            path: self.path.clone(),
            message: format!("contents are not valid UTF-8: {}", e),
        })
    }

    /// Path relative to the target's root.
    pub fn relative_path(&self) -> PathBuf {
        paths::relative_to(&self.path, &self.root)
    }

    /// Where this target is written under `out_dir`.
    pub fn output_path(&self, out_dir: &Path) -> PathBuf {
        out_dir.join(self.relative_path())
    }
}
