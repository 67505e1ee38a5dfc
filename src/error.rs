//! Error types for the composer, its pipelines and watchers.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the build engine.
pub type Result<T, E = BuildError> = std::result::Result<T, E>;

/// Error produced while building a single file.
///
/// Pipelines hand out their result as a shared future, so this type is `Clone`
/// and carries messages rather than the underlying error values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum BuildError {
    /// No stage ever loaded contents for this file
    #[error("file \"{}\" not loaded", .0.display())]
    NotLoaded(PathBuf),
    /// Contents could not be produced (missing file, directory, ...)
    #[error("\"{}\" could not be read", .0.display())]
    Unavailable(PathBuf),
    /// The file changed while it was being built
    #[error("\"{}\" changed, rebuilding", .0.display())]
    Rebuild(PathBuf),
    /// A stage failed while transforming the file
    #[error("plugin \"{plugin}\" failed on \"{}\": {message}", path.display())]
    Plugin { plugin: String, path: PathBuf, message: String },
    /// Filesystem error
    #[error("IO error on \"{}\": {message}", path.display())]
    Io { path: PathBuf, message: String },
    /// A pipeline was triggered for a path that was never registered
    #[error("pipeline does not exist for \"{}\"", .0.display())]
    NoSuchPipeline(PathBuf),
    /// `virtual_file` was called without a virtual file plugin registered
    #[error("no virtual file plugin initialized")]
    NoVirtualFilePlugin,
    /// The build attempt was torn down before producing a result
    #[error("build aborted: {0}")]
    Aborted(String),
}

impl BuildError {
    /// Create a stage failure.
    pub fn plugin(
        plugin: impl Into<String>,
        path: impl Into<PathBuf>,
        message: impl std::fmt::Display,
    ) -> Self {
        BuildError::Plugin {
            plugin: plugin.into(),
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Create an IO error for the given path.
    pub fn io(path: impl Into<PathBuf>, err: &std::io::Error) -> Self {
        BuildError::Io { path: path.into(), message: err.to_string() }
    }

    /// Whether this error means "no content", which silently skips output.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, BuildError::NotLoaded(_) | BuildError::Unavailable(_))
    }

    /// Whether this error is a restart request rather than a failure.
    pub fn is_rebuild(&self) -> bool {
        matches!(self, BuildError::Rebuild(_))
    }
}

/// Error while setting up or running a change notifier.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WatchError {
    /// Failed to initialize file watcher
    #[error("Failed to initialize file watcher: {0}")]
    WatcherInit(notify::Error),
    /// Failed to add watch path
    #[error("Failed to watch path: {0}")]
    WatchPath(notify::Error),
    /// Watched directory not found
    #[error("Watch directory not found: {}", .0.display())]
    RootNotFound(PathBuf),
    /// Watching was started outside of a tokio runtime
    #[error("Watcher must be started within a tokio runtime")]
    NoRuntime,
}

/// Error while loading a build manifest.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ManifestError {
    /// File I/O error
    #[error("Failed to read manifest \"{}\": {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// JSON5 parsing error
    #[error("Failed to parse manifest: {0}")]
    Parse(#[from] json5::Error),
    /// Invalid glob pattern
    #[error("Invalid glob pattern '{0}': {1}")]
    Pattern(String, glob::PatternError),
    /// A source entry without an input path
    #[error("manifest source has no \"in\" path")]
    MissingInput,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_grouping() {
        assert!(BuildError::NotLoaded(PathBuf::from("/a")).is_unavailable());
        assert!(BuildError::Unavailable(PathBuf::from("/a")).is_unavailable());
        assert!(!BuildError::Rebuild(PathBuf::from("/a")).is_unavailable());
        assert!(!BuildError::plugin("sass", "/a", "boom").is_unavailable());
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(
            BuildError::Rebuild(PathBuf::from("/a.css")).to_string(),
            "\"/a.css\" changed, rebuilding"
        );
        assert_eq!(
            BuildError::plugin("copy-file", "/a", "denied").to_string(),
            "plugin \"copy-file\" failed on \"/a\": denied"
        );
        assert_eq!(
            BuildError::NoSuchPipeline(PathBuf::from("/x")).to_string(),
            "pipeline does not exist for \"/x\""
        );
    }
}
