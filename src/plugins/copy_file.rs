//! Copies files and directory trees to the output directory.

use crate::composer::Composer;
use crate::error::{BuildError, Result};
use crate::pipeline::PipelineOptions;
use crate::plugin::Plugin;
use crate::target::{Bytes, Contents, Target};
use async_trait::async_trait;
use futures::future::join_all;
use tracing::info;

/// Pops a leading `copy` tag.
///
/// Files keep their loaded contents and are written unchanged. For a directory
/// every entry is registered with its own `copy` pipeline, sharing the
/// directory's root and output, and those are built before the directory's
/// own contents resolve.
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyFilePlugin;

#[async_trait]
impl Plugin for CopyFilePlugin {
    fn name(&self) -> &str {
        "copy-file"
    }

    fn operates_on(&self, _composer: &Composer, target: &Target) -> bool {
        target.scheme().is("copy")
    }

    async fn transform_impl(&self, composer: &Composer, target: Target) -> Result<Target> {
        let contents = Contents::from_future(copy(composer.clone(), target.clone()));
        Ok(target.with_scheme(target.scheme().remove_first()).with_contents(contents))
    }
}

async fn copy(composer: Composer, target: Target) -> Result<Bytes> {
    let path = target.path();
    let pipeline = composer.load_file(path, PipelineOptions::new(target.root()));

    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|_| BuildError::Unavailable(path.to_path_buf()))?;

    if meta.is_dir() {
        let mut options = PipelineOptions::new(pipeline.root_path()).with_scheme("copy");
        options.output = pipeline.output_path().map(|p| p.to_path_buf());

        let mut entries = tokio::fs::read_dir(path).await.map_err(|e| BuildError::io(path, &e))?;
        let mut builds = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| BuildError::io(path, &e))? {
            builds.push(composer.load_file(entry.path(), options.clone()).build());
        }

        if composer.options().verbose {
            info!(path = %path.display(), entries = builds.len(), "copying directory");
        }
        join_all(builds).await;
    }

    target.bytes().await
}
