//! Reads a target's contents from disk.

use crate::composer::Composer;
use crate::error::{BuildError, Result};
use crate::plugin::Plugin;
use crate::plugins::VirtualFilePlugin;
use crate::target::{Bytes, Contents, Target};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::info;

/// Loads file contents for every target that is not virtual.
///
/// The scheme is left untouched. Reading happens lazily when the contents are
/// awaited; a missing path, a directory or a read error all yield
/// [`BuildError::Unavailable`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadFilePlugin;

#[async_trait]
impl Plugin for LoadFilePlugin {
    fn name(&self) -> &str {
        "load-file"
    }

    fn operates_on(&self, _composer: &Composer, target: &Target) -> bool {
        target.scheme().first() != VirtualFilePlugin::TAG
    }

    async fn transform_impl(&self, composer: &Composer, target: Target) -> Result<Target> {
        let path = target.path().to_path_buf();
        let verbose = composer.options().verbose;
        Ok(target.with_contents(Contents::from_future(load(path, verbose))))
    }
}

async fn load(path: PathBuf, verbose: bool) -> Result<Bytes> {
    let read = match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => tokio::fs::read(&path).await,
        Ok(_) => return Err(BuildError::Unavailable(path)),
        Err(err) => Err(err),
    };

    match read {
        Ok(bytes) => Ok(bytes.into()),
        Err(err) => {
            if verbose {
                info!(path = %path.display(), error = %err, "failed to read file");
            }
            Err(BuildError::Unavailable(path))
        }
    }
}
