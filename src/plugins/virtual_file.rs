//! Serves registered in-memory contents.

use crate::composer::Composer;
use crate::error::{BuildError, Result};
use crate::paths;
use crate::plugin::Plugin;
use crate::target::{Bytes, Contents, Target};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Stage for files that exist only in memory.
///
/// Operates on targets whose first tag is `virtual`, pops that tag and
/// replaces the contents with what was registered for the path through
/// [`Composer::virtual_file`]. Unregistered paths yield
/// [`BuildError::Unavailable`].
#[derive(Debug, Default)]
pub struct VirtualFilePlugin {
    files: RwLock<HashMap<PathBuf, Bytes>>,
}

impl VirtualFilePlugin {
    /// Scheme tag this plugin consumes.
    pub const TAG: &'static str = "virtual";

    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the contents served for `path`.
    pub fn set(&self, path: impl AsRef<Path>, contents: impl AsRef<[u8]>) {
        let contents: Bytes = Arc::from(contents.as_ref());
        self.files.write().insert(paths::resolve_path(path), contents);
    }

    /// Contents registered for `path`.
    pub fn get(&self, path: impl AsRef<Path>) -> Option<Bytes> {
        self.files.read().get(&paths::resolve_path(path)).cloned()
    }
}

#[async_trait]
impl Plugin for VirtualFilePlugin {
    fn name(&self) -> &str {
        "virtual-file"
    }

    fn operates_on(&self, _composer: &Composer, target: &Target) -> bool {
        target.scheme().is(Self::TAG)
    }

    async fn transform_impl(&self, _composer: &Composer, target: Target) -> Result<Target> {
        let contents = match self.get(target.path()) {
            Some(bytes) => Contents::ready(bytes),
            None => Contents::failed(BuildError::Unavailable(target.path().to_path_buf())),
        };
        Ok(target.with_scheme(target.scheme().remove_first()).with_contents(contents))
    }
}
