//! The composer: plugin registry, pipeline registry and dependency graph.
//!
//! A [`Composer`] is a cheap-to-clone handle. Every clone shares the same
//! registries, so plugins and pipelines can hold one while they work.

use crate::error::{BuildError, Result, WatchError};
use crate::graph::DependencyGraph;
use crate::paths;
use crate::pipeline::{BuildFuture, Pipeline, PipelineOptions};
use crate::plugin::Plugin;
use crate::plugins::VirtualFilePlugin;
use crate::result::{BuildResult, FileResult};
use crate::scheme::Scheme;
use crate::target::Target;
use crate::watcher::{FsWatcher, OnChange, WatchGuard, Watcher};
use futures::future::{join_all, FutureExt};
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Instant;
use tracing::{debug, info};

/// Composer-wide settings visible to every plugin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComposerOptions {
    /// Emit diagnostics for every stage and pipeline event
    pub verbose: bool,
    /// Build for release; plugins may minify or skip debug output
    pub release: bool,
}

impl ComposerOptions {
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_release(mut self, release: bool) -> Self {
        self.release = release;
        self
    }
}

struct ComposerInner {
    options: ComposerOptions,
    plugins: RwLock<Vec<Arc<dyn Plugin>>>,
    virtual_files: RwLock<Option<Arc<VirtualFilePlugin>>>,
    pipelines: Mutex<HashMap<PathBuf, Arc<Pipeline>>>,
    dependencies: Mutex<DependencyGraph>,
}

/// Coordinates plugins, per-file pipelines and the dependency graph.
#[derive(Clone)]
pub struct Composer {
    inner: Arc<ComposerInner>,
}

/// Non-owning handle held by pipelines.
#[derive(Clone)]
pub(crate) struct WeakComposer(Weak<ComposerInner>);

impl WeakComposer {
    pub(crate) fn upgrade(&self) -> Option<Composer> {
        self.0.upgrade().map(|inner| Composer { inner })
    }
}

impl Composer {
    /// Create a composer with no plugins and no pipelines.
    pub fn new(options: ComposerOptions) -> Self {
        Self {
            inner: Arc::new(ComposerInner {
                options,
                plugins: RwLock::new(Vec::new()),
                virtual_files: RwLock::new(None),
                pipelines: Mutex::new(HashMap::new()),
                dependencies: Mutex::new(DependencyGraph::new()),
            }),
        }
    }

    pub fn options(&self) -> &ComposerOptions {
        &self.inner.options
    }

    fn downgrade(&self) -> WeakComposer {
        WeakComposer(Arc::downgrade(&self.inner))
    }

    /// Append a plugin to the chain.
    ///
    /// Plugins run in the order they were added. Pipelines that are already
    /// running keep the chain they started with.
    pub fn add_plugin<P: Plugin + 'static>(&self, plugin: P) -> &Self {
        if self.options().verbose {
            info!(plugin = plugin.name(), "loading plugin");
        }

        let plugin = Arc::new(plugin);
        let any: Arc<dyn Any + Send + Sync> = plugin.clone();
        if let Ok(virtual_files) = any.downcast::<VirtualFilePlugin>() {
            *self.inner.virtual_files.write() = Some(virtual_files);
        }

        self.inner.plugins.write().push(plugin);
        self
    }

    /// Snapshot of the plugin chain.
    pub fn plugins(&self) -> Vec<Arc<dyn Plugin>> {
        self.inner.plugins.read().clone()
    }

    /// Register `path` for building, returning its pipeline.
    ///
    /// If a pipeline already exists for the resolved path it is returned as is
    /// and `options` are ignored.
    pub fn load_file(&self, path: impl AsRef<Path>, options: PipelineOptions) -> Arc<Pipeline> {
        let path = paths::resolve_path(path);
        let mut pipelines = self.inner.pipelines.lock();
        if let Some(existing) = pipelines.get(&path) {
            return Arc::clone(existing);
        }

        if self.options().verbose {
            info!(path = %path.display(), "creating pipeline");
        }
        let pipeline = Arc::new(Pipeline::new(self.downgrade(), &path, &options));
        pipelines.insert(path, Arc::clone(&pipeline));
        pipeline
    }

    /// Register an in-memory file and its pipeline.
    ///
    /// The scheme is prefixed with `virtual` when it does not already start
    /// with it, so the contents are served from memory instead of disk.
    /// Requires the [`VirtualFilePlugin`] to be registered.
    pub fn virtual_file(
        &self,
        path: impl AsRef<Path>,
        contents: impl AsRef<[u8]>,
        mut options: PipelineOptions,
    ) -> Result<Arc<Pipeline>> {
        let Some(virtual_files) = self.inner.virtual_files.read().clone() else {
            return Err(BuildError::NoVirtualFilePlugin);
        };

        let path = paths::resolve_path(path);
        virtual_files.set(&path, contents);

        let scheme = match options.scheme.take() {
            Some(scheme) => Scheme::new(scheme),
            None => Scheme::from_extension(&path),
        };
        let scheme = if scheme.is(VirtualFilePlugin::TAG) {
            scheme
        } else if scheme.is_empty() {
            Scheme::new(VirtualFilePlugin::TAG)
        } else {
            Scheme::new(format!("{}:{}", VirtualFilePlugin::TAG, scheme))
        };
        options.scheme = Some(scheme.as_str().to_string());

        Ok(self.load_file(path, options))
    }

    /// Record that building `file` consulted `depends_on`.
    pub fn add_dependency_for(
        &self,
        file: impl AsRef<Path>,
        depends_on: impl AsRef<Path>,
    ) -> &Self {
        let file = paths::resolve_path(file);
        let depends_on = paths::resolve_path(depends_on);
        if self.options().verbose {
            info!(
                file = %file.display(),
                depends_on = %depends_on.display(),
                "adding dependency"
            );
        }
        self.inner.dependencies.lock().set(file, depends_on);
        self
    }

    /// Forget everything `file` was recorded as depending on.
    pub fn clear_dependencies_for(&self, file: impl AsRef<Path>) -> &Self {
        let file = paths::resolve_path(file);
        if self.options().verbose {
            info!(file = %file.display(), "clearing dependencies");
        }
        self.inner.dependencies.lock().delete(&file);
        self
    }

    /// Files that `file` depends on.
    pub fn dependencies_of(&self, file: impl AsRef<Path>) -> Vec<PathBuf> {
        self.inner.dependencies.lock().get(&paths::resolve_path(file))
    }

    /// Files whose builds consulted `file`.
    pub fn dependents_of(&self, file: impl AsRef<Path>) -> Vec<PathBuf> {
        self.inner.dependencies.lock().get_reverse(&paths::resolve_path(file))
    }

    /// Pipeline registered for `path`, if any.
    pub fn pipeline(&self, path: impl AsRef<Path>) -> Option<Arc<Pipeline>> {
        self.inner.pipelines.lock().get(&paths::resolve_path(path)).cloned()
    }

    /// Every registered pipeline, ordered by input path.
    pub fn pipelines(&self) -> Vec<Arc<Pipeline>> {
        let mut pipelines: Vec<_> = self.inner.pipelines.lock().values().cloned().collect();
        pipelines.sort_by(|a, b| a.input_path().cmp(b.input_path()));
        pipelines
    }

    /// Rebuild the pipeline for `path` and wait for it.
    pub async fn trigger_pipeline(&self, path: impl AsRef<Path>) -> Result<Target> {
        self.trigger(path.as_ref())?.await
    }

    fn trigger(&self, path: &Path) -> Result<BuildFuture> {
        let path = paths::resolve_path(path);
        match self.pipeline(&path) {
            Some(pipeline) => Ok(pipeline.rebuild()),
            None => Err(BuildError::NoSuchPipeline(path)),
        }
    }

    /// Build every registered pipeline.
    ///
    /// Per-file failures are reported in the result and never fail the whole
    /// build. Files registered while the build runs are built by whoever
    /// registered them, not by this call.
    pub async fn build(&self) -> BuildResult {
        let started = Instant::now();
        let files = join_all(self.pipelines().into_iter().map(|pipeline| {
            let build = pipeline.build_settled();
            let input = pipeline.input_path().to_path_buf();
            async move {
                let file_started = Instant::now();
                let settled = build.await;
                FileResult::from_settled(input, &settled, file_started.elapsed())
            }
        }))
        .await;

        let result = BuildResult::new(files, started.elapsed());
        if self.options().verbose {
            info!(summary = %result.summary(), "build complete");
        }
        result
    }

    /// Rebuild `path` and every file that depends on it.
    pub async fn file_changed(&self, path: impl AsRef<Path>) {
        let path = paths::resolve_path(path);
        if self.options().verbose {
            info!(path = %path.display(), "file changed");
        }

        let mut affected = vec![path.clone()];
        affected.extend(self.dependents_of(&path));

        join_all(affected.into_iter().map(|file| async move {
            if let Err(err) = self.trigger_pipeline(&file).await {
                debug!(path = %file.display(), error = %err, "rebuild after change failed");
            }
        }))
        .await;
    }

    /// Rebuild affected pipelines whenever `watcher` reports a change.
    pub fn subscribe(&self, watcher: &dyn Watcher) -> std::result::Result<WatchGuard, WatchError> {
        let composer = self.clone();
        let on_change: OnChange = Arc::new(move |path: PathBuf| {
            let composer = composer.clone();
            async move { composer.file_changed(path).await }.boxed()
        });
        watcher.start(on_change)
    }

    /// Build everything, then rebuild on every change `watcher` reports.
    ///
    /// Never returns unless subscribing fails.
    pub async fn watch_with<W: Watcher>(
        &self,
        watcher: W,
    ) -> std::result::Result<Infallible, WatchError> {
        let result = self.build().await;
        info!(summary = %result.summary(), "initial build complete, watching for changes");

        let _guard = self.subscribe(&watcher)?;
        std::future::pending().await
    }

    /// Build everything, then watch `root` on the file system.
    pub async fn watch(
        &self,
        root: impl AsRef<Path>,
    ) -> std::result::Result<Infallible, WatchError> {
        let watcher = FsWatcher::new(root)?;
        self.watch_with(watcher).await
    }
}

impl fmt::Debug for Composer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Composer")
            .field("options", &self.inner.options)
            .field("plugins", &self.inner.plugins.read().len())
            .field("pipelines", &self.inner.pipelines.lock().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::add_default_plugins;
    use crate::result::BuildStatus;
    use crate::watcher::FakeWatcher;
    use tempfile::TempDir;

    #[test]
    fn test_options_builder() {
        let options = ComposerOptions::default().with_verbose(true).with_release(true);
        assert!(options.verbose);
        assert!(options.release);
    }

    #[test]
    fn test_load_file_registers_once() {
        let composer = Composer::new(ComposerOptions::default());
        let a = composer.load_file("/p/a.txt", PipelineOptions::new("/p"));
        let b = composer.load_file("/p/./x/../a.txt", PipelineOptions::new("/other"));

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(b.root_path(), Path::new("/p"));
        assert_eq!(composer.pipelines().len(), 1);
    }

    #[test]
    fn test_virtual_file_requires_plugin() {
        let composer = Composer::new(ComposerOptions::default());
        let err = composer.virtual_file("/p/a.txt", "x", PipelineOptions::new("/p")).unwrap_err();
        assert_eq!(err, BuildError::NoVirtualFilePlugin);
    }

    #[test]
    fn test_virtual_file_scheme_prefixed() {
        let composer = Composer::new(ComposerOptions::default());
        add_default_plugins(&composer);

        let a = composer.virtual_file("/p/a.txt", "x", PipelineOptions::new("/p")).unwrap();
        let b = composer
            .virtual_file("/p/b", "x", PipelineOptions::new("/p").with_scheme("virtual:to-base64"))
            .unwrap();
        let c = composer.virtual_file("/p/c", "x", PipelineOptions::new("/p")).unwrap();

        assert_eq!(a.scheme().as_str(), "virtual:txt");
        assert_eq!(b.scheme().as_str(), "virtual:to-base64");
        assert_eq!(c.scheme().as_str(), "virtual");
    }

    #[test]
    fn test_dependencies_resolved_and_cleared() {
        let composer = Composer::new(ComposerOptions::default());
        composer
            .add_dependency_for("/site/index.html", "/site/./nav.ejs")
            .add_dependency_for("/site/about.html", "/site/nav.ejs");

        assert_eq!(
            composer.dependencies_of("/site/index.html"),
            vec![PathBuf::from("/site/nav.ejs")]
        );
        assert_eq!(composer.dependents_of("/site/nav.ejs").len(), 2);

        composer.clear_dependencies_for("/site/index.html");
        assert_eq!(
            composer.dependents_of("/site/nav.ejs"),
            vec![PathBuf::from("/site/about.html")]
        );
    }

    #[tokio::test]
    async fn test_trigger_unknown_pipeline() {
        let composer = Composer::new(ComposerOptions::default());
        let err = composer.trigger_pipeline("/nowhere.txt").await.unwrap_err();
        assert_eq!(err, BuildError::NoSuchPipeline(PathBuf::from("/nowhere.txt")));
    }

    #[tokio::test]
    async fn test_virtual_file_built_from_memory() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("out");
        let composer = Composer::new(ComposerOptions::default());
        add_default_plugins(&composer);

        let root = temp.path().join("src");
        let options = PipelineOptions::new(&root).with_output(&out);
        composer.virtual_file(root.join("gen.txt"), "generated", options).unwrap();
        let result = composer.build().await;

        assert_eq!(result.built_count(), 1);
        assert_eq!(std::fs::read_to_string(out.join("gen.txt")).unwrap(), "generated");
    }

    #[tokio::test]
    async fn test_build_reports_missing_file_as_skipped() {
        let temp = TempDir::new().unwrap();
        let composer = Composer::new(ComposerOptions::default());
        add_default_plugins(&composer);

        composer.load_file(
            temp.path().join("missing.txt"),
            PipelineOptions::new(temp.path()).with_output(temp.path().join("out")),
        );
        let result = composer.build().await;

        assert!(result.is_success());
        assert_eq!(result.files[0].status, BuildStatus::Skipped);
        assert!(!temp.path().join("out").exists());
    }

    #[tokio::test]
    async fn test_subscribe_and_stop() {
        let composer = Composer::new(ComposerOptions::default());
        let watcher = FakeWatcher::new("/p");

        let guard = composer.subscribe(&watcher).unwrap();
        assert_eq!(watcher.subscriber_count(), 1);

        guard.stop();
        guard.stop();
        assert_eq!(watcher.subscriber_count(), 0);
    }
}
