//! Assetline - extensible asset build pipeline
//!
//! This library provides:
//! - A [`Composer`] holding an ordered chain of [`Plugin`]s, a registry of
//!   per-file [`Pipeline`]s and a file [`DependencyGraph`]
//! - Scheme-tagged targets: each plugin consumes the tag it understands from
//!   the front of the target's [`Scheme`] and hands a new [`Target`] on
//! - Incremental rebuilds: a pipeline that is asked to rebuild while running
//!   restarts instead of running twice, and changed files rebuild everything
//!   recorded as depending on them
//! - Watch mode through the [`Watcher`] abstraction
//!
//! # Example
//!
//! ```ignore
//! use assetline::{Composer, ComposerOptions, PipelineOptions};
//! use assetline::plugins::add_default_plugins;
//!
//! let composer = Composer::new(ComposerOptions::default());
//! add_default_plugins(&composer);
//! composer.load_file("src/logo.png", PipelineOptions::new("src").with_output("dist"));
//!
//! let result = composer.build().await;
//! println!("{}", result.summary());
//! ```

pub mod cli;
pub mod composer;
pub mod error;
pub mod graph;
pub mod manifest;
pub mod paths;
pub mod pipeline;
pub mod plugin;
pub mod plugins;
pub mod result;
pub mod scheme;
pub mod target;
pub mod watcher;

pub use composer::{Composer, ComposerOptions};
pub use error::{BuildError, ManifestError, Result, WatchError};
pub use graph::{DependencyGraph, TwoWayMap};
pub use pipeline::{
    BuildFuture, Outcome, Pipeline, PipelineOptions, PipelineStatus, Settled, SettledFuture,
};
pub use plugin::Plugin;
pub use result::{BuildResult, BuildStatus, FileResult};
pub use scheme::Scheme;
pub use target::{Bytes, Contents, Target};
pub use watcher::{FakeWatcher, FsWatcher, OnChange, WatchGuard, Watcher};
