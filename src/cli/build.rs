//! Build and watch command implementations

use std::path::PathBuf;
use std::process::ExitCode;

use tracing::info;

use super::{SourceArgs, EXIT_ERROR, EXIT_INVALID_ARGS, EXIT_SUCCESS};
use crate::composer::{Composer, ComposerOptions};
use crate::manifest::{load_glob, load_manifest};
use crate::paths;
use crate::pipeline::PipelineOptions;
use crate::plugins::add_default_plugins;

/// Create a composer with the built-in plugins and register the requested
/// sources.
fn setup(sources: &SourceArgs, verbose: bool) -> Result<(Composer, PathBuf), ExitCode> {
    let composer = Composer::new(
        ComposerOptions::default().with_verbose(verbose).with_release(sources.release),
    );
    add_default_plugins(&composer);

    let root = match &sources.root {
        Some(root) if !root.as_os_str().is_empty() => paths::resolve_path(root),
        _ => paths::resolve_path("."),
    };

    if let Some(file) = &sources.file {
        if verbose {
            info!(file = %file, "building file");
        }
        let mut options = PipelineOptions::new(&root);
        options.output = sources.output.as_ref().map(paths::resolve_path);

        if let Err(e) = load_glob(&composer, paths::resolve_path(file), &options) {
            eprintln!("Error: {}", e);
            return Err(ExitCode::from(EXIT_INVALID_ARGS));
        }
    }

    if let Some(config) = &sources.config {
        if let Err(e) = load_manifest(&composer, config) {
            eprintln!("Error: {}", e);
            return Err(ExitCode::from(EXIT_ERROR));
        }
    }

    Ok((composer, root))
}

/// Execute the build command
pub async fn run_build(
    sources: &SourceArgs,
    verbose: bool,
    json: bool,
    strict: bool,
) -> ExitCode {
    let (composer, _) = match setup(sources, verbose) {
        Ok(setup) => setup,
        Err(code) => return code,
    };

    let result = composer.build().await;

    if json {
        match serde_json::to_string_pretty(&result) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("Error: Failed to serialize build result: {}", e);
                return ExitCode::from(EXIT_ERROR);
            }
        }
    } else if result.is_success() {
        println!("{}", result.summary());
    } else {
        eprintln!("{}", result.summary());
    }

    if strict && !result.is_success() {
        ExitCode::from(EXIT_ERROR)
    } else {
        ExitCode::from(EXIT_SUCCESS)
    }
}

/// Execute the watch command
pub async fn run_watch(sources: &SourceArgs, verbose: bool) -> ExitCode {
    let (composer, root) = match setup(sources, verbose) {
        Ok(setup) => setup,
        Err(code) => return code,
    };

    println!("Watching {} for changes...", root.display());
    println!("Press Ctrl+C to stop");

    match composer.watch(&root).await {
        Ok(never) => match never {},
        Err(e) => {
            eprintln!("Watch error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}
