//! Build manifests.
//!
//! A manifest is a JSON5 file listing the sources to register, relative to the
//! manifest's own directory:
//!
//! ```json5
//! {
//!   root: "src",     // input root, default: the manifest's directory
//!   out: "dist",     // output directory, default: the manifest's directory
//!   srcs: [
//!     "**/*.html",                        // scheme from each file's extension
//!     "to-base64:img/*.png",              // scheme before the last ':'
//!     { scheme: "copy", in: "static", out: "assets", root: "static" },
//!   ],
//! }
//! ```
//!
//! Every input is a glob; each match gets its own pipeline.

use crate::composer::Composer;
use crate::error::ManifestError;
use crate::paths;
use crate::pipeline::{Pipeline, PipelineOptions};
use crate::scheme;
use glob::glob;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Parsed manifest file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub root: Option<String>,
    #[serde(default)]
    pub out: Option<String>,
    #[serde(default)]
    pub srcs: Vec<Source>,
}

/// One entry of `srcs`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Source {
    /// `"[scheme:]glob"`
    Glob(String),
    /// Object form with per-source output and root
    Entry {
        #[serde(default)]
        scheme: Option<String>,
        #[serde(rename = "in", default)]
        input: Option<String>,
        #[serde(default)]
        out: Option<String>,
        #[serde(default)]
        root: Option<String>,
    },
}

/// A source with every path resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource {
    /// Absolute glob pattern
    pub pattern: PathBuf,
    pub options: PipelineOptions,
}

impl Manifest {
    /// Parse manifest text.
    pub fn parse(text: &str) -> Result<Self, ManifestError> {
        Ok(json5::from_str(text)?)
    }

    /// Read and parse the manifest at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|source| ManifestError::Io { path: path.to_path_buf(), source })?;
        Self::parse(&text)
    }

    /// Resolve every source against `manifest_dir`.
    pub fn resolve(&self, manifest_dir: &Path) -> Result<Vec<ResolvedSource>, ManifestError> {
        let root_dir = join_non_empty(manifest_dir, self.root.as_deref());
        let out_dir = join_non_empty(manifest_dir, self.out.as_deref());

        self.srcs
            .iter()
            .map(|src| -> Result<ResolvedSource, ManifestError> {
                let (scheme, input, options) = match src {
                    Source::Glob(spec) => {
                        let (scheme, input) = split_scheme(spec);
                        let options = PipelineOptions::new(&root_dir).with_output(&out_dir);
                        (scheme.map(str::to_string), input, options)
                    }
                    Source::Entry { scheme, input, out, root } => {
                        let input = input.as_deref().ok_or(ManifestError::MissingInput)?;
                        let root = join_non_empty(&root_dir, root.as_deref());
                        let options = PipelineOptions::new(root)
                            .with_output(join_non_empty(&out_dir, out.as_deref()));
                        (scheme.clone(), input, options)
                    }
                };
                let pattern = paths::resolve_path(root_dir.join(input));
                Ok(ResolvedSource { pattern, options: PipelineOptions { scheme, ..options } })
            })
            .collect()
    }
}

/// Split `"scheme:glob"` at the last separator.
pub fn split_scheme(spec: &str) -> (Option<&str>, &str) {
    match spec.rfind(scheme::SEP) {
        Some(idx) => (Some(&spec[..idx]), &spec[idx + scheme::SEP.len_utf8()..]),
        None => (None, spec),
    }
}

fn join_non_empty(base: &Path, rel: Option<&str>) -> PathBuf {
    match rel {
        Some(rel) if !rel.is_empty() => paths::resolve_path(base.join(rel)),
        _ => paths::resolve_path(base),
    }
}

/// Register every source listed in the manifest at `path`.
///
/// Returns the pipelines that were registered (or already existed).
pub fn load_manifest(
    composer: &Composer,
    path: impl AsRef<Path>,
) -> Result<Vec<Arc<Pipeline>>, ManifestError> {
    let path = paths::resolve_path(path);
    if composer.options().verbose {
        info!(path = %path.display(), "reading manifest file");
    }

    let manifest = Manifest::load(&path)?;
    let manifest_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

    let mut pipelines = Vec::new();
    for source in manifest.resolve(&manifest_dir)? {
        pipelines.extend(load_glob(composer, &source.pattern, &source.options)?);
    }
    Ok(pipelines)
}

/// Register every path matching `pattern`.
///
/// A pattern without glob metacharacters is registered as is, even when the
/// file does not exist yet.
pub fn load_glob(
    composer: &Composer,
    pattern: impl AsRef<Path>,
    options: &PipelineOptions,
) -> Result<Vec<Arc<Pipeline>>, ManifestError> {
    let pattern = pattern.as_ref();
    let pattern_str = pattern.to_string_lossy();

    if !pattern_str.contains(['*', '?', '[']) {
        return Ok(vec![composer.load_file(pattern, options.clone())]);
    }

    let entries = glob(&pattern_str)
        .map_err(|e| ManifestError::Pattern(pattern_str.to_string(), e))?;

    let mut matches = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) => matches.push(path),
            Err(e) => warn!(error = %e, "error reading path"),
        }
    }
    matches.sort();

    Ok(matches.into_iter().map(|path| composer.load_file(path, options.clone())).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composer::ComposerOptions;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_split_scheme() {
        assert_eq!(split_scheme("**/*.html"), (None, "**/*.html"));
        assert_eq!(split_scheme("copy:static"), (Some("copy"), "static"));
        assert_eq!(
            split_scheme("to-base64:copy:img/*.png"),
            (Some("to-base64:copy"), "img/*.png")
        );
    }

    #[test]
    fn test_parse_json5() {
        let manifest = Manifest::parse(
            r#"{
                // comments and trailing commas are allowed
                out: 'dist',
                srcs: ['*.css', {scheme: 'copy', in: 'static', out: 'assets'},],
            }"#,
        )
        .unwrap();

        assert_eq!(manifest.out.as_deref(), Some("dist"));
        assert!(manifest.root.is_none());
        assert_eq!(manifest.srcs[0], Source::Glob("*.css".to_string()));
        assert!(matches!(
            &manifest.srcs[1],
            Source::Entry { scheme: Some(s), input: Some(i), out: Some(o), root: None }
                if s == "copy" && i == "static" && o == "assets"
        ));
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(Manifest::parse("{srcs: [1"), Err(ManifestError::Parse(_))));
    }

    #[test]
    fn test_resolve_paths() {
        let manifest = Manifest::parse(
            r#"{root: 'src', out: 'dist', srcs: [
                'copy:img/*.png',
                {in: 'static', out: 'assets', root: 'static'},
            ]}"#,
        )
        .unwrap();
        let sources = manifest.resolve(Path::new("/site")).unwrap();

        assert_eq!(sources[0].pattern, PathBuf::from("/site/src/img/*.png"));
        assert_eq!(sources[0].options.root, PathBuf::from("/site/src"));
        assert_eq!(sources[0].options.output, Some(PathBuf::from("/site/dist")));
        assert_eq!(sources[0].options.scheme.as_deref(), Some("copy"));

        assert_eq!(sources[1].pattern, PathBuf::from("/site/src/static"));
        assert_eq!(sources[1].options.root, PathBuf::from("/site/src/static"));
        assert_eq!(sources[1].options.output, Some(PathBuf::from("/site/dist/assets")));
        assert!(sources[1].options.scheme.is_none());
    }

    #[test]
    fn test_resolve_defaults_to_manifest_dir() {
        let manifest = Manifest::parse("{root: '', srcs: ['a.txt']}").unwrap();
        let sources = manifest.resolve(Path::new("/site")).unwrap();

        assert_eq!(sources[0].options.root, PathBuf::from("/site"));
        assert_eq!(sources[0].options.output, Some(PathBuf::from("/site")));
    }

    #[test]
    fn test_entry_without_input() {
        let manifest = Manifest::parse("{srcs: [{scheme: 'copy'}]}").unwrap();
        assert!(matches!(
            manifest.resolve(Path::new("/site")),
            Err(ManifestError::MissingInput)
        ));
    }

    #[test]
    fn test_load_manifest_registers_matches() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        fs::create_dir_all(src.join("css")).unwrap();
        fs::write(src.join("css/a.css"), "").unwrap();
        fs::write(src.join("css/b.css"), "").unwrap();
        fs::write(src.join("index.html"), "").unwrap();
        fs::write(
            temp.path().join("assets.json5"),
            "{root: 'src', out: 'dist', srcs: ['css/*.css', 'copy:index.html']}",
        )
        .unwrap();

        let composer = Composer::new(ComposerOptions::default());
        let pipelines = load_manifest(&composer, temp.path().join("assets.json5")).unwrap();

        assert_eq!(pipelines.len(), 3);
        let html = composer.pipeline(src.join("index.html")).unwrap();
        assert_eq!(html.scheme().as_str(), "copy");
        assert_eq!(html.output_path(), Some(temp.path().join("dist").as_path()));
        assert_eq!(composer.pipeline(src.join("css/a.css")).unwrap().scheme().as_str(), "css");
    }

    #[test]
    fn test_load_manifest_missing_file() {
        let composer = Composer::new(ComposerOptions::default());
        let err = load_manifest(&composer, "/definitely/not/here.json5").unwrap_err();
        assert!(matches!(err, ManifestError::Io { .. }));
    }

    #[test]
    fn test_load_glob_literal_path() {
        let composer = Composer::new(ComposerOptions::default());
        let pipelines =
            load_glob(&composer, "/site/not-yet.css", &PipelineOptions::new("/site")).unwrap();
        assert_eq!(pipelines.len(), 1);
        assert_eq!(pipelines[0].input_path(), Path::new("/site/not-yet.css"));
    }

    #[test]
    fn test_load_glob_invalid_pattern() {
        let composer = Composer::new(ComposerOptions::default());
        let err = load_glob(&composer, "/site/[", &PipelineOptions::new("/site")).unwrap_err();
        assert!(matches!(err, ManifestError::Pattern(..)));
    }
}
