//! Scheme tags.
//!
//! A scheme is the ordered list of transformations still pending for an
//! artifact, written as tags joined by [`SEP`] (e.g. `to-base64:copy`). The
//! first tag is the active one: stages match on it and then either pop it
//! ([`Scheme::remove_first`]) or swap it for the kind they produce
//! ([`Scheme::replace_first`]).
//!
//! Schemes are values; every operation returns a new `Scheme`.

use std::fmt;
use std::path::Path;

/// Tag separator.
pub const SEP: char = ':';

/// An ordered list of scheme tags in its string form.
///
/// The empty scheme is valid and means "no stage applies automatically".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Scheme(String);

impl Scheme {
    /// Create a scheme from its string form.
    pub fn new(scheme: impl Into<String>) -> Self {
        Self(scheme.into())
    }

    /// Derive a scheme from a file name's extension.
    ///
    /// Returns the empty scheme when the name has no extension.
    pub fn from_extension(path: impl AsRef<Path>) -> Self {
        let ext = path
            .as_ref()
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self(ext.strip_prefix('.').map(str::to_string).unwrap_or(ext))
    }

    /// The active tag.
    pub fn first(&self) -> &str {
        self.0.split(SEP).next().unwrap_or_default()
    }

    /// Drop the active tag.
    pub fn remove_first(&self) -> Self {
        match self.0.split_once(SEP) {
            Some((_, rest)) => Self(rest.to_string()),
            None => Self::default(),
        }
    }

    /// Replace the active tag with `first`.
    pub fn replace_first(&self, first: &str) -> Self {
        match self.0.split_once(SEP) {
            Some((_, rest)) => Self(format!("{first}{SEP}{rest}")),
            None => Self(first.to_string()),
        }
    }

    /// All tags, in order.
    pub fn split(&self) -> Vec<&str> {
        self.0.split(SEP).collect()
    }

    /// Whether the active tag equals `tag`.
    pub fn is(&self, tag: &str) -> bool {
        self.first() == tag
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Scheme {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Scheme {
    fn from(s: String) -> Self {
        Self(s)
    }
}
