//! Encodes contents as base64 text.

use crate::composer::Composer;
use crate::error::Result;
use crate::plugin::Plugin;
use crate::target::{Bytes, Target};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Pops a leading `to-base64` tag and replaces the contents with their
/// standard-alphabet, padded base64 encoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToBase64Plugin;

#[async_trait]
impl Plugin for ToBase64Plugin {
    fn name(&self) -> &str {
        "to-base64"
    }

    fn operates_on(&self, _composer: &Composer, target: &Target) -> bool {
        target.scheme().is("to-base64")
    }

    async fn transform_impl(&self, _composer: &Composer, target: Target) -> Result<Target> {
        let contents = target
            .contents()
            .map(|bytes| Ok(Bytes::from(STANDARD.encode(bytes).into_bytes())));
        Ok(target.with_scheme(target.scheme().remove_first()).with_contents(contents))
    }
}
