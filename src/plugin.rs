//! The stage (plugin) contract.
//!
//! The composer runs every registered plugin, in registration order, against
//! the evolving target of each build. A plugin decides for itself whether the
//! target is relevant, normally by looking at the active scheme tag.

use crate::composer::Composer;
use crate::error::Result;
use crate::target::Target;
use async_trait::async_trait;
use tracing::info;

/// A transformation stage.
///
/// Implementors provide [`name`](Plugin::name),
/// [`operates_on`](Plugin::operates_on) and
/// [`transform_impl`](Plugin::transform_impl). The composer only ever calls
/// [`transform`](Plugin::transform), which skips targets the plugin does not
/// operate on.
///
/// A transform may do arbitrary async work, including building other files
/// through the composer and recording what it consulted with
/// [`Composer::add_dependency_for`]. Returning
/// [`BuildError::Rebuild`](crate::BuildError::Rebuild) restarts the owning
/// pipeline; [`BuildError::Unavailable`](crate::BuildError::Unavailable)
/// contents produce no output; any other error fails the attempt.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Name used in diagnostics.
    fn name(&self) -> &str;

    /// Whether this plugin applies to `target`. Must not have side effects.
    fn operates_on(&self, composer: &Composer, target: &Target) -> bool;

    /// Produce the next target from `target`.
    async fn transform_impl(&self, composer: &Composer, target: Target) -> Result<Target>;

    /// Run the plugin if it applies, otherwise pass `target` through unchanged.
    async fn transform(&self, composer: &Composer, target: Target) -> Result<Target> {
        if !self.operates_on(composer, &target) {
            return Ok(target);
        }

        if composer.options().verbose {
            info!(plugin = self.name(), path = %target.path().display(), "running plugin");
        }

        self.transform_impl(composer, target).await
    }
}
