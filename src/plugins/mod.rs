//! Built-in plugins.
//!
//! These cover loading and moving bytes around; language compilers and
//! minifiers are external plugins registered after them.
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
//! let result = composer.build().await;
//! ```

pub mod copy_file;
pub mod load_file;
pub mod to_base64;
pub mod virtual_file;

pub use copy_file::CopyFilePlugin;
pub use load_file::LoadFilePlugin;
pub use to_base64::ToBase64Plugin;
pub use virtual_file::VirtualFilePlugin;

use crate::composer::Composer;

/// Register the built-in plugins in their canonical order.
pub fn add_default_plugins(composer: &Composer) {
    composer
        .add_plugin(LoadFilePlugin)
        .add_plugin(VirtualFilePlugin::new())
        .add_plugin(ToBase64Plugin)
        .add_plugin(CopyFilePlugin);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composer::ComposerOptions;

    #[test]
    fn test_default_plugin_order() {
        let composer = Composer::new(ComposerOptions::default());
        add_default_plugins(&composer);

        let names: Vec<String> =
            composer.plugins().iter().map(|p| p.name().to_string()).collect();
        assert_eq!(names, ["load-file", "virtual-file", "to-base64", "copy-file"]);
    }
}
