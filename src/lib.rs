#![warn(missing_docs)]

//! Render, cache and asynchronously load LevelUp payment codes.

pub use nalgebra as math;

pub use levelup_core as core;
pub use levelup_services as services;
pub use levelup_widgets as widgets;

/// A "prelude" for users of levelup.
///
/// Importing this module brings into scope the most common types
/// needed to show a payment code.
///
/// ```rust
/// use levelup::prelude::*;
/// ```
pub mod prelude {
    pub use crate::core::config::{LoaderConfig, TasksConfig};
    pub use crate::core::{MainThread, Update, UpdateManager};

    pub use crate::services::code::{
        key_for, BackgroundRenderer, CodeCache, CodeError, CodeGenerator, CodeImage, CodeLoader,
        HashMapCache, InlineRenderer, LoadCallback, LoadKey, OnCodeLoaded, PendingImage,
        QrCodeGenerator, RenderScheduler,
    };
    pub use crate::services::settings::Settings;

    pub use crate::widgets::{CodeView, OnCodeLoadListener};

    // Math
    pub use nalgebra::Vector2;
}
