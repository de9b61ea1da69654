// SPDX-License-Identifier: LGPL-3.0-only

//! Payment-code loading.
//!
//! Content strings (payment tokens) are rendered into code images by a
//! [CodeGenerator], stored in a shared [CodeCache] under a content digest,
//! and handed to views by a [CodeLoader] bound to the main thread. Renders
//! run wherever the injected [RenderScheduler] puts them.

pub mod cache;
pub mod error;
pub mod executor;
pub mod generator;
pub mod image;
pub mod key;
pub mod loader;
pub mod pending;

pub use cache::{CodeCache, HashMapCache};
pub use error::CodeError;
pub use executor::{BackgroundRenderer, CompletionSink, InlineRenderer, RenderRequest, RenderScheduler};
pub use generator::{CodeGenerator, QrCodeGenerator};
pub use image::{CodeImage, Region};
pub use key::{key_for, LoadKey};
pub use loader::{CodeLoader, LoadCallback, OnCodeLoaded};
pub use pending::{ImageSlot, PendingImage};
