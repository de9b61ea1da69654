// SPDX-License-Identifier: LGPL-3.0-only
pub mod code;
pub mod settings;

pub use code::{CodeImage, CodeLoader, HashMapCache, LoadKey, PendingImage, QrCodeGenerator};
pub use settings::Settings;
