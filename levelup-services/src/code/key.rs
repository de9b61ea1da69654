// SPDX-License-Identifier: LGPL-3.0-only

//! Content-derived keys for code images.

use sha1::{Digest, Sha1};
use std::fmt;

/// Identifies a renderable payload.
///
/// The key is the lower-case hex SHA-1 digest of the content, so equal
/// content always maps to the same key and cached images never go stale.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoadKey(String);

impl LoadKey {
    /// Derive the key for `content`.
    pub fn for_content(content: &str) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(content.as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    /// The hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LoadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for LoadKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Shorthand for [LoadKey::for_content].
pub fn key_for(content: &str) -> LoadKey {
    LoadKey::for_content(content)
}
