// SPDX-License-Identifier: LGPL-3.0-only
//! Error types for code loading.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while producing a code image.
///
/// Cloneable so a single failure can be handed to every caller waiting on
/// the same key.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodeError {
    /// There is nothing to encode.
    #[error("Cannot render an empty code")]
    EmptyContent,

    /// Code generation failed.
    #[error("Code generation failed: {0}")]
    GenerationFailed(String),

    /// The render did not finish in time.
    #[error("Code render timed out after {0:?}")]
    Timeout(Duration),

    /// The background task went away before producing a result.
    #[error("Render task failed: {0}")]
    Scheduler(String),
}
