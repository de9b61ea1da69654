#![warn(missing_docs)]

//! Views for levelup => See `levelup` crate.
//!
//! Contains the views that display loaded payment codes.

/// Contains the [code_view::CodeView] view and its load listener.
pub mod code_view;

pub use code_view::{CodeView, OnCodeLoadListener};
