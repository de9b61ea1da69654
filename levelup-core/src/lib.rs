#![warn(missing_docs)]

//! Core library for levelup => See `levelup` crate.
//!
//! Contains the configuration types, the background task runner and the
//! coordinating thread that loaders and views are confined to.

/// Contains the [LoaderConfig](config::LoaderConfig) and [TasksConfig](config::TasksConfig) structs.
pub mod config;

/// Contains the coordinating thread executor.
pub mod main_thread;

/// Contains the task runner and utilities for running async
pub mod tasks;

/// Contains the update mode bitflag.
pub mod update;

pub use main_thread::MainThread;
pub use update::{Update, UpdateManager};
