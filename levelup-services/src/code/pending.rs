// SPDX-License-Identifier: LGPL-3.0-only

//! Handles for in-progress code loads.

use crate::code::error::CodeError;
use crate::code::key::LoadKey;
use std::cell::Cell;
use std::fmt;
use std::rc::Weak;
use std::sync::{Arc, OnceLock};

/// Single-assignment storage for a load result.
///
/// The result is written at most once and then only read, so clones can be
/// handed to other threads to poll for the image.
pub struct ImageSlot<T> {
    result: Arc<OnceLock<Result<T, CodeError>>>,
}

impl<T> ImageSlot<T> {
    /// Create an empty slot.
    pub fn new() -> Self {
        Self {
            result: Arc::new(OnceLock::new()),
        }
    }

    /// Store the image. Returns `false` if the slot was already resolved.
    pub fn set_image(&self, image: T) -> bool {
        self.result.set(Ok(image)).is_ok()
    }

    /// Store a failure. Returns `false` if the slot was already resolved.
    pub fn set_error(&self, error: CodeError) -> bool {
        self.result.set(Err(error)).is_ok()
    }

    /// Whether an image has been stored.
    pub fn is_loaded(&self) -> bool {
        matches!(self.result.get(), Some(Ok(_)))
    }

    /// Whether the slot holds either an image or a failure.
    pub fn is_resolved(&self) -> bool {
        self.result.get().is_some()
    }
}

impl<T: Clone> ImageSlot<T> {
    /// The stored image, if any.
    pub fn image(&self) -> Option<T> {
        match self.result.get() {
            Some(Ok(image)) => Some(image.clone()),
            _ => None,
        }
    }

    /// The stored failure, if any.
    pub fn error(&self) -> Option<CodeError> {
        match self.result.get() {
            Some(Err(error)) => Some(error.clone()),
            _ => None,
        }
    }
}

impl<T> Clone for ImageSlot<T> {
    fn clone(&self) -> Self {
        Self {
            result: self.result.clone(),
        }
    }
}

impl<T> Default for ImageSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Receives cancellations from [PendingImage::cancel_load].
pub(crate) trait CancelRegistration {
    fn cancel_registration(&self, key: &LoadKey, ticket: u64);
}

/// The result of one `get_code` call: the image for a key, once available.
///
/// Lives on the main thread with the loader that created it. Use
/// [PendingImage::slot] to read the result from other threads.
pub struct PendingImage<T> {
    load_key: LoadKey,
    slot: ImageSlot<T>,
    ticket: u64,
    loader: Option<Weak<dyn CancelRegistration>>,
    cancelled: Cell<bool>,
}

impl<T> PendingImage<T> {
    pub(crate) fn registered(
        load_key: LoadKey,
        slot: ImageSlot<T>,
        ticket: u64,
        loader: Weak<dyn CancelRegistration>,
    ) -> Self {
        Self {
            load_key,
            slot,
            ticket,
            loader: Some(loader),
            cancelled: Cell::new(false),
        }
    }

    /// A pending image that is already resolved.
    pub fn resolved(load_key: LoadKey, image: T) -> Self {
        let slot = ImageSlot::new();
        slot.set_image(image);
        Self {
            load_key,
            slot,
            ticket: 0,
            loader: None,
            cancelled: Cell::new(false),
        }
    }

    /// The key this load is for.
    pub fn load_key(&self) -> &LoadKey {
        &self.load_key
    }

    /// Tell the loader this caller no longer needs the result.
    ///
    /// Calling it again, after the image arrived, or after the loader was
    /// dropped does nothing.
    pub fn cancel_load(&self) {
        if self.cancelled.replace(true) || self.slot.is_resolved() {
            return;
        }
        if let Some(loader) = self.loader.as_ref().and_then(Weak::upgrade) {
            loader.cancel_registration(&self.load_key, self.ticket);
        }
    }

    /// Whether [PendingImage::cancel_load] was called.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }

    /// Store the image. Returns `false` if one was already stored.
    pub fn set_image(&self, image: T) -> bool {
        self.slot.set_image(image)
    }

    /// Whether the image is available.
    pub fn is_loaded(&self) -> bool {
        self.slot.is_loaded()
    }

    /// A thread-safe handle to the result.
    pub fn slot(&self) -> ImageSlot<T> {
        self.slot.clone()
    }
}

impl<T: Clone> PendingImage<T> {
    /// The image, if it has been loaded.
    pub fn image(&self) -> Option<T> {
        self.slot.image()
    }

    /// The render failure, if the load failed.
    pub fn error(&self) -> Option<CodeError> {
        self.slot.error()
    }
}

impl<T> fmt::Debug for PendingImage<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingImage")
            .field("load_key", &self.load_key)
            .field("loaded", &self.slot.is_loaded())
            .field("cancelled", &self.cancelled.get())
            .finish()
    }
}
