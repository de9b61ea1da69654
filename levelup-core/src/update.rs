use bitflags::bitflags;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

bitflags! {
    /// Update flags requested by views and loaders.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct Update: u8 {
        /// Repaint.
        const DRAW = 0b0001;
        /// Recompute layout, for example because the content size changed.
        const LAYOUT = 0b0010;
    }
}

/// Collects update requests from any thread until the host drains them.
#[derive(Clone, Debug, Default)]
pub struct UpdateManager {
    pending: Arc<AtomicU8>,
}

impl UpdateManager {
    /// Creates a manager with no pending updates.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests the given updates.
    pub fn insert(&self, update: Update) {
        self.pending.fetch_or(update.bits(), Ordering::AcqRel);
    }

    /// Returns the pending updates without clearing them.
    pub fn get(&self) -> Update {
        Update::from_bits_truncate(self.pending.load(Ordering::Acquire))
    }

    /// Returns and clears the pending updates.
    pub fn take(&self) -> Update {
        Update::from_bits_truncate(self.pending.swap(0, Ordering::AcqRel))
    }
}
