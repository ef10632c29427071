//! Flags shared between the foreground session and background tasks

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A boolean shared across tasks
///
/// Used for the session fault flag (raised by whoever sees the adapter
/// die, cleared only by a successful reconnect) and the flashing flag.
/// Clones observe the same value.
#[derive(Debug, Clone, Default)]
pub struct SharedFlag(Arc<AtomicBool>);

impl SharedFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag, returning whether it was already set
    pub fn raise(&self) -> bool {
        self.0.swap(true, Ordering::SeqCst)
    }

    /// Clear the flag, returning whether it was set
    pub fn clear(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }

    pub fn set(&self, value: bool) {
        self.0.store(value, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
