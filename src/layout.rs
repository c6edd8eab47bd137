//! Registry for the optional layout-analysis capability.
//!
//! Layout mode is process-wide and monotonic: once activated it stays active
//! for the rest of the process lifetime. Jobs only *check* it; they never
//! deactivate it. The only synchronisation is one compare-and-set on the
//! first activation.

use std::sync::atomic::{AtomicBool, Ordering};

/// Outcome of [`LayoutRegistry::try_activate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// The capability is not present in this process.
    Unavailable,
    /// This call flipped the capability from off to on.
    Activated,
    /// Another call activated it earlier.
    AlreadyActive,
}

impl Activation {
    /// `true` when layout mode is on after the call.
    pub fn is_active(self) -> bool {
        !matches!(self, Activation::Unavailable)
    }
}

/// Tracks whether layout analysis is available and whether it has been enabled.
#[derive(Debug)]
pub struct LayoutRegistry {
    available: bool,
    active: AtomicBool,
}

impl LayoutRegistry {
    /// Create a registry with explicit availability.
    pub fn new(available: bool) -> Self {
        Self {
            available,
            active: AtomicBool::new(false),
        }
    }

    /// Availability follows the `layout` cargo feature.
    pub fn from_build() -> Self {
        Self::new(cfg!(feature = "layout"))
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Enable the capability if it is available.
    pub fn try_activate(&self) -> Activation {
        if !self.available {
            return Activation::Unavailable;
        }
        match self
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => Activation::Activated,
            Err(_) => Activation::AlreadyActive,
        }
    }
}

impl Default for LayoutRegistry {
    fn default() -> Self {
        Self::from_build()
    }
}
