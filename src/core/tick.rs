//! External tick identifiers.
//!
//! The reentrancy guard and the fired-message ledger both reset whenever the
//! tick identifier changes. The host driver owns the clock and advances it
//! once per logical frame.

use std::cell::Cell;

/// Source of the current tick identifier.
pub trait TickSource {
    /// Identifier of the frame currently being processed.
    fn tick(&self) -> u64;
}

/// Frame counter shared between the driver and one or more machines.
///
/// # Example
///
/// ```rust
/// use canopy::{FrameClock, TickSource};
///
/// let clock = FrameClock::new();
/// assert_eq!(clock.tick(), 0);
/// clock.advance();
/// assert_eq!(clock.tick(), 1);
/// ```
#[derive(Debug, Default)]
pub struct FrameClock {
    frame: Cell<u64>,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(frame: u64) -> Self {
        Self {
            frame: Cell::new(frame),
        }
    }

    /// Move to the next frame and return it.
    pub fn advance(&self) -> u64 {
        let next = self.frame.get().wrapping_add(1);
        self.frame.set(next);
        next
    }

    pub fn set(&self, frame: u64) {
        self.frame.set(frame);
    }
}

impl TickSource for FrameClock {
    fn tick(&self) -> u64 {
        self.frame.get()
    }
}
