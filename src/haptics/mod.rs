//! Haptic feedback
//!
//! Pulse aggregation, strength policy and the coordinator that feeds the
//! connection manager.

mod coordinator;
mod pulse;
mod strength;

pub use coordinator::HapticCoordinator;
pub use pulse::PulseAccumulator;
pub use strength::{HapticSettings, NoteEvent, PulseMode, StrengthContext, StrengthMode};
