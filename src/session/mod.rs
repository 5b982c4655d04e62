//! Session lifecycle coordination.
//!
//! Mirrors the server-side session TTL on the client: a warning alarm shortly
//! before expiry, a countdown while the warning is up, an expiry alarm that forces
//! logout, and an extend action that restarts the whole cycle.

mod alarm;
mod coordinator;

pub use alarm::{Alarm, AlarmKind, AlarmSet};
pub use coordinator::{CoordinatorOptions, SessionCoordinator, SessionPhase};
