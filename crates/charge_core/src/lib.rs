//! Charging session domain: records, charge curve, power sharing, status
//! transitions and the per-session tick.

pub mod allocator;
pub mod curve;
mod events;
mod models;
pub mod state_machine;
pub mod tick;

pub use crate::events::TickEvent;
pub use crate::models::*;
pub use crate::state_machine::{EntityKind, TransitionError, validate_transition};
pub use crate::tick::{TickContext, TickError, TickSettings, TickSimulator};
