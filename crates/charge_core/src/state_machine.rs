//! Legal status transitions for stations, ports and sessions.
//!
//! Every table is an exhaustive match, so adding a status without deciding
//! its transitions fails to compile.

use std::fmt;

use thiserror::Error;

use crate::{PortStatus, SessionStatus, StationStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Station,
    Port,
    Session,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntityKind::Station => "station",
            EntityKind::Port => "port",
            EntityKind::Session => "session",
        })
    }
}

/// A rejected status change. Raised only by caller bugs, never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{entity} transition from {from} to {to} is not allowed (allowed: [{}])", .allowed.join(", "))]
pub struct TransitionError {
    pub entity: EntityKind,
    pub from: String,
    pub to: String,
    pub allowed: Vec<String>,
}

pub trait StatusTransitions: Copy + Eq + fmt::Display + 'static {
    const ENTITY: EntityKind;

    fn allowed_next(self) -> &'static [Self];
}

impl StatusTransitions for StationStatus {
    const ENTITY: EntityKind = EntityKind::Station;

    fn allowed_next(self) -> &'static [Self] {
        use StationStatus::*;
        match self {
            New => &[Active],
            Active => &[Maintenance, OutOfOrder],
            Maintenance => &[Active],
            OutOfOrder => &[Active],
        }
    }
}

impl StatusTransitions for PortStatus {
    const ENTITY: EntityKind = EntityKind::Port;

    fn allowed_next(self) -> &'static [Self] {
        use PortStatus::*;
        match self {
            Free => &[Charging, Reserved],
            Reserved => &[Charging, Free],
            Charging => &[Free, Error],
            Error => &[Free],
        }
    }
}

impl StatusTransitions for SessionStatus {
    const ENTITY: EntityKind = EntityKind::Session;

    fn allowed_next(self) -> &'static [Self] {
        use SessionStatus::*;
        match self {
            Started => &[InProgress, Failed],
            InProgress => &[InProgress, Completed, Interrupted, Failed],
            Completed | Interrupted | Failed => &[],
        }
    }
}

pub fn can_transition<S: StatusTransitions>(from: S, to: S) -> bool {
    from.allowed_next().contains(&to)
}

pub fn validate_transition<S: StatusTransitions>(from: S, to: S) -> Result<(), TransitionError> {
    if can_transition(from, to) {
        return Ok(());
    }
    Err(TransitionError {
        entity: S::ENTITY,
        from: from.to_string(),
        to: to.to_string(),
        allowed: from.allowed_next().iter().map(ToString::to_string).collect(),
    })
}
