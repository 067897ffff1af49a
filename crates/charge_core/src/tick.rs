use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    ChargingSession, SessionStatus, TickEvent,
    allocator::effective_power,
    state_machine::{TransitionError, validate_transition},
};

/// Charge percent that triggers the "almost full" notification.
pub const THRESHOLD_PERCENT: f64 = 80.0;
pub const FULL_PERCENT: f64 = 100.0;

const SECONDS_PER_HOUR: f64 = 3600.0;
const PERCENT_DECIMALS: i32 = 2;
const COST_DECIMALS: i32 = 2;
const ENERGY_DECIMALS: i32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TickSettings {
    /// Simulated seconds advanced by one tick.
    pub tick_duration_seconds: u32,
    /// Upper bound of ticks applied to a session per invocation.
    pub ticks_per_invocation: u32,
}

impl Default for TickSettings {
    fn default() -> Self {
        TickSettings {
            tick_duration_seconds: 10,
            ticks_per_invocation: 6,
        }
    }
}

/// Station-side inputs of a tick, fixed for the whole invocation.
#[derive(Debug, Clone, Copy)]
pub struct TickContext {
    pub station_power_kw: f64,
    pub active_port_count: usize,
    pub now: DateTime<Utc>,
}

#[derive(Error, Debug)]
pub enum TickError {
    #[error("invariant violation: session {session_id} is {status} and cannot be ticked")]
    TerminalSession {
        session_id: String,
        status: SessionStatus,
    },
    #[error("invariant violation: {0}")]
    Transition(#[from] TransitionError),
    #[error("session {session_id} has invalid {field}: {value}")]
    InvalidInput {
        session_id: String,
        field: &'static str,
        value: f64,
    },
}

impl TickError {
    pub fn is_invariant_violation(&self) -> bool {
        match self {
            TickError::TerminalSession { .. } | TickError::Transition(_) => true,
            TickError::InvalidInput { .. } => false,
        }
    }
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

/// Round the derived quantities to the precision they are stored with.
pub fn round_for_persistence(session: &mut ChargingSession) {
    session.charge_percent = round_to(session.charge_percent, PERCENT_DECIMALS);
    session.energy_consumed_kwh = round_to(session.energy_consumed_kwh, ENERGY_DECIMALS);
    session.total_cost = round_to(session.total_cost, COST_DECIMALS);
}

fn check_input(
    session_id: &str,
    field: &'static str,
    value: f64,
    valid: impl Fn(f64) -> bool,
) -> Result<(), TickError> {
    if value.is_finite() && valid(value) {
        Ok(())
    } else {
        Err(TickError::InvalidInput {
            session_id: session_id.to_string(),
            field,
            value,
        })
    }
}

fn validate_inputs(session: &ChargingSession, ctx: &TickContext) -> Result<(), TickError> {
    let id = session.session_id.as_str();
    check_input(id, "battery capacity", session.battery_capacity_kwh, |v| v > 0.0)?;
    check_input(id, "charge percent", session.charge_percent, |v| {
        (0.0..=FULL_PERCENT).contains(&v)
    })?;
    check_input(id, "energy consumed", session.energy_consumed_kwh, |v| v >= 0.0)?;
    check_input(id, "total cost", session.total_cost, |v| v >= 0.0)?;
    check_input(id, "tariff", session.tariff_per_kwh, |v| v >= 0.0)?;
    check_input(id, "station power", ctx.station_power_kw, |v| v >= 0.0)
}

/// Advances charging sessions in fixed-duration steps.
#[derive(Debug, Clone, Default)]
pub struct TickSimulator {
    settings: TickSettings,
}

impl TickSimulator {
    pub fn new(settings: TickSettings) -> Self {
        TickSimulator { settings }
    }

    pub fn settings(&self) -> &TickSettings {
        &self.settings
    }

    /// Apply one tick to `session` and return the events it produced.
    ///
    /// The session is left untouched when an error is returned. Quantities are
    /// kept at full precision; threshold and completion are decided on the
    /// values as they will be stored.
    pub fn tick(
        &self,
        session: &mut ChargingSession,
        ctx: &TickContext,
    ) -> Result<Vec<TickEvent>, TickError> {
        if session.status.is_terminal() {
            return Err(TickError::TerminalSession {
                session_id: session.session_id.clone(),
                status: session.status,
            });
        }
        validate_inputs(session, ctx)?;

        let mut events = Vec::new();
        let mut status = session.status;
        if status == SessionStatus::Started {
            validate_transition(status, SessionStatus::InProgress)?;
            status = SessionStatus::InProgress;
            events.push(TickEvent::ChargingStarted {
                session_id: session.session_id.clone(),
                user_id: session.user_id.clone(),
            });
        }

        let old_percent = session.charge_percent;
        let power_kw = effective_power(ctx.station_power_kw, ctx.active_port_count, old_percent);
        let interval_hours = f64::from(self.settings.tick_duration_seconds) / SECONDS_PER_HOUR;
        let energy_added = power_kw * interval_hours;

        let new_percent =
            (old_percent + energy_added / session.battery_capacity_kwh * 100.0).min(FULL_PERCENT);
        let new_energy = session.energy_consumed_kwh + energy_added;
        let new_cost = session.total_cost + energy_added * session.tariff_per_kwh;

        let stored_old_percent = round_to(old_percent, PERCENT_DECIMALS);
        let stored_new_percent = round_to(new_percent, PERCENT_DECIMALS);
        let completed = stored_new_percent >= FULL_PERCENT;
        let next_status = if completed {
            SessionStatus::Completed
        } else {
            SessionStatus::InProgress
        };
        validate_transition(status, next_status)?;

        session.status = next_status;
        session.charge_percent = if completed { FULL_PERCENT } else { new_percent };
        session.energy_consumed_kwh = new_energy;
        session.total_cost = new_cost;
        session.updated_at = Some(ctx.now);

        if stored_old_percent < THRESHOLD_PERCENT && stored_new_percent >= THRESHOLD_PERCENT {
            events.push(TickEvent::ChargeThresholdReached {
                session_id: session.session_id.clone(),
                user_id: session.user_id.clone(),
                charge_percent: stored_new_percent,
            });
        }

        if completed {
            session.completed_at = Some(ctx.now);
            events.push(TickEvent::ChargingCompleted {
                session_id: session.session_id.clone(),
                user_id: session.user_id.clone(),
                energy_consumed_kwh: round_to(new_energy, ENERGY_DECIMALS),
                total_cost: round_to(new_cost, COST_DECIMALS),
            });
        }

        Ok(events)
    }

    /// Run up to `ticks_per_invocation` ticks, stopping as soon as the session
    /// completes or fails, then round the session for persistence.
    pub fn advance(
        &self,
        session: &mut ChargingSession,
        ctx: &TickContext,
    ) -> Result<Vec<TickEvent>, TickError> {
        let mut events = Vec::new();
        for tick in 0..self.settings.ticks_per_invocation {
            events.extend(self.tick(session, ctx)?);
            if matches!(
                session.status,
                SessionStatus::Completed | SessionStatus::Failed
            ) {
                tracing::debug!(
                    session_id = %session.session_id,
                    status = %session.status,
                    ticks = tick + 1,
                    "Session reached a terminal status"
                );
                break;
            }
        }
        round_for_persistence(session);
        Ok(events)
    }
}
