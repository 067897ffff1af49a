//! Charge-rate taper as a function of state of charge.
//!
//! Real chargers run constant-current up to a knee and then taper while the
//! cell voltage is held. This is approximated with three flat steps so that a
//! tick stays deterministic.

/// Charge percent at which the first taper starts.
pub const FIRST_TAPER_PERCENT: f64 = 70.0;
/// Charge percent at which the final taper starts.
pub const FINAL_TAPER_PERCENT: f64 = 90.0;

const FULL_RATE: f64 = 1.0;
const FIRST_TAPER_RATE: f64 = 0.6;
const FINAL_TAPER_RATE: f64 = 0.3;

/// Multiplier in `(0, 1]` applied to a port's power share.
pub fn power_factor(charge_percent: f64) -> f64 {
    if charge_percent < FIRST_TAPER_PERCENT {
        FULL_RATE
    } else if charge_percent < FINAL_TAPER_PERCENT {
        FIRST_TAPER_RATE
    } else {
        FINAL_TAPER_RATE
    }
}
