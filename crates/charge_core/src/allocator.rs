use std::collections::HashMap;

use crate::curve::power_factor;

/// Power delivered to one port, in kW.
///
/// The station's rated power is split evenly between the active ports, then
/// tapered by the port's state of charge.
pub fn effective_power(station_power_kw: f64, active_port_count: usize, charge_percent: f64) -> f64 {
    let power_per_port = station_power_kw / active_port_count.max(1) as f64;
    power_per_port * power_factor(charge_percent)
}

/// Count the sessions sharing each station.
///
/// The count is a snapshot: callers take it once per invocation and keep it
/// even when sessions complete mid-batch.
pub fn active_port_counts<'a>(
    station_ids: impl IntoIterator<Item = &'a str>,
) -> HashMap<String, usize> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for station_id in station_ids {
        *counts.entry(station_id.to_string()).or_default() += 1;
    }
    counts
}

#[cfg(test)]
mod test_effective_power {
    use super::*;

    #[test]
    /// One port takes the whole station
    fn test_single_port() {
        assert_eq!(effective_power(150.0, 1, 0.0), 150.0);
    }

    #[test]
    /// Two ports split the station evenly, whatever the other charge level
    fn test_shared_station() {
        assert_eq!(effective_power(150.0, 2, 10.0), 75.0);
        assert_eq!(effective_power(150.0, 2, 50.0), 75.0);
    }

    #[test]
    /// No active port is treated as one
    fn test_zero_ports() {
        assert_eq!(effective_power(150.0, 0, 0.0), 150.0);
    }

    #[test]
    /// The share is tapered by the charge curve
    fn test_tapered() {
        assert!((effective_power(150.0, 1, 99.5) - 45.0).abs() < 1e-9);
        assert!((effective_power(150.0, 2, 75.0) - 45.0).abs() < 1e-9);
    }
}
