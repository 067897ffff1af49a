use serde::{Deserialize, Serialize};

/// Notification-worthy change produced by a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum TickEvent {
    ChargingStarted {
        session_id: String,
        user_id: String,
    },
    ChargeThresholdReached {
        session_id: String,
        user_id: String,
        charge_percent: f64,
    },
    ChargingCompleted {
        session_id: String,
        user_id: String,
        energy_consumed_kwh: f64,
        total_cost: f64,
    },
}

impl TickEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            TickEvent::ChargingStarted { .. } => "CHARGING_STARTED",
            TickEvent::ChargeThresholdReached { .. } => "CHARGE_THRESHOLD_REACHED",
            TickEvent::ChargingCompleted { .. } => "CHARGING_COMPLETED",
        }
    }

    pub fn session_id(&self) -> &str {
        match self {
            TickEvent::ChargingStarted { session_id, .. }
            | TickEvent::ChargeThresholdReached { session_id, .. }
            | TickEvent::ChargingCompleted { session_id, .. } => session_id,
        }
    }

    pub fn user_id(&self) -> &str {
        match self {
            TickEvent::ChargingStarted { user_id, .. }
            | TickEvent::ChargeThresholdReached { user_id, .. }
            | TickEvent::ChargingCompleted { user_id, .. } => user_id,
        }
    }

    /// Text sent to the driver.
    pub fn message(&self) -> String {
        match self {
            TickEvent::ChargingStarted { session_id, .. } => {
                format!("Your EV charging session {session_id} has started.")
            }
            TickEvent::ChargeThresholdReached { charge_percent, .. } => format!(
                "Your EV is at {charge_percent}% charge. Consider stopping soon to save time."
            ),
            TickEvent::ChargingCompleted {
                energy_consumed_kwh,
                total_cost,
                ..
            } => format!(
                "Charging complete! Total energy: {energy_consumed_kwh} kWh, Cost: ${total_cost}"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = TickEvent::ChargeThresholdReached {
            session_id: "sess-1a2b3c4d".into(),
            user_id: "user-1".into(),
            charge_percent: 80.14,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "CHARGE_THRESHOLD_REACHED");
        assert_eq!(json["sessionId"], "sess-1a2b3c4d");
        assert_eq!(json["userId"], "user-1");
        assert_eq!(json["chargePercent"], 80.14);

        let decoded: TickEvent = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn test_messages() {
        let started = TickEvent::ChargingStarted {
            session_id: "sess-1a2b3c4d".into(),
            user_id: "user-1".into(),
        };
        assert_eq!(
            started.message(),
            "Your EV charging session sess-1a2b3c4d has started."
        );

        let completed = TickEvent::ChargingCompleted {
            session_id: "sess-1a2b3c4d".into(),
            user_id: "user-1".into(),
            energy_consumed_kwh: 42.5,
            total_cost: 12.75,
        };
        assert_eq!(
            completed.message(),
            "Charging complete! Total energy: 42.5 kWh, Cost: $12.75"
        );
        assert_eq!(completed.event_type(), "CHARGING_COMPLETED");
        assert_eq!(completed.user_id(), "user-1");
        assert_eq!(completed.session_id(), "sess-1a2b3c4d");
    }
}
