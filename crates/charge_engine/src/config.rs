use charge_core::TickSettings;
use serde::{Deserialize, Serialize};

/// Options recognised by the tick engine.
///
/// Table names are opaque to the engine and handed to the store as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SimulatorConfig {
    #[serde(flatten)]
    pub tick: TickSettings,
    pub sessions_table: String,
    pub stations_table: String,
    /// Receives failures and forwarded notifications for tech support.
    pub error_logs_table: String,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        SimulatorConfig {
            tick: TickSettings::default(),
            sessions_table: "Sessions".into(),
            stations_table: "Stations".into(),
            error_logs_table: "ErrorLogs".into(),
        }
    }
}
