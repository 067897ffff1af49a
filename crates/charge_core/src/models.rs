use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;

/// A raw store record: a JSON object keyed by attribute name.
pub type Item = serde_json::Map<String, serde_json::Value>;

pub const PK: &str = "PK";
pub const SK: &str = "SK";
const METADATA_SK: &str = "METADATA";

/// Battery capacity assumed for session records that predate the snapshot field.
pub const DEFAULT_BATTERY_CAPACITY_KWH: f64 = 60.0;
/// Rated power assumed for station records missing `powerKw`.
pub const DEFAULT_STATION_POWER_KW: f64 = 150.0;

#[derive(Error, Debug)]
pub enum RecordError {
    #[error("{kind} record is missing key attribute {attribute}")]
    MissingKey {
        kind: &'static str,
        attribute: &'static str,
    },
    #[error("malformed {kind} record: {source}")]
    Malformed {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("{kind} record did not encode to an object")]
    NotAnObject { kind: &'static str },
}

/// Primary key of a record in the key-value store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    #[serde(rename = "PK")]
    pub pk: String,
    #[serde(rename = "SK")]
    pub sk: String,
}

impl RecordKey {
    pub fn new(pk: impl Into<String>, sk: impl Into<String>) -> Self {
        RecordKey {
            pk: pk.into(),
            sk: sk.into(),
        }
    }

    pub fn station(station_id: &str) -> Self {
        RecordKey::new(format!("STATION#{station_id}"), METADATA_SK)
    }

    pub fn port(station_id: &str, port_id: &str) -> Self {
        RecordKey::new(format!("STATION#{station_id}"), format!("PORT#{port_id}"))
    }

    pub fn session(session_id: &str) -> Self {
        RecordKey::new(format!("SESSION#{session_id}"), METADATA_SK)
    }

    /// Read the key attributes stored alongside an item.
    pub fn from_item(item: &Item) -> Option<Self> {
        let pk = item.get(PK)?.as_str()?;
        let sk = item.get(SK)?.as_str()?;
        Some(RecordKey::new(pk, sk))
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.pk, self.sk)
    }
}

/// A typed entity that lives in the store as an [`Item`].
///
/// Encoding writes the camelCase fields plus the `PK`/`SK` attributes; decoding
/// ignores the key attributes and any field it does not know about.
pub trait Record: Serialize + DeserializeOwned {
    const KIND: &'static str;

    fn key(&self) -> RecordKey;

    fn to_item(&self) -> Result<Item, RecordError> {
        let value = serde_json::to_value(self).map_err(|source| RecordError::Malformed {
            kind: Self::KIND,
            source,
        })?;
        let serde_json::Value::Object(mut item) = value else {
            return Err(RecordError::NotAnObject { kind: Self::KIND });
        };
        let key = self.key();
        item.insert(PK.into(), key.pk.into());
        item.insert(SK.into(), key.sk.into());
        Ok(item)
    }

    fn from_item(item: &Item) -> Result<Self, RecordError> {
        serde_json::from_value(serde_json::Value::Object(item.clone())).map_err(|source| {
            RecordError::Malformed {
                kind: Self::KIND,
                source,
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StationStatus {
    New,
    Active,
    Maintenance,
    OutOfOrder,
}

impl StationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StationStatus::New => "NEW",
            StationStatus::Active => "ACTIVE",
            StationStatus::Maintenance => "MAINTENANCE",
            StationStatus::OutOfOrder => "OUT_OF_ORDER",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PortStatus {
    Free,
    Reserved,
    Charging,
    Error,
}

impl PortStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PortStatus::Free => "FREE",
            PortStatus::Reserved => "RESERVED",
            PortStatus::Charging => "CHARGING",
            PortStatus::Error => "ERROR",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Started,
    InProgress,
    Completed,
    Interrupted,
    Failed,
}

impl SessionStatus {
    /// Statuses the tick engine picks up on every invocation.
    pub const ACTIVE: [SessionStatus; 2] = [SessionStatus::Started, SessionStatus::InProgress];

    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Started => "STARTED",
            SessionStatus::InProgress => "IN_PROGRESS",
            SessionStatus::Completed => "COMPLETED",
            SessionStatus::Interrupted => "INTERRUPTED",
            SessionStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(self) -> bool {
        match self {
            SessionStatus::Started | SessionStatus::InProgress => false,
            SessionStatus::Completed | SessionStatus::Interrupted | SessionStatus::Failed => true,
        }
    }
}

macro_rules! display_as_str {
    ($($status:ty),*) => {
        $(
            impl fmt::Display for $status {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.as_str())
                }
            }
        )*
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        }
    }
}

/// Triage state of an error log entry, moved along by tech support.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogStatus {
    #[default]
    New,
    InProgress,
    Resolved,
}

impl LogStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            LogStatus::New => "NEW",
            LogStatus::InProgress => "IN_PROGRESS",
            LogStatus::Resolved => "RESOLVED",
        }
    }
}

display_as_str!(StationStatus, PortStatus, SessionStatus, LogLevel, LogStatus);

fn default_station_power() -> f64 {
    DEFAULT_STATION_POWER_KW
}

fn default_battery_capacity() -> f64 {
    DEFAULT_BATTERY_CAPACITY_KWH
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Station {
    pub station_id: String,
    #[serde(default)]
    pub name: String,
    /// Rated power in kW, shared between every active port.
    #[serde(default = "default_station_power")]
    pub power_kw: f64,
    #[serde(default)]
    pub tariff_per_kwh: f64,
    #[serde(default)]
    pub total_ports: u32,
    pub status: StationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Record for Station {
    const KIND: &'static str = "station";

    fn key(&self) -> RecordKey {
        RecordKey::station(&self.station_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargingPort {
    pub port_id: String,
    pub station_id: String,
    #[serde(default)]
    pub port_number: u32,
    pub status: PortStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Record for ChargingPort {
    const KIND: &'static str = "port";

    fn key(&self) -> RecordKey {
        RecordKey::port(&self.station_id, &self.port_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargingSession {
    /// Opaque id, `sess-<8 hex>` for sessions opened by the session service.
    pub session_id: String,
    pub user_id: String,
    pub station_id: String,
    pub port_id: String,
    pub status: SessionStatus,
    #[serde(default)]
    pub charge_percent: f64,
    #[serde(default)]
    pub energy_consumed_kwh: f64,
    #[serde(default)]
    pub total_cost: f64,
    /// Tariff snapshotted when the session started.
    #[serde(default)]
    pub tariff_per_kwh: f64,
    #[serde(default = "default_battery_capacity")]
    pub battery_capacity_kwh: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Write counter used to fence concurrent writers. Absent on records
    /// that were never written by the tick engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
}

impl ChargingSession {
    pub fn new(
        user_id: impl Into<String>,
        station_id: impl Into<String>,
        port_id: impl Into<String>,
        tariff_per_kwh: f64,
        battery_capacity_kwh: f64,
        now: DateTime<Utc>,
    ) -> Self {
        ChargingSession {
            session_id: new_session_id(),
            user_id: user_id.into(),
            station_id: station_id.into(),
            port_id: port_id.into(),
            status: SessionStatus::Started,
            charge_percent: 0.0,
            energy_consumed_kwh: 0.0,
            total_cost: 0.0,
            tariff_per_kwh,
            battery_capacity_kwh,
            created_at: Some(now),
            updated_at: Some(now),
            completed_at: None,
            version: None,
        }
    }
}

/// Session ids in the format the session service hands out.
pub fn new_session_id() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("sess-{}", &hex[..8])
}

impl Record for ChargingSession {
    const KIND: &'static str = "session";

    fn key(&self) -> RecordKey {
        RecordKey::session(&self.session_id)
    }
}

/// Entry of the error log table read by the tech-support pages.
///
/// Notifications are logged there as well, at `INFO` under a
/// `NOTIFICATION#` key; everything else is keyed `ERROR#<id>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorLog {
    pub error_id: String,
    pub service: String,
    pub level: LogLevel,
    pub message: String,
    #[serde(default)]
    pub log_status: LogStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ErrorLog {
    pub fn new(
        service: impl Into<String>,
        level: LogLevel,
        message: impl Into<String>,
        details: Option<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        ErrorLog {
            error_id: uuid::Uuid::new_v4().to_string(),
            service: service.into(),
            level,
            message: message.into(),
            log_status: LogStatus::New,
            details,
            timestamp,
        }
    }
}

impl Record for ErrorLog {
    const KIND: &'static str = "error log";

    fn key(&self) -> RecordKey {
        let prefix = match self.level {
            LogLevel::Info => "NOTIFICATION",
            LogLevel::Debug | LogLevel::Warning | LogLevel::Error | LogLevel::Critical => "ERROR",
        };
        RecordKey::new(
            format!("{prefix}#{}", self.error_id),
            self.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        )
    }
}
