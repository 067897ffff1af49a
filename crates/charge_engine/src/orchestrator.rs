use std::collections::HashMap;
use std::sync::Arc;

use charge_core::{
    ChargingPort, ChargingSession, ErrorLog, Item, LogLevel, PortStatus, Record, RecordError,
    RecordKey, SessionStatus, Station, TickContext, TickError, TickEvent, TickSimulator,
    TransitionError, allocator, validate_transition,
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{
    config::SimulatorConfig,
    notify::NotificationSink,
    store::{Condition, RecordStore, StoreError},
};

const VERSION_ATTRIBUTE: &str = "version";
const STATUS_ATTRIBUTE: &str = "status";
const STATION_ID_ATTRIBUTE: &str = "stationId";
const UNKNOWN_SESSION: &str = "<unknown>";
const SIMULATOR_SERVICE: &str = "charging_simulator";
const NOTIFICATION_SERVICE: &str = "notification_service";

/// Outcome of one invocation, the only thing the scheduler gets back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationSummary {
    /// Sessions written back still in progress.
    pub updated: usize,
    /// Sessions written back as completed.
    pub completed: usize,
    pub errors: usize,
    pub event_count: usize,
}

/// Failure that aborts the whole invocation.
#[derive(Error, Debug)]
pub enum InvocationError {
    #[error("failed to fetch {status} sessions: {source}")]
    FetchActiveSessions {
        status: SessionStatus,
        #[source]
        source: StoreError,
    },
}

/// Failure scoped to a single session. Counted and logged, never propagated.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error("failed to fetch station {station_id}: {source}")]
    StationLookup {
        station_id: String,
        #[source]
        source: StoreError,
    },
    #[error("station {station_id} not found")]
    StationNotFound { station_id: String },
    #[error(transparent)]
    Tick(#[from] TickError),
    #[error("failed to persist session: {0}")]
    Persist(#[source] StoreError),
    #[error("failed to fetch port {port_id} on station {station_id}: {source}")]
    PortLookup {
        station_id: String,
        port_id: String,
        #[source]
        source: StoreError,
    },
    #[error("port {port_id} on station {station_id} not found")]
    PortNotFound { station_id: String, port_id: String },
    #[error("port {port_id} on station {station_id} cannot be released: {source}")]
    PortTransition {
        station_id: String,
        port_id: String,
        #[source]
        source: TransitionError,
    },
    #[error("failed to release port {port_id} on station {station_id}: {source}")]
    PortRelease {
        station_id: String,
        port_id: String,
        #[source]
        source: StoreError,
    },
}

impl SessionError {
    pub fn is_invariant_violation(&self) -> bool {
        match self {
            SessionError::Tick(error) => error.is_invariant_violation(),
            SessionError::PortTransition { .. } => true,
            SessionError::Record(_)
            | SessionError::StationLookup { .. }
            | SessionError::StationNotFound { .. }
            | SessionError::Persist(_)
            | SessionError::PortLookup { .. }
            | SessionError::PortNotFound { .. }
            | SessionError::PortRelease { .. } => false,
        }
    }
}

/// Station metadata read during one invocation, keyed by station id.
///
/// Absent stations are remembered too, so each distinct station is fetched
/// at most once. Lookup failures are not cached.
#[derive(Debug, Default)]
struct StationCache {
    stations: HashMap<String, Option<Station>>,
}

impl StationCache {
    async fn get(
        &mut self,
        store: &dyn RecordStore,
        table: &str,
        station_id: &str,
    ) -> Result<Option<&Station>, SessionError> {
        if !self.stations.contains_key(station_id) {
            let item = store
                .get_by_key(table, &RecordKey::station(station_id))
                .await
                .map_err(|source| SessionError::StationLookup {
                    station_id: station_id.to_string(),
                    source,
                })?;
            let station = item.as_ref().map(Station::from_item).transpose()?;
            self.stations.insert(station_id.to_string(), station);
        }
        Ok(self.stations.get(station_id).and_then(Option::as_ref))
    }
}

struct ProcessedSession {
    session: ChargingSession,
    events: Vec<TickEvent>,
}

/// Drives one invocation of the tick engine end to end.
pub struct BatchOrchestrator {
    store: Arc<dyn RecordStore>,
    sink: Arc<dyn NotificationSink>,
    config: SimulatorConfig,
    simulator: TickSimulator,
}

impl BatchOrchestrator {
    pub fn new(
        store: Arc<dyn RecordStore>,
        sink: Arc<dyn NotificationSink>,
        config: SimulatorConfig,
    ) -> Self {
        let simulator = TickSimulator::new(config.tick);
        BatchOrchestrator {
            store,
            sink,
            config,
            simulator,
        }
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    pub async fn run_invocation(&self) -> Result<InvocationSummary, InvocationError> {
        self.run_invocation_at(Utc::now()).await
    }

    /// Advance every active session, write them back, release the ports of
    /// completed sessions and forward the produced events.
    ///
    /// Only a failure to fetch the active sessions is returned as an error;
    /// anything going wrong with one session is counted in the summary.
    pub async fn run_invocation_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<InvocationSummary, InvocationError> {
        tracing::info!("Charging simulator invoked at {}", now.to_rfc3339());

        let items = match self.fetch_active_sessions().await {
            Ok(items) => items,
            Err(error) => {
                tracing::error!(%error, "Simulator failure: could not fetch active sessions");
                let entry = ErrorLog::new(
                    SIMULATOR_SERVICE,
                    LogLevel::Critical,
                    format!("Simulator failure: {error}"),
                    None,
                    now,
                );
                self.write_log(entry).await;
                return Err(error);
            }
        };
        tracing::info!("Found {} active sessions", items.len());

        let mut summary = InvocationSummary::default();
        if items.is_empty() {
            return Ok(summary);
        }

        // Every fetched record holds its port, decodable or not.
        let active_ports = allocator::active_port_counts(
            items
                .iter()
                .filter_map(|item| item.get(STATION_ID_ATTRIBUTE).and_then(Value::as_str)),
        );
        let decoded: Vec<(String, Result<ChargingSession, RecordError>)> = items
            .iter()
            .map(|item| (session_label(item), ChargingSession::from_item(item)))
            .collect();

        let mut cache = StationCache::default();
        let mut events = Vec::new();
        for (label, session) in decoded {
            let result = match session {
                Ok(session) => {
                    self.process_session(session, &mut cache, &active_ports, now)
                        .await
                }
                Err(error) => Err(error.into()),
            };

            match result {
                Ok(processed) => {
                    events.extend(processed.events);
                    if processed.session.status == SessionStatus::Completed {
                        summary.completed += 1;
                        if let Err(error) = self.release_port(&processed.session, now).await {
                            summary.errors += 1;
                            self.record_session_error(&label, &error, now).await;
                        }
                    } else {
                        summary.updated += 1;
                    }
                }
                Err(error) => {
                    summary.errors += 1;
                    self.record_session_error(&label, &error, now).await;
                }
            }
        }

        summary.event_count = events.len();
        for event in &events {
            if let Err(error) = self.sink.emit(event).await {
                tracing::warn!(
                    %error,
                    event_type = event.event_type(),
                    session_id = %event.session_id(),
                    "Failed to emit notification"
                );
            }
            self.write_log(notification_log(event, now)).await;
        }

        tracing::info!(
            updated = summary.updated,
            completed = summary.completed,
            errors = summary.errors,
            event_count = summary.event_count,
            "Simulator results"
        );
        Ok(summary)
    }

    async fn fetch_active_sessions(&self) -> Result<Vec<Item>, InvocationError> {
        let mut items = Vec::new();
        for status in SessionStatus::ACTIVE {
            let found = self
                .store
                .query_by_status(&self.config.sessions_table, status.as_str())
                .await
                .map_err(|source| InvocationError::FetchActiveSessions { status, source })?;
            items.extend(found);
        }
        Ok(items)
    }

    async fn process_session(
        &self,
        mut session: ChargingSession,
        cache: &mut StationCache,
        active_ports: &HashMap<String, usize>,
        now: DateTime<Utc>,
    ) -> Result<ProcessedSession, SessionError> {
        tracing::debug!(session_id = %session.session_id, status = %session.status, "Processing session");

        let station = cache
            .get(
                self.store.as_ref(),
                &self.config.stations_table,
                &session.station_id,
            )
            .await?
            .ok_or_else(|| SessionError::StationNotFound {
                station_id: session.station_id.clone(),
            })?;
        let ctx = TickContext {
            station_power_kw: station.power_kw,
            active_port_count: active_ports.get(&session.station_id).copied().unwrap_or(1),
            now,
        };

        let read_status = session.status;
        let events = self.simulator.advance(&mut session, &ctx)?;
        self.persist(&mut session, read_status).await?;
        Ok(ProcessedSession { session, events })
    }

    /// Write the session back, conditional on nobody having written it since
    /// it was read. Stopping a session only flips its status, so the status
    /// read is part of the fence as well as the version.
    async fn persist(
        &self,
        session: &mut ChargingSession,
        read_status: SessionStatus,
    ) -> Result<(), SessionError> {
        let conditions = [
            match session.version {
                Some(version) => Condition::field_equals(VERSION_ATTRIBUTE, version),
                None => Condition::field_absent(VERSION_ATTRIBUTE),
            },
            Condition::field_equals(STATUS_ATTRIBUTE, read_status.as_str()),
        ];
        session.version = Some(session.version.map_or(1, |version| version + 1));
        let item = session.to_item()?;
        self.store
            .put_record(&self.config.sessions_table, item, &conditions)
            .await
            .map_err(SessionError::Persist)
    }

    /// Free the port of a completed session, if its current status allows it.
    async fn release_port(
        &self,
        session: &ChargingSession,
        now: DateTime<Utc>,
    ) -> Result<(), SessionError> {
        let key = RecordKey::port(&session.station_id, &session.port_id);
        let item = self
            .store
            .get_by_key(&self.config.stations_table, &key)
            .await
            .map_err(|source| SessionError::PortLookup {
                station_id: session.station_id.clone(),
                port_id: session.port_id.clone(),
                source,
            })?
            .ok_or_else(|| SessionError::PortNotFound {
                station_id: session.station_id.clone(),
                port_id: session.port_id.clone(),
            })?;
        let port = ChargingPort::from_item(&item)?;

        validate_transition(port.status, PortStatus::Free).map_err(|source| {
            SessionError::PortTransition {
                station_id: session.station_id.clone(),
                port_id: session.port_id.clone(),
                source,
            }
        })?;

        let mut fields = Item::new();
        fields.insert(STATUS_ATTRIBUTE.into(), PortStatus::Free.as_str().into());
        fields.insert(
            "updatedAt".into(),
            now.to_rfc3339_opts(SecondsFormat::AutoSi, true).into(),
        );
        self.store
            .update_fields(
                &self.config.stations_table,
                &key,
                fields,
                &[Condition::field_equals(
                    STATUS_ATTRIBUTE,
                    port.status.as_str(),
                )],
            )
            .await
            .map_err(|source| SessionError::PortRelease {
                station_id: session.station_id.clone(),
                port_id: session.port_id.clone(),
                source,
            })
    }

    async fn record_session_error(
        &self,
        session_id: &str,
        error: &SessionError,
        now: DateTime<Utc>,
    ) {
        log_session_error(session_id, error);
        let details = (session_id != UNKNOWN_SESSION)
            .then(|| serde_json::json!({ "sessionId": session_id }).to_string());
        let entry = ErrorLog::new(
            SIMULATOR_SERVICE,
            LogLevel::Error,
            error.to_string(),
            details,
            now,
        );
        self.write_log(entry).await;
    }

    /// Best effort: a failed log write is reported and otherwise ignored.
    async fn write_log(&self, entry: ErrorLog) {
        let item = match entry.to_item() {
            Ok(item) => item,
            Err(error) => {
                tracing::warn!(%error, "Failed to encode error log entry");
                return;
            }
        };
        if let Err(error) = self
            .store
            .put_record(&self.config.error_logs_table, item, &[])
            .await
        {
            tracing::warn!(%error, level = %entry.level, "Failed to write error log entry");
        }
    }
}

fn session_label(item: &Item) -> String {
    item.get("sessionId")
        .and_then(Value::as_str)
        .unwrap_or(UNKNOWN_SESSION)
        .to_string()
}

fn notification_log(event: &TickEvent, now: DateTime<Utc>) -> ErrorLog {
    ErrorLog::new(
        NOTIFICATION_SERVICE,
        LogLevel::Info,
        format!("[{}] Session {}", event.event_type(), event.session_id()),
        serde_json::to_string(event).ok(),
        now,
    )
}

fn log_session_error(session_id: &str, error: &SessionError) {
    if error.is_invariant_violation() {
        tracing::error!(session_id, %error, "Invariant violation while processing session");
    } else {
        tracing::error!(session_id, %error, "Error processing session");
    }
}
