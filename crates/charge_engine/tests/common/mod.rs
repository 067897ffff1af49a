//! Shared fixtures for orchestrator integration tests.
#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use charge_core::{
    ChargingPort, ChargingSession, ErrorLog, Item, PortStatus, Record, RecordKey, SessionStatus,
    Station, StationStatus, TickEvent,
};
use charge_engine::{
    BatchOrchestrator, Condition, InMemoryStore, NotificationSink, NotifyError, RecordStore,
    SimulatorConfig, StoreError,
};
use chrono::{DateTime, TimeZone, Utc};

pub const SESSIONS: &str = "Sessions";
pub const STATIONS: &str = "Stations";
pub const ERROR_LOGS: &str = "ErrorLogs";

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
}

/// Active station with the given rated power and a 0.30 tariff.
pub fn station(station_id: &str, power_kw: f64) -> Station {
    Station {
        station_id: station_id.into(),
        name: format!("Station {station_id}"),
        power_kw,
        tariff_per_kwh: 0.30,
        total_ports: 4,
        status: StationStatus::Active,
        created_at: Some(now()),
        updated_at: Some(now()),
    }
}

pub fn port(station_id: &str, port_id: &str, status: PortStatus) -> ChargingPort {
    ChargingPort {
        port_id: port_id.into(),
        station_id: station_id.into(),
        port_number: 1,
        status,
        updated_at: Some(now()),
    }
}

/// Session with a 60 kWh battery and a 0.30 tariff.
pub fn session(
    station_id: &str,
    port_id: &str,
    status: SessionStatus,
    charge_percent: f64,
) -> ChargingSession {
    let mut session = ChargingSession::new("user-1", station_id, port_id, 0.30, 60.0, now());
    session.status = status;
    session.charge_percent = charge_percent;
    session
}

#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<TickEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<TickEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn emit(&self, event: &TickEvent) -> Result<(), NotifyError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct FailingSink {
    attempts: AtomicUsize,
}

impl FailingSink {
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotificationSink for FailingSink {
    async fn emit(&self, _event: &TickEvent) -> Result<(), NotifyError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(NotifyError::Transport("sms gateway unreachable".into()))
    }
}

/// Wraps the in-memory store to count station lookups, reject writes of
/// chosen sessions, fail the status query, or let another writer bump or
/// stop a session just before it is written back.
#[derive(Debug)]
pub struct FaultyStore {
    pub inner: Arc<InMemoryStore>,
    pub station_lookups: AtomicUsize,
    pub rejected_sessions: HashSet<RecordKey>,
    pub fail_query: bool,
    pub concurrent_writer: bool,
    pub stop_before_write: bool,
}

impl FaultyStore {
    pub fn new(inner: Arc<InMemoryStore>) -> Self {
        FaultyStore {
            inner,
            station_lookups: AtomicUsize::new(0),
            rejected_sessions: HashSet::new(),
            fail_query: false,
            concurrent_writer: false,
            stop_before_write: false,
        }
    }
}

impl FaultyStore {
    async fn bump_version(&self, key: &RecordKey) {
        let current = self.inner.get_by_key(SESSIONS, key).await.unwrap();
        if let Some(mut item) = current {
            let version = item.get("version").and_then(|v| v.as_u64()).unwrap_or(0);
            item.insert("version".into(), (version + 1).into());
            self.inner.put_record(SESSIONS, item, &[]).await.unwrap();
        }
    }

    /// What the stop endpoint does: flip the status, leave the version alone.
    async fn stop_session(&self, key: &RecordKey) {
        let mut fields = Item::new();
        fields.insert("status".into(), SessionStatus::Interrupted.as_str().into());
        self.inner
            .update_fields(SESSIONS, key, fields, &[])
            .await
            .unwrap();
    }
}

#[async_trait]
impl RecordStore for FaultyStore {
    async fn query_by_status(&self, table: &str, status: &str) -> Result<Vec<Item>, StoreError> {
        if self.fail_query {
            return Err(StoreError::Backend("status index unavailable".into()));
        }
        self.inner.query_by_status(table, status).await
    }

    async fn get_by_key(&self, table: &str, key: &RecordKey) -> Result<Option<Item>, StoreError> {
        if table == STATIONS {
            self.station_lookups.fetch_add(1, Ordering::SeqCst);
        }
        self.inner.get_by_key(table, key).await
    }

    async fn put_record(
        &self,
        table: &str,
        item: Item,
        conditions: &[Condition],
    ) -> Result<(), StoreError> {
        if let Some(key) = RecordKey::from_item(&item) {
            if self.rejected_sessions.contains(&key) {
                return Err(StoreError::Backend(
                    "provisioned throughput exceeded".into(),
                ));
            }
            if self.concurrent_writer && table == SESSIONS {
                self.bump_version(&key).await;
            }
            if self.stop_before_write && table == SESSIONS {
                self.stop_session(&key).await;
            }
        }
        self.inner.put_record(table, item, conditions).await
    }

    async fn update_fields(
        &self,
        table: &str,
        key: &RecordKey,
        fields: Item,
        conditions: &[Condition],
    ) -> Result<(), StoreError> {
        self.inner
            .update_fields(table, key, fields, conditions)
            .await
    }
}

pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub sink: Arc<RecordingSink>,
}

impl Harness {
    pub fn new() -> Self {
        Harness {
            store: Arc::new(InMemoryStore::new([SESSIONS, STATIONS, ERROR_LOGS])),
            sink: Arc::new(RecordingSink::default()),
        }
    }

    pub fn orchestrator(&self) -> BatchOrchestrator {
        BatchOrchestrator::new(
            self.store.clone(),
            self.sink.clone(),
            SimulatorConfig::default(),
        )
    }

    pub fn orchestrator_with(&self, store: Arc<dyn RecordStore>) -> BatchOrchestrator {
        BatchOrchestrator::new(store, self.sink.clone(), SimulatorConfig::default())
    }

    pub async fn put(&self, table: &str, record: &impl Record) {
        self.store
            .put_record(table, record.to_item().unwrap(), &[])
            .await
            .unwrap();
    }

    pub async fn put_item(&self, table: &str, item: Item) {
        self.store.put_record(table, item, &[]).await.unwrap();
    }

    /// Seed a station, a charging port and an active session on it.
    pub async fn seed_session(&self, session: &ChargingSession) {
        self.put(
            STATIONS,
            &port(&session.station_id, &session.port_id, PortStatus::Charging),
        )
        .await;
        self.put(SESSIONS, session).await;
    }

    pub async fn stored_session(&self, session: &ChargingSession) -> ChargingSession {
        let item = self
            .store
            .get_by_key(SESSIONS, &session.key())
            .await
            .unwrap()
            .expect("session record");
        ChargingSession::from_item(&item).unwrap()
    }

    pub async fn stored_port(&self, station_id: &str, port_id: &str) -> ChargingPort {
        let item = self
            .store
            .get_by_key(STATIONS, &RecordKey::port(station_id, port_id))
            .await
            .unwrap()
            .expect("port record");
        ChargingPort::from_item(&item).unwrap()
    }

    pub fn error_logs(&self) -> Vec<ErrorLog> {
        self.store
            .scan(ERROR_LOGS)
            .unwrap()
            .iter()
            .map(|item| ErrorLog::from_item(item).unwrap())
            .collect()
    }
}
