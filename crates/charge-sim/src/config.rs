use std::path::Path;

use anyhow::Context;
use charge_core::{ChargingPort, ChargingSession, Record, Station};
use charge_engine::{InMemoryStore, RecordStore, SimulatorConfig};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// Records loaded into the in-memory store at startup
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Fixtures {
    pub stations: Vec<Station>,
    pub ports: Vec<ChargingPort>,
    pub sessions: Vec<ChargingSession>,
}

impl Fixtures {
    pub async fn seed(&self, store: &InMemoryStore, config: &SimulatorConfig) -> anyhow::Result<()> {
        for station in &self.stations {
            put(store, &config.stations_table, station).await?;
        }
        for port in &self.ports {
            put(store, &config.stations_table, port).await?;
        }
        for session in &self.sessions {
            put(store, &config.sessions_table, session).await?;
        }
        tracing::info!(
            "Seeded {} stations, {} ports and {} sessions",
            self.stations.len(),
            self.ports.len(),
            self.sessions.len()
        );
        Ok(())
    }
}

async fn put<R: Record>(store: &InMemoryStore, table: &str, record: &R) -> anyhow::Result<()> {
    let item = record.to_item()?;
    store
        .put_record(table, item, &[])
        .await
        .with_context(|| format!("Failed to seed {} {}", R::KIND, record.key()))
}

pub async fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read '{}'", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse '{}'", path.display()))
}
