//! Key-value store collaborator.
//!
//! The engine only needs four operations from the persistence layer: a
//! secondary-index query by status, a primary-key lookup, a full-record
//! upsert and a partial update. Both writes accept conditions so callers can
//! fence against concurrent writers.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use charge_core::{Item, RecordKey};
use serde_json::Value;
use thiserror::Error;

const STATUS_ATTRIBUTE: &str = "status";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("table {table} does not exist")]
    TableNotFound { table: String },
    #[error("item {key} not found in {table}")]
    ItemNotFound { table: String, key: RecordKey },
    #[error("item written to {table} has no PK/SK attributes")]
    MissingKey { table: String },
    #[error("conditional check failed for {key} in {table}")]
    ConditionFailed { table: String, key: RecordKey },
    #[error("store backend failure: {0}")]
    Backend(String),
}

/// Precondition evaluated against the current version of an item.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    FieldEquals { field: String, value: Value },
    FieldAbsent { field: String },
}

impl Condition {
    pub fn field_equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Condition::FieldEquals {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn field_absent(field: impl Into<String>) -> Self {
        Condition::FieldAbsent {
            field: field.into(),
        }
    }

    /// A missing item has no fields: equality fails, absence holds.
    pub fn holds(&self, current: Option<&Item>) -> bool {
        match self {
            Condition::FieldEquals { field, value } => {
                current.and_then(|item| item.get(field)) == Some(value)
            }
            Condition::FieldAbsent { field } => {
                current.is_none_or(|item| !item.contains_key(field))
            }
        }
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Query the status index of `table`.
    async fn query_by_status(&self, table: &str, status: &str) -> Result<Vec<Item>, StoreError>;

    async fn get_by_key(&self, table: &str, key: &RecordKey) -> Result<Option<Item>, StoreError>;

    /// Insert or replace a whole item. The key is read from its `PK`/`SK`.
    async fn put_record(
        &self,
        table: &str,
        item: Item,
        conditions: &[Condition],
    ) -> Result<(), StoreError>;

    /// Overwrite some fields of an existing item.
    async fn update_fields(
        &self,
        table: &str,
        key: &RecordKey,
        fields: Item,
        conditions: &[Condition],
    ) -> Result<(), StoreError>;
}

type Table = HashMap<RecordKey, Item>;

/// Process-local store used by the development binary and the tests.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: Mutex<HashMap<String, Table>>,
}

impl InMemoryStore {
    pub fn new<I, S>(table_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tables = table_names
            .into_iter()
            .map(|name| (name.into(), Table::new()))
            .collect();
        InMemoryStore {
            tables: Mutex::new(tables),
        }
    }

    /// Every item of `table`, in no particular order.
    pub fn scan(&self, table: &str) -> Result<Vec<Item>, StoreError> {
        self.with_table(table, |items| Ok(items.values().cloned().collect()))
    }

    fn with_table<T>(
        &self,
        table: &str,
        f: impl FnOnce(&mut Table) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut tables = self
            .tables
            .lock()
            .map_err(|_| StoreError::Backend("in-memory store lock poisoned".into()))?;
        let items = tables
            .get_mut(table)
            .ok_or_else(|| StoreError::TableNotFound {
                table: table.to_string(),
            })?;
        f(items)
    }

    fn check_conditions(
        table: &str,
        key: &RecordKey,
        current: Option<&Item>,
        conditions: &[Condition],
    ) -> Result<(), StoreError> {
        if conditions.iter().all(|condition| condition.holds(current)) {
            Ok(())
        } else {
            Err(StoreError::ConditionFailed {
                table: table.to_string(),
                key: key.clone(),
            })
        }
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn query_by_status(&self, table: &str, status: &str) -> Result<Vec<Item>, StoreError> {
        self.with_table(table, |items| {
            Ok(items
                .values()
                .filter(|item| item.get(STATUS_ATTRIBUTE).and_then(Value::as_str) == Some(status))
                .cloned()
                .collect())
        })
    }

    async fn get_by_key(&self, table: &str, key: &RecordKey) -> Result<Option<Item>, StoreError> {
        self.with_table(table, |items| Ok(items.get(key).cloned()))
    }

    async fn put_record(
        &self,
        table: &str,
        item: Item,
        conditions: &[Condition],
    ) -> Result<(), StoreError> {
        let key = RecordKey::from_item(&item).ok_or_else(|| StoreError::MissingKey {
            table: table.to_string(),
        })?;
        self.with_table(table, |items| {
            Self::check_conditions(table, &key, items.get(&key), conditions)?;
            items.insert(key, item);
            Ok(())
        })
    }

    async fn update_fields(
        &self,
        table: &str,
        key: &RecordKey,
        fields: Item,
        conditions: &[Condition],
    ) -> Result<(), StoreError> {
        self.with_table(table, |items| {
            Self::check_conditions(table, key, items.get(key), conditions)?;
            let item = items.get_mut(key).ok_or_else(|| StoreError::ItemNotFound {
                table: table.to_string(),
                key: key.clone(),
            })?;
            item.extend(fields);
            Ok(())
        })
    }
}
