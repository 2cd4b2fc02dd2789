//! RecordStore — the contract between the lifecycle core and account persistence
//!
//! A store publishes two live views through `tokio::sync::watch`:
//! the current account id and the full record snapshot. Both are only
//! republished when their value actually changes. Writes go through
//! [`RecordStore::modify`], which runs a closure against a
//! [`RecordTransaction`] atomically with respect to every other reader and
//! writer of the store.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::Result;
use crate::types::{AccountAttribute, AccountRecord, AccountRecordId, AccountRecordsView};

/// Persistent account record store consumed by the lifecycle core
#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    /// Live current-account id, distinct until changed
    fn current_account_id(&self) -> watch::Receiver<Option<AccountRecordId>>;

    /// Live full snapshot of all records
    fn records_view(&self) -> watch::Receiver<AccountRecordsView>;

    /// Run `transaction` atomically and return its result once committed
    async fn modify<T, F>(&self, transaction: F) -> Result<T>
    where
        F: for<'t> FnOnce(&mut RecordTransaction<'t>) -> T + Send + 'static,
        T: Send + 'static;
}

/// Backing table of records, the current pointer, and the id allocator
#[derive(Debug, Clone)]
pub struct RecordTable {
    records: BTreeMap<AccountRecordId, AccountRecord>,
    current_id: Option<AccountRecordId>,
    next_id: i64,
}

impl Default for RecordTable {
    fn default() -> Self {
        Self {
            records: BTreeMap::new(),
            current_id: None,
            next_id: 1,
        }
    }
}

impl RecordTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_id(&self) -> Option<AccountRecordId> {
        self.current_id
    }

    /// Full snapshot view, records ordered by id
    pub fn view(&self) -> AccountRecordsView {
        AccountRecordsView {
            records: self.records.values().cloned().collect(),
            current_id: self.current_id,
        }
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            records: self.records.values().cloned().collect(),
            current_id: self.current_id,
            next_id: self.next_id,
        }
    }

    /// Rebuild a table from a snapshot.
    ///
    /// The id allocator resumes past both the saved counter and the largest
    /// stored id so restored ids are never handed out again.
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let max_id = snapshot.records.iter().map(|r| r.id.raw()).max().unwrap_or(0);
        let records = snapshot
            .records
            .into_iter()
            .map(|r| (r.id, r))
            .collect();
        Self {
            records,
            current_id: snapshot.current_id,
            next_id: snapshot.next_id.max(max_id + 1),
        }
    }

    /// Begin a transaction over this table
    pub fn transaction(&mut self) -> RecordTransaction<'_> {
        RecordTransaction { table: self }
    }
}

/// Mutable view handed to [`RecordStore::modify`] closures
pub struct RecordTransaction<'a> {
    table: &'a mut RecordTable,
}

impl RecordTransaction<'_> {
    pub fn current_id(&self) -> Option<AccountRecordId> {
        self.table.current_id
    }

    pub fn set_current_id(&mut self, id: Option<AccountRecordId>) {
        self.table.current_id = id;
    }

    pub fn record(&self, id: AccountRecordId) -> Option<&AccountRecord> {
        self.table.records.get(&id)
    }

    pub fn records(&self) -> impl Iterator<Item = &AccountRecord> {
        self.table.records.values()
    }

    /// Replace the record stored under `id` with the closure's result.
    ///
    /// The closure receives the current record (if any); returning `None`
    /// deletes it. The stored record always keeps `id`.
    pub fn update_record<F>(&mut self, id: AccountRecordId, update: F)
    where
        F: FnOnce(Option<AccountRecord>) -> Option<AccountRecord>,
    {
        let current = self.table.records.remove(&id);
        if let Some(mut updated) = update(current) {
            updated.id = id;
            self.table.records.insert(id, updated);
        }
    }

    /// Create a record with a freshly allocated id
    pub fn create_record(&mut self, attributes: Vec<AccountAttribute>) -> AccountRecordId {
        let id = AccountRecordId::new(self.table.next_id);
        self.table.next_id += 1;
        self.table
            .records
            .insert(id, AccountRecord::new(id, attributes));
        id
    }
}

/// Serializable image of a [`RecordTable`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub records: Vec<AccountRecord>,
    pub current_id: Option<AccountRecordId>,
    pub next_id: i64,
}
