//! MemoryRecordStore — Tokio actor owning an in-memory [`RecordTable`]
//!
//! All transactions are processed sequentially via an mpsc channel, which
//! gives serializable consistency for `modify` without any lock held by
//! callers. After every transaction the actor republishes the record view and
//! the current id through watch channels, but only when they changed. The
//! caller's `modify` resolves after that publish, so a committed write is
//! always visible on the watch channels by the time `modify` returns.
//!
//! # Usage
//!
//! ```rust,no_run
//! use polarway_accounts::{AccountsConfig, MemoryRecordStore, RecordStore};
//!
//! #[tokio::main]
//! async fn main() -> polarway_accounts::Result<()> {
//!     let config = AccountsConfig::new(2040, "/data/accounts");
//!     let store = MemoryRecordStore::spawn(&config);
//!
//!     let id = store
//!         .modify(|txn| {
//!             let id = txn.create_record(Vec::new());
//!             txn.set_current_id(Some(id));
//!             id
//!         })
//!         .await?;
//!
//!     assert_eq!(*store.current_account_id().borrow(), Some(id));
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info};

use crate::config::AccountsConfig;
use crate::error::{AccountsError, Result};
use crate::store::{RecordStore, RecordTable, RecordTransaction, StoreSnapshot};
use crate::types::{AccountRecordId, AccountRecordsView};

/// Runs against the table and returns the acknowledgement to fire after publishing
type Transaction = Box<dyn FnOnce(&mut RecordTable) -> Ack + Send>;
type Ack = Box<dyn FnOnce() + Send>;

// ─── Actor Messages ───

enum StoreMsg {
    Modify { transaction: Transaction },
}

// ─── Actor ───

/// In-memory record store actor
pub struct MemoryRecordStore {
    table: RecordTable,
    views: watch::Sender<AccountRecordsView>,
    current: watch::Sender<Option<AccountRecordId>>,
    rx: mpsc::Receiver<StoreMsg>,
}

impl MemoryRecordStore {
    /// Spawn an empty store and return a handle to it
    pub fn spawn(config: &AccountsConfig) -> RecordStoreHandle {
        Self::spawn_with_table(config, RecordTable::new())
    }

    /// Spawn a store seeded from a previously taken snapshot
    pub fn spawn_with_snapshot(config: &AccountsConfig, snapshot: StoreSnapshot) -> RecordStoreHandle {
        Self::spawn_with_table(config, RecordTable::from_snapshot(snapshot))
    }

    fn spawn_with_table(config: &AccountsConfig, table: RecordTable) -> RecordStoreHandle {
        let (tx, rx) = mpsc::channel(config.store_channel_capacity);
        let (views, view_rx) = watch::channel(table.view());
        let (current, current_rx) = watch::channel(table.current_id());

        let actor = Self {
            table,
            views,
            current,
            rx,
        };

        tokio::spawn(actor.run());
        info!("MemoryRecordStore spawned");
        RecordStoreHandle {
            tx,
            view_rx,
            current_rx,
        }
    }

    /// Main event loop
    async fn run(mut self) {
        while let Some(msg) = self.rx.recv().await {
            match msg {
                StoreMsg::Modify { transaction } => {
                    let ack = transaction(&mut self.table);
                    self.publish();
                    ack();
                }
            }
        }
        info!("MemoryRecordStore stopped");
    }

    fn publish(&self) {
        let view = self.table.view();
        let view_changed = self.views.send_if_modified(|current| {
            if *current == view {
                return false;
            }
            *current = view;
            true
        });

        let current_id = self.table.current_id();
        let current_changed = self.current.send_if_modified(|current| {
            if *current == current_id {
                return false;
            }
            *current = current_id;
            true
        });

        if view_changed || current_changed {
            debug!(
                records = self.views.borrow().records.len(),
                current = ?current_id,
                "Record view published"
            );
        }
    }
}

// ─── Handle (client-facing API) ───

/// Thread-safe handle to communicate with a [`MemoryRecordStore`]
#[derive(Clone)]
pub struct RecordStoreHandle {
    tx: mpsc::Sender<StoreMsg>,
    view_rx: watch::Receiver<AccountRecordsView>,
    current_rx: watch::Receiver<Option<AccountRecordId>>,
}

impl RecordStoreHandle {
    /// Serializable image of the store's current contents
    pub async fn snapshot(&self) -> Result<StoreSnapshot> {
        let (reply, rx) = oneshot::channel();
        let transaction: Transaction = Box::new(move |table: &mut RecordTable| -> Ack {
            let snapshot = table.snapshot();
            Box::new(move || {
                let _ = reply.send(snapshot);
            })
        });
        self.send(transaction, rx).await
    }

    /// Latest published view, without waiting for a change
    pub fn current_view(&self) -> AccountRecordsView {
        self.view_rx.borrow().clone()
    }

    async fn send<T>(&self, transaction: Transaction, rx: oneshot::Receiver<T>) -> Result<T> {
        self.tx
            .send(StoreMsg::Modify { transaction })
            .await
            .map_err(|_| AccountsError::StoreUnavailable("MemoryRecordStore".into()))?;
        rx.await.map_err(|_| {
            AccountsError::ActorUnavailable("MemoryRecordStore dropped the reply".into())
        })
    }
}

#[async_trait]
impl RecordStore for RecordStoreHandle {
    fn current_account_id(&self) -> watch::Receiver<Option<AccountRecordId>> {
        self.current_rx.clone()
    }

    fn records_view(&self) -> watch::Receiver<AccountRecordsView> {
        self.view_rx.clone()
    }

    async fn modify<T, F>(&self, transaction: F) -> Result<T>
    where
        F: for<'t> FnOnce(&mut RecordTransaction<'t>) -> T + Send + 'static,
        T: Send + 'static,
    {
        let (reply, rx) = oneshot::channel();
        let transaction: Transaction = Box::new(move |table: &mut RecordTable| -> Ack {
            let output = transaction(&mut table.transaction());
            Box::new(move || {
                let _ = reply.send(output);
            })
        });
        self.send(transaction, rx).await
    }
}
