//! # Polarway Accounts
//!
//! Lifecycle coordination for multiple logical accounts living inside one
//! process: which account is current, how the process reacts when an
//! account's authorization flips underneath it, and how logged-out accounts
//! are cleaned up exactly once.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                   polarway-accounts                      │
//! ├──────────────────────────┬───────────────────────────────┤
//! │ CurrentAccountController │      CleanupOrchestrator      │
//! │  (resolve, watch kind,   │  (id → CancellationToken,     │
//! │   reload on divergence)  │   start / cancel per view)    │
//! │            │             │               │               │
//! │     AuthStateWatcher     │          cleanup_account      │
//! ├──────────────────────────┴───────────────────────────────┤
//! │   RecordStore contract (watch views + modify txns)       │
//! │   MemoryRecordStore actor (feature = "memory")           │
//! └──────────────────────────────────────────────────────────┘
//!             ▲
//!        logout() marks the current record and installs a new one
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use futures::StreamExt;
//! use polarway_accounts::{
//!     current_account_stream, logout, run_cleanup_orchestrator, AccountResolver,
//!     AccountsConfig, MemoryRecordStore,
//! };
//!
//! async fn run(resolver: Arc<impl AccountResolver>) -> polarway_accounts::Result<()> {
//!     let config = AccountsConfig::new(2040, "/data/accounts");
//!     let store = Arc::new(MemoryRecordStore::spawn(&config));
//!
//!     let _cleanup = run_cleanup_orchestrator(&config, Arc::clone(&store), Arc::clone(&resolver));
//!     let mut current = current_account_stream(&config, store.as_ref(), resolver);
//!
//!     while let Some(account) = current.next().await {
//!         if account.is_some() {
//!             logout(store.as_ref()).await?;
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod cleanup;
pub mod config;
pub mod current;
pub mod error;
pub mod logout;
pub mod session;
pub mod store;
pub mod types;
pub mod watcher;

#[cfg(feature = "memory")]
pub mod memory;

// Re-exports for convenience
pub use cleanup::{
    cleanup_account, run_cleanup_orchestrator, CleanupOrchestrator, CleanupOutcome, CleanupTable,
};
pub use config::{AccountsConfig, ResolveOptions};
pub use current::{current_account_stream, CurrentAccountController, CurrentAccountStream};
pub use error::{AccountsError, Result};
pub use logout::logout;
pub use session::{AccountResolver, AccountSession, AuthorizedSession, ResolvedAccount};
pub use store::{RecordStore, RecordTable, RecordTransaction, StoreSnapshot};
pub use types::{
    AccountAttribute, AccountKind, AccountRecord, AccountRecordId, AccountRecordsView,
    BackgroundTaskMode, PersistedAccountState,
};
pub use watcher::AuthStateWatcher;

#[cfg(feature = "memory")]
pub use memory::{MemoryRecordStore, RecordStoreHandle};
