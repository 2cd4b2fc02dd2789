//! Cleanup of logged-out accounts
//!
//! [`CleanupOrchestrator`] follows the store's record view and keeps exactly
//! one cleanup task per record carrying the logged-out marker. Each view is
//! reconciled against a lock-guarded `id → CancellationToken` table: stale
//! entries are removed and new ones inserted under the lock, then, with the
//! lock released, stale tokens are cancelled and new tasks spawned.
//!
//! [`cleanup_account`] is the per-record task: resolve, best-effort remote
//! logout, then delete the local record.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use polarway_accounts::{run_cleanup_orchestrator, AccountResolver, AccountsConfig, MemoryRecordStore};
//!
//! fn start(resolver: Arc<impl AccountResolver>) {
//!     let config = AccountsConfig::new(2040, "/data/accounts");
//!     let store = Arc::new(MemoryRecordStore::spawn(&config));
//!
//!     // Cleanup runs for as long as the orchestrator is held
//!     let orchestrator = run_cleanup_orchestrator(&config, store, resolver);
//!     drop(orchestrator);
//! }
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{AccountsConfig, ResolveOptions};
use crate::session::{AccountResolver, ResolvedAccount};
use crate::store::RecordStore;
use crate::types::{AccountRecordId, AccountRecordsView, BackgroundTaskMode};

// ─── Task Table ───

/// Start/cancel decisions produced by one reconciliation
#[derive(Debug, Default)]
pub struct Reconciliation {
    pub cancel: Vec<(AccountRecordId, CancellationToken)>,
    pub start: Vec<(AccountRecordId, CancellationToken)>,
}

/// Live cleanup entries keyed by record id
pub struct CleanupTable {
    root: CancellationToken,
    entries: Mutex<HashMap<AccountRecordId, CancellationToken>>,
}

impl CleanupTable {
    /// Entry tokens are children of `root`, so cancelling it cancels them all
    pub fn new(root: CancellationToken) -> Self {
        Self {
            root,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Bring the table in line with `view` and report what changed.
    ///
    /// Tokens for new entries are allocated here, before any task exists, so
    /// a cancellation that lands before the task starts is still observed.
    pub fn reconcile(&self, view: &AccountRecordsView) -> Reconciliation {
        let valid: HashSet<AccountRecordId> = view.logged_out_ids().collect();
        let mut plan = Reconciliation::default();

        let mut entries = self.entries.lock();

        let stale: Vec<AccountRecordId> = entries
            .keys()
            .filter(|id| !valid.contains(id))
            .copied()
            .collect();
        for id in stale {
            if let Some(token) = entries.remove(&id) {
                plan.cancel.push((id, token));
            }
        }

        for id in valid {
            if !entries.contains_key(&id) {
                let token = self.root.child_token();
                entries.insert(id, token.clone());
                plan.start.push((id, token));
            }
        }

        plan
    }

    /// Sorted ids of live entries
    pub fn ids(&self) -> Vec<AccountRecordId> {
        let mut ids: Vec<_> = self.entries.lock().keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Cancel and forget every entry
    pub fn cancel_all(&self) {
        let drained: Vec<_> = self.entries.lock().drain().collect();
        for (_, token) in drained {
            token.cancel();
        }
    }
}

// ─── Orchestrator ───

/// Long-running cleanup of logged-out records.
///
/// Everything it started is cancelled when it is stopped or dropped.
pub struct CleanupOrchestrator {
    table: Arc<CleanupTable>,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl CleanupOrchestrator {
    /// Subscribe to `store`'s record view and start reconciling
    pub fn spawn<S, R>(config: &AccountsConfig, store: Arc<S>, resolver: Arc<R>) -> Self
    where
        S: RecordStore,
        R: AccountResolver,
    {
        let cancel = CancellationToken::new();
        let table = Arc::new(CleanupTable::new(cancel.clone()));
        let options = config.cleanup_resolve_options();

        let handle = tokio::spawn(Self::run(
            store,
            resolver,
            options,
            Arc::clone(&table),
            cancel.clone(),
        ));
        info!("CleanupOrchestrator started");

        Self {
            table,
            cancel,
            handle: Some(handle),
        }
    }

    async fn run<S, R>(
        store: Arc<S>,
        resolver: Arc<R>,
        options: ResolveOptions,
        table: Arc<CleanupTable>,
        cancel: CancellationToken,
    ) where
        S: RecordStore,
        R: AccountResolver,
    {
        let mut views = store.records_view();
        loop {
            let view = views.borrow_and_update().clone();
            let plan = table.reconcile(&view);
            if !plan.cancel.is_empty() || !plan.start.is_empty() {
                debug!(
                    cancelled = plan.cancel.len(),
                    started = plan.start.len(),
                    live = table.len(),
                    "Cleanup table reconciled"
                );
            }

            for (id, token) in plan.cancel {
                debug!(%id, "Cancelling cleanup");
                token.cancel();
            }
            for (id, token) in plan.start {
                let store = Arc::clone(&store);
                let resolver = Arc::clone(&resolver);
                let options = options.clone();
                tokio::spawn(async move {
                    let outcome =
                        cleanup_account(store.as_ref(), resolver.as_ref(), &options, id, &token).await;
                    debug!(%id, ?outcome, "Cleanup task finished");
                });
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                changed = views.changed() => {
                    if changed.is_err() {
                        warn!("Record view closed, stopping cleanup");
                        break;
                    }
                }
            }
        }
        table.cancel_all();
    }

    /// Ids with a live cleanup entry
    pub fn active_ids(&self) -> Vec<AccountRecordId> {
        self.table.ids()
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Cancel every outstanding entry and unsubscribe from the store
    pub fn stop(&mut self) {
        self.cancel.cancel();
        self.table.cancel_all();
        if let Some(handle) = self.handle.take() {
            handle.abort();
            info!("CleanupOrchestrator stopped");
        }
    }
}

impl Drop for CleanupOrchestrator {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Start cleaning up logged-out records for as long as the returned handle is held
pub fn run_cleanup_orchestrator<S, R>(
    config: &AccountsConfig,
    store: Arc<S>,
    resolver: Arc<R>,
) -> CleanupOrchestrator
where
    S: RecordStore,
    R: AccountResolver,
{
    CleanupOrchestrator::spawn(config, store, resolver)
}

// ─── Cleanup Task ───

/// How a cleanup task ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupOutcome {
    /// Resolved unauthorized; the record is left in place
    SkippedUnauthorized,
    /// Record deleted after the remote logout attempt
    Removed { remote_acknowledged: bool },
    /// Cancelled before the delete committed; the record is untouched
    Cancelled,
    /// The store rejected the delete; the record is untouched
    Failed,
}

/// Log out and delete one logged-out record.
///
/// A failed logout request counts as "not acknowledged" and never stops the
/// delete. If `cancel` fires before the delete commits, the record stays.
pub async fn cleanup_account<S, R>(
    store: &S,
    resolver: &R,
    options: &ResolveOptions,
    id: AccountRecordId,
    cancel: &CancellationToken,
) -> CleanupOutcome
where
    S: RecordStore,
    R: AccountResolver,
{
    let account = tokio::select! {
        biased;
        _ = cancel.cancelled() => return CleanupOutcome::Cancelled,
        account = resolver.resolve(id, options) => account,
    };

    let session = match account {
        ResolvedAccount::Unauthorized(_) => {
            debug!(%id, "Logged-out account is unauthorized, nothing to clean");
            return CleanupOutcome::SkippedUnauthorized;
        }
        ResolvedAccount::Authorized(session) => session,
    };

    session.set_background_task_mode(BackgroundTaskMode::Always);
    let acknowledged = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            session.set_background_task_mode(BackgroundTaskMode::Never);
            return CleanupOutcome::Cancelled;
        }
        response = session.send_logout_request() => match response {
            Ok(acknowledged) => acknowledged,
            Err(e) => {
                warn!(%id, error = ?e, "Logout request failed");
                false
            }
        },
    };
    session.set_background_task_mode(BackgroundTaskMode::Never);

    let guard = cancel.clone();
    let removed = store
        .modify(move |txn| {
            if guard.is_cancelled() {
                return false;
            }
            txn.update_record(id, |_| None);
            true
        })
        .await;

    match removed {
        Ok(true) => {
            info!(%id, remote_acknowledged = acknowledged, "Logged-out account removed");
            CleanupOutcome::Removed {
                remote_acknowledged: acknowledged,
            }
        }
        Ok(false) => CleanupOutcome::Cancelled,
        Err(e) => {
            warn!(%id, error = ?e, "Failed to remove logged-out account");
            CleanupOutcome::Failed
        }
    }
}
