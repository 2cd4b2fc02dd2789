//! Shared test doubles — scripted sessions and a recording resolver

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;

use polarway_accounts::{
    AccountRecord, AccountRecordId, AccountRecordsView, AccountResolver, AccountSession,
    AccountsConfig, AccountsError, AuthorizedSession, BackgroundTaskMode, MemoryRecordStore,
    PersistedAccountState, RecordStore, RecordStoreHandle, RecordTransaction, ResolveOptions,
    ResolvedAccount, StoreSnapshot,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn test_config() -> AccountsConfig {
    AccountsConfig::new(2040, "/tmp/polarway-accounts-tests").with_testing_environment(true)
}

pub fn id(raw: i64) -> AccountRecordId {
    AccountRecordId::new(raw)
}

/// Store seeded with `records` and `current`
pub fn seeded_store(records: Vec<AccountRecord>, current: Option<i64>) -> RecordStoreHandle {
    let next_id = records.iter().map(|r| r.id.raw()).max().unwrap_or(0) + 1;
    MemoryRecordStore::spawn_with_snapshot(
        &test_config(),
        StoreSnapshot {
            records,
            current_id: current.map(AccountRecordId::new),
            next_id,
        },
    )
}

/// Poll `condition` until it holds, failing the test after five seconds
pub async fn wait_until<F: FnMut() -> bool>(mut condition: F) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

// ─── Sessions ───

#[derive(Debug, Clone, Copy)]
pub enum LogoutResponse {
    Acknowledged(bool),
    TransportFailure,
}

pub struct MockSession {
    id: AccountRecordId,
    state: watch::Sender<PersistedAccountState>,
    modes: Mutex<Vec<BackgroundTaskMode>>,
    response: Mutex<LogoutResponse>,
    released: watch::Sender<bool>,
    logout_calls: AtomicUsize,
    logout_completed: AtomicUsize,
}

impl MockSession {
    pub fn new(id: AccountRecordId, state: PersistedAccountState) -> Arc<Self> {
        Arc::new(Self {
            id,
            state: watch::channel(state).0,
            modes: Mutex::new(Vec::new()),
            response: Mutex::new(LogoutResponse::Acknowledged(true)),
            released: watch::channel(true).0,
            logout_calls: AtomicUsize::new(0),
            logout_completed: AtomicUsize::new(0),
        })
    }

    pub fn authorized(id: AccountRecordId) -> Arc<Self> {
        Self::new(id, PersistedAccountState::Authorized { user_id: id.raw() * 100 })
    }

    pub fn unauthorized(id: AccountRecordId) -> Arc<Self> {
        Self::new(id, PersistedAccountState::Empty)
    }

    pub fn set_state(&self, state: PersistedAccountState) {
        self.state.send_replace(state);
    }

    pub fn set_logout_response(&self, response: LogoutResponse) {
        *self.response.lock() = response;
    }

    /// Make logout requests wait until [`MockSession::release_logout`]
    pub fn hold_logout(&self) {
        self.released.send_replace(false);
    }

    pub fn release_logout(&self) {
        self.released.send_replace(true);
    }

    /// Live state subscriptions, one per active watcher
    pub fn watchers(&self) -> usize {
        self.state.receiver_count()
    }

    pub fn modes(&self) -> Vec<BackgroundTaskMode> {
        self.modes.lock().clone()
    }

    pub fn logout_calls(&self) -> usize {
        self.logout_calls.load(Ordering::SeqCst)
    }

    pub fn logout_completed(&self) -> usize {
        self.logout_completed.load(Ordering::SeqCst)
    }
}

impl AccountSession for MockSession {
    fn id(&self) -> AccountRecordId {
        self.id
    }

    fn persisted_state(&self) -> watch::Receiver<PersistedAccountState> {
        self.state.subscribe()
    }
}

#[async_trait]
impl AuthorizedSession for MockSession {
    fn set_background_task_mode(&self, mode: BackgroundTaskMode) {
        self.modes.lock().push(mode);
    }

    async fn send_logout_request(&self) -> polarway_accounts::Result<bool> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        let mut released = self.released.subscribe();
        loop {
            let open = *released.borrow_and_update();
            if open || released.changed().await.is_err() {
                break;
            }
        }
        self.logout_completed.fetch_add(1, Ordering::SeqCst);

        let response = *self.response.lock();
        match response {
            LogoutResponse::Acknowledged(ack) => Ok(ack),
            LogoutResponse::TransportFailure => {
                Err(AccountsError::Transport("connection reset".into()))
            }
        }
    }
}

// ─── Resolver ───

/// Resolves ids to registered sessions, classifying by current persisted state.
///
/// Unknown ids resolve to a fresh unauthorized session.
#[derive(Default)]
pub struct MockResolver {
    sessions: Mutex<HashMap<AccountRecordId, Arc<MockSession>>>,
    resolutions: Mutex<Vec<(AccountRecordId, ResolveOptions)>>,
}

impl MockResolver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register(&self, session: Arc<MockSession>) -> Arc<MockSession> {
        self.sessions.lock().insert(session.id, Arc::clone(&session));
        session
    }

    pub fn resolutions(&self) -> Vec<(AccountRecordId, ResolveOptions)> {
        self.resolutions.lock().clone()
    }

    pub fn resolution_count(&self, id: AccountRecordId) -> usize {
        self.resolutions.lock().iter().filter(|(r, _)| *r == id).count()
    }
}

#[async_trait]
impl AccountResolver for MockResolver {
    async fn resolve(&self, id: AccountRecordId, options: &ResolveOptions) -> ResolvedAccount {
        self.resolutions.lock().push((id, options.clone()));
        let session = Arc::clone(
            self.sessions
                .lock()
                .entry(id)
                .or_insert_with(|| MockSession::unauthorized(id)),
        );

        let authorized = matches!(
            *session.state.borrow(),
            PersistedAccountState::Authorized { .. }
        );
        if authorized {
            ResolvedAccount::Authorized(session)
        } else {
            ResolvedAccount::Unauthorized(session)
        }
    }
}

// ─── Store ───

/// Memory store whose writes can be held at a gate or rejected outright
pub struct GatedStore {
    inner: RecordStoreHandle,
    open: watch::Sender<bool>,
    reject: AtomicBool,
    pending: AtomicUsize,
}

impl GatedStore {
    /// Wraps `inner` with the gate closed
    pub fn new(inner: RecordStoreHandle) -> Self {
        Self {
            inner,
            open: watch::channel(false).0,
            reject: AtomicBool::new(false),
            pending: AtomicUsize::new(0),
        }
    }

    pub fn open(&self) {
        self.open.send_replace(true);
    }

    /// Fail every write with `StoreUnavailable` once it passes the gate
    pub fn reject_writes(&self) {
        self.reject.store(true, Ordering::SeqCst);
    }

    /// Writes currently waiting at the gate
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &RecordStoreHandle {
        &self.inner
    }
}

#[async_trait]
impl RecordStore for GatedStore {
    fn current_account_id(&self) -> watch::Receiver<Option<AccountRecordId>> {
        self.inner.current_account_id()
    }

    fn records_view(&self) -> watch::Receiver<AccountRecordsView> {
        self.inner.records_view()
    }

    async fn modify<T, F>(&self, transaction: F) -> polarway_accounts::Result<T>
    where
        F: for<'t> FnOnce(&mut RecordTransaction<'t>) -> T + Send + 'static,
        T: Send + 'static,
    {
        self.pending.fetch_add(1, Ordering::SeqCst);
        let mut open = self.open.subscribe();
        loop {
            let passed = *open.borrow_and_update();
            if passed || open.changed().await.is_err() {
                break;
            }
        }
        self.pending.fetch_sub(1, Ordering::SeqCst);

        if self.reject.load(Ordering::SeqCst) {
            return Err(AccountsError::StoreUnavailable("GatedStore".into()));
        }
        self.inner.modify(transaction).await
    }
}
