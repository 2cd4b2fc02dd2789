//! Session handles and the resolver that produces them
//!
//! A record id resolves to either an unauthorized or an authorized session.
//! The variant reflects the persisted state sampled at resolution time;
//! reclassification needs a fresh resolution.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::config::ResolveOptions;
use crate::error::Result;
use crate::types::{AccountKind, AccountRecordId, BackgroundTaskMode, PersistedAccountState};

/// Capabilities shared by every resolved session
pub trait AccountSession: Send + Sync + 'static {
    fn id(&self) -> AccountRecordId;

    /// Live view of the session's persisted state
    fn persisted_state(&self) -> watch::Receiver<PersistedAccountState>;
}

/// Session backed by an authorization
#[async_trait]
pub trait AuthorizedSession: AccountSession {
    fn set_background_task_mode(&self, mode: BackgroundTaskMode);

    /// Ask the server to terminate the authorization.
    ///
    /// `Ok(acknowledged)` carries the server's answer; `Err` is a transport failure.
    async fn send_logout_request(&self) -> Result<bool>;
}

/// Either side of a resolution
#[derive(Clone)]
pub enum ResolvedAccount {
    Unauthorized(Arc<dyn AccountSession>),
    Authorized(Arc<dyn AuthorizedSession>),
}

impl ResolvedAccount {
    pub fn id(&self) -> AccountRecordId {
        match self {
            Self::Unauthorized(session) => session.id(),
            Self::Authorized(session) => session.id(),
        }
    }

    /// Classification sampled when this handle was resolved
    pub fn kind(&self) -> AccountKind {
        match self {
            Self::Unauthorized(_) => AccountKind::Unauthorized,
            Self::Authorized(_) => AccountKind::Authorized,
        }
    }

    pub fn persisted_state(&self) -> watch::Receiver<PersistedAccountState> {
        match self {
            Self::Unauthorized(session) => session.persisted_state(),
            Self::Authorized(session) => session.persisted_state(),
        }
    }
}

impl std::fmt::Debug for ResolvedAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedAccount")
            .field("id", &self.id())
            .field("kind", &self.kind())
            .finish()
    }
}

/// Turns a record id into a live session
#[async_trait]
pub trait AccountResolver: Send + Sync + 'static {
    /// Always eventually yields a handle; failures belong to the implementation.
    async fn resolve(&self, id: AccountRecordId, options: &ResolveOptions) -> ResolvedAccount;
}
