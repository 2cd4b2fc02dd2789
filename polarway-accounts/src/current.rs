//! CurrentAccountController — tracks the active account and reissues it on reclassification
//!
//! The controller follows the store's current-account id. For every distinct
//! id it resolves a session and emits it; `None` is emitted straight away when
//! there is no current account. After each emission it watches the session's
//! persisted state and, when the classification diverges from the one sampled
//! at resolution, resolves the same id again and emits the fresh handle.
//!
//! The resolve/watch chain for an id lives inside the controller task as a
//! single future. Switching ids drops that future before the next chain
//! starts, so at most one chain is alive per controller and nothing is
//! emitted for an id once it stops being current.
//!
//! Emissions go through a latest-value channel: a consumer that falls behind
//! sees the newest answer, and nothing queues up in between.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future;
use futures::stream::{BoxStream, Stream, StreamExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::{AccountsConfig, ResolveOptions};
use crate::session::{AccountResolver, ResolvedAccount};
use crate::store::RecordStore;
use crate::types::AccountRecordId;
use crate::watcher::AuthStateWatcher;

/// Outer `None` until the first answer is published
type Emitter = watch::Sender<Option<Option<ResolvedAccount>>>;

/// Background task that turns current-id changes into resolved sessions
pub struct CurrentAccountController<R> {
    resolver: Arc<R>,
    options: ResolveOptions,
    ids: watch::Receiver<Option<AccountRecordId>>,
    tx: Emitter,
    cancel: CancellationToken,
}

impl<R: AccountResolver> CurrentAccountController<R> {
    /// Spawn the controller and return the stream of current accounts
    pub fn spawn<S: RecordStore>(
        config: &AccountsConfig,
        store: &S,
        resolver: Arc<R>,
    ) -> CurrentAccountStream {
        let (tx, rx) = watch::channel(None);
        let cancel = CancellationToken::new();

        let controller = Self {
            resolver,
            options: config.resolve_options(),
            ids: store.current_account_id(),
            tx,
            cancel: cancel.clone(),
        };

        let handle = tokio::spawn(controller.run());
        CurrentAccountStream {
            inner: WatchStream::new(rx).filter_map(future::ready).boxed(),
            cancel,
            handle,
        }
    }

    /// Main event loop
    async fn run(mut self) {
        let mut current = *self.ids.borrow_and_update();

        'outer: loop {
            match current {
                None => {
                    debug!("No current account");
                    if self.tx.send(Some(None)).is_err() {
                        break;
                    }
                    loop {
                        tokio::select! {
                            _ = self.cancel.cancelled() => break 'outer,
                            _ = self.tx.closed() => break 'outer,
                            changed = self.ids.changed() => {
                                if changed.is_err() {
                                    // Store gone: the last answer stands until cancelled
                                    self.cancel.cancelled().await;
                                    break 'outer;
                                }
                                let next = *self.ids.borrow_and_update();
                                if next != current {
                                    current = next;
                                    continue 'outer;
                                }
                            }
                        }
                    }
                }
                Some(id) => {
                    info!(%id, "Tracking current account");
                    let chain = track(self.resolver.as_ref(), &self.options, id, &self.tx);
                    tokio::pin!(chain);

                    loop {
                        tokio::select! {
                            _ = self.cancel.cancelled() => break 'outer,
                            // Chain only returns once the consumer is gone
                            _ = &mut chain => break 'outer,
                            changed = self.ids.changed() => {
                                if changed.is_err() {
                                    tokio::select! {
                                        _ = self.cancel.cancelled() => {}
                                        _ = &mut chain => {}
                                    }
                                    break 'outer;
                                }
                                let next = *self.ids.borrow_and_update();
                                if next != current {
                                    debug!(previous = %id, next = ?next, "Current account switched");
                                    current = next;
                                    continue 'outer;
                                }
                            }
                        }
                    }
                }
            }
        }
        debug!("CurrentAccountController stopped");
    }
}

/// Resolve `id`, emit it, and re-resolve whenever its classification diverges.
///
/// Returns only when the output channel is closed.
async fn track<R: AccountResolver>(
    resolver: &R,
    options: &ResolveOptions,
    id: AccountRecordId,
    tx: &Emitter,
) {
    loop {
        let account = resolver.resolve(id, options).await;
        let baseline = account.kind();
        debug!(%id, kind = %baseline, "Account resolved");

        let mut divergence = AuthStateWatcher::new(account.persisted_state(), baseline).divergence();
        if tx.send(Some(Some(account))).is_err() {
            return;
        }

        loop {
            match divergence.next().await {
                Some(true) => break,
                Some(false) => continue,
                // Session dropped its state; keep the handle until the id changes
                None => {
                    tx.closed().await;
                    return;
                }
            }
        }
        info!(%id, "Account classification changed, reloading");
    }
}

/// Start tracking the store's current account
pub fn current_account_stream<S, R>(
    config: &AccountsConfig,
    store: &S,
    resolver: Arc<R>,
) -> CurrentAccountStream
where
    S: RecordStore,
    R: AccountResolver,
{
    CurrentAccountController::spawn(config, store, resolver)
}

/// Stream of current accounts: `None` when there is none, otherwise the
/// latest resolved session. Answers superseded before they are polled are
/// skipped. Dropping it stops the controller.
pub struct CurrentAccountStream {
    inner: BoxStream<'static, Option<ResolvedAccount>>,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl CurrentAccountStream {
    /// Stop the controller; no further items are produced after this returns
    pub fn cancel(&mut self) {
        self.cancel.cancel();
        self.handle.abort();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Stream for CurrentAccountStream {
    type Item = Option<ResolvedAccount>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.cancel.is_cancelled() {
            return Poll::Ready(None);
        }
        self.inner.poll_next_unpin(cx)
    }
}

impl Drop for CurrentAccountStream {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.handle.abort();
    }
}
