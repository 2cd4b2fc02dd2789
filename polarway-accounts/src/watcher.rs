//! AuthStateWatcher — detects when a session's classification drifts
//!
//! Produces a deduplicated boolean stream: `true` while the persisted state's
//! classification differs from the baseline sampled at resolution, `false`
//! while it matches. Consecutive identical values are collapsed.

use futures::future;
use futures::stream::{BoxStream, StreamExt};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::types::{AccountKind, PersistedAccountState};

/// Watches one session's persisted state against a baseline classification
pub struct AuthStateWatcher {
    states: watch::Receiver<PersistedAccountState>,
    baseline: AccountKind,
}

impl AuthStateWatcher {
    pub fn new(states: watch::Receiver<PersistedAccountState>, baseline: AccountKind) -> Self {
        Self { states, baseline }
    }

    pub fn baseline(&self) -> AccountKind {
        self.baseline
    }

    /// Live divergence stream; the first item reflects the state at subscription.
    ///
    /// Ends when the session drops its state sender.
    pub fn divergence(self) -> BoxStream<'static, bool> {
        let baseline = self.baseline;
        WatchStream::new(self.states)
            .map(move |state| state.kind() != baseline)
            .scan(None, |last: &mut Option<bool>, diverged| {
                let fresh = last.replace(diverged) != Some(diverged);
                future::ready(Some(fresh.then_some(diverged)))
            })
            .filter_map(future::ready)
            .boxed()
    }
}
