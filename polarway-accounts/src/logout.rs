//! Logout marking — flag the current record and install a fresh current account

use tracing::info;

use crate::error::Result;
use crate::store::RecordStore;
use crate::types::AccountRecordId;

/// Mark the current account as logged out and switch to a new empty record.
///
/// Runs as one store transaction: the current record gains the logged-out
/// marker (once), a new record without attributes is created, and it becomes
/// current. Returns the new current id, or `None` when there was no current
/// account and nothing changed.
pub async fn logout<S: RecordStore>(store: &S) -> Result<Option<AccountRecordId>> {
    let outcome = store
        .modify(|txn| {
            let previous = txn.current_id()?;
            txn.update_record(previous, |current| current.map(|r| r.marked_logged_out()));
            let next = txn.create_record(Vec::new());
            txn.set_current_id(Some(next));
            Some((previous, next))
        })
        .await?;

    match outcome {
        Some((previous, next)) => {
            info!(previous = %previous, current = %next, "Account marked as logged out");
            Ok(Some(next))
        }
        None => Ok(None),
    }
}
