//! Scoped transactions with explicit commit and rollback.

use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::warn;

use crate::{Result, error::StepContext as _};

/// Run `body` inside an immediate transaction.
///
/// The transaction is committed only after `body` returns `Ok`; on any error
/// it is rolled back explicitly before the error is returned.
pub(crate) fn in_transaction<T>(
  conn: &mut Connection,
  commit_step: &'static str,
  body: impl FnOnce(&Transaction<'_>) -> Result<T>,
) -> Result<T> {
  let tx = conn
    .transaction_with_behavior(TransactionBehavior::Immediate)
    .step("begin transaction")?;

  match body(&tx) {
    Ok(value) => {
      tx.commit().step(commit_step)?;
      Ok(value)
    }
    Err(err) => {
      if let Err(rollback) = tx.rollback() {
        warn!(error = %rollback, "rollback failed");
      }
      Err(err)
    }
  }
}
