//! SQLite backend for the Strata knowledge store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread. Each store operation is a single closure on that thread, and
//! every multi-step write runs inside one explicit transaction.

mod encode;
mod orient;
mod promote;
mod recall;
mod store;
mod sync_state;
mod tx;
mod verify;

pub mod error;
pub mod schema;

pub use error::{Error, Result};
pub use schema::{Migration, Migrator};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
