//! Core types and trait definitions for the Strata knowledge store.
//!
//! This crate is deliberately free of database and process dependencies.
//! Everything that touches the live repository goes through [`RepoProbe`];
//! everything that touches persisted state goes through a
//! [`store::KnowledgeStore`] backend.

pub mod check;
pub mod claim;
pub mod edge;
pub mod error;
pub mod freshness;
pub mod link;
pub mod orient;
pub mod probe;
pub mod recall;
pub mod store;
pub mod sync;

pub use error::{Error, Result};
pub use probe::RepoProbe;
