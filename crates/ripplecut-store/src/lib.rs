//! RippleCut store - thin gateway over the relational engine
//!
//! The core treats the persistent store as a pluggable collaborator: this
//! crate provides prepared statements, typed row access, and transactions
//! with single-level nesting tolerance over SQLite.

pub mod gateway;
pub mod schema;

pub use gateway::{SqlExt, Store, TxnHandle};
pub use schema::SCHEMA_VERSION;
