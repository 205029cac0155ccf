//! History store for tably
//!
//! A narrow SQLite-backed adapter: load the recent finalized splits, save a
//! new one with a FIFO cap. No indexing or querying beyond that.

pub mod repo;
pub mod schema;

pub use repo::{Database, DEFAULT_HISTORY_CAP};
