//! SQLite backend for the order ledger.
//!
//! Schema migrations live in `migrations/` and are embedded into the binary. Call [`SqliteDatabase::migrate`] once
//! at start-up.
mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteDatabase;
