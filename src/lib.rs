//! koreader-hardcover: mirror KOReader reading progress into Hardcover.
//!
//! KOReader keeps per-book reading statistics in `statistics.sqlite3`. This
//! crate imports them into a local store, lets each book be mapped to a
//! Hardcover book (and optionally an edition), and reconciles progress with
//! Hardcover's GraphQL API using as few writes as possible.
//!
//! # Features
//!
//! - Import of KOReader books and reading sessions
//! - Drift-tolerant comparison that skips redundant writes
//! - Creation of missing shelf entries and read records without duplicates
//! - Per-book outcome reporting; one failing book never stops a batch

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Configuration and CLI.
pub mod config;
/// Local database and KOReader import.
pub mod db;
/// Error types.
pub mod error;
/// Hardcover GraphQL client.
pub mod hardcover;
/// Progress reconciliation.
pub mod sync;

#[cfg(test)]
mod tests;

pub use config::{Cli, Command, Config};
pub use db::Database;
pub use error::{AppError, Result};
pub use hardcover::{HardcoverClient, RemoteApi, RemoteError};
pub use sync::{SyncEngine, SyncService};
