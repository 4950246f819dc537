//! SQLite-backed response store for offline-first serving.
//!
//! This module provides a persistent, versioned store of captured
//! request/response pairs using SQLite with async access via tokio-rusqlite.
//! It supports:
//!
//! - Named, version-tagged stores with whole-store purge on version change
//! - Entry keys derived from SHA-256 over request identity (method + URL)
//! - Automatic schema migrations
//! - WAL mode for concurrent access

pub mod connection;
pub mod entries;
pub mod key;
pub mod migrations;

pub use crate::Error;

pub use connection::StoreDb;
pub use entries::Entry;
