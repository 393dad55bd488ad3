//! SQLite storage layer for Memento Mirror.
//!
//! This module provides the persistence layer using SQLite with:
//! - WAL mode for concurrent reads
//! - One IMMEDIATE transaction per batch commit
//! - Per-collection destination tables created on demand
//!
//! # Submodules
//!
//! - [`schema`] - Database schema definitions
//! - [`sqlite`] - Main SQLite storage implementation

pub mod schema;
pub mod sqlite;

pub use sqlite::{MirroredRow, SqliteStorage};
