//! Memento Mirror - incremental local mirror of a remote library API
//!
//! This crate provides the core functionality for the `mm` CLI tool.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface using clap
//! - [`remote`] - Request descriptors, the `Transport` seam and the HTTP client
//! - [`pagination`] - Continuation detection across pagination schemes
//! - [`fetch`] - Exhaustive page fetching with retry and a page ceiling
//! - [`sync`] - Sync controller, watermarks, probe and status
//! - [`storage`] - SQLite database layer
//! - [`config`] - Configuration management
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod pagination;
pub mod remote;
pub mod storage;
pub mod sync;
pub mod validate;

pub use error::{Error, Result};
