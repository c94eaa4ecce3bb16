//! # icfs Core
//!
//! Credit ledger and access-control engine for a file-sharing platform where
//! uploading earns credit and downloading spends it.
//!
//! ## Overview
//!
//! - **Ledger**: [`ledger::LedgerService`] registers content, grants access,
//!   deletes and updates content, and records reviews. Every mutating
//!   operation runs inside exactly one unit of work and either commits as a
//!   whole or leaves no trace.
//! - **Authentication**: [`auth::AuthService`] registers accounts, issues
//!   opaque session tokens backed by a [`ports::SessionStore`], validates and
//!   revokes them.
//! - **Ports**: [`ports`] defines the store capabilities the services depend
//!   on, so backends remain swappable.
//! - **Backends**: [`infrastructure::memory`] is always available;
//!   `infrastructure::postgres` and `infrastructure::redis` come with the
//!   `database` feature.
//!
//! ## Feature Flags
//!
//! - `database` (default): PostgreSQL/Redis adapters, embedded migrations and
//!   [`runtime`] wiring.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)]

/// Session-based authentication
pub mod auth;

/// Error taxonomy shared by every operation
pub mod error;

/// Store implementations
pub mod infrastructure;

/// Credit ledger operations
pub mod ledger;

/// Store capability traits and the unit-of-work contract
pub mod ports;

/// Service wiring from a loaded configuration
#[cfg(feature = "database")]
#[cfg_attr(docsrs, doc(cfg(feature = "database")))]
pub mod runtime;

#[cfg(feature = "database")]
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

pub use error::{LedgerError, Result, StatusClass};

pub use icfs_model as model;
