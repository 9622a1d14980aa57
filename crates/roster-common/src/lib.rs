//! Roster Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, the tabular codec, logging and error handling for the roster
//! synchronization workspace.
//!
//! # Overview
//!
//! - **Types**: the [`Member`](types::Member) record and the payloads that move it
//!   between pipeline stages
//! - **Tabular**: CSV parsing for uploaded rosters and CSV serialization for
//!   exported snapshots, sharing one set of column identifiers
//! - **Logging**: `tracing` subscriber setup shared by every binary
//! - **Error Handling**: [`RosterError`] and the [`Result`] alias
//!
//! # Example
//!
//! ```no_run
//! use roster_common::tabular;
//!
//! fn roundtrip(upload: &[u8]) -> roster_common::Result<Vec<u8>> {
//!     let members = tabular::parse_members(upload)?;
//!     tabular::write_members(&members)
//! }
//! ```

pub mod error;
pub mod logging;
pub mod tabular;
pub mod types;

// Re-export commonly used types
pub use error::{Result, RosterError};
pub use types::{MetricUpdate, Member, NotificationTask};
