//! Roster sync server
//!
//! Keeps a member store in step with uploaded rosters and the people on them.
//!
//! # Stages
//!
//! - **Ingest**: an uploaded CSV roster is parsed, every member is upserted
//!   and one notification task is queued per stored member.
//! - **Notifier**: each queued task issues a short-lived signed link, emails
//!   it to the member and marks the member notified.
//! - **Updater**: `POST /members` writes weight and height for an existing
//!   member.
//! - **Exporter**: on a fixed interval the whole store is written out as a
//!   timestamped CSV snapshot.
//!
//! # Backends
//!
//! Stages talk to the outside world only through the capability traits
//! [`storage::ObjectStore`], [`db::MemberStore`], [`queue::NotificationQueue`]
//! and [`mail::Mailer`]. The binary wires them to S3, PostgreSQL and a mail
//! HTTP API; tests substitute in-memory fakes.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod mail;
pub mod middleware;
pub mod pipeline;
pub mod queue;
pub mod scheduler;
pub mod storage;
pub mod worker;

pub use config::Config;
pub use error::{ErrorKind, SyncError, SyncResult};
