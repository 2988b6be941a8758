//! Horizon server library
//!
//! Consumes raw security and operational logs from a message bus, stages
//! every payload in object storage, and normalizes it into an OCSF event
//! using a per-source-type field mapping before writing it to PostgreSQL.
//!
//! # Architecture
//!
//! - **bus**: at-least-once subscription to the raw log subject
//! - **storage**: staging store for raw payloads (S3-compatible or in-memory)
//! - **db**: reference ledger, mapping catalog and normalized event store
//! - **ocsf**: the mapping-driven normalization engine
//! - **ingest**: the per-message pipeline, consumer loop and replay
//! - **features**: HTTP slices for publishing logs and managing mappings
//!
//! Every store sits behind a narrow async trait, so the pipeline runs the
//! same against PostgreSQL and S3 as against the in-memory implementations
//! used by the tests.

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod api;
pub mod bus;
pub mod config;
pub mod db;
pub mod error;
pub mod features;
pub mod ingest;
pub mod middleware;
pub mod models;
pub mod ocsf;
pub mod storage;

pub use error::{ApiResult, AppError};
