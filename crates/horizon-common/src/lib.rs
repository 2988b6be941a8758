//! Horizon Common Library
//!
//! Shared building blocks for the Horizon workspace members:
//!
//! - **Error Handling**: the common error type and result alias
//! - **Checksums**: content digests recorded alongside staged payloads
//! - **Logging**: tracing subscriber setup driven by [`logging::LogConfig`]
//!
//! # Example
//!
//! ```no_run
//! use horizon_common::checksum::sha256_hex;
//! use horizon_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> horizon_common::Result<()> {
//!     let _guard = init_logging(&LogConfig::from_env()?)?;
//!     tracing::info!(digest = %sha256_hex(b"{}"), "ready");
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod checksum;
pub mod error;
pub mod logging;

pub use error::{HorizonError, Result};
