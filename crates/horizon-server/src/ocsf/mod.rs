//! OCSF normalization engine
//!
//! Pure transformation from a raw JSON log plus a mapping body into a
//! canonical OCSF event. Nothing in this module performs I/O.

pub mod models;
pub mod normalizer;
pub mod path;
pub mod severity;

pub use models::CanonicalEvent;
pub use normalizer::{normalize, KnownTarget, MappingBody, NormalizeError};
pub use path::extract;
pub use severity::severity_id;
