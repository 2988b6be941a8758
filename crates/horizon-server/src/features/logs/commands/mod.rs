pub mod ingest;

pub use ingest::{IngestLogsCommand, IngestLogsResponse};
