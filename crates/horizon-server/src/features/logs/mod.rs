pub mod commands;
pub mod routes;

pub use commands::{IngestLogsCommand, IngestLogsResponse};
pub use routes::logs_routes;
