//! Mapping management: the documents that drive normalization per source type

pub mod commands;
pub mod queries;
pub mod routes;

pub use commands::{CreateMappingCommand, CreateMappingError};
pub use queries::{GetMappingError, GetMappingQuery, ListMappingsError, ListMappingsQuery};
pub use routes::mappings_routes;
