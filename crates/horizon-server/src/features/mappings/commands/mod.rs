pub mod create;

pub use create::{CreateMappingCommand, CreateMappingError};
