pub mod get;
pub mod list;

pub use get::{GetMappingError, GetMappingQuery};
pub use list::{ListMappingsError, ListMappingsQuery};
