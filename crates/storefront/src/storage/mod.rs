pub mod catalog_store;
pub mod schema;
pub mod types;

pub use catalog_store::*;
pub use types::*;
