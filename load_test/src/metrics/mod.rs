pub mod collector;
pub mod reporter;
pub mod summary;
pub mod types;
