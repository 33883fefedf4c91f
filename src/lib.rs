pub mod config;
pub mod error;
pub mod ingest;
pub mod loader;
pub mod normalize;
pub mod raw;
pub mod resolve;
pub mod store;
pub mod summary;
