pub mod config;
pub mod error;
pub mod generator;
pub mod guard;
pub mod llm;
pub mod log_store;
pub mod retrieval;
pub mod schema;
