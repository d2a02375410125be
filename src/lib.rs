pub mod app;
pub mod config;
pub mod error;
pub mod indexer;
pub mod llm;
pub mod logging;
pub mod models;
pub mod prompt;
pub mod rag;
pub mod server;
