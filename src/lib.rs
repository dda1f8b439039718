//! Video Chat Server Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod analysis;
pub mod background_jobs;
pub mod chat;
pub mod config;
pub mod llm;
pub mod media;
pub mod search;
pub mod server;
pub mod sqlite_persistence;
pub mod video_store;

// Re-export commonly used types for convenience
pub use server::{make_app, run_server, RequestsLoggingLevel, ServerConfig, ServerState};
pub use video_store::{SqliteVideoStore, VideoStore};
