//! ReelVC core library.
//!
//! This crate provides the foundational components of the media
//! version-control engine: configuration, database persistence, canonical
//! JSON hashing, the project/branch/commit repository engine, the commit
//! graph assembler with contributor scoring, merge- and fork-request state
//! machines, and the workspace boundary lock enforcer.

pub mod cache;
pub mod canonical;
pub mod config;
pub mod db;
pub mod engine;
pub mod errors;
pub mod graph;
pub mod models;
pub mod review;
pub mod workspace;

// Re-exports for convenience.
pub use cache::{GraphCache, MemoryCache, NullCache};
pub use config::AppConfig;
pub use db::Database;
pub use engine::RepoEngine;
pub use errors::CoreError;
pub use graph::ProjectGraph;
