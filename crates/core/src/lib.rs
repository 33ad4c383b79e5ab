//! Core types and shared functionality for crawlable.
//!
//! This crate provides:
//! - Escaped-fragment URL rewriting and cache key derivation
//! - Cache store abstraction with SQLite and in-memory backends
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod fragment;

pub use cache::{CacheStore, MemoryStore, SqliteStore};
pub use config::AppConfig;
pub use error::Error;
pub use fragment::RenderRequest;
