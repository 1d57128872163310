/// Blog Service Library
///
/// Posts and user accounts for the blog platform. PostgreSQL is the system of
/// record; Redis caches single posts and search pages; Elasticsearch serves
/// full-text search. The post service keeps the three in step.
///
/// # Modules
///
/// - `handlers`: HTTP request handlers and the bearer-token extractor
/// - `models`: Data structures for posts and users
/// - `services`: Business logic (post orchestration, user accounts)
/// - `db`: Relational store traits and PostgreSQL implementations
/// - `search`: Search index trait and Elasticsearch implementation
/// - `security`: Password hashing and JWT handling
/// - `validators`: Input validation helpers
/// - `error`: HTTP error mapping
/// - `config`: Configuration management
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod search;
pub mod security;
pub mod services;
pub mod validators;

pub use config::Config;
pub use error::{AppError, Result};
