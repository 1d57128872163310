//! Relational store access.
//!
//! PostgreSQL is the system of record. Services talk to it through the
//! transaction-scoped traits below so tests can substitute in-memory stores.
//! A transaction that is dropped without `commit` rolls back.

pub mod pool;
pub mod post_repo;
pub mod user_repo;

pub use pool::{create_pool, migrate, DbConfig};
pub use post_repo::PgPostStore;
pub use user_repo::PgUserStore;

use crate::models::{NewPost, NewUserRecord, Post, PostId, User, UserId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Constraint violation: {0}")]
    Conflict(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store operation timed out")]
    Timeout,
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Map unique violations to `Conflict`, pass everything else through
pub(crate) fn map_db_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") {
            return StoreError::Conflict(db_err.message().to_string());
        }
    }
    StoreError::Database(err)
}

/// Opens post transactions
#[async_trait::async_trait]
pub trait PostStore: Send + Sync {
    async fn begin(&self) -> StoreResult<Box<dyn PostTransaction>>;

    /// Connectivity probe for readiness checks
    async fn ping(&self) -> StoreResult<()>;
}

/// Post operations scoped to one open transaction
#[async_trait::async_trait]
pub trait PostTransaction: Send {
    /// Insert a post; the store assigns the id
    async fn create_post(&mut self, post: &NewPost) -> StoreResult<Post>;

    /// Overwrite title, short description and content of an existing post
    async fn update_post(&mut self, post: &Post) -> StoreResult<Post>;

    /// Remove a post. Returns false when no row matched.
    async fn delete_post(&mut self, id: PostId) -> StoreResult<bool>;

    async fn find_post_by_id(&mut self, id: PostId) -> StoreResult<Option<Post>>;

    /// Full-text search ordered by relevance, then recency
    async fn find_posts_by_text(
        &mut self,
        query: &str,
        from: i64,
        size: i64,
    ) -> StoreResult<Vec<Post>>;

    /// Newest first
    async fn find_recent_posts(&mut self, from: i64, size: i64) -> StoreResult<Vec<Post>>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}

/// Opens user transactions
#[async_trait::async_trait]
pub trait UserStore: Send + Sync {
    async fn begin(&self) -> StoreResult<Box<dyn UserTransaction>>;
}

/// User operations scoped to one open transaction.
/// Email and username lookups are case-insensitive.
#[async_trait::async_trait]
pub trait UserTransaction: Send {
    async fn create_user(&mut self, user: &NewUserRecord) -> StoreResult<User>;

    /// Overwrite email, username and name
    async fn update_user(&mut self, user: &User) -> StoreResult<User>;

    async fn update_password(&mut self, id: UserId, password_hash: &str) -> StoreResult<User>;

    async fn delete_user(&mut self, id: UserId) -> StoreResult<bool>;

    async fn find_user_by_id(&mut self, id: UserId) -> StoreResult<Option<User>>;

    async fn find_user_by_email(&mut self, email: &str) -> StoreResult<Option<User>>;

    async fn find_user_by_username(&mut self, username: &str) -> StoreResult<Option<User>>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}
