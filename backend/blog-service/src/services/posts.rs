/// Post service - keeps PostgreSQL, the search index and the cache in step
///
/// Writes commit to PostgreSQL first. Search and cache updates run after the
/// commit and never undo it: when one of them fails the caller gets an
/// `IndexSync` or `CacheSync` error that still carries the committed post.
/// Reads go cache, then search index, then PostgreSQL.
use super::retry::{with_retry, RetryConfig};
use crate::db::{PostStore, PostTransaction, StoreError};
use crate::models::{Post, PostId, PostInput};
use crate::search::{PostDocument, SearchError, SearchIndex};
use crate::validators::validate_pagination;
use blog_cache::{ttl, CacheError, CacheKey, CacheStore, CacheStoreExt};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use validator::Validate;

/// Source of creation timestamps
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, Error)]
pub enum PostError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Transaction error: {0}")]
    Transaction(#[source] StoreError),

    #[error("Persistence error: {0}")]
    Persistence(#[source] StoreError),

    #[error("Post {0} not found")]
    NotFound(PostId),

    /// The write committed but the search index was not updated
    #[error("Post {id} saved but search index sync failed: {source}")]
    IndexSync {
        id: PostId,
        post: Option<Box<Post>>,
        #[source]
        source: SearchError,
    },

    /// The write committed and was indexed but the cache was not updated
    #[error("Post {id} saved but cache sync failed: {source}")]
    CacheSync {
        id: PostId,
        post: Option<Box<Post>>,
        #[source]
        source: CacheError,
    },
}

impl PostError {
    /// True when the relational write committed and only propagation failed
    pub fn is_partial_success(&self) -> bool {
        matches!(self, PostError::IndexSync { .. } | PostError::CacheSync { .. })
    }

    /// The committed record attached to a partial-success error
    pub fn committed_post(&self) -> Option<&Post> {
        match self {
            PostError::IndexSync { post, .. } | PostError::CacheSync { post, .. } => {
                post.as_deref()
            }
            _ => None,
        }
    }

    /// Take the committed record out of a partial-success error
    pub fn into_committed_post(self) -> Option<Post> {
        match self {
            PostError::IndexSync { post, .. } | PostError::CacheSync { post, .. } => {
                post.map(|p| *p)
            }
            _ => None,
        }
    }
}

impl From<validator::ValidationErrors> for PostError {
    fn from(err: validator::ValidationErrors) -> Self {
        PostError::Validation(err.to_string())
    }
}

/// Errors that have a timeout variant
trait TimedOut {
    fn timed_out() -> Self;
}

impl TimedOut for StoreError {
    fn timed_out() -> Self {
        StoreError::Timeout
    }
}

impl TimedOut for SearchError {
    fn timed_out() -> Self {
        SearchError::Timeout
    }
}

impl TimedOut for CacheError {
    fn timed_out() -> Self {
        CacheError::Timeout
    }
}

async fn within<T, E, F>(limit: Duration, fut: F) -> Result<T, E>
where
    E: TimedOut,
    F: Future<Output = Result<T, E>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .unwrap_or_else(|_| Err(E::timed_out()))
}

/// Store failures inside an open transaction. A timeout means the
/// transaction itself is in doubt.
fn stage_error(err: StoreError) -> PostError {
    match err {
        StoreError::Timeout => PostError::Transaction(err),
        other => PostError::Persistence(other),
    }
}

#[derive(Debug, Clone)]
pub struct PostServiceConfig {
    /// TTL for `post{id}` entries
    pub post_ttl: Duration,
    /// TTL for cached search pages
    pub search_ttl: Duration,
    /// Bound on each relational call, including begin and commit
    pub store_timeout: Duration,
    /// Bound on each cache or search call
    pub sync_timeout: Duration,
    /// Retries for post-commit propagation
    pub sync_retry: RetryConfig,
}

impl Default for PostServiceConfig {
    fn default() -> Self {
        Self {
            post_ttl: Duration::from_secs(ttl::POST),
            search_ttl: Duration::from_secs(ttl::SEARCH),
            store_timeout: Duration::from_secs(5),
            sync_timeout: Duration::from_secs(2),
            sync_retry: RetryConfig::disabled(),
        }
    }
}

pub struct PostService {
    store: Arc<dyn PostStore>,
    cache: Arc<dyn CacheStore>,
    search: Arc<dyn SearchIndex>,
    config: PostServiceConfig,
    clock: Clock,
}

impl PostService {
    pub fn new(
        store: Arc<dyn PostStore>,
        cache: Arc<dyn CacheStore>,
        search: Arc<dyn SearchIndex>,
        config: PostServiceConfig,
    ) -> Self {
        Self {
            store,
            cache,
            search,
            config,
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Create a post
    pub async fn create(&self, input: PostInput) -> Result<Post, PostError> {
        input.validate()?;
        let new_post = input.into_new_post((self.clock)());

        let mut tx = self.begin().await?;
        let created = self.stage(tx.create_post(&new_post)).await;
        let post = match created {
            Ok(post) => post,
            Err(e) => return Err(self.abort(tx, stage_error(e)).await),
        };
        self.commit(tx).await?;

        info!(post_id = post.id, "Post created");

        let doc = PostDocument::from(&post);
        let indexed = self.propagate(|| self.search.index(&doc)).await;
        let cached = self.refresh_cache(&post).await;

        settle(post.id, Some(&post), indexed, cached).map(|()| post)
    }

    /// Replace title, short description and content of an existing post.
    /// The id and creation time are kept.
    pub async fn update(&self, id: PostId, input: PostInput) -> Result<Post, PostError> {
        input.validate()?;

        let mut tx = self.begin().await?;
        let found = self.stage(tx.find_post_by_id(id)).await;
        let existing = match found {
            Ok(Some(post)) => post,
            Ok(None) => return Err(self.abort(tx, PostError::NotFound(id)).await),
            Err(e) => return Err(self.abort(tx, stage_error(e)).await),
        };

        let replacement = input.apply_to(&existing);
        let written = self.stage(tx.update_post(&replacement)).await;
        let post = match written {
            Ok(post) => post,
            Err(e) => return Err(self.abort(tx, stage_error(e)).await),
        };
        self.commit(tx).await?;

        info!(post_id = post.id, "Post updated");

        let doc = PostDocument::from(&post);
        let indexed = self.propagate(|| self.search.update(&doc)).await;
        let cached = self.refresh_cache(&post).await;

        settle(post.id, Some(&post), indexed, cached).map(|()| post)
    }

    /// Delete a post from every tier
    pub async fn delete(&self, id: PostId) -> Result<(), PostError> {
        let mut tx = self.begin().await?;
        let found = self.stage(tx.find_post_by_id(id)).await;
        match found {
            Ok(Some(_)) => {}
            Ok(None) => return Err(self.abort(tx, PostError::NotFound(id)).await),
            Err(e) => return Err(self.abort(tx, stage_error(e)).await),
        }

        let deleted = self.stage(tx.delete_post(id)).await;
        match deleted {
            Ok(true) => {}
            Ok(false) => return Err(self.abort(tx, PostError::NotFound(id)).await),
            Err(e) => return Err(self.abort(tx, stage_error(e)).await),
        }
        self.commit(tx).await?;

        info!(post_id = id, "Post deleted");

        let indexed = self.propagate(|| self.search.delete(id)).await;
        let cached = self.evict(id).await;

        settle(id, None, indexed, cached)
    }

    /// Tiered lookup: cache, then search index, then PostgreSQL.
    /// Lower tiers do not repopulate higher ones.
    pub async fn find_by_id(&self, id: PostId) -> Result<Post, PostError> {
        let key = CacheKey::post(id);
        match within(self.config.sync_timeout, self.cache.get_json::<Post>(&key)).await {
            Ok(Some(post)) => {
                debug!(post_id = id, "Post served from cache");
                return Ok(post);
            }
            Ok(None) => {}
            Err(e) => warn!(post_id = id, error = %e, "Cache read failed"),
        }

        match within(self.config.sync_timeout, self.search.get_by_id(id)).await {
            Ok(Some(doc)) => {
                debug!(post_id = id, "Post served from search index");
                return Ok(doc.into());
            }
            Ok(None) => {}
            Err(e) => warn!(post_id = id, error = %e, "Search index read failed"),
        }

        let mut tx = self.begin().await?;
        let found = self.stage(tx.find_post_by_id(id)).await;
        self.release(tx).await;

        match found {
            Ok(Some(post)) => Ok(post),
            Ok(None) => Err(PostError::NotFound(id)),
            Err(e) => Err(stage_error(e)),
        }
    }

    /// Full-text search. Pages are cached by query and pagination; when the
    /// search index is unavailable PostgreSQL full-text search answers.
    pub async fn find_by_title_content(
        &self,
        query: &str,
        from: i64,
        size: i64,
    ) -> Result<Vec<Post>, PostError> {
        validate_pagination(from, size).map_err(PostError::Validation)?;
        let query = query.trim();
        if query.is_empty() {
            return Err(PostError::Validation("query must not be blank".to_string()));
        }

        let key = CacheKey::search(query, from, size);
        match within(self.config.sync_timeout, self.cache.get_json::<Vec<Post>>(&key)).await {
            Ok(Some(posts)) => {
                debug!(query = %query, "Search page served from cache");
                return Ok(posts);
            }
            Ok(None) => {}
            Err(e) => warn!(query = %query, error = %e, "Cache read failed"),
        }

        match within(self.config.sync_timeout, self.search.search(query, from, size)).await {
            Ok(docs) => {
                let posts: Vec<Post> = docs.into_iter().map(Post::from).collect();
                let cached = within(
                    self.config.sync_timeout,
                    self.cache.set_json(&key, &posts, self.config.search_ttl),
                )
                .await;
                if let Err(e) = cached {
                    warn!(query = %query, error = %e, "Failed to cache search page");
                }
                Ok(posts)
            }
            Err(e) => {
                warn!(
                    query = %query,
                    error = %e,
                    "Search index unavailable, falling back to relational search"
                );
                let mut tx = self.begin().await?;
                let found = self.stage(tx.find_posts_by_text(query, from, size)).await;
                self.release(tx).await;
                found.map_err(stage_error)
            }
        }
    }

    /// Newest posts first
    pub async fn find_recent(&self, from: i64, size: i64) -> Result<Vec<Post>, PostError> {
        validate_pagination(from, size).map_err(PostError::Validation)?;

        let mut tx = self.begin().await?;
        let found = self.stage(tx.find_recent_posts(from, size)).await;
        self.release(tx).await;
        found.map_err(stage_error)
    }

    async fn begin(&self) -> Result<Box<dyn PostTransaction>, PostError> {
        within(self.config.store_timeout, self.store.begin())
            .await
            .map_err(PostError::Transaction)
    }

    async fn stage<T, F>(&self, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        within(self.config.store_timeout, fut).await
    }

    async fn commit(&self, tx: Box<dyn PostTransaction>) -> Result<(), PostError> {
        within(self.config.store_timeout, tx.commit())
            .await
            .map_err(PostError::Transaction)
    }

    /// Roll back and hand back the error that caused it
    async fn abort(&self, tx: Box<dyn PostTransaction>, cause: PostError) -> PostError {
        if let Err(e) = within(self.config.store_timeout, tx.rollback()).await {
            warn!(error = %e, "Transaction rollback failed");
        }
        cause
    }

    /// End a read-only transaction
    async fn release(&self, tx: Box<dyn PostTransaction>) {
        if let Err(e) = within(self.config.store_timeout, tx.rollback()).await {
            debug!(error = %e, "Read transaction release failed");
        }
    }

    /// One post-commit call, bounded and retried per config
    async fn propagate<T, E, F, Fut>(&self, mut op: F) -> Result<T, E>
    where
        E: TimedOut + std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let limit = self.config.sync_timeout;
        with_retry(&self.config.sync_retry, || within(limit, op())).await
    }

    /// Write the fresh record and drop cached search pages that may list
    /// stale data. Both steps run even if the first fails.
    async fn refresh_cache(&self, post: &Post) -> Result<(), CacheError> {
        let key = CacheKey::post(post.id);
        let payload = serde_json::to_string(post)?;
        let ttl = self.config.post_ttl;

        let written = self.propagate(|| self.cache.set(&key, &payload, ttl)).await;
        let invalidated = self.invalidate_search_pages().await;
        written.and(invalidated)
    }

    async fn evict(&self, id: PostId) -> Result<(), CacheError> {
        let key = CacheKey::post(id);
        let removed = self.propagate(|| self.cache.del(&key)).await;
        let invalidated = self.invalidate_search_pages().await;
        removed.and(invalidated)
    }

    async fn invalidate_search_pages(&self) -> Result<(), CacheError> {
        let pattern = CacheKey::search_pattern();
        let removed = self
            .propagate(|| self.cache.del_matching(&pattern))
            .await?;
        if removed > 0 {
            debug!(removed, "Invalidated cached search pages");
        }
        Ok(())
    }
}

/// Fold the two propagation results into the caller-facing outcome.
/// An index failure wins over a cache failure; the cache failure is logged.
fn settle(
    id: PostId,
    post: Option<&Post>,
    indexed: Result<(), SearchError>,
    cached: Result<(), CacheError>,
) -> Result<(), PostError> {
    match (indexed, cached) {
        (Ok(()), Ok(())) => Ok(()),
        (Err(source), cached) => {
            if let Err(cache_err) = cached {
                warn!(post_id = id, error = %cache_err, "Cache sync failed");
            }
            error!(post_id = id, error = %source, "Search index sync failed after commit");
            Err(PostError::IndexSync {
                id,
                post: post.cloned().map(Box::new),
                source,
            })
        }
        (Ok(()), Err(source)) => {
            warn!(post_id = id, error = %source, "Cache sync failed after commit");
            Err(PostError::CacheSync {
                id,
                post: post.cloned().map(Box::new),
                source,
            })
        }
    }
}
