//! In-memory stand-ins for PostgreSQL, Redis and Elasticsearch
//!
//! Each double can be switched into a failing mode so tests can drive the
//! post service through partial-failure paths without real infrastructure.
#![allow(dead_code)]

use async_trait::async_trait;
use blog_cache::{CacheError, CacheResult, CacheStore};
use blog_service::db::{
    PostStore, PostTransaction, StoreError, StoreResult, UserStore, UserTransaction,
};
use blog_service::models::{NewPost, NewUserRecord, Post, PostId, PostInput, User, UserId};
use blog_service::search::{PostDocument, SearchError, SearchIndex};
use blog_service::services::{Clock, PostService, PostServiceConfig};
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn matches_text(haystacks: [&str; 3], query: &str) -> bool {
    let needle = query.to_lowercase();
    haystacks
        .iter()
        .any(|field| field.to_lowercase().contains(&needle))
}

fn page<T>(items: Vec<T>, from: i64, size: i64) -> Vec<T> {
    items
        .into_iter()
        .skip(from.max(0) as usize)
        .take(size.max(0) as usize)
        .collect()
}

fn newest_first(posts: &mut [Post]) {
    posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

// ---------------------------------------------------------------------------
// Relational store
// ---------------------------------------------------------------------------

#[derive(Default)]
struct PostStoreInner {
    rows: Mutex<BTreeMap<PostId, Post>>,
    next_id: AtomicI64,
    fail_begin: AtomicBool,
    fail_writes: AtomicBool,
    fail_commit: AtomicBool,
    stall: AtomicBool,
    begins: AtomicUsize,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
}

/// Post store with snapshot transactions. Ids come from a shared sequence
/// that is not rolled back, like a PostgreSQL BIGSERIAL.
#[derive(Clone, Default)]
pub struct InMemoryPostStore {
    inner: Arc<PostStoreInner>,
}

impl InMemoryPostStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_begin(&self, on: bool) {
        self.inner.fail_begin.store(on, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, on: bool) {
        self.inner.fail_writes.store(on, Ordering::SeqCst);
    }

    pub fn fail_commit(&self, on: bool) {
        self.inner.fail_commit.store(on, Ordering::SeqCst);
    }

    /// Make every statement hang until the service timeout fires
    pub fn stall(&self, on: bool) {
        self.inner.stall.store(on, Ordering::SeqCst);
    }

    pub fn get(&self, id: PostId) -> Option<Post> {
        self.inner.rows.lock().unwrap().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.rows.lock().unwrap().len()
    }

    pub fn begins(&self) -> usize {
        self.inner.begins.load(Ordering::SeqCst)
    }

    pub fn commits(&self) -> usize {
        self.inner.commits.load(Ordering::SeqCst)
    }

    pub fn rollbacks(&self) -> usize {
        self.inner.rollbacks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PostStore for InMemoryPostStore {
    async fn begin(&self) -> StoreResult<Box<dyn PostTransaction>> {
        if self.inner.fail_begin.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection refused".to_string()));
        }
        self.inner.begins.fetch_add(1, Ordering::SeqCst);
        let snapshot = self.inner.rows.lock().unwrap().clone();
        Ok(Box::new(InMemoryPostTransaction {
            inner: self.inner.clone(),
            rows: snapshot,
        }))
    }

    async fn ping(&self) -> StoreResult<()> {
        if self.inner.fail_begin.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }
}

struct InMemoryPostTransaction {
    inner: Arc<PostStoreInner>,
    rows: BTreeMap<PostId, Post>,
}

impl InMemoryPostTransaction {
    async fn statement(&self, write: bool) -> StoreResult<()> {
        if self.inner.stall.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
        if write && self.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("write rejected".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl PostTransaction for InMemoryPostTransaction {
    async fn create_post(&mut self, post: &NewPost) -> StoreResult<Post> {
        self.statement(true).await?;
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let created = post.clone().with_id(id);
        self.rows.insert(id, created.clone());
        Ok(created)
    }

    async fn update_post(&mut self, post: &Post) -> StoreResult<Post> {
        self.statement(true).await?;
        match self.rows.get_mut(&post.id) {
            Some(row) => {
                row.title = post.title.clone();
                row.short_desc = post.short_desc.clone();
                row.content = post.content.clone();
                Ok(row.clone())
            }
            None => Err(StoreError::Database(sqlx::Error::RowNotFound)),
        }
    }

    async fn delete_post(&mut self, id: PostId) -> StoreResult<bool> {
        self.statement(true).await?;
        Ok(self.rows.remove(&id).is_some())
    }

    async fn find_post_by_id(&mut self, id: PostId) -> StoreResult<Option<Post>> {
        self.statement(false).await?;
        Ok(self.rows.get(&id).cloned())
    }

    async fn find_posts_by_text(
        &mut self,
        query: &str,
        from: i64,
        size: i64,
    ) -> StoreResult<Vec<Post>> {
        self.statement(false).await?;
        let mut hits: Vec<Post> = self
            .rows
            .values()
            .filter(|p| matches_text([&p.title, &p.short_desc, &p.content], query))
            .cloned()
            .collect();
        newest_first(&mut hits);
        Ok(page(hits, from, size))
    }

    async fn find_recent_posts(&mut self, from: i64, size: i64) -> StoreResult<Vec<Post>> {
        self.statement(false).await?;
        let mut all: Vec<Post> = self.rows.values().cloned().collect();
        newest_first(&mut all);
        Ok(page(all, from, size))
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        if self.inner.fail_commit.load(Ordering::SeqCst) {
            self.inner.rollbacks.fetch_add(1, Ordering::SeqCst);
            return Err(StoreError::Unavailable("commit failed".to_string()));
        }
        *self.inner.rows.lock().unwrap() = self.rows;
        self.inner.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.inner.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

#[derive(Default)]
struct CacheInner {
    entries: Mutex<HashMap<String, String>>,
    fail: AtomicBool,
    gets: AtomicUsize,
}

/// Key-value cache with glob support for trailing `*` patterns
#[derive(Clone, Default)]
pub struct InMemoryCache {
    inner: Arc<CacheInner>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, on: bool) {
        self.inner.fail.store(on, Ordering::SeqCst);
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.inner.entries.lock().unwrap().get(key).cloned()
    }

    pub fn insert_raw(&self, key: &str, value: &str) {
        self.inner
            .entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }

    pub fn remove(&self, key: &str) {
        self.inner.entries.lock().unwrap().remove(key);
    }

    pub fn post(&self, id: PostId) -> Option<Post> {
        self.raw(&blog_cache::CacheKey::post(id))
            .and_then(|raw| serde_json::from_str(&raw).ok())
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.entries.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn gets(&self) -> usize {
        self.inner.gets.load(Ordering::SeqCst)
    }

    fn check(&self) -> CacheResult<()> {
        if self.inner.fail.load(Ordering::SeqCst) {
            return Err(CacheError::Timeout);
        }
        Ok(())
    }
}

#[async_trait]
impl CacheStore for InMemoryCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        self.inner.gets.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.raw(key))
    }

    async fn set(&self, key: &str, value: &str, _ttl: Duration) -> CacheResult<()> {
        self.check()?;
        self.insert_raw(key, value);
        Ok(())
    }

    async fn del(&self, key: &str) -> CacheResult<()> {
        self.check()?;
        self.inner.entries.lock().unwrap().remove(key);
        Ok(())
    }

    async fn keys_matching(&self, pattern: &str) -> CacheResult<Vec<String>> {
        self.check()?;
        let entries = self.inner.entries.lock().unwrap();
        let keys = match pattern.strip_suffix('*') {
            Some(prefix) => entries
                .keys()
                .filter(|k| k.starts_with(prefix))
                .cloned()
                .collect(),
            None => entries.keys().filter(|k| *k == pattern).cloned().collect(),
        };
        Ok(keys)
    }

    async fn ping(&self) -> CacheResult<()> {
        self.check()
    }
}

// ---------------------------------------------------------------------------
// Search index
// ---------------------------------------------------------------------------

#[derive(Default)]
struct SearchInner {
    docs: Mutex<BTreeMap<PostId, PostDocument>>,
    fail: AtomicBool,
    failures_left: AtomicUsize,
    searches: AtomicUsize,
    writes: AtomicUsize,
}

/// Search index doing case-insensitive substring matching
#[derive(Clone, Default)]
pub struct InMemorySearchIndex {
    inner: Arc<SearchInner>,
}

impl InMemorySearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, on: bool) {
        self.inner.fail.store(on, Ordering::SeqCst);
    }

    /// Reject the next `n` writes, then recover
    pub fn fail_next(&self, n: usize) {
        self.inner.failures_left.store(n, Ordering::SeqCst);
    }

    pub fn doc(&self, id: PostId) -> Option<PostDocument> {
        self.inner.docs.lock().unwrap().get(&id).cloned()
    }

    pub fn put(&self, doc: PostDocument) {
        self.inner.docs.lock().unwrap().insert(doc.id, doc);
    }

    pub fn len(&self) -> usize {
        self.inner.docs.lock().unwrap().len()
    }

    pub fn searches(&self) -> usize {
        self.inner.searches.load(Ordering::SeqCst)
    }

    /// Write attempts, failed ones included
    pub fn writes(&self) -> usize {
        self.inner.writes.load(Ordering::SeqCst)
    }

    fn check_write(&self) -> Result<(), SearchError> {
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let consumed = self
            .inner
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if consumed.is_ok() {
            return Err(SearchError::Status {
                status: 429,
                body: "too many requests".to_string(),
            });
        }
        Ok(())
    }

    fn check(&self) -> Result<(), SearchError> {
        if self.inner.fail.load(Ordering::SeqCst) {
            return Err(SearchError::Status {
                status: 503,
                body: "index unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl SearchIndex for InMemorySearchIndex {
    async fn index(&self, doc: &PostDocument) -> Result<(), SearchError> {
        self.check_write()?;
        self.put(doc.clone());
        Ok(())
    }

    async fn update(&self, doc: &PostDocument) -> Result<(), SearchError> {
        self.check_write()?;
        self.put(doc.clone());
        Ok(())
    }

    async fn delete(&self, id: PostId) -> Result<(), SearchError> {
        self.check_write()?;
        self.inner.docs.lock().unwrap().remove(&id);
        Ok(())
    }

    async fn get_by_id(&self, id: PostId) -> Result<Option<PostDocument>, SearchError> {
        self.check()?;
        Ok(self.doc(id))
    }

    async fn search(
        &self,
        query: &str,
        from: i64,
        size: i64,
    ) -> Result<Vec<PostDocument>, SearchError> {
        self.inner.searches.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let hits: Vec<PostDocument> = self
            .inner
            .docs
            .lock()
            .unwrap()
            .values()
            .filter(|d| matches_text([&d.title, &d.short_desc, &d.content], query))
            .cloned()
            .collect();
        Ok(page(hits, from, size))
    }

    async fn ping(&self) -> Result<(), SearchError> {
        self.check()
    }
}

// ---------------------------------------------------------------------------
// User store
// ---------------------------------------------------------------------------

#[derive(Default)]
struct UserStoreInner {
    rows: Mutex<BTreeMap<UserId, User>>,
    next_id: AtomicI64,
    fail_begin: AtomicBool,
}

/// User store enforcing case-insensitive uniqueness of email and username
#[derive(Clone, Default)]
pub struct InMemoryUserStore {
    inner: Arc<UserStoreInner>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_begin(&self, on: bool) {
        self.inner.fail_begin.store(on, Ordering::SeqCst);
    }

    pub fn get(&self, id: UserId) -> Option<User> {
        self.inner.rows.lock().unwrap().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.rows.lock().unwrap().len()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn begin(&self) -> StoreResult<Box<dyn UserTransaction>> {
        if self.inner.fail_begin.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection refused".to_string()));
        }
        let snapshot = self.inner.rows.lock().unwrap().clone();
        Ok(Box::new(InMemoryUserTransaction {
            inner: self.inner.clone(),
            rows: snapshot,
        }))
    }
}

struct InMemoryUserTransaction {
    inner: Arc<UserStoreInner>,
    rows: BTreeMap<UserId, User>,
}

impl InMemoryUserTransaction {
    fn ensure_unique(&self, id: Option<UserId>, email: &str, username: &str) -> StoreResult<()> {
        let clash = self.rows.values().any(|u| {
            Some(u.id) != id
                && (u.email.eq_ignore_ascii_case(email)
                    || u.username.eq_ignore_ascii_case(username))
        });
        if clash {
            return Err(StoreError::Conflict(
                "duplicate key value violates unique constraint".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl UserTransaction for InMemoryUserTransaction {
    async fn create_user(&mut self, user: &NewUserRecord) -> StoreResult<User> {
        self.ensure_unique(None, &user.email, &user.username)?;
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let created = User {
            id,
            email: user.email.clone(),
            username: user.username.clone(),
            name: user.name.clone(),
            password_hash: user.password_hash.clone(),
        };
        self.rows.insert(id, created.clone());
        Ok(created)
    }

    async fn update_user(&mut self, user: &User) -> StoreResult<User> {
        self.ensure_unique(Some(user.id), &user.email, &user.username)?;
        match self.rows.get_mut(&user.id) {
            Some(row) => {
                row.email = user.email.clone();
                row.username = user.username.clone();
                row.name = user.name.clone();
                Ok(row.clone())
            }
            None => Err(StoreError::Database(sqlx::Error::RowNotFound)),
        }
    }

    async fn update_password(&mut self, id: UserId, password_hash: &str) -> StoreResult<User> {
        match self.rows.get_mut(&id) {
            Some(row) => {
                row.password_hash = password_hash.to_string();
                Ok(row.clone())
            }
            None => Err(StoreError::Database(sqlx::Error::RowNotFound)),
        }
    }

    async fn delete_user(&mut self, id: UserId) -> StoreResult<bool> {
        Ok(self.rows.remove(&id).is_some())
    }

    async fn find_user_by_id(&mut self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.rows.get(&id).cloned())
    }

    async fn find_user_by_email(&mut self, email: &str) -> StoreResult<Option<User>> {
        Ok(self
            .rows
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_user_by_username(&mut self, username: &str) -> StoreResult<Option<User>> {
        Ok(self
            .rows
            .values()
            .find(|u| u.username.eq_ignore_ascii_case(username))
            .cloned())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        *self.inner.rows.lock().unwrap() = self.rows;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
}

/// Clock that advances one minute per call, starting at `epoch()`
pub fn stepping_clock() -> Clock {
    let ticks = Arc::new(AtomicI64::new(0));
    Arc::new(move || epoch() + ChronoDuration::minutes(ticks.fetch_add(1, Ordering::SeqCst)))
}

pub fn post_input(title: &str, short_desc: &str, content: &str) -> PostInput {
    PostInput {
        title: title.to_string(),
        short_desc: short_desc.to_string(),
        content: content.to_string(),
    }
}

/// Timeouts short enough that stalled doubles fail fast
pub fn fast_config() -> PostServiceConfig {
    PostServiceConfig {
        store_timeout: Duration::from_millis(100),
        sync_timeout: Duration::from_millis(100),
        ..PostServiceConfig::default()
    }
}

pub struct Harness {
    pub store: InMemoryPostStore,
    pub cache: InMemoryCache,
    pub search: InMemorySearchIndex,
    pub service: PostService,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(fast_config())
    }

    pub fn with_config(config: PostServiceConfig) -> Self {
        let store = InMemoryPostStore::new();
        let cache = InMemoryCache::new();
        let search = InMemorySearchIndex::new();
        let service = PostService::new(
            Arc::new(store.clone()),
            Arc::new(cache.clone()),
            Arc::new(search.clone()),
            config,
        )
        .with_clock(stepping_clock());

        Self {
            store,
            cache,
            search,
            service,
        }
    }
}
