//! Full-text search index for posts.

pub mod elasticsearch;

pub use self::elasticsearch::{ElasticsearchConfig, ElasticsearchIndex};

use crate::models::{Post, PostId};
use ::elasticsearch::http::transport::BuildError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid Elasticsearch URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("failed to build transport: {0}")]
    TransportBuild(#[from] BuildError),
    #[error("transport error: {0}")]
    Transport(#[from] ::elasticsearch::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("search operation timed out")]
    Timeout,
}

/// Indexed projection of a post. The document id is `id.to_string()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostDocument {
    pub id: PostId,
    pub title: String,
    pub short_desc: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Post> for PostDocument {
    fn from(post: &Post) -> Self {
        Self {
            id: post.id,
            title: post.title.clone(),
            short_desc: post.short_desc.clone(),
            content: post.content.clone(),
            created_at: post.created_at,
        }
    }
}

impl From<PostDocument> for Post {
    fn from(doc: PostDocument) -> Self {
        Post {
            id: doc.id,
            title: doc.title,
            short_desc: doc.short_desc,
            content: doc.content,
            created_at: doc.created_at,
        }
    }
}

#[async_trait::async_trait]
pub trait SearchIndex: Send + Sync {
    /// Add a document
    async fn index(&self, doc: &PostDocument) -> Result<(), SearchError>;

    /// Overwrite a document, creating it when absent
    async fn update(&self, doc: &PostDocument) -> Result<(), SearchError>;

    /// Remove a document. Removing an absent document succeeds.
    async fn delete(&self, id: PostId) -> Result<(), SearchError>;

    async fn get_by_id(&self, id: PostId) -> Result<Option<PostDocument>, SearchError>;

    /// Ranked phrase match over title, short description and content
    async fn search(
        &self,
        query: &str,
        from: i64,
        size: i64,
    ) -> Result<Vec<PostDocument>, SearchError>;

    /// Connectivity probe for readiness checks
    async fn ping(&self) -> Result<(), SearchError>;
}
