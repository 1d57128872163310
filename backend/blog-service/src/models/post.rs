use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Post identifier, assigned by the relational store
pub type PostId = i64;

/// Canonical post record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Post {
    pub id: PostId,
    pub title: String,
    pub short_desc: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Write payload for creating or replacing a post
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PostInput {
    #[validate(
        length(min = 1, max = 200),
        custom(function = "crate::validators::validate_not_blank")
    )]
    pub title: String,
    #[validate(
        length(min = 1, max = 300),
        custom(function = "crate::validators::validate_not_blank")
    )]
    pub short_desc: String,
    #[validate(
        length(min = 1, max = 50000),
        custom(function = "crate::validators::validate_not_blank")
    )]
    pub content: String,
}

/// Insert record handed to the store; the id is assigned on insert
#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub short_desc: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl PostInput {
    pub fn into_new_post(self, created_at: DateTime<Utc>) -> NewPost {
        NewPost {
            title: self.title,
            short_desc: self.short_desc,
            content: self.content,
            created_at,
        }
    }

    /// Replace the mutable fields of `existing`, keeping its id and creation time
    pub fn apply_to(self, existing: &Post) -> Post {
        Post {
            id: existing.id,
            title: self.title,
            short_desc: self.short_desc,
            content: self.content,
            created_at: existing.created_at,
        }
    }
}

impl NewPost {
    pub fn with_id(self, id: PostId) -> Post {
        Post {
            id,
            title: self.title,
            short_desc: self.short_desc,
            content: self.content,
            created_at: self.created_at,
        }
    }
}
