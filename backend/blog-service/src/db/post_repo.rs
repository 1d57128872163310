use super::{map_db_error, PostStore, PostTransaction, StoreResult};
use crate::models::{NewPost, Post, PostId};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;

const POST_COLUMNS: &str = "id, title, short_desc, content, created_at";

/// PostgreSQL post store
#[derive(Clone)]
pub struct PgPostStore {
    pool: PgPool,
}

impl PgPostStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl PostStore for PgPostStore {
    async fn begin(&self) -> StoreResult<Box<dyn PostTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgPostTransaction { tx }))
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Open PostgreSQL transaction. Dropping it without commit rolls back.
pub struct PgPostTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait::async_trait]
impl PostTransaction for PgPostTransaction {
    async fn create_post(&mut self, post: &NewPost) -> StoreResult<Post> {
        let sql = format!(
            "INSERT INTO posts (title, short_desc, content, created_at) \
             VALUES ($1, $2, $3, $4) RETURNING {POST_COLUMNS}"
        );
        let created = sqlx::query_as::<_, Post>(&sql)
            .bind(&post.title)
            .bind(&post.short_desc)
            .bind(&post.content)
            .bind(post.created_at)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(map_db_error)?;

        debug!(post_id = created.id, "Inserted post row");
        Ok(created)
    }

    async fn update_post(&mut self, post: &Post) -> StoreResult<Post> {
        let sql = format!(
            "UPDATE posts SET title = $2, short_desc = $3, content = $4 \
             WHERE id = $1 RETURNING {POST_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Post>(&sql)
            .bind(post.id)
            .bind(&post.title)
            .bind(&post.short_desc)
            .bind(&post.content)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(map_db_error)?;

        Ok(updated)
    }

    async fn delete_post(&mut self, id: PostId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_db_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_post_by_id(&mut self, id: PostId) -> StoreResult<Option<Post>> {
        let sql = format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1");
        let post = sqlx::query_as::<_, Post>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(post)
    }

    async fn find_posts_by_text(
        &mut self,
        query: &str,
        from: i64,
        size: i64,
    ) -> StoreResult<Vec<Post>> {
        let sql = format!(
            "SELECT {POST_COLUMNS} FROM posts \
             WHERE search_vector @@ plainto_tsquery('english', $1) \
             ORDER BY ts_rank(search_vector, plainto_tsquery('english', $1)) DESC, \
                      created_at DESC, id DESC \
             LIMIT $2 OFFSET $3"
        );
        let posts = sqlx::query_as::<_, Post>(&sql)
            .bind(query)
            .bind(size)
            .bind(from)
            .fetch_all(&mut *self.tx)
            .await?;

        debug!(query = %query, count = posts.len(), "Relational full-text search");
        Ok(posts)
    }

    async fn find_recent_posts(&mut self, from: i64, size: i64) -> StoreResult<Vec<Post>> {
        let sql = format!(
            "SELECT {POST_COLUMNS} FROM posts \
             ORDER BY created_at DESC, id DESC \
             LIMIT $1 OFFSET $2"
        );
        let posts = sqlx::query_as::<_, Post>(&sql)
            .bind(size)
            .bind(from)
            .fetch_all(&mut *self.tx)
            .await?;

        Ok(posts)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
