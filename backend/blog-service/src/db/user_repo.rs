use super::{map_db_error, StoreResult, UserStore, UserTransaction};
use crate::models::{NewUserRecord, User, UserId};
use sqlx::{PgPool, Postgres, Transaction};

const USER_COLUMNS: &str = "id, email, username, name, password_hash";

/// PostgreSQL user store
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl UserStore for PgUserStore {
    async fn begin(&self) -> StoreResult<Box<dyn UserTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUserTransaction { tx }))
    }
}

pub struct PgUserTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait::async_trait]
impl UserTransaction for PgUserTransaction {
    async fn create_user(&mut self, user: &NewUserRecord) -> StoreResult<User> {
        let sql = format!(
            "INSERT INTO users (email, username, name, password_hash) \
             VALUES ($1, $2, $3, $4) RETURNING {USER_COLUMNS}"
        );
        let created = sqlx::query_as::<_, User>(&sql)
            .bind(&user.email)
            .bind(&user.username)
            .bind(&user.name)
            .bind(&user.password_hash)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(map_db_error)?;

        Ok(created)
    }

    async fn update_user(&mut self, user: &User) -> StoreResult<User> {
        let sql = format!(
            "UPDATE users SET email = $2, username = $3, name = $4, updated_at = NOW() \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, User>(&sql)
            .bind(user.id)
            .bind(&user.email)
            .bind(&user.username)
            .bind(&user.name)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(map_db_error)?;

        Ok(updated)
    }

    async fn update_password(&mut self, id: UserId, password_hash: &str) -> StoreResult<User> {
        let sql = format!(
            "UPDATE users SET password_hash = $2, updated_at = NOW() \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(password_hash)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(map_db_error)?;

        Ok(updated)
    }

    async fn delete_user(&mut self, id: UserId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_db_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_user_by_id(&mut self, id: UserId) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(user)
    }

    async fn find_user_by_email(&mut self, email: &str) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1)");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(user)
    }

    async fn find_user_by_username(&mut self, username: &str) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE LOWER(username) = LOWER($1)");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(user)
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
