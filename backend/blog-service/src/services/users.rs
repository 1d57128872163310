/// User service - registration, profile management and login
use crate::db::{StoreError, UserStore, UserTransaction};
use crate::models::{
    ChangePasswordRequest, DeleteAccountRequest, LoginRequest, LoginResponse, NewUser,
    NewUserRecord, UpdateUser, User, UserId,
};
use crate::security::{hash_password, verify_password, JwtKeys, SecurityError};
use crate::validators::{validate_email, validate_password};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use validator::Validate;

const INVALID_CREDENTIALS: &str = "Invalid credentials";
const WEAK_PASSWORD: &str =
    "password must be at least 8 characters with upper and lower case letters, a digit and a special character";

#[derive(Debug, Error)]
pub enum UserError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Transaction error: {0}")]
    Transaction(#[source] StoreError),

    #[error("Persistence error: {0}")]
    Persistence(#[source] StoreError),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("User {0} not found")]
    NotFound(UserId),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<validator::ValidationErrors> for UserError {
    fn from(err: validator::ValidationErrors) -> Self {
        UserError::Validation(err.to_string())
    }
}

impl From<SecurityError> for UserError {
    fn from(err: SecurityError) -> Self {
        tracing::error!("Security error: {}", err);
        UserError::Internal(err.to_string())
    }
}

fn store_error(err: StoreError) -> UserError {
    match err {
        StoreError::Conflict(_) => {
            UserError::Conflict("email or username already registered".to_string())
        }
        StoreError::Timeout => UserError::Transaction(err),
        other => UserError::Persistence(other),
    }
}

pub struct UserService {
    store: Arc<dyn UserStore>,
    keys: Arc<JwtKeys>,
}

impl UserService {
    pub fn new(store: Arc<dyn UserStore>, keys: Arc<JwtKeys>) -> Self {
        Self { store, keys }
    }

    /// Register a new account
    pub async fn create(&self, input: NewUser) -> Result<User, UserError> {
        input.validate()?;
        if !validate_password(&input.password) {
            return Err(UserError::Validation(WEAK_PASSWORD.to_string()));
        }

        let record = NewUserRecord {
            email: input.email.trim().to_string(),
            username: input.username.trim().to_string(),
            name: input.name.trim().to_string(),
            password_hash: hash_password(&input.password)?,
        };

        let mut tx = self.begin().await?;
        let created = tx.create_user(&record).await;
        let user = match created {
            Ok(user) => user,
            Err(e) => return Err(abort(tx, store_error(e)).await),
        };
        commit(tx).await?;

        info!(user_id = user.id, "User registered");
        Ok(user)
    }

    /// Replace email, username and display name
    pub async fn update_profile(&self, user_id: UserId, input: UpdateUser) -> Result<User, UserError> {
        input.validate()?;

        let mut tx = self.begin().await?;
        let loaded = load(&mut tx, user_id).await;
        let existing = match loaded {
            Ok(user) => user,
            Err(e) => return Err(abort(tx, e).await),
        };

        let replacement = User {
            id: existing.id,
            email: input.email.trim().to_string(),
            username: input.username.trim().to_string(),
            name: input.name.trim().to_string(),
            password_hash: existing.password_hash,
        };
        let written = tx.update_user(&replacement).await;
        let user = match written {
            Ok(user) => user,
            Err(e) => return Err(abort(tx, store_error(e)).await),
        };
        commit(tx).await?;

        info!(user_id, "User profile updated");
        Ok(user)
    }

    /// Change password after re-checking the current one
    pub async fn update_password(
        &self,
        user_id: UserId,
        request: ChangePasswordRequest,
    ) -> Result<User, UserError> {
        request.validate()?;
        if !validate_password(&request.new_password) {
            return Err(UserError::Validation(WEAK_PASSWORD.to_string()));
        }

        let mut tx = self.begin().await?;
        let loaded = load(&mut tx, user_id).await;
        let existing = match loaded {
            Ok(user) => user,
            Err(e) => return Err(abort(tx, e).await),
        };

        match verify_password(&request.current_password, &existing.password_hash) {
            Ok(true) => {}
            Ok(false) => {
                warn!(user_id, "Password change rejected: current password mismatch");
                let cause = UserError::Unauthorized("current password is incorrect".to_string());
                return Err(abort(tx, cause).await);
            }
            Err(e) => return Err(abort(tx, e.into()).await),
        }

        let new_hash = match hash_password(&request.new_password) {
            Ok(hash) => hash,
            Err(e) => return Err(abort(tx, e.into()).await),
        };
        let written = tx.update_password(user_id, &new_hash).await;
        let user = match written {
            Ok(user) => user,
            Err(e) => return Err(abort(tx, store_error(e)).await),
        };
        commit(tx).await?;

        info!(user_id, "User password changed");
        Ok(user)
    }

    /// Delete an account after re-checking its password
    pub async fn delete(
        &self,
        user_id: UserId,
        request: DeleteAccountRequest,
    ) -> Result<(), UserError> {
        request.validate()?;

        let mut tx = self.begin().await?;
        let loaded = load(&mut tx, user_id).await;
        let existing = match loaded {
            Ok(user) => user,
            Err(e) => return Err(abort(tx, e).await),
        };

        match verify_password(&request.password, &existing.password_hash) {
            Ok(true) => {}
            Ok(false) => {
                warn!(user_id, "Account deletion rejected: password mismatch");
                let cause = UserError::Unauthorized(INVALID_CREDENTIALS.to_string());
                return Err(abort(tx, cause).await);
            }
            Err(e) => return Err(abort(tx, e.into()).await),
        }

        let deleted = tx.delete_user(user_id).await;
        match deleted {
            Ok(true) => {}
            Ok(false) => return Err(abort(tx, UserError::NotFound(user_id)).await),
            Err(e) => return Err(abort(tx, store_error(e)).await),
        }
        commit(tx).await?;

        info!(user_id, "User deleted");
        Ok(())
    }

    /// Authenticate by email or username and issue an access token.
    /// Unknown accounts and wrong passwords fail identically.
    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse, UserError> {
        request.validate()?;
        let identifier = request.identifier.trim();

        let mut tx = self.begin().await?;
        let found = if validate_email(identifier) {
            tx.find_user_by_email(identifier).await
        } else {
            tx.find_user_by_username(identifier).await
        };
        if let Err(e) = tx.rollback().await {
            warn!(error = %e, "Read transaction release failed");
        }

        let user = match found.map_err(store_error)? {
            Some(user) => user,
            None => {
                warn!("Login failed: unknown account");
                return Err(UserError::Unauthorized(INVALID_CREDENTIALS.to_string()));
            }
        };

        if !verify_password(&request.password, &user.password_hash)? {
            warn!(user_id = user.id, "Login failed: password mismatch");
            return Err(UserError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        }

        let token = self.keys.issue(&user)?;
        info!(user_id = user.id, "User logged in");

        Ok(LoginResponse {
            user,
            token,
            token_type: "Bearer".to_string(),
            expires_in: self.keys.ttl_secs(),
        })
    }

    async fn begin(&self) -> Result<Box<dyn UserTransaction>, UserError> {
        self.store.begin().await.map_err(UserError::Transaction)
    }
}

async fn load(tx: &mut Box<dyn UserTransaction>, user_id: UserId) -> Result<User, UserError> {
    match tx.find_user_by_id(user_id).await {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err(UserError::NotFound(user_id)),
        Err(e) => Err(store_error(e)),
    }
}

async fn commit(tx: Box<dyn UserTransaction>) -> Result<(), UserError> {
    tx.commit().await.map_err(UserError::Transaction)
}

async fn abort(tx: Box<dyn UserTransaction>, cause: UserError) -> UserError {
    if let Err(e) = tx.rollback().await {
        warn!(error = %e, "Transaction rollback failed");
    }
    cause
}
