use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// User identifier, assigned by the relational store
pub type UserId = i64;

/// User account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub username: String,
    pub name: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
}

/// User registration request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewUser {
    #[validate(custom(function = "crate::validators::validate_email_shape_validator"))]
    pub email: String,
    #[validate(
        length(min = 3, max = 32),
        custom(function = "crate::validators::validate_username_shape_validator")
    )]
    pub username: String,
    #[validate(
        length(min = 1, max = 100),
        custom(function = "crate::validators::validate_not_blank")
    )]
    pub name: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

/// Profile update request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateUser {
    #[validate(custom(function = "crate::validators::validate_email_shape_validator"))]
    pub email: String,
    #[validate(
        length(min = 3, max = 32),
        custom(function = "crate::validators::validate_username_shape_validator")
    )]
    pub username: String,
    #[validate(
        length(min = 1, max = 100),
        custom(function = "crate::validators::validate_not_blank")
    )]
    pub name: String,
}

/// Password change request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, max = 128))]
    pub current_password: String,
    #[validate(length(min = 8, max = 128))]
    pub new_password: String,
}

/// Account deletion request; the password re-authenticates the caller
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DeleteAccountRequest {
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

/// Login request. `identifier` is either an email or a username.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 254))]
    pub identifier: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

/// Successful login
#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub user: User,
    pub token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Row values written for a new account
#[derive(Debug, Clone)]
pub struct NewUserRecord {
    pub email: String,
    pub username: String,
    pub name: String,
    pub password_hash: String,
}
