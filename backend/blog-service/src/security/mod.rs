/// Security primitives for blog-service
///
/// - **password**: Argon2id password hashing
/// - **jwt**: HS512 token issuance and validation with injected keys
pub mod jwt;
pub mod password;

pub use jwt::{Claims, JwtKeys};
pub use password::{hash_password, verify_password};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error("Invalid password hash format: {0}")]
    InvalidHash(String),

    #[error("Token generation failed: {0}")]
    TokenGeneration(String),

    #[error("Token validation failed: {0}")]
    InvalidToken(String),
}
