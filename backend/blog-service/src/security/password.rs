/// Password hashing and verification using Argon2id
use super::SecurityError;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// Hash a password using Argon2id
///
/// Returns a PHC-formatted string with a random per-password salt, safe for
/// database storage. Strength rules are checked by the caller.
pub fn hash_password(password: &str) -> Result<String, SecurityError> {
    let salt = SaltString::generate(&mut OsRng);

    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| SecurityError::Hashing(e.to_string()))?
        .to_string();

    Ok(password_hash)
}

/// Verify a password against its hash
///
/// `Ok(false)` means the password did not match; `Err` means the stored hash
/// could not be processed.
pub fn verify_password(password: &str, password_hash: &str) -> Result<bool, SecurityError> {
    let parsed_hash =
        PasswordHash::new(password_hash).map_err(|e| SecurityError::InvalidHash(e.to_string()))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(_) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(SecurityError::Hashing(e.to_string())),
    }
}
