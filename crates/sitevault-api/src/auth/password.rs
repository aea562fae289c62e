/// Password hashing and verification using bcrypt
///
/// Credentials are stored as bcrypt hashes (cost 12). Older accounts may
/// still carry a plaintext credential; those are compared directly until the
/// next password change replaces them with a hash.
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Bcrypt cost factor. Changing it only affects hashes produced afterwards.
pub const BCRYPT_COST: u32 = 12;

/// Version prefix shared by every bcrypt hash (`$2a$`, `$2b$`, `$2y$`)
const BCRYPT_PREFIX: &str = "$2";

/// Minimum password length
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum password length in bytes (bcrypt input limit)
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Password hashing errors
#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    HashingFailed(String),

    #[error("{0}")]
    Weak(String),
}

/// Hash a plaintext password with the fixed production cost
///
/// # Example
///
/// ```no_run
/// use sitevault_api::auth::password::{hash_password, is_hashed};
///
/// let hash = hash_password("correct horse battery").unwrap();
/// assert!(is_hashed(&hash));
/// ```
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    hash_password_with_cost(password, BCRYPT_COST)
}

/// Hash with an explicit cost; lower costs keep tests fast
pub fn hash_password_with_cost(password: &str, cost: u32) -> Result<String, PasswordError> {
    bcrypt::hash(password, cost).map_err(|e| PasswordError::HashingFailed(e.to_string()))
}

/// Verify a plaintext password against a bcrypt hash.
///
/// A malformed hash verifies as `false`.
pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

/// Whether a stored credential is already a bcrypt hash
pub fn is_hashed(credential: &str) -> bool {
    credential.starts_with(BCRYPT_PREFIX)
}

/// Verify a password against a stored credential that may still be plaintext
pub fn verify_credential(password: &str, stored: &str) -> bool {
    if is_hashed(stored) {
        return verify_password(password, stored);
    }

    // Compare digests so the comparison length does not depend on the input
    let provided = Sha256::digest(password.as_bytes());
    let expected = Sha256::digest(stored.as_bytes());
    constant_time_eq(&provided, &expected)
}

/// Check a new password before it is hashed and stored
pub fn validate_new_password(password: &str) -> Result<(), PasswordError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(PasswordError::Weak(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    if password.len() > MAX_PASSWORD_BYTES {
        return Err(PasswordError::Weak(format!(
            "Password must be at most {MAX_PASSWORD_BYTES} bytes"
        )));
    }

    Ok(())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
