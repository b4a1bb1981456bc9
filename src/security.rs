use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};

use crate::error::PaymentsError;

/// Hash a password into a salted PHC string.
pub fn hash_password(password: &str) -> Result<String, PaymentsError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PaymentsError::PasswordHash(e.to_string()))?
        .to_string();
    Ok(hash)
}

/// Verify a stored hash against a password provided by the user.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}
