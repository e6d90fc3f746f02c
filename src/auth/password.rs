//! Credential hashing for Learn Space accounts
//!
//! Hashes are Argon2id PHC strings, so salt and cost parameters travel with
//! each stored hash. A login check runs the same Argon2 work whether or not
//! the account exists.

use std::sync::OnceLock;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

use crate::types::LearnSpaceError;

/// Plaintext behind the decoy hash; never a valid account password
const DECOY_PASSWORD: &str = "learnspace-decoy-credential";

fn hasher() -> Argon2<'static> {
    Argon2::new(Algorithm::Argon2id, Version::V0x13, Params::default())
}

pub fn hash_password(password: &str) -> Result<String, LearnSpaceError> {
    let salt = SaltString::generate(&mut OsRng);

    hasher()
        .hash_password(password.as_bytes(), &salt)
        .map(|phc| phc.to_string())
        .map_err(|e| LearnSpaceError::Auth(format!("Failed to hash password: {e}")))
}

/// Whether `password` matches a stored PHC hash. A malformed hash is an error.
pub fn verify_password(password: &str, phc: &str) -> Result<bool, LearnSpaceError> {
    let parsed = PasswordHash::new(phc)
        .map_err(|e| LearnSpaceError::Auth(format!("Stored password hash is malformed: {e}")))?;

    Ok(hasher().verify_password(password.as_bytes(), &parsed).is_ok())
}

/// Check a login attempt.
///
/// `stored` is `None` for an unknown email. That case is verified against a
/// decoy hash and always fails, so it costs the same as a wrong password.
pub fn check_login(password: &str, stored: Option<&str>) -> Result<bool, LearnSpaceError> {
    match stored {
        Some(phc) => verify_password(password, phc),
        None => {
            verify_password(password, decoy_hash()?)?;
            Ok(false)
        }
    }
}

/// Hash of [`DECOY_PASSWORD`], computed on first use
fn decoy_hash() -> Result<&'static str, LearnSpaceError> {
    static DECOY: OnceLock<String> = OnceLock::new();

    if let Some(phc) = DECOY.get() {
        return Ok(phc);
    }
    let phc = hash_password(DECOY_PASSWORD)?;
    Ok(DECOY.get_or_init(|| phc))
}

/// Compute the decoy hash up front so the first unknown-email login is not slower
pub fn warm_up() -> Result<(), LearnSpaceError> {
    decoy_hash().map(|_| ())
}
