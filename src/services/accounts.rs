//! Registration, login and session identity

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::auth::{check_login, hash_password};
use crate::db::{users, Store};
use crate::types::{FieldErrors, LearnSpaceError};

pub const PASSWORD_MIN_CHARS: usize = 6;

/// Credentials posted to register and login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// User as exposed to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: String,
    pub email: String,
}

impl From<users::UserRow> for PublicUser {
    fn from(row: users::UserRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
        }
    }
}

/// Body returned by register and login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub message: String,
    pub user: PublicUser,
}

/// Lowercased, trimmed email
fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
}

/// Create an account. A second registration for the same email is a conflict.
pub fn register(store: &Store, credentials: &Credentials) -> Result<PublicUser, LearnSpaceError> {
    let email = normalize_email(&credentials.email);

    let mut errors = FieldErrors::new();
    if !is_valid_email(&email) {
        errors.push("email", "must be a valid email address");
    }
    if credentials.password.chars().count() < PASSWORD_MIN_CHARS {
        errors.push(
            "password",
            format!("must be at least {} characters", PASSWORD_MIN_CHARS),
        );
    }
    errors.into_result()?;

    let hash = hash_password(&credentials.password)?;
    let user = store.with_conn(|conn| users::insert_user(conn, &email, &hash))?;

    info!(user_id = %user.id, "Registered new user");
    Ok(user.into())
}

/// Check credentials. Unknown email and wrong password look the same.
pub fn login(store: &Store, credentials: &Credentials) -> Result<PublicUser, LearnSpaceError> {
    let email = normalize_email(&credentials.email);
    let rejected = || LearnSpaceError::Unauthenticated("Invalid email or password".into());

    let user = store.with_conn(|conn| users::find_by_email(conn, &email))?;

    // Unknown emails still pay for one Argon2 verification
    let stored = user.as_ref().map(|u| u.password_hash.as_str());
    if !check_login(&credentials.password, stored)? {
        match &user {
            Some(user) => debug!(user_id = %user.id, "Login attempt with wrong password"),
            None => debug!("Login attempt for unknown email"),
        }
        return Err(rejected());
    }

    user.map(PublicUser::from).ok_or_else(rejected)
}

/// Resolve the user behind a verified session
pub fn current_user(store: &Store, user_id: &str) -> Result<PublicUser, LearnSpaceError> {
    store
        .with_conn(|conn| users::find_by_id(conn, user_id))?
        .map(PublicUser::from)
        .ok_or_else(|| LearnSpaceError::Unauthenticated("Session user no longer exists".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds(email: &str, password: &str) -> Credentials {
        Credentials {
            email: email.into(),
            password: password.into(),
        }
    }

    #[test]
    fn test_register_twice_conflicts() {
        let store = Store::open_in_memory().unwrap();
        let user = register(&store, &creds("Ada@Example.com", "secret1")).unwrap();
        assert_eq!(user.email, "ada@example.com");

        let err = register(&store, &creds("ada@example.com", "another")).unwrap_err();
        assert!(matches!(err, LearnSpaceError::Conflict(_)));
    }

    #[test]
    fn test_register_validation() {
        let store = Store::open_in_memory().unwrap();
        match register(&store, &creds("not-an-email", "123")) {
            Err(LearnSpaceError::Validation(fields)) => {
                let names: Vec<&str> = fields.iter().map(|f| f.field.as_str()).collect();
                assert_eq!(names, vec!["email", "password"]);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
        assert_eq!(store.stats().unwrap().users, 0);
    }

    #[test]
    fn test_login() {
        let store = Store::open_in_memory().unwrap();
        let user = register(&store, &creds("ada@example.com", "secret1")).unwrap();

        let logged_in = login(&store, &creds(" ADA@example.com", "secret1")).unwrap();
        assert_eq!(logged_in, user);

        let wrong = login(&store, &creds("ada@example.com", "wrong-pass")).unwrap_err();
        let unknown = login(&store, &creds("bob@example.com", "secret1")).unwrap_err();
        assert_eq!(wrong.public_message(), unknown.public_message());
        assert!(matches!(wrong, LearnSpaceError::Unauthenticated(_)));

        assert_eq!(current_user(&store, &user.id).unwrap(), user);
        assert!(current_user(&store, "ghost").is_err());
    }

    #[test]
    fn test_unknown_email_costs_a_hash_check() {
        use std::time::Instant;

        let store = Store::open_in_memory().unwrap();
        register(&store, &creds("ada@example.com", "secret1")).unwrap();
        crate::auth::password::warm_up().unwrap();

        let started = Instant::now();
        login(&store, &creds("ada@example.com", "wrong-pass")).unwrap_err();
        let wrong = started.elapsed();

        let started = Instant::now();
        login(&store, &creds("nobody@example.com", "wrong-pass")).unwrap_err();
        let unknown = started.elapsed();

        // Both run one Argon2 verification; a skipped check is orders of magnitude faster
        assert!(unknown * 4 >= wrong, "unknown {:?} vs wrong {:?}", unknown, wrong);
    }

    #[test]
    fn test_email_shapes() {
        assert!(is_valid_email("a@b.co"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("@b.co"));
        assert!(!is_valid_email("a b@c.de"));
        assert!(!is_valid_email("a@@b.co"));
    }
}
