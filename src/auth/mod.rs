//! Authentication and authorization for Learn Space
//!
//! Provides:
//! - Session token issuing and verification (JWT in an http-only cookie)
//! - Password hashing with Argon2
//! - The ownership guard shared by every private course and presentation route

pub mod guard;
pub mod jwt;
pub mod password;

pub use guard::{authorize, Access};
pub use jwt::{
    extract_token_from_cookie, extract_token_from_header, Claims, SessionTokens, TokenRejection,
    TokenVerdict, SESSION_COOKIE,
};
pub use password::{check_login, hash_password, verify_password};
