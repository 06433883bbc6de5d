use std::sync::Arc;

use anyhow::anyhow;
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use thiserror::Error;
use tracing::{debug, info};

use warbler_db::models::{NewUserRow, UserRow};
use warbler_db::{Database, is_integrity_error};

use crate::session::SessionStore;
use crate::views::Views;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub sessions: SessionStore,
    pub views: Views,
}

impl AppStateInner {
    pub fn new(db: Database) -> anyhow::Result<AppState> {
        Ok(Arc::new(Self {
            db,
            sessions: SessionStore::new(),
            views: Views::new()?,
        }))
    }
}

#[derive(Debug, Error)]
pub enum SignupError {
    #[error("password is required")]
    MissingPassword,

    /// Missing username/email, or one of them is already taken.
    #[error("integrity error: {0}")]
    Integrity(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NewUser<'a> {
    pub username: Option<&'a str>,
    pub email: Option<&'a str>,
    pub password: Option<&'a str>,
    pub image_url: Option<&'a str>,
}

/// Hashes the password with Argon2id and stores the user.
pub fn signup(db: &Database, new: NewUser<'_>) -> Result<UserRow, SignupError> {
    let password = new
        .password
        .filter(|p| !p.is_empty())
        .ok_or(SignupError::MissingPassword)?;

    let password_hash = hash_password(password)?;

    let user = db
        .create_user(&NewUserRow {
            username: new.username,
            email: new.email,
            password_hash: Some(&password_hash),
            image_url: new.image_url,
        })
        .map_err(|e| {
            if is_integrity_error(&e) {
                SignupError::Integrity(e.to_string())
            } else {
                SignupError::Other(e)
            }
        })?;

    info!("Signed up user {} ({})", user.username, user.id);
    Ok(user)
}

/// Returns the user when `username` exists and `password` matches.
/// Wrong credentials yield `Ok(None)`; only storage failures are errors.
pub fn authenticate(db: &Database, username: &str, password: &str) -> anyhow::Result<Option<UserRow>> {
    let Some(user) = db.get_user_by_username(username)? else {
        debug!("Login attempt for unknown user {}", username);
        return Ok(None);
    };

    if verify_password(password, &user.password)? {
        Ok(Some(user))
    } else {
        debug!("Wrong password for {}", username);
        Ok(None)
    }
}

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("Password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

fn verify_password(password: &str, stored_hash: &str) -> anyhow::Result<bool> {
    let parsed_hash =
        PasswordHash::new(stored_hash).map_err(|e| anyhow!("Stored password hash is malformed: {}", e))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user<'a>(username: Option<&'a str>, email: Option<&'a str>, password: Option<&'a str>) -> NewUser<'a> {
        NewUser {
            username,
            email,
            password,
            image_url: Some(""),
        }
    }

    #[test]
    fn signup_stores_input_and_hashes_password() {
        let db = Database::open_in_memory().unwrap();
        let u = signup(&db, new_user(Some("testUser"), Some("test@email.com"), Some("123456"))).unwrap();

        assert_eq!(u.email, "test@email.com");
        assert_eq!(u.username, "testUser");
        assert_ne!(u.password, "123456");
        assert!(u.password.starts_with("$argon2"));
    }

    #[test]
    fn signup_without_username_or_email_is_an_integrity_error() {
        let db = Database::open_in_memory().unwrap();

        let err = signup(&db, new_user(None, Some("test@email.com"), Some("123234"))).unwrap_err();
        assert!(matches!(err, SignupError::Integrity(_)));

        let err = signup(&db, new_user(Some("testUser"), None, Some("123234"))).unwrap_err();
        assert!(matches!(err, SignupError::Integrity(_)));
    }

    #[test]
    fn signup_without_password_is_a_validation_error() {
        let db = Database::open_in_memory().unwrap();

        let err = signup(&db, new_user(Some("testUser1"), Some("test1@email.com"), None)).unwrap_err();
        assert!(matches!(err, SignupError::MissingPassword));
        assert!(db.get_user_by_username("testUser1").unwrap().is_none());
    }

    #[test]
    fn duplicate_username_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        signup(&db, new_user(Some("testUser"), Some("a@email.com"), Some("123456"))).unwrap();

        let err = signup(&db, new_user(Some("testUser"), Some("b@email.com"), Some("123456"))).unwrap_err();
        assert!(matches!(err, SignupError::Integrity(_)));
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        signup(&db, new_user(Some("testUser"), Some("a@email.com"), Some("123456"))).unwrap();

        let err = signup(&db, new_user(Some("other"), Some("a@email.com"), Some("123456"))).unwrap_err();
        assert!(matches!(err, SignupError::Integrity(_)));
        assert!(db.get_user_by_username("other").unwrap().is_none());
    }

    #[test]
    fn authenticate_distinguishes_bad_credentials() {
        let db = Database::open_in_memory().unwrap();
        let u = signup(&db, new_user(Some("testUser"), Some("test@email.com"), Some("123456"))).unwrap();

        assert_eq!(authenticate(&db, "testUser", "123456").unwrap(), Some(u));
        assert_eq!(authenticate(&db, "testUser", "1236").unwrap(), None);
        assert_eq!(authenticate(&db, "tUser", "123456").unwrap(), None);
    }
}
