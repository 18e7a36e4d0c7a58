//! Token storage and the route guard.
//!
//! Tokens are issued elsewhere (the login page); this module only reads
//! them, attaches them to requests and wipes them when they are no longer
//! valid.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const ACCESS_TOKEN: &str = "access_token";
pub const REFRESH_TOKEN: &str = "refresh_token";
pub const TOKEN_TYPE: &str = "token_type";
pub const MQTT_KEY: &str = "mqtt_key";
pub const USER_ID: &str = "user_id";
pub const TOKEN_EXPIRES_AT: &str = "token_expires_at";

/// Every key the guard clears on auth failure
pub const AUTH_KEYS: [&str; 6] = [
    ACCESS_TOKEN,
    REFRESH_TOKEN,
    TOKEN_TYPE,
    MQTT_KEY,
    USER_ID,
    TOKEN_EXPIRES_AT,
];

pub const LOGIN_PATH: &str = "/login";

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Failed to access token storage: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Token storage is corrupt: {0}")]
    ParseError(#[from] serde_json::Error),
}

/// File-backed key/value storage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenStorage {
    #[serde(skip)]
    path: Option<PathBuf>,
    #[serde(flatten)]
    values: BTreeMap<String, String>,
}

impl TokenStorage {
    /// Storage that is never written to disk
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load from `path`; a missing file is an empty storage
    pub fn load(path: &Path) -> Result<Self, AuthError> {
        let mut storage = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            if content.trim().is_empty() {
                Self::default()
            } else {
                serde_json::from_str::<Self>(&content)?
            }
        } else {
            Self::default()
        };
        storage.path = Some(path.to_path_buf());
        Ok(storage)
    }

    pub fn save(&self) -> Result<(), AuthError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(&self.values)?)?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.values.remove(key)
    }

    /// Remove every auth key and persist
    pub fn clear_auth(&mut self) -> Result<(), AuthError> {
        for key in AUTH_KEYS {
            self.values.remove(key);
        }
        self.save()
    }

    /// Expiry stored as epoch milliseconds
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let millis = self.get(TOKEN_EXPIRES_AT)?.trim().parse::<i64>().ok()?;
        Utc.timestamp_millis_opt(millis).single()
    }

    /// `(token_type, access_token)` when a token is present
    pub fn authorization(&self) -> Option<(String, String)> {
        let token = self.get(ACCESS_TOKEN).filter(|t| !t.is_empty())?;
        let token_type = self
            .get(TOKEN_TYPE)
            .filter(|t| !t.is_empty())
            .unwrap_or("Bearer");
        Some((token_type.to_string(), token.to_string()))
    }

    pub fn is_token_valid(&self, now: DateTime<Utc>) -> bool {
        if self.authorization().is_none() {
            return false;
        }
        match self.get(TOKEN_EXPIRES_AT) {
            None => true,
            // unparseable expiry is treated as expired
            Some(_) => self.expires_at().is_some_and(|at| at > now),
        }
    }
}

/// Result of guarding a route
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    Allow,
    /// Go to [`LOGIN_PATH`], then back to `redirect` after login
    RedirectToLogin { redirect: String },
}

pub struct AuthGuard<'a> {
    storage: &'a mut TokenStorage,
}

impl<'a> AuthGuard<'a> {
    pub fn new(storage: &'a mut TokenStorage) -> Self {
        Self { storage }
    }

    pub fn check(&mut self, path: &str, now: DateTime<Utc>) -> Result<GuardOutcome, AuthError> {
        if is_public(path) || self.storage.is_token_valid(now) {
            return Ok(GuardOutcome::Allow);
        }

        tracing::info!("Auth check failed for {}, clearing stored tokens", path);
        self.storage.clear_auth()?;
        Ok(GuardOutcome::RedirectToLogin {
            redirect: path.to_string(),
        })
    }
}

fn is_public(path: &str) -> bool {
    path == LOGIN_PATH || path.starts_with("/login?")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn logged_in(expires_in: Duration) -> TokenStorage {
        let mut storage = TokenStorage::in_memory();
        storage.set(ACCESS_TOKEN, "abc");
        storage.set(REFRESH_TOKEN, "def");
        storage.set(TOKEN_TYPE, "Bearer");
        storage.set(MQTT_KEY, "mqtt");
        storage.set(USER_ID, "7");
        storage.set(
            TOKEN_EXPIRES_AT,
            (Utc::now() + expires_in).timestamp_millis().to_string(),
        );
        storage.set("theme", "dark");
        storage
    }

    #[test]
    fn test_valid_token_is_allowed() {
        let mut storage = logged_in(Duration::hours(1));
        let outcome = AuthGuard::new(&mut storage)
            .check("/quality/completeness", Utc::now())
            .unwrap();
        assert_eq!(outcome, GuardOutcome::Allow);
        assert_eq!(storage.get(ACCESS_TOKEN), Some("abc"));
    }

    #[test]
    fn test_expired_token_clears_all_keys() {
        let mut storage = logged_in(Duration::hours(-1));
        let outcome = AuthGuard::new(&mut storage)
            .check("/quality/flow?id=3", Utc::now())
            .unwrap();

        assert_eq!(
            outcome,
            GuardOutcome::RedirectToLogin {
                redirect: "/quality/flow?id=3".to_string()
            }
        );
        for key in AUTH_KEYS {
            assert!(storage.get(key).is_none(), "{} should be cleared", key);
        }
        // unrelated keys survive
        assert_eq!(storage.get("theme"), Some("dark"));
    }

    #[test]
    fn test_missing_token_redirects() {
        let mut storage = TokenStorage::in_memory();
        let outcome = AuthGuard::new(&mut storage).check("/system/user", Utc::now()).unwrap();
        assert!(matches!(outcome, GuardOutcome::RedirectToLogin { .. }));
    }

    #[test]
    fn test_login_is_public() {
        let mut storage = TokenStorage::in_memory();
        let outcome = AuthGuard::new(&mut storage).check(LOGIN_PATH, Utc::now()).unwrap();
        assert_eq!(outcome, GuardOutcome::Allow);
    }

    #[test]
    fn test_authorization_defaults_to_bearer() {
        let mut storage = TokenStorage::in_memory();
        storage.set(ACCESS_TOKEN, "xyz");
        assert_eq!(
            storage.authorization(),
            Some(("Bearer".to_string(), "xyz".to_string()))
        );
        assert!(storage.is_token_valid(Utc::now()));

        storage.set(TOKEN_EXPIRES_AT, "not-a-number");
        assert!(!storage.is_token_valid(Utc::now()));

        assert_eq!(storage.remove(TOKEN_EXPIRES_AT).as_deref(), Some("not-a-number"));
        assert!(storage.is_token_valid(Utc::now()));
    }

    #[test]
    fn test_file_round_trip_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("tokens.json");

        let mut storage = TokenStorage::load(&path).unwrap();
        storage.set(ACCESS_TOKEN, "abc");
        storage.set(USER_ID, "7");
        storage.save().unwrap();

        let mut reloaded = TokenStorage::load(&path).unwrap();
        assert_eq!(reloaded.get(USER_ID), Some("7"));

        reloaded.clear_auth().unwrap();
        let after = TokenStorage::load(&path).unwrap();
        assert!(after.get(ACCESS_TOKEN).is_none());
    }
}
