//! Session credentials and their on-disk form
//!
//! Cookies are stored as a pretty-printed JSON object (name → value),
//! the token as a raw text file.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::Result;

/// Cookie carrying the chat session id
pub const SESSION_COOKIE: &str = "ds_session_id";

/// Cookies and bearer token captured from one login
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCredentials {
    pub cookies: BTreeMap<String, String>,
    pub token: Option<String>,
}

impl SessionCredentials {
    /// Build the cookie map from `(name, value)` pairs.
    ///
    /// Duplicate names overwrite earlier entries.
    pub fn from_cookie_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let cookies = pairs
            .into_iter()
            .map(|(name, value)| (name.into(), value.into()))
            .collect();

        Self {
            cookies,
            token: None,
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    /// Value of the `ds_session_id` cookie, if captured
    pub fn session_id(&self) -> Option<&str> {
        self.cookies.get(SESSION_COOKIE).map(String::as_str)
    }

    /// Write the cookie map as JSON with 2-space indentation
    pub fn save_cookies(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.cookies)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Write the raw token. Does nothing when no token was found.
    pub fn save_token(&self, path: impl AsRef<Path>) -> Result<()> {
        if let Some(token) = &self.token {
            std::fs::write(path, token)?;
        }
        Ok(())
    }

    /// Load previously saved credentials. A missing token file yields `token = None`.
    pub fn load(cookies_path: impl AsRef<Path>, token_path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(cookies_path)?;
        let cookies: BTreeMap<String, String> = serde_json::from_str(&content)?;

        let token = match std::fs::read_to_string(token_path) {
            Ok(token) if !token.is_empty() => Some(token),
            Ok(_) => None,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        Ok(Self { cookies, token })
    }
}

/// First `max_chars` characters of a secret, for status lines
pub fn preview(secret: &str, max_chars: usize) -> &str {
    match secret.char_indices().nth(max_chars) {
        Some((idx, _)) => &secret[..idx],
        None => secret,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_duplicate_cookie_names_last_wins() {
        let creds = SessionCredentials::from_cookie_pairs(vec![
            ("a", "1"),
            ("b", "2"),
            ("a", "3"),
        ]);
        assert_eq!(creds.cookies.len(), 2);
        assert_eq!(creds.cookies["a"], "3");
        assert!(creds.token.is_none());
    }

    #[test]
    fn test_save_cookies_preserves_names_and_values() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("cookies.json");

        let creds = SessionCredentials::from_cookie_pairs(vec![
            ("ds_session_id", "abc%3D%3D"),
            ("smidV2", "2024 value with spaces"),
            ("unicode", "välue"),
        ]);
        creds.save_cookies(&path)?;

        let content = std::fs::read_to_string(&path)?;
        assert!(content.contains("\n  \"ds_session_id\": \"abc%3D%3D\""));

        let parsed: BTreeMap<String, String> = serde_json::from_str(&content)?;
        assert_eq!(parsed, creds.cookies);

        Ok(())
    }

    #[test]
    fn test_save_token_raw() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("token.txt");

        let creds = SessionCredentials::default().with_token(Some("tok-123".to_string()));
        creds.save_token(&path)?;
        assert_eq!(std::fs::read_to_string(&path)?, "tok-123");

        Ok(())
    }

    #[test]
    fn test_save_token_none_writes_nothing() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("token.txt");

        SessionCredentials::default().save_token(&path)?;
        assert!(!path.exists());

        Ok(())
    }

    #[test]
    fn test_load_round_trip_without_token() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let cookies = temp_dir.path().join("cookies.json");
        let token = temp_dir.path().join("token.txt");

        let creds = SessionCredentials::from_cookie_pairs(vec![("ds_session_id", "xyz")]);
        creds.save_cookies(&cookies)?;

        let loaded = SessionCredentials::load(&cookies, &token)?;
        assert_eq!(loaded.session_id(), Some("xyz"));
        assert!(loaded.token.is_none());

        Ok(())
    }

    #[test]
    fn test_preview() {
        assert_eq!(preview("abcdef", 3), "abc");
        assert_eq!(preview("ab", 20), "ab");
        assert_eq!(preview("ünïcödé", 2), "ün");
    }
}
