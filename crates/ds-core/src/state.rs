//! Persisted session state (last successful login)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{Error, Result};

/// State kept between runs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub last_login: Option<DateTime<Utc>>,
}

impl SessionState {
    /// Load state from `path`; a missing file is an empty state
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Stamp the current time as the last login and persist it
    pub fn record_login(path: impl AsRef<Path>) -> Result<DateTime<Utc>> {
        Self::record_login_at(path, Utc::now())
    }

    pub fn record_login_at(path: impl AsRef<Path>, at: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let path = path.as_ref();
        let mut state = match Self::load(path) {
            Ok(state) => state,
            Err(Error::Json(e)) => {
                tracing::warn!("Replacing unreadable state in {}: {}", path.display(), e);
                Self::default()
            }
            Err(e) => return Err(e),
        };
        state.last_login = Some(at);
        state.save(path)?;

        tracing::debug!("Recorded login time {} in {}", at.to_rfc3339(), path.display());
        Ok(at)
    }

    /// Time elapsed since the last login
    pub fn login_age(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        self.last_login.map(|at| now - at)
    }
}
