//! Streamed chat fragments

use serde::{Deserialize, Serialize};
use std::io::BufRead;

use crate::{Error, Result};

/// Which sub-stream a fragment belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FragmentKind {
    /// Internal reasoning stream
    Think,
    /// Visible answer stream
    #[default]
    Response,
}

/// One labeled text chunk of a streamed reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatFragment {
    #[serde(default)]
    pub kind: FragmentKind,
    pub text: String,
}

impl ChatFragment {
    pub fn new(kind: FragmentKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }

    pub fn think(text: impl Into<String>) -> Self {
        Self::new(FragmentKind::Think, text)
    }

    pub fn response(text: impl Into<String>) -> Self {
        Self::new(FragmentKind::Response, text)
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

impl From<(FragmentKind, String)> for ChatFragment {
    fn from((kind, text): (FragmentKind, String)) -> Self {
        Self { kind, text }
    }
}

/// Read JSON-lines fragments (`{"kind": "THINK", "text": "..."}` per line).
///
/// Blank lines are skipped. A malformed line fails with its 1-based line number.
pub fn read_fragments<R: BufRead>(reader: R) -> Result<Vec<ChatFragment>> {
    let mut fragments = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let fragment = serde_json::from_str(&line)
            .map_err(|e| Error::Fragment(format!("line {}: {}", idx + 1, e)))?;
        fragments.push(fragment);
    }

    Ok(fragments)
}
