//! Session namespacing: object-store keys and workspace names derived from
//! an opaque session id.
//!
//! Every key is `"{session}/{uuid}_{filename}"`, with a fresh UUID v4 per
//! call, so two uploads of the same file from the same session never land on
//! the same key and no write ever overwrites another. Workspace names add the
//! task id because one session can have several tasks in flight.

use crate::error::CompressError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

static SESSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,128}$").expect("valid session regex"));

static UNSAFE_FILENAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9._-]").expect("valid filename regex"));

const MAX_FILENAME_LEN: usize = 120;

/// Opaque identifier scoping one client's objects and workspaces.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Mint a new random session id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Accept a caller-supplied id if it is safe to use as a key prefix.
    pub fn parse(raw: &str) -> Result<Self, CompressError> {
        let raw = raw.trim();
        if SESSION_RE.is_match(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(CompressError::InvalidSession(raw.to_string()))
        }
    }

    /// Use the supplied id, or mint one when absent or blank.
    pub fn parse_or_generate(raw: Option<&str>) -> Result<Self, CompressError> {
        match raw.map(str::trim).filter(|s| !s.is_empty()) {
            Some(s) => Self::parse(s),
            None => Ok(Self::generate()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key prefix every object of this session starts with.
    pub fn key_prefix(&self) -> String {
        format!("{}/", self.0)
    }

    /// True when `key` lives in this session's namespace.
    pub fn owns_key(&self, key: &str) -> bool {
        key.starts_with(&self.key_prefix())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which artifact a key names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyVariant {
    /// The uploaded source document.
    Original,
    /// The recompressed result.
    Compressed,
}

/// Derive a fresh, never-reused object key under the session namespace.
pub fn derive_key(session: &SessionId, variant: KeyVariant, filename: &str) -> String {
    let id = Uuid::new_v4();
    let name = sanitize_filename(filename);
    match variant {
        KeyVariant::Original => format!("{}/{}_{}", session, id, name),
        KeyVariant::Compressed => format!("{}/{}_compressed_{}", session, id, name),
    }
}

/// Workspace directory prefix scoped to one task of one session.
pub fn workspace_prefix(session: &SessionId, task_id: &Uuid) -> String {
    format!("pdfcompress-{}-{}-", session, task_id.simple())
}

/// Make a client filename safe to embed in a key or a local path.
///
/// Path separators and anything outside `[A-Za-z0-9._-]` become `_`, leading
/// dots are stripped so the result is never hidden or `..`, and the stem is
/// truncated so keys stay bounded. The extension is kept.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned = UNSAFE_FILENAME_CHARS.replace_all(base, "_");
    let cleaned = cleaned.trim_start_matches('.');

    let mut out = if cleaned.is_empty() {
        "document.pdf".to_string()
    } else {
        cleaned.to_string()
    };

    if out.len() > MAX_FILENAME_LEN {
        let ext = out
            .rfind('.')
            .map(|i| out[i..].to_string())
            .filter(|e| e.len() <= 10)
            .unwrap_or_default();
        out.truncate(MAX_FILENAME_LEN - ext.len());
        out.push_str(&ext);
    }
    out
}
