//! Scanned-code to bike-id resolution.
//!
//! The QR layer is a black box that hands over a decoded string; this
//! module decides what that string binds to. Two resolvers ship: the
//! direct one (the code is the bike id) and a table-backed one for
//! deployments with an indirection layer. Callers are identical across
//! the two.

use std::collections::HashMap;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    #[error("scanned code does not resolve to a bike: {0:?}")]
    UnknownCode(String),
}

/// Resolves a scanned code into the bike id it binds to.
pub trait CodeResolver: Send + Sync {
    fn resolve(&self, scanned_code: &str) -> Result<String, BindingError>;
}

// ─── Direct resolver ──────────────────────────────────────────────

/// The scanned code IS the bike id.
///
/// Accepts any non-empty code free of path separators and control
/// characters; those would corrupt store keys.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectResolver;

impl CodeResolver for DirectResolver {
    fn resolve(&self, scanned_code: &str) -> Result<String, BindingError> {
        let code = scanned_code.trim();
        if code.is_empty() || code.chars().any(|c| c == '/' || c.is_control()) {
            return Err(BindingError::UnknownCode(scanned_code.to_string()));
        }
        Ok(code.to_string())
    }
}

// ─── Table resolver ───────────────────────────────────────────────

/// Explicit code-to-bike lookup table.
#[derive(Debug, Default, Clone)]
pub struct TableResolver {
    table: HashMap<String, String>,
}

impl TableResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, code: impl Into<String>, bike_id: impl Into<String>) {
        self.table.insert(code.into(), bike_id.into());
    }
}

impl FromIterator<(String, String)> for TableResolver {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            table: iter.into_iter().collect(),
        }
    }
}

impl CodeResolver for TableResolver {
    fn resolve(&self, scanned_code: &str) -> Result<String, BindingError> {
        self.table
            .get(scanned_code)
            .cloned()
            .ok_or_else(|| BindingError::UnknownCode(scanned_code.to_string()))
    }
}

// ─── Tests ────────────────────────────────────────────────────────
