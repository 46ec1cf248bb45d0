//! Common types used throughout ctm-sync
//!
//! This module contains shared type definitions, type aliases,
//! and utility types used across multiple modules.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// JSON object type
pub type JsonObject = serde_json::Map<String, JsonValue>;

// ============================================================================
// Write Disposition
// ============================================================================

/// How a record set should be written to a warehouse table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteDisposition {
    /// Drop any existing table contents and write the batch as the full table
    #[default]
    Replace,
    /// Add the batch to the existing rows
    Append,
}

impl fmt::Display for WriteDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Replace => f.write_str("replace"),
            Self::Append => f.write_str("append"),
        }
    }
}

// ============================================================================
// Failure Policy
// ============================================================================

/// What a paginated fetch does when the upstream answers with a non-success status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Abort the whole run by returning the error
    #[default]
    FailFast,
    /// Log, keep what was accumulated for this scope, and let the caller move on
    SkipOnError,
}

// ============================================================================
// Account Identifier
// ============================================================================

/// Vendor-assigned account identifier
///
/// The vendor uses integers, but rows read back from a warehouse may carry
/// them as text, so both shapes are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AccountId {
    /// Numeric identifier
    Int(i64),
    /// Text identifier
    Text(String),
}

impl AccountId {
    /// Read an identifier out of a JSON value
    pub fn from_json(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::Number(n) => n.as_i64().map(Self::Int),
            JsonValue::String(s) if !s.is_empty() => Some(
                s.parse::<i64>()
                    .map_or_else(|_| Self::Text(s.clone()), Self::Int),
            ),
            _ => None,
        }
    }

    /// Convert to a JSON value for tagging records
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Int(i) => JsonValue::from(*i),
            Self::Text(s) => JsonValue::String(s.clone()),
        }
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for AccountId {
    fn from(id: i64) -> Self {
        Self::Int(id)
    }
}

/// An account as the call jobs see it: identifier plus display name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRef {
    /// Account identifier
    pub id: AccountId,
    /// Display name, when the warehouse row carries one
    pub name: Option<String>,
}

impl AccountRef {
    /// Create a new account reference
    pub fn new(id: impl Into<AccountId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: Some(name.into()),
        }
    }

    /// Build from a warehouse row holding `id` and `name`
    pub fn from_row(row: &JsonObject) -> Option<Self> {
        let id = row.get("id").and_then(AccountId::from_json)?;
        let name = row.get("name").and_then(|v| v.as_str()).map(String::from);
        Some(Self { id, name })
    }

    /// Name or an empty string
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }
}

// ============================================================================
// Utilities
// ============================================================================

/// Extension trait for Option<String> to handle empty strings
pub trait OptionStringExt {
    /// Returns None if the string is empty
    fn none_if_empty(self) -> Option<String>;
}

impl OptionStringExt for Option<String> {
    fn none_if_empty(self) -> Option<String> {
        self.filter(|s| !s.is_empty())
    }
}

impl OptionStringExt for String {
    fn none_if_empty(self) -> Option<String> {
        if self.is_empty() {
            None
        } else {
            Some(self)
        }
    }
}
