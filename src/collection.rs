//! Pieces shared by the command and device engines.
//!
//! Ids are assigned max-of-tail: the next id is one past the id of the *last*
//! element, not the largest id present. Sequences are only ever appended to,
//! so the two agree until an element is removed from the middle; after that a
//! freed id can be reissued only if it was the tail. Concurrent appends for
//! the same user may read the same tail and hand out the same id.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::StoreError;

/// An id as sent by a client: a JSON number or a numeric string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RawId {
    Int(i64),
    Text(String),
}

impl RawId {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            RawId::Int(n) => Some(*n),
            RawId::Text(s) => s.trim().parse().ok(),
        }
    }

    pub fn as_text(&self) -> Option<String> {
        match self {
            RawId::Int(n) => Some(n.to_string()),
            RawId::Text(s) => {
                let s = s.trim();
                (!s.is_empty()).then(|| s.to_string())
            }
        }
    }
}

/// `1` for an empty sequence, otherwise one past the tail's id.
pub fn next_after(tail: Option<i64>) -> Result<i64, StoreError> {
    nth_after(tail, 0)
}

/// The id `offset` places after [`next_after`]; a tail at the top of the id
/// range is reported as corrupt.
pub fn nth_after(tail: Option<i64>, offset: usize) -> Result<i64, StoreError> {
    i64::try_from(offset)
        .ok()
        .and_then(|n| tail.unwrap_or(0).checked_add(1)?.checked_add(n))
        .ok_or_else(|| StoreError::Corrupt(format!("id overflow after tail {tail:?}")))
}

/// Today's UTC date as `YYYY-MM-DD`.
pub fn today() -> String {
    OffsetDateTime::now_utc().date().to_string()
}

/// Non-empty text; whitespace-only counts as absent.
pub(crate) fn present(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.trim().is_empty())
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}
