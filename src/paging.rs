//! Cursor pagination
//!
//! Cursors are opaque url-safe base64 tokens wrapping the entity name at a
//! page boundary. Names are unique per entity type and lists are ordered by
//! name, so a name pins a position without exposing offsets.
//!
//! Pagination is not snapshot-isolated across requests: writes between two
//! page fetches may shift boundaries. Each page and its `total` are read in
//! one transaction.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Encode a page boundary name as a cursor
pub fn encode_cursor(name: &str) -> String {
    URL_SAFE_NO_PAD.encode(name.as_bytes())
}

/// Decode a cursor back into the boundary name
pub fn decode_cursor(cursor: &str) -> Result<String> {
    let bytes = URL_SAFE_NO_PAD
        .decode(cursor.trim())
        .map_err(|e| Error::InvalidCursor(format!("{}: {}", cursor, e)))?;
    let name = String::from_utf8(bytes)
        .map_err(|_| Error::InvalidCursor(format!("{}: not valid UTF-8", cursor)))?;
    if name.is_empty() {
        return Err(Error::InvalidCursor(format!("{}: empty position", cursor)));
    }
    Ok(name)
}

/// Where a page starts relative to the ordered entity list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PagePosition {
    First,
    /// Entities named strictly after the boundary
    After(String),
    /// Entities named strictly before the boundary
    Before(String),
}

/// Caller-supplied page parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: usize,
    pub before: Option<String>,
    pub after: Option<String>,
}

impl PageRequest {
    pub fn first(limit: usize) -> Self {
        Self {
            limit,
            before: None,
            after: None,
        }
    }

    pub fn after(limit: usize, cursor: impl Into<String>) -> Self {
        Self {
            limit,
            before: None,
            after: Some(cursor.into()),
        }
    }

    pub fn before(limit: usize, cursor: impl Into<String>) -> Self {
        Self {
            limit,
            before: Some(cursor.into()),
            after: None,
        }
    }

    /// Validate the limit and decode whichever cursor is set
    pub fn position(&self, max_limit: usize) -> Result<PagePosition> {
        if self.limit == 0 || self.limit > max_limit {
            return Err(Error::InvalidInput(format!(
                "limit must be between 1 and {}, got {}",
                max_limit, self.limit
            )));
        }
        match (&self.before, &self.after) {
            (Some(_), Some(_)) => Err(Error::InvalidInput(
                "Only one of before or after cursor may be set".to_string(),
            )),
            (Some(before), None) => Ok(PagePosition::Before(decode_cursor(before)?)),
            (None, Some(after)) => Ok(PagePosition::After(decode_cursor(after)?)),
            (None, None) => Ok(PagePosition::First),
        }
    }
}

/// Cursor block of a result list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paging {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
    pub total: usize,
}

/// One page of entities plus the cursors to its neighbours.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultList<T> {
    pub data: Vec<T>,
    pub paging: Paging,
}

impl<T> ResultList<T> {
    pub fn new(data: Vec<T>, before: Option<String>, after: Option<String>, total: usize) -> Self {
        Self {
            data,
            paging: Paging { before, after, total },
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Boundary names of a fetched page, before they become cursors.
///
/// `rows` is the page as fetched in query order with one extra look-ahead
/// row; it is trimmed to `limit` and returned in ascending name order.
pub fn page_bounds<T>(
    mut rows: Vec<T>,
    position: &PagePosition,
    limit: usize,
    name_of: impl Fn(&T) -> &str,
) -> (Vec<T>, Option<String>, Option<String>) {
    let has_more = rows.len() > limit;
    rows.truncate(limit);

    match position {
        PagePosition::Before(_) => {
            rows.reverse();
            let before = if has_more {
                rows.first().map(|r| encode_cursor(name_of(r)))
            } else {
                None
            };
            let after = rows.last().map(|r| encode_cursor(name_of(r)));
            (rows, before, after)
        }
        PagePosition::After(_) => {
            let before = rows.first().map(|r| encode_cursor(name_of(r)));
            let after = if has_more {
                rows.last().map(|r| encode_cursor(name_of(r)))
            } else {
                None
            };
            (rows, before, after)
        }
        PagePosition::First => {
            let after = if has_more {
                rows.last().map(|r| encode_cursor(name_of(r)))
            } else {
                None
            };
            (rows, None, after)
        }
    }
}
