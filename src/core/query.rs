//! Query-string parsing into typed query directives
//!
//! This module turns the raw key/value pairs of a request query string into
//! a [`QueryDirective`]: pagination, sort keys, a field allow-list, and a
//! residual equality filter for everything else.
//!
//! Parsing is deliberately permissive: malformed input degrades to defaults
//! rather than failing, so `parse` never returns an error.
//!
//! # Example
//! ```rust,ignore
//! // GET /posts?page=2&limit=5&sort=-likes&fields=title,likes&author=42
//! let directive = QueryDirective::parse(query_pairs);
//! assert_eq!(directive.page, 2);
//! assert_eq!(directive.limit, 5);
//! // directive.filter contains {"author": "42"}
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Default page number when `page` is absent or malformed
pub const DEFAULT_PAGE: u64 = 1;

/// Default page size when `limit` is absent or malformed
pub const DEFAULT_LIMIT: u64 = 10;

/// Query keys consumed by pagination/sort/projection parsing.
///
/// These never appear in the residual filter.
pub const RESERVED_KEYS: [&str; 4] = ["page", "limit", "sort", "fields"];

/// Sort direction for a single sort key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// A single (field, direction) pair from the `sort` parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    pub order: SortOrder,
}

impl SortKey {
    /// Parse one entry of the comma-separated `sort` list.
    ///
    /// A leading `-` marks descending order. Empty entries (including a
    /// bare `-`) yield `None`.
    fn parse(entry: &str) -> Option<Self> {
        let entry = entry.trim();
        let (field, order) = match entry.strip_prefix('-') {
            Some(rest) => (rest, SortOrder::Descending),
            None => (entry, SortOrder::Ascending),
        };

        if field.is_empty() {
            return None;
        }

        Some(Self {
            field: field.to_string(),
            order,
        })
    }
}

/// Parsed query directive: pagination, sort, projection, residual filter
///
/// Built fresh per request by [`QueryDirective::parse`] and immutable
/// afterwards. Invariants:
/// - `page` and `limit` are always ≥ 1
/// - `filter` never contains a reserved key (`page`, `limit`, `sort`, `fields`)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryDirective {
    /// Page number, 1-based
    pub page: u64,

    /// Items per page
    ///
    /// No upper bound is enforced at this layer; capping is caller policy.
    pub limit: u64,

    /// Ordered sort keys from the `sort` parameter
    pub sort: Vec<SortKey>,

    /// Field allow-list from the `fields` parameter
    ///
    /// `None` means the caller's default projection applies.
    pub fields: Option<Vec<String>>,

    /// Residual equality filter: every query key not reserved above,
    /// value kept as-is (storage backends perform their own coercion)
    pub filter: IndexMap<String, String>,
}

impl QueryDirective {
    /// Parse raw query pairs into a directive.
    ///
    /// Accepts any iterator of string-like pairs, so it works directly with
    /// `axum::extract::Query<Vec<(String, String)>>` as well as plain maps.
    /// Repeated keys keep the last value.
    pub fn parse<I, K, V>(raw: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut directive = Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
            ..Self::default()
        };

        for (key, value) in raw {
            let (key, value) = (key.as_ref(), value.as_ref());
            match key {
                "page" => directive.page = parse_positive(value, DEFAULT_PAGE),
                "limit" => directive.limit = parse_positive(value, DEFAULT_LIMIT),
                "sort" => {
                    directive.sort = value.split(',').filter_map(SortKey::parse).collect();
                }
                "fields" => {
                    let fields: Vec<String> = value
                        .split(',')
                        .map(str::trim)
                        .filter(|f| !f.is_empty())
                        .map(str::to_string)
                        .collect();
                    directive.fields = if fields.is_empty() { None } else { Some(fields) };
                }
                _ => {
                    directive.filter.insert(key.to_string(), value.to_string());
                }
            }
        }

        directive
    }

    /// Number of documents to skip for the current page
    pub fn skip(&self) -> u64 {
        (self.page - 1) * self.limit
    }
}

/// Parse a positive integer, falling back to `default` for non-numeric,
/// zero, or negative input.
fn parse_positive(value: &str, default: u64) -> u64 {
    match value.trim().parse::<i64>() {
        Ok(n) if n >= 1 => n as u64,
        _ => default,
    }
}
