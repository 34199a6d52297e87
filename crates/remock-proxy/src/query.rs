//! Pagination and sort options parsed from query-string parameters.
//!
//! Parsing never fails: malformed input degrades to defaults (`skip = 0`,
//! unbounded `limit`, no sort) rather than erroring. Structural validation of
//! the parsed options happens in the store, before any storage access.

use serde::Serialize;

/// Sort direction for one sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    /// SQL fragment for this direction.
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC",
        }
    }
}

/// One field of a sort specification, in significance order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

/// Normalized pagination/sort options.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryOpts {
    /// Sort keys in significance order; `None` means store insertion order.
    pub sort: Option<Vec<SortKey>>,
    /// Number of leading records to skip.
    pub skip: u64,
    /// Maximum number of records to return; `None` means unbounded.
    pub limit: Option<u64>,
}

impl QueryOpts {
    /// Parse options from a raw query string (`"sort=-a,b&skip=2&limit=10"`).
    ///
    /// An absent query string yields `None`. A `sort` value is a
    /// comma-separated field list where a `-` prefix means descending; empty
    /// tokens and a lone `-` are skipped. Non-numeric `skip` falls back to 0,
    /// non-numeric `limit` to unbounded.
    pub fn from_query_str(raw: Option<&str>) -> Option<Self> {
        let raw = raw?;
        let mut opts = QueryOpts::default();

        for pair in raw.split('&') {
            let (name, value) = match pair.split_once('=') {
                Some((name, value)) => (name, value),
                None => continue,
            };
            let value = urlencoding::decode(value)
                .map(|decoded| decoded.into_owned())
                .unwrap_or_else(|_| value.to_string());
            match name {
                "sort" => opts.sort = parse_sort(&value),
                "skip" => opts.skip = value.parse().unwrap_or(0),
                "limit" => opts.limit = value.parse().ok(),
                _ => {}
            }
        }

        Some(opts)
    }
}

fn parse_sort(raw: &str) -> Option<Vec<SortKey>> {
    let keys: Vec<SortKey> = raw
        .split(',')
        .filter_map(|token| {
            let token = token.trim();
            let (field, direction) = match token.strip_prefix('-') {
                Some(rest) => (rest, SortDirection::Descending),
                None => (token, SortDirection::Ascending),
            };
            if field.is_empty() {
                return None;
            }
            Some(SortKey {
                field: field.to_string(),
                direction,
            })
        })
        .collect();

    if keys.is_empty() {
        None
    } else {
        Some(keys)
    }
}
