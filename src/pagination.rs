//! Per-request pagination: page number, page size and sort expression.
//! Values travel with each collection read; nothing is stored between calls.

use crate::case::to_snake_case;
use crate::error::AppError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 100;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub limit: i64,
    pub page: i64,
    pub sort: String,
}

impl Pagination {
    pub fn new(limit: i64, page: i64, sort: impl Into<String>) -> Self {
        Pagination {
            limit,
            page,
            sort: sort.into(),
        }
    }

    /// Read `page`, `limit` and `sort` from query parameters. Unparseable numbers count as unset.
    pub fn from_query(params: &HashMap<String, String>) -> Self {
        let int = |key: &str| params.get(key).and_then(|v| v.trim().parse::<i64>().ok()).unwrap_or(0);
        Pagination {
            limit: int("limit"),
            page: int("page"),
            sort: params.get("sort").cloned().unwrap_or_default(),
        }
    }

    /// Page size: 10 when unset or non-positive, capped at 100.
    pub fn page_size(&self) -> i64 {
        match self.limit {
            l if l > MAX_LIMIT => MAX_LIMIT,
            l if l <= 0 => DEFAULT_LIMIT,
            l => l,
        }
    }

    /// Page number: 1 when unset or non-positive.
    pub fn page_number(&self) -> i64 {
        if self.page <= 0 {
            DEFAULT_PAGE
        } else {
            self.page
        }
    }

    /// `(offset, limit)` for the SQL query.
    pub fn offset_limit(&self) -> (i64, i64) {
        let limit = self.page_size();
        let offset = (self.page_number() - 1).saturating_mul(limit);
        (offset, limit)
    }

    pub fn sort_keys(&self) -> Result<Vec<SortKey>, AppError> {
        parse_sort(&self.sort)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub column: String,
    pub direction: SortDirection,
}

fn sort_item_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*([A-Za-z_][A-Za-z0-9_]*)(?:\s+(asc|desc))?\s*$").expect("sort item pattern is valid")
    })
}

/// Parse `"name desc, createdAt"` into sort keys. Column names are converted to snake_case.
pub fn parse_sort(sort: &str) -> Result<Vec<SortKey>, AppError> {
    if sort.trim().is_empty() {
        return Ok(Vec::new());
    }
    sort.split(',')
        .map(|item| {
            let caps = sort_item_pattern()
                .captures(item)
                .ok_or_else(|| AppError::BadRequest(format!("invalid sort expression: {}", item.trim())))?;
            let direction = match caps.get(2).map(|m| m.as_str().to_ascii_lowercase()) {
                Some(d) if d == "desc" => SortDirection::Desc,
                _ => SortDirection::Asc,
            };
            Ok(SortKey {
                column: to_snake_case(&caps[1]),
                direction,
            })
        })
        .collect()
}
