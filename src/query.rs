// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Incremental pull-query construction.
//!
//! Builds the remote filter predicate for pull synchronization: always scoped
//! to the owner, plus a strictly-greater-than watermark filter when an
//! incremental window exists. Construction is pure; nothing here executes
//! the query.
//!
//! # Example
//!
//! ```
//! use tagsync::query::{Filter, PullQuery};
//!
//! // Full resync: owner scope only
//! let full = PullQuery::incremental("tags", "owner-1", 0);
//! assert_eq!(full.filters.len(), 1);
//!
//! // Incremental: adds exactly one updated_at > watermark filter
//! let inc = PullQuery::incremental("tags", "owner-1", 1000);
//! assert_eq!(inc.filters.len(), 2);
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Remote column holding the owner scope.
pub const OWNER_COLUMN: &str = "owner_id";
/// Remote column holding the update timestamp.
pub const UPDATED_AT_COLUMN: &str = "updated_at";

/// A single filter predicate on a remote column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
}

/// Supported remote-store comparison operators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FilterOp {
    /// Equality on a text column.
    Eq(String),
    /// Strictly greater-than on a numeric column.
    Gt(i64),
}

impl Filter {
    #[must_use]
    pub fn eq(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            op: FilterOp::Eq(value.into()),
        }
    }

    #[must_use]
    pub fn gt(column: impl Into<String>, value: i64) -> Self {
        Self {
            column: column.into(),
            op: FilterOp::Gt(value),
        }
    }

    /// Evaluate this filter against a JSON row.
    #[must_use]
    pub fn matches(&self, row: &Value) -> bool {
        match &self.op {
            FilterOp::Eq(want) => row
                .get(&self.column)
                .and_then(Value::as_str)
                .is_some_and(|got| got == want),
            FilterOp::Gt(floor) => row
                .get(&self.column)
                .and_then(Value::as_i64)
                .is_some_and(|got| got > *floor),
        }
    }
}

/// A composed pull request against one remote table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullQuery {
    pub table: String,
    pub filters: Vec<Filter>,
}

impl PullQuery {
    /// Build the incremental pull query for `(table, owner, since)`.
    ///
    /// `since == 0` deliberately means a full pull with no timestamp
    /// predicate; any positive watermark adds exactly one strictly
    /// greater-than filter on [`UPDATED_AT_COLUMN`].
    #[must_use]
    pub fn incremental(table: impl Into<String>, owner_id: &str, since: i64) -> Self {
        let mut filters = vec![Filter::eq(OWNER_COLUMN, owner_id)];
        if since > 0 {
            filters.push(Filter::gt(UPDATED_AT_COLUMN, since));
        }
        Self {
            table: table.into(),
            filters,
        }
    }

    /// Evaluate all filters against a JSON row (AND semantics).
    #[must_use]
    pub fn matches(&self, row: &Value) -> bool {
        self.filters.iter().all(|f| f.matches(row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_zero_since_has_no_timestamp_filter() {
        let q = PullQuery::incremental("tags", "o1", 0);
        assert_eq!(q.filters, vec![Filter::eq(OWNER_COLUMN, "o1")]);
    }

    #[test]
    fn test_positive_since_adds_exactly_one_gt_filter() {
        let q = PullQuery::incremental("pages", "o1", 500);
        assert_eq!(q.filters.len(), 2);
        let gt: Vec<_> = q
            .filters
            .iter()
            .filter(|f| matches!(f.op, FilterOp::Gt(_)))
            .collect();
        assert_eq!(gt.len(), 1);
        assert_eq!(gt[0].column, UPDATED_AT_COLUMN);
        assert_eq!(gt[0].op, FilterOp::Gt(500));
    }

    #[test]
    fn test_gt_is_strict() {
        let q = PullQuery::incremental("tags", "o1", 1000);
        let at_watermark = json!({"owner_id": "o1", "updated_at": 1000});
        let past_watermark = json!({"owner_id": "o1", "updated_at": 1001});
        assert!(!q.matches(&at_watermark));
        assert!(q.matches(&past_watermark));
    }

    #[test]
    fn test_owner_scope_always_applied() {
        let q = PullQuery::incremental("tags", "o1", 0);
        assert!(q.matches(&json!({"owner_id": "o1", "updated_at": 1})));
        assert!(!q.matches(&json!({"owner_id": "o2", "updated_at": 1})));
    }

    #[test]
    fn test_missing_columns_do_not_match() {
        let q = PullQuery::incremental("tags", "o1", 5);
        assert!(!q.matches(&json!({"owner_id": "o1"})));
        assert!(!q.matches(&json!({"updated_at": 10})));
    }

    #[test]
    fn test_construction_is_value_only() {
        // Same inputs, same query; nothing is executed or mutated.
        let a = PullQuery::incremental("tags", "o1", 7);
        let b = PullQuery::incremental("tags", "o1", 7);
        assert_eq!(a, b);
    }
}
