//! Property-based tests for the sync engine's pure building blocks.
//!
//! Uses proptest to generate random/malformed inputs and verify that URL
//! canonicalization, query construction, and record (de)serialization never
//! panic and hold their invariants on the whole input space.
//!
//! Run with: `cargo test --test proptest_sync`

use proptest::prelude::*;
use serde_json::{json, Value};

use tagsync::query::{FilterOp, PullQuery, OWNER_COLUMN, UPDATED_AT_COLUMN};
use tagsync::url_norm::{canonical_key, same_resource};
use tagsync::{Record, Tag, TaggedPage};

// =============================================================================
// Strategies for generating test data
// =============================================================================

/// Generate a well-formed http(s) URL from structured parts.
fn url_strategy() -> impl Strategy<Value = String> {
    (
        prop_oneof![Just("http"), Just("https")],
        "[a-z]{1,10}(\\.[a-z]{2,6}){1,2}", // host like "example.com"
        prop::collection::vec("[a-z0-9]{1,8}", 0..4), // path segments
        prop::collection::vec(("[a-su-z][a-z0-9]{0,7}", "[a-z0-9]{0,8}"), 0..3), // query pairs, never named "t"
    )
        .prop_map(|(scheme, host, segments, pairs)| {
            let mut url = format!("{scheme}://{host}/{}", segments.join("/"));
            if !pairs.is_empty() {
                let query: Vec<String> =
                    pairs.iter().map(|(k, v)| format!("{k}={v}")).collect();
                url.push('?');
                url.push_str(&query.join("&"));
            }
            url
        })
}

/// Generate arbitrary JSON values (including shapes no record matches).
fn arbitrary_json_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| Value::Number(n.into())),
        ".*".prop_map(Value::String),
    ];

    leaf.prop_recursive(4, 64, 10, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..10).prop_map(Value::Array),
            prop::collection::hash_map(".*", inner, 0..10)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

// =============================================================================
// URL Canonicalization Properties
// =============================================================================

proptest! {
    /// Canonicalization is total: any string in, some string out, no panic.
    #[test]
    fn fuzz_canonical_key_never_panics(raw in ".*") {
        let _ = canonical_key(&raw);
    }

    /// Canonicalizing an already-canonical key changes nothing.
    #[test]
    fn prop_canonical_key_idempotent(url in url_strategy()) {
        let once = canonical_key(&url);
        prop_assert_eq!(canonical_key(&once), once.clone());
    }

    /// The volatile timestamp parameter never affects resource identity.
    #[test]
    fn prop_volatile_param_never_changes_identity(
        url in url_strategy(),
        t1 in "[0-9]{1,12}",
        t2 in "[0-9]{1,12}",
    ) {
        let sep = if url.contains('?') { '&' } else { '?' };
        let a = format!("{url}{sep}t={t1}");
        let b = format!("{url}{sep}t={t2}");
        prop_assert!(same_resource(&a, &b));
        prop_assert!(same_resource(&a, &url));
    }

    /// Fragments never affect resource identity.
    #[test]
    fn prop_fragment_never_changes_identity(
        url in url_strategy(),
        fragment in "[a-z0-9-]{0,16}",
    ) {
        let with_fragment = format!("{url}#{fragment}");
        prop_assert!(same_resource(&with_fragment, &url));
    }

    /// Non-volatile query parameters are preserved: two URLs that differ in a
    /// meaningful parameter value stay distinct.
    #[test]
    fn prop_meaningful_params_kept_distinct(
        url in url_strategy(),
        key in "[a-su-z][a-z0-9]{0,7}",
        v1 in "[a-z0-9]{1,8}",
        v2 in "[a-z0-9]{1,8}",
    ) {
        prop_assume!(v1 != v2);
        let sep = if url.contains('?') { '&' } else { '?' };
        let a = format!("{url}{sep}{key}={v1}");
        let b = format!("{url}{sep}{key}={v2}");
        prop_assert!(!same_resource(&a, &b));
    }
}

// =============================================================================
// Pull Query Properties
// =============================================================================

proptest! {
    /// The owner filter is present for every (owner, since) combination, and
    /// the timestamp filter appears exactly when a positive watermark exists.
    #[test]
    fn prop_query_filter_shape(
        owner in "[a-z0-9-]{1,24}",
        since in any::<i64>(),
    ) {
        let q = PullQuery::incremental("tags", &owner, since);

        let owner_filters = q
            .filters
            .iter()
            .filter(|f| f.column == OWNER_COLUMN && f.op == FilterOp::Eq(owner.clone()))
            .count();
        prop_assert_eq!(owner_filters, 1);

        let gt_filters = q
            .filters
            .iter()
            .filter(|f| f.column == UPDATED_AT_COLUMN && matches!(f.op, FilterOp::Gt(_)))
            .count();
        if since > 0 {
            prop_assert_eq!(gt_filters, 1);
            prop_assert_eq!(q.filters.len(), 2);
        } else {
            prop_assert_eq!(gt_filters, 0);
            prop_assert_eq!(q.filters.len(), 1);
        }
    }

    /// The watermark window is strict: rows at or below `since` never match,
    /// rows above it match whenever the owner agrees.
    #[test]
    fn prop_watermark_window_is_strict(
        since in 1i64..1_000_000_000,
        below in 0i64..1_000_000,
        above in 1i64..1_000_000,
    ) {
        let q = PullQuery::incremental("tags", "o1", since);

        let at = json!({"owner_id": "o1", "updated_at": since});
        let under = json!({"owner_id": "o1", "updated_at": since - below});
        let over = json!({"owner_id": "o1", "updated_at": since + above});
        prop_assert!(!q.matches(&at));
        prop_assert!(!q.matches(&under));
        prop_assert!(q.matches(&over));

        let wrong_owner = json!({"owner_id": "o2", "updated_at": since + above});
        prop_assert!(!q.matches(&wrong_owner));
    }

    /// Filter evaluation is total over arbitrary JSON rows.
    #[test]
    fn fuzz_query_matches_never_panics(
        since in any::<i64>(),
        row in arbitrary_json_strategy(),
    ) {
        let q = PullQuery::incremental("pages", "o1", since);
        let _ = q.matches(&row);
    }
}

// =============================================================================
// Record Invariant Tests
// =============================================================================

proptest! {
    /// Record deserialization never panics on arbitrary bytes.
    #[test]
    fn fuzz_record_from_random_bytes(bytes in prop::collection::vec(any::<u8>(), 0..4096)) {
        let _ = serde_json::from_slice::<Tag>(&bytes);
        let _ = serde_json::from_slice::<TaggedPage>(&bytes);
    }

    /// Record deserialization handles arbitrary JSON shapes gracefully.
    #[test]
    fn fuzz_record_from_arbitrary_json(row in arbitrary_json_strategy()) {
        let _ = serde_json::from_value::<Tag>(row.clone());
        let _ = serde_json::from_value::<TaggedPage>(row);
    }

    /// `touch` is strictly monotonic and never drops below `created_at`,
    /// whatever state the timestamps start in.
    #[test]
    fn prop_touch_monotonic(
        created_at in 0i64..4_000_000_000_000,
        updated_at in 0i64..4_000_000_000_000,
    ) {
        let mut tag = Tag::new("probe");
        tag.created_at = created_at;
        tag.updated_at = updated_at;

        tag.touch();
        prop_assert!(tag.updated_at > updated_at);
        prop_assert!(tag.updated_at >= tag.created_at);
    }

    /// Tombstoning always flags and strictly bumps, so a tombstone wins a
    /// last-writer-wins merge against the record it replaced.
    #[test]
    fn prop_tombstone_outranks_predecessor(
        created_at in 0i64..4_000_000_000_000,
        updated_at in 0i64..4_000_000_000_000,
    ) {
        let mut page = TaggedPage::new("https://example.com/p", "P");
        page.created_at = created_at;
        page.updated_at = updated_at;

        page.tombstone();
        prop_assert!(page.is_deleted());
        prop_assert!(page.updated_at > updated_at);
    }

    /// Tag serialization round-trips through the remote's JSON row shape.
    #[test]
    fn prop_tag_roundtrip(
        name in ".{0,64}",
        bindings in prop::collection::vec("[a-f0-9-]{1,36}", 0..8),
        deleted in any::<bool>(),
    ) {
        let mut tag = Tag::new(name);
        tag.bindings = bindings;
        tag.deleted = deleted;

        let row = serde_json::to_value(&tag).unwrap();
        let back: Tag = serde_json::from_value(row).unwrap();
        prop_assert_eq!(back, tag);
    }
}
