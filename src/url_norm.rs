// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! URL canonicalization for resource identity.
//!
//! Two records refer to the same logical page iff their canonical keys are
//! equal, regardless of entity id. Canonicalization keeps scheme, lowercased
//! host, path, and every query parameter except the single volatile timestamp
//! parameter (`t`) that repeat visits append; the fragment is dropped.
//!
//! Only that one parameter is special-cased. Dropping everything would
//! conflate distinct pages that differ by meaningful query parameters.
//!
//! # Example
//!
//! ```
//! use tagsync::url_norm::{canonical_key, same_resource};
//!
//! assert!(same_resource(
//!     "https://example.com/page?t=123",
//!     "https://example.com/page?t=456",
//! ));
//! assert_ne!(
//!     canonical_key("https://example.com/page1"),
//!     canonical_key("https://example.com/page2"),
//! );
//! ```

use url::Url;

/// The volatile timestamp query parameter stripped during canonicalization.
pub const VOLATILE_QUERY_PARAM: &str = "t";

/// Compute the canonical comparison key for a raw URL.
///
/// Total: never fails. Malformed input falls back to a best-effort transform
/// (everything before the first `?`).
#[must_use]
pub fn canonical_key(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut parsed) => {
            let kept: Vec<(String, String)> = parsed
                .query_pairs()
                .filter(|(k, _)| k != VOLATILE_QUERY_PARAM)
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();

            if kept.is_empty() {
                parsed.set_query(None);
            } else {
                parsed
                    .query_pairs_mut()
                    .clear()
                    .extend_pairs(kept.iter().map(|(k, v)| (k.as_str(), v.as_str())));
            }
            parsed.set_fragment(None);
            // Url already lowercases the host during parsing.
            parsed.to_string()
        }
        Err(_) => raw.split('?').next().unwrap_or(raw).to_string(),
    }
}

/// Whether two raw URLs identify the same logical page.
#[must_use]
pub fn same_resource(a: &str, b: &str) -> bool {
    canonical_key(a) == canonical_key(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volatile_param_stripped() {
        assert_eq!(
            canonical_key("https://example.com/page?t=123"),
            canonical_key("https://example.com/page?t=456"),
        );
    }

    #[test]
    fn test_distinct_paths_stay_distinct() {
        assert_ne!(
            canonical_key("https://example.com/page1"),
            canonical_key("https://example.com/page2"),
        );
    }

    #[test]
    fn test_meaningful_params_kept() {
        assert_ne!(
            canonical_key("https://example.com/search?q=rust"),
            canonical_key("https://example.com/search?q=zig"),
        );
    }

    #[test]
    fn test_volatile_stripped_among_others() {
        assert_eq!(
            canonical_key("https://example.com/search?q=rust&t=111"),
            canonical_key("https://example.com/search?q=rust&t=222"),
        );
    }

    #[test]
    fn test_host_lowercased() {
        assert!(same_resource(
            "https://Example.COM/page",
            "https://example.com/page",
        ));
    }

    #[test]
    fn test_fragment_dropped() {
        assert!(same_resource(
            "https://example.com/page#section-2",
            "https://example.com/page",
        ));
    }

    #[test]
    fn test_malformed_input_does_not_fail() {
        // Not parseable as a URL - best-effort split on '?'
        assert_eq!(canonical_key("not a url?t=5"), "not a url");
        assert_eq!(canonical_key(""), "");
        assert_eq!(canonical_key("???"), "");
    }

    #[test]
    fn test_same_resource() {
        assert!(same_resource(
            "https://example.com/a?t=1",
            "https://example.com/a",
        ));
        assert!(!same_resource(
            "https://example.com/a",
            "https://example.com/b",
        ));
    }
}
