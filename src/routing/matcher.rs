//! Route matching logic.
//!
//! # Responsibilities
//! - Walk a parsed pattern and a concrete URL path in lock-step
//! - Extract named capture values in declaration order
//! - Resolve mid-pattern rest captures with a bounded literal scan
//!
//! # Design Decisions
//! - Method comparison is case-insensitive (per HTTP spec); paths are not
//! - "No match" is `None`, never an error: it drives dispatcher flow
//! - No percent-decoding here; captures are the raw URL segments
//! - O(segments) with no backtracking beyond the bounded literal scan

use crate::routing::pattern::{PathPart, RoutePattern};

/// Captured route parameters, in pattern declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captures {
    values: Vec<(String, String)>,
}

impl Captures {
    /// Look up a capture by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Iterate captures in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Number of captured values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if nothing was captured.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn push(&mut self, name: &str, value: String) {
        self.values.push((name.to_string(), value));
    }
}

/// Split a request path into segments.
///
/// The leading slash is stripped; interior and trailing empty segments are
/// kept so that `/feeds//packages` is distinguishable from `/feeds/packages`.
fn segments(path: &str) -> Vec<&str> {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    if trimmed.is_empty() {
        Vec::new()
    } else {
        trimmed.split('/').collect()
    }
}

/// Match a request path against a pattern's path parts.
///
/// Returns the captured values, or `None` if the path does not match.
pub fn match_path(path: &str, parts: &[PathPart]) -> Option<Captures> {
    let segs = segments(path);
    let mut captures = Captures::default();

    let mut pi = 0; // part index
    let mut si = 0; // segment index

    while pi < parts.len() {
        match &parts[pi] {
            PathPart::Literal(lit) => {
                if si >= segs.len() || segs[si] != lit {
                    return None;
                }
                si += 1;
                pi += 1;
            }
            PathPart::Single(name) => {
                // Empty segments never match a capture (double-slash ambiguity).
                if si >= segs.len() || segs[si].is_empty() {
                    return None;
                }
                captures.push(name, segs[si].to_string());
                si += 1;
                pi += 1;
            }
            PathPart::Rest(name) => {
                if pi + 1 == parts.len() {
                    // Trailing rest: consume everything remaining.
                    if si >= segs.len() || segs[si..].iter().any(|s| s.is_empty()) {
                        return None;
                    }
                    captures.push(name, segs[si..].join("/"));
                    si = segs.len();
                    pi += 1;
                } else {
                    // Mid-pattern rest: scan forward for the next literal,
                    // leaving room for the pure captures between here and it.
                    let lit_offset = parts[pi + 1..].iter().position(|p| !p.is_capture())?;
                    let PathPart::Literal(lit) = &parts[pi + 1 + lit_offset] else {
                        return None;
                    };
                    let skip = lit_offset; // single captures between rest and literal

                    let found = (si + skip + 1..segs.len()).find(|&p| segs[p] == lit.as_str())?;
                    let end = found - skip;
                    if segs[si..end].iter().any(|s| s.is_empty()) {
                        return None;
                    }
                    captures.push(name, segs[si..end].join("/"));
                    si = end;
                    pi += 1;
                }
            }
        }
    }

    // Both the pattern and the path must be fully consumed.
    if si == segs.len() {
        Some(captures)
    } else {
        None
    }
}

/// Match an incoming request against a pattern.
///
/// Rejects on method mismatch (case-insensitive), then delegates to
/// [`match_path`].
pub fn match_request(method: &str, path: &str, pattern: &RoutePattern) -> Option<Captures> {
    if !method.eq_ignore_ascii_case(pattern.method()) {
        return None;
    }
    match_path(path, pattern.parts())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::pattern::RoutePattern;

    fn matches(route: &str, path: &str) -> Option<Captures> {
        let pattern = RoutePattern::parse(route).unwrap();
        match_path(path, pattern.parts())
    }

    #[test]
    fn literal_and_single_captures() {
        let caps = matches("GET /feeds/[feed_slug]/packages", "/feeds/acme/packages").unwrap();
        assert_eq!(caps.get("feed_slug"), Some("acme"));
        assert_eq!(caps.len(), 1);
    }

    #[test]
    fn segment_count_must_match() {
        assert!(matches("GET /feeds/[slug]/packages", "/feeds/acme").is_none());
        assert!(matches("GET /feeds/[slug]", "/feeds/acme/packages").is_none());
    }

    #[test]
    fn captures_are_verbatim_segments() {
        let caps = matches("GET /p/[name]", "/p/hello%20world").unwrap();
        // No decoding at this layer.
        assert_eq!(caps.get("name"), Some("hello%20world"));
    }

    #[test]
    fn rest_capture_consumes_suffix() {
        let caps = matches("GET /a/[...rest]", "/a/b/c/d").unwrap();
        assert_eq!(caps.get("rest"), Some("b/c/d"));
    }

    #[test]
    fn two_singles_after_storage_prefix() {
        let caps = matches("GET /-/storage/[category]/[id]", "/-/storage/pkg/abc.tar.gz").unwrap();
        assert_eq!(caps.get("category"), Some("pkg"));
        assert_eq!(caps.get("id"), Some("abc.tar.gz"));
    }

    #[test]
    fn mid_pattern_rest_stops_at_literal() {
        let caps = matches("GET /files/[...path]/meta", "/files/a/b/c/meta").unwrap();
        assert_eq!(caps.get("path"), Some("a/b/c"));
    }

    #[test]
    fn mid_pattern_rest_skips_following_captures() {
        let caps = matches(
            "GET /files/[...path]/[version]/meta",
            "/files/a/b/1.0.0/meta",
        )
        .unwrap();
        assert_eq!(caps.get("path"), Some("a/b"));
        assert_eq!(caps.get("version"), Some("1.0.0"));
    }

    #[test]
    fn rest_requires_at_least_one_segment() {
        assert!(matches("GET /a/[...rest]", "/a").is_none());
        assert!(matches("GET /files/[...path]/meta", "/files/meta").is_none());
    }

    #[test]
    fn rest_fails_without_its_literal() {
        assert!(matches("GET /files/[...path]/meta", "/files/a/b/c").is_none());
    }

    #[test]
    fn empty_segments_are_rejected() {
        assert!(matches("GET /feeds/[slug]/packages", "/feeds//packages").is_none());
    }

    #[test]
    fn trailing_slash_does_not_match() {
        assert!(matches("GET /feeds/[slug]", "/feeds/acme/").is_none());
    }

    #[test]
    fn root_pattern_matches_root() {
        let caps = matches("GET /", "/").unwrap();
        assert!(caps.is_empty());
    }

    #[test]
    fn capture_order_is_declaration_order() {
        let caps = matches("GET /[a]/[b]/[c]", "/1/2/3").unwrap();
        let order: Vec<&str> = caps.iter().map(|(n, _)| n).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn method_comparison_is_case_insensitive() {
        let pattern = RoutePattern::parse("GET /x").unwrap();
        assert!(match_request("get", "/x", &pattern).is_some());
        assert!(match_request("POST", "/x", &pattern).is_none());
    }
}
