//! Pathname policy: decides whether a path is reported, and as what.
//!
//! Patterns are globs where `*` stands for exactly one non-empty path
//! segment. Everything else in a pattern is literal, and a pattern must match
//! the whole path.
//!
//! Skip patterns win over mask patterns. Among mask patterns the first match
//! in declaration order is reported verbatim, so `/users/42` under the mask
//! `/users/*` is reported as `/users/*`.

use regex::Regex;
use tracing::warn;

use crate::error::{Result, TrackerError};

/// Outcome of running a raw path through the policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedPath {
    /// Report the event under this path.
    Report(String),
    /// A skip pattern matched; the event must not be sent.
    Suppressed,
}

impl ResolvedPath {
    /// The reportable path, or `None` when suppressed.
    pub fn into_path(self) -> Option<String> {
        match self {
            ResolvedPath::Report(path) => Some(path),
            ResolvedPath::Suppressed => None,
        }
    }

    pub fn is_suppressed(&self) -> bool {
        matches!(self, ResolvedPath::Suppressed)
    }
}

/// Compile a glob into an anchored regex.
pub fn compile_glob(pattern: &str) -> Result<Regex> {
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join("[^/]+");

    Regex::new(&format!("^{}$", body)).map_err(|source| TrackerError::Pattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// Precompiled mask and skip lists.
///
/// Built once when the tracker is initialized; resolving is then a pure
/// lookup with no allocation beyond the returned path.
#[derive(Debug, Clone, Default)]
pub struct PathPolicy {
    skip: Vec<Regex>,
    mask: Vec<(String, Regex)>,
}

impl PathPolicy {
    /// Compile the given lists. Patterns that fail to compile are logged and
    /// left out rather than failing initialization.
    pub fn new(mask_patterns: &[String], skip_patterns: &[String]) -> Self {
        let skip = skip_patterns
            .iter()
            .filter_map(|pattern| match compile_glob(pattern) {
                Ok(regex) => Some(regex),
                Err(e) => {
                    warn!(error = %e, "Ignoring skip pattern");
                    None
                }
            })
            .collect();

        let mask = mask_patterns
            .iter()
            .filter_map(|pattern| match compile_glob(pattern) {
                Ok(regex) => Some((pattern.clone(), regex)),
                Err(e) => {
                    warn!(error = %e, "Ignoring mask pattern");
                    None
                }
            })
            .collect();

        Self { skip, mask }
    }

    /// A policy that reports every path unchanged.
    pub fn passthrough() -> Self {
        Self::default()
    }

    pub fn resolve(&self, raw: &str) -> ResolvedPath {
        if self.skip.iter().any(|regex| regex.is_match(raw)) {
            return ResolvedPath::Suppressed;
        }

        self.mask
            .iter()
            .find(|(_, regex)| regex.is_match(raw))
            .map(|(pattern, _)| ResolvedPath::Report(pattern.clone()))
            .unwrap_or_else(|| ResolvedPath::Report(raw.to_string()))
    }
}

/// One-shot resolution without keeping the compiled policy around.
pub fn resolve(raw: &str, mask_patterns: &[String], skip_patterns: &[String]) -> ResolvedPath {
    PathPolicy::new(mask_patterns, skip_patterns).resolve(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_mask_reports_pattern_literal() {
        let resolved = resolve("/users/42", &patterns(&["/users/*"]), &[]);
        assert_eq!(resolved, ResolvedPath::Report("/users/*".into()));
    }

    #[test]
    fn test_skip_suppresses() {
        let resolved = resolve("/admin/secret", &[], &patterns(&["/admin/*"]));
        assert_eq!(resolved, ResolvedPath::Suppressed);
    }

    #[test]
    fn test_unmatched_path_passes_through() {
        let resolved = resolve(
            "/pricing",
            &patterns(&["/users/*"]),
            &patterns(&["/admin/*"]),
        );
        assert_eq!(resolved, ResolvedPath::Report("/pricing".into()));
    }

    #[test]
    fn test_skip_takes_precedence_over_mask() {
        let resolved = resolve(
            "/admin/users",
            &patterns(&["/admin/*"]),
            &patterns(&["/admin/*"]),
        );
        assert!(resolved.is_suppressed());
    }

    #[test]
    fn test_first_mask_wins() {
        let policy = PathPolicy::new(&patterns(&["/shop/*/*", "/shop/*/reviews"]), &[]);
        assert_eq!(
            policy.resolve("/shop/boots/reviews"),
            ResolvedPath::Report("/shop/*/*".into())
        );

        let reversed = PathPolicy::new(&patterns(&["/shop/*/reviews", "/shop/*/*"]), &[]);
        assert_eq!(
            reversed.resolve("/shop/boots/reviews"),
            ResolvedPath::Report("/shop/*/reviews".into())
        );
    }

    #[test]
    fn test_star_matches_exactly_one_segment() {
        let policy = PathPolicy::new(&patterns(&["/users/*"]), &[]);

        assert_eq!(
            policy.resolve("/users/42/settings"),
            ResolvedPath::Report("/users/42/settings".into())
        );
        // Empty segment is not a segment
        assert_eq!(
            policy.resolve("/users/"),
            ResolvedPath::Report("/users/".into())
        );
    }

    #[test]
    fn test_matching_is_anchored() {
        let policy = PathPolicy::new(&[], &patterns(&["/admin"]));
        assert!(policy.resolve("/admin").is_suppressed());
        assert!(!policy.resolve("/admin-panel").is_suppressed());
        assert!(!policy.resolve("/x/admin").is_suppressed());
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        let policy = PathPolicy::new(&patterns(&["/files/*.pdf"]), &[]);
        assert_eq!(
            policy.resolve("/files/report.pdf"),
            ResolvedPath::Report("/files/*.pdf".into())
        );
        assert_eq!(
            policy.resolve("/files/reportxpdf"),
            ResolvedPath::Report("/files/reportxpdf".into())
        );
    }

    #[test]
    fn test_passthrough_policy() {
        let policy = PathPolicy::passthrough();
        assert_eq!(policy.resolve("/a/b"), ResolvedPath::Report("/a/b".into()));
    }

    #[test]
    fn test_into_path() {
        assert_eq!(ResolvedPath::Report("/a".into()).into_path(), Some("/a".into()));
        assert_eq!(ResolvedPath::Suppressed.into_path(), None);
    }
}
