//! Visitor cookie rendering.

use std::fmt;

use chrono::{DateTime, Duration, Utc};

/// Name of the cookie holding the persisted visitor id.
pub const VISITOR_COOKIE: &str = "seline_vid";

/// Days until the visitor cookie expires.
pub const VISITOR_COOKIE_DAYS: i64 = 365;

/// A cookie assignment in `document.cookie` form.
///
/// Renders as
/// `name=value;expires=<date>;path=/;domain=.<parent>;SameSite=Lax`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCookie {
    pub name: String,
    pub value: String,
    pub expires: DateTime<Utc>,
    pub domain: Option<String>,
}

impl SetCookie {
    /// The visitor-id cookie, scoped to the registrable parent of `hostname`.
    pub fn visitor(id: &str, hostname: Option<&str>, now: DateTime<Utc>) -> Self {
        Self {
            name: VISITOR_COOKIE.to_string(),
            value: id.to_string(),
            expires: now + Duration::days(VISITOR_COOKIE_DAYS),
            domain: hostname
                .filter(|h| !h.is_empty())
                .map(registrable_domain),
        }
    }
}

impl fmt::Display for SetCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}={};expires={};path=/",
            self.name,
            urlencoding::encode(&self.value),
            self.expires.format("%a, %d %b %Y %H:%M:%S GMT"),
        )?;
        if let Some(domain) = &self.domain {
            write!(f, ";domain=.{}", domain)?;
        }
        write!(f, ";SameSite=Lax")
    }
}

/// Last two labels of a hostname (`app.shop.example.com` → `example.com`).
pub fn registrable_domain(hostname: &str) -> String {
    let labels: Vec<&str> = hostname.split('.').collect();
    let start = labels.len().saturating_sub(2);
    labels[start..].join(".")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 12, 30, 0).unwrap()
    }

    #[test]
    fn test_visitor_cookie_renders_browser_attributes() {
        let cookie = SetCookie::visitor("v 1", Some("app.example.com"), fixed_now());
        assert_eq!(
            cookie.to_string(),
            "seline_vid=v%201;expires=Sat, 16 Oct 2027 12:30:00 GMT;path=/;domain=.example.com;SameSite=Lax"
        );
    }

    #[test]
    fn test_cookie_without_hostname_omits_domain() {
        let cookie = SetCookie::visitor("abc", None, fixed_now());
        assert!(!cookie.to_string().contains("domain="));
        assert!(cookie.to_string().ends_with(";path=/;SameSite=Lax"));
    }

    #[test]
    fn test_registrable_domain() {
        assert_eq!(registrable_domain("a.b.example.com"), "example.com");
        assert_eq!(registrable_domain("example.com"), "example.com");
        assert_eq!(registrable_domain("localhost"), "localhost");
    }
}
