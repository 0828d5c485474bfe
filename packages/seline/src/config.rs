//! Tracker options.
//!
//! Options are fixed once the tracker is initialized. They can be built in
//! code, deserialized from JSON (camelCase keys), or read from the
//! `data-*` attributes of an embedding script tag.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub const DEFAULT_API_HOST: &str = "https://api.seline.com";

/// Path of the event endpoint relative to the API host.
pub const EVENT_PATH: &str = "/s/e";

/// Path of the user endpoint relative to the API host.
pub const USER_PATH: &str = "/s/su";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Options {
    /// Project token. Not validated; requests go out without it if absent.
    pub token: Option<String>,
    pub api_host: String,
    /// Report the initial page view and follow navigations.
    pub auto_page_view: bool,
    /// Paths matching any of these are never reported.
    pub skip_patterns: Vec<String>,
    /// Paths matching one of these are reported as the pattern itself.
    pub mask_patterns: Vec<String>,
    /// Persist the visitor id once the visitor is identified.
    pub cookie_on_identify: bool,
    /// Persist the visitor id as soon as the server assigns one.
    #[serde(alias = "cookie")]
    pub cookie_mode: bool,
    /// Track clicks on links leaving the site.
    pub outbound: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            token: None,
            api_host: DEFAULT_API_HOST.to_string(),
            auto_page_view: true,
            skip_patterns: Vec::new(),
            mask_patterns: Vec::new(),
            cookie_on_identify: false,
            cookie_mode: false,
            outbound: false,
        }
    }
}

impl Options {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..Default::default()
        }
    }

    pub fn with_api_host(mut self, api_host: impl Into<String>) -> Self {
        self.api_host = api_host.into();
        self
    }

    pub fn with_auto_page_view(mut self, enabled: bool) -> Self {
        self.auto_page_view = enabled;
        self
    }

    pub fn with_skip_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skip_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_mask_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mask_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_cookie_on_identify(mut self, enabled: bool) -> Self {
        self.cookie_on_identify = enabled;
        self
    }

    pub fn with_cookie_mode(mut self, enabled: bool) -> Self {
        self.cookie_mode = enabled;
        self
    }

    pub fn with_outbound(mut self, enabled: bool) -> Self {
        self.outbound = enabled;
        self
    }

    /// Build options from script-tag attributes (`data-token`,
    /// `data-api-host`, `data-skip-patterns`, ...).
    ///
    /// Auto page view stays on unless the attribute is literally `"false"`;
    /// the other toggles are on only when literally `"true"`.
    pub fn from_attributes(attrs: &HashMap<String, String>) -> Self {
        let attr = |name: &str| attrs.get(name).map(String::as_str);
        let flag = |name: &str| attr(name) == Some("true");

        Self {
            token: attr("data-token").map(str::to_string),
            api_host: attr("data-api-host")
                .filter(|h| !h.is_empty())
                .unwrap_or(DEFAULT_API_HOST)
                .to_string(),
            auto_page_view: attr("data-auto-page-view") != Some("false"),
            skip_patterns: parse_patterns(attr("data-skip-patterns")),
            mask_patterns: parse_patterns(attr("data-mask-patterns")),
            cookie_on_identify: flag("data-cookie-on-identify"),
            cookie_mode: flag("data-cookie"),
            outbound: flag("data-outbound"),
        }
    }

    pub(crate) fn endpoints(&self) -> Endpoints {
        let host = self.api_host.trim_end_matches('/');
        Endpoints {
            event: format!("{}{}", host, EVENT_PATH),
            user: format!("{}{}", host, USER_PATH),
        }
    }
}

/// Resolved endpoint URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Endpoints {
    pub event: String,
    pub user: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Options::default().endpoints()
    }
}

/// Parse a pattern list attribute: `['/a/*', "/b"]` or `/a/*, /b`.
pub fn parse_patterns(value: Option<&str>) -> Vec<String> {
    let Some(value) = value else {
        return Vec::new();
    };

    let value = value.trim();
    let value = value.strip_prefix('[').unwrap_or(value);
    let value = value.strip_suffix(']').unwrap_or(value);

    value
        .split(',')
        .map(|p| p.trim().trim_matches(|c: char| c == '\'' || c == '"'))
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let options = Options::default();
        assert_eq!(options.api_host, DEFAULT_API_HOST);
        assert!(options.auto_page_view);
        assert!(!options.cookie_mode);
        assert!(!options.cookie_on_identify);
        assert!(!options.outbound);
        assert!(options.token.is_none());
    }

    #[test]
    fn test_endpoints_trim_trailing_slash() {
        let endpoints = Options::new("t").with_api_host("https://a.example.com/").endpoints();
        assert_eq!(endpoints.event, "https://a.example.com/s/e");
        assert_eq!(endpoints.user, "https://a.example.com/s/su");
    }

    #[test]
    fn test_parse_patterns() {
        assert_eq!(
            parse_patterns(Some("['/users/*', \"/admin/*\"]")),
            vec!["/users/*", "/admin/*"]
        );
        assert_eq!(parse_patterns(Some("/a, /b ,")), vec!["/a", "/b"]);
        assert!(parse_patterns(Some("[]")).is_empty());
        assert!(parse_patterns(None).is_empty());
    }

    #[test]
    fn test_from_attributes() {
        let options = Options::from_attributes(&attrs(&[
            ("data-token", "tok"),
            ("data-api-host", "https://collect.example.com"),
            ("data-auto-page-view", "false"),
            ("data-skip-patterns", "[/admin/*]"),
            ("data-mask-patterns", "/users/*"),
            ("data-cookie", "true"),
            ("data-cookie-on-identify", "yes"),
            ("data-outbound", "true"),
        ]));

        assert_eq!(options.token.as_deref(), Some("tok"));
        assert_eq!(options.api_host, "https://collect.example.com");
        assert!(!options.auto_page_view);
        assert_eq!(options.skip_patterns, vec!["/admin/*"]);
        assert_eq!(options.mask_patterns, vec!["/users/*"]);
        assert!(options.cookie_mode);
        assert!(!options.cookie_on_identify);
        assert!(options.outbound);
    }

    #[test]
    fn test_from_empty_attributes_uses_defaults() {
        let options = Options::from_attributes(&HashMap::new());
        assert_eq!(options, Options::default());
    }

    #[test]
    fn test_deserialize_camel_case() {
        let options: Options = serde_json::from_str(
            r#"{"token":"t","maskPatterns":["/u/*"],"cookie":true,"autoPageView":false}"#,
        )
        .unwrap();

        assert_eq!(options.token.as_deref(), Some("t"));
        assert_eq!(options.mask_patterns, vec!["/u/*"]);
        assert!(options.cookie_mode);
        assert!(!options.auto_page_view);
        assert_eq!(options.api_host, DEFAULT_API_HOST);
    }
}
