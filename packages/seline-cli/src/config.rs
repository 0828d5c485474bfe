use anyhow::{Context, Result};
use dotenvy::dotenv;
use seline::{parse_patterns, Options, DEFAULT_API_HOST};
use std::env;
use std::path::PathBuf;

/// Tracker configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub token: String,
    pub api_host: String,
    pub skip_patterns: Vec<String>,
    pub mask_patterns: Vec<String>,
    pub cookie: bool,
    pub cookie_on_identify: bool,
    pub outbound: bool,
    /// Where local storage and cookies are kept between runs
    pub state_dir: PathBuf,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            token: env::var("SELINE_TOKEN").context("SELINE_TOKEN must be set")?,
            api_host: env::var("SELINE_API_HOST")
                .unwrap_or_else(|_| DEFAULT_API_HOST.to_string()),
            skip_patterns: parse_patterns(env::var("SELINE_SKIP_PATTERNS").ok().as_deref()),
            mask_patterns: parse_patterns(env::var("SELINE_MASK_PATTERNS").ok().as_deref()),
            cookie: flag("SELINE_COOKIE")?,
            cookie_on_identify: flag("SELINE_COOKIE_ON_IDENTIFY")?,
            outbound: flag("SELINE_OUTBOUND")?,
            state_dir: env::var("SELINE_STATE_DIR")
                .unwrap_or_else(|_| ".seline".to_string())
                .into(),
        })
    }

    /// Tracker options for a one-shot process. Page views are only sent
    /// when asked for.
    pub fn options(&self) -> Options {
        Options::new(self.token.clone())
            .with_api_host(self.api_host.clone())
            .with_auto_page_view(false)
            .with_skip_patterns(self.skip_patterns.clone())
            .with_mask_patterns(self.mask_patterns.clone())
            .with_cookie_mode(self.cookie)
            .with_cookie_on_identify(self.cookie_on_identify)
            .with_outbound(self.outbound)
    }

    pub fn local_storage_path(&self) -> PathBuf {
        self.state_dir.join("local.json")
    }

    pub fn cookies_path(&self) -> PathBuf {
        self.state_dir.join("cookies.json")
    }
}

fn flag(name: &str) -> Result<bool> {
    match env::var(name) {
        Ok(value) => value
            .parse()
            .with_context(|| format!("{} must be true or false", name)),
        Err(_) => Ok(false),
    }
}
