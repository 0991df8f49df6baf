//!
//! Console configuration
//! ---------------------
//! Settings come from `CONTACTDESK_*` environment variables with built-in defaults;
//! the server binary lets command-line flags override them. Unparseable values are
//! logged and replaced by the default rather than aborting startup.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use crate::metrics::{DayBoundary, Locale};

pub const DEFAULT_HTTP_PORT: u16 = 7880;
pub const DEFAULT_SESSION_TTL_SECS: u64 = 60 * 60;
pub const DEFAULT_ADMIN_EMAIL: &str = "admin@contactdesk.local";
pub const DEFAULT_ADMIN_PASSWORD: &str = "contactdesk";

#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    pub http_port: u16,
    /// JSON file holding the contact records snapshot. `None` serves an empty store.
    pub records_path: Option<PathBuf>,
    pub locale: Locale,
    pub day_boundary: DayBoundary,
    pub session_ttl: Duration,
    /// When set, sign-up creates unconfirmed accounts that cannot sign in until confirmed.
    pub require_confirmation: bool,
    pub admin_email: String,
    pub admin_password: String,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            http_port: DEFAULT_HTTP_PORT,
            records_path: None,
            locale: Locale::default(),
            day_boundary: DayBoundary::default(),
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
            require_confirmation: false,
            admin_email: DEFAULT_ADMIN_EMAIL.to_string(),
            admin_password: DEFAULT_ADMIN_PASSWORD.to_string(),
        }
    }
}

impl ConsoleConfig {
    /// Build a configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build a configuration from an arbitrary variable lookup; used by `from_env` and tests.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = ConsoleConfig::default();
        if let Some(v) = lookup("CONTACTDESK_HTTP_PORT") {
            match v.trim().parse::<u16>() {
                Ok(p) => cfg.http_port = p,
                Err(_) => warn!(target: "config", value = %v, "invalid CONTACTDESK_HTTP_PORT; using default"),
            }
        }
        if let Some(v) = lookup("CONTACTDESK_RECORDS") {
            if !v.trim().is_empty() { cfg.records_path = Some(PathBuf::from(v.trim())); }
        }
        if let Some(v) = lookup("CONTACTDESK_LOCALE") {
            cfg.set_locale(&v);
        }
        if let Some(v) = lookup("CONTACTDESK_DAY_BOUNDARY") {
            cfg.set_day_boundary(&v);
        }
        if let Some(v) = lookup("CONTACTDESK_SESSION_TTL_SECS") {
            match v.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => cfg.session_ttl = Duration::from_secs(secs),
                _ => warn!(target: "config", value = %v, "invalid CONTACTDESK_SESSION_TTL_SECS; using default"),
            }
        }
        if let Some(v) = lookup("CONTACTDESK_REQUIRE_CONFIRMATION") {
            match parse_bool(&v) {
                Some(b) => cfg.require_confirmation = b,
                None => warn!(target: "config", value = %v, "invalid CONTACTDESK_REQUIRE_CONFIRMATION; using default"),
            }
        }
        if let Some(v) = lookup("CONTACTDESK_ADMIN_EMAIL") {
            if !v.trim().is_empty() { cfg.admin_email = v.trim().to_string(); }
        }
        if let Some(v) = lookup("CONTACTDESK_ADMIN_PASSWORD") {
            if !v.is_empty() { cfg.admin_password = v; }
        }
        cfg
    }

    pub fn set_locale(&mut self, raw: &str) {
        match Locale::parse(raw) {
            Some(l) => self.locale = l,
            None => warn!(target: "config", value = %raw, "unsupported locale; keeping {}", self.locale.tag()),
        }
    }

    pub fn set_day_boundary(&mut self, raw: &str) {
        match DayBoundary::parse(raw) {
            Some(b) => self.day_boundary = b,
            None => warn!(target: "config", value = %raw, "invalid day boundary; keeping {}", self.day_boundary),
        }
    }
}

pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
