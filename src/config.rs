//! Service configuration: defaults, then environment (`FILEDROP_*`), then CLI flags.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::keygen::MIN_KEY_LEN;

/// Longest accepted session lifetime (one year). Larger values are clamped.
pub const MAX_SESSION_TTL_SECS: u64 = 365 * 24 * 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyStrength {
    /// Alphanumeric keys of `key_length` characters.
    Short,
    /// 16 random bytes, base64url.
    Secure,
}

impl KeyStrength {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "short" | "alnum" | "alphanumeric" => Some(KeyStrength::Short),
            "secure" | "strong" => Some(KeyStrength::Secure),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceConfig {
    pub http_port: u16,
    /// Base URL of the remote cache service. `None` selects the in-memory registry.
    pub registry_url: Option<String>,
    /// Root folder for the filesystem object store.
    pub storage_root: String,
    pub session_ttl_secs: u64,
    pub key_strength: KeyStrength,
    pub key_length: usize,
    pub registry_timeout_ms: u64,
    pub store_timeout_ms: u64,
    /// Interval for sweeping expired records from the in-memory registry; 0 disables.
    pub sweep_interval_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            registry_url: None,
            storage_root: "files".to_string(),
            session_ttl_secs: 24 * 3600,
            key_strength: KeyStrength::Short,
            key_length: MIN_KEY_LEN,
            registry_timeout_ms: 5_000,
            store_timeout_ms: 30_000,
            sweep_interval_secs: 5,
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse::<T>().ok())
}

fn non_empty_env(name: &str) -> Option<String> {
    env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Value following `flag` in `args`, if any.
fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag && i + 1 < args.len() {
            return Some(args[i + 1].as_str());
        }
        i += 1;
    }
    None
}

pub fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

pub const USAGE: &str = "filedrop\n\nUSAGE:\n  filedrop [--http-port N] [--registry-url URL] [--storage-root PATH] [--session-ttl SECS] [--key-strength short|secure] [--key-length N]\n\nOPTIONS:\n  --http-port N           HTTP API port (env: FILEDROP_HTTP_PORT, default 8080)\n  --registry-url URL      Cache service base URL (env: FILEDROP_REGISTRY_URL; unset = in-memory registry)\n  --storage-root PATH     Object store root folder (env: FILEDROP_STORAGE_ROOT, default files)\n  --session-ttl SECS      Session lifetime (env: FILEDROP_SESSION_TTL_SECS, default 86400)\n  --key-strength KIND     short|secure (env: FILEDROP_KEY_STRENGTH, default short)\n  --key-length N          Length of short keys, min 6 (env: FILEDROP_KEY_LENGTH, default 6)\n";

impl ServiceConfig {
    /// Overlay `FILEDROP_*` environment variables onto the defaults.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(v) = parse_env("FILEDROP_HTTP_PORT") { cfg.http_port = v; }
        if let Some(v) = non_empty_env("FILEDROP_REGISTRY_URL") { cfg.registry_url = Some(v); }
        if let Some(v) = non_empty_env("FILEDROP_STORAGE_ROOT") { cfg.storage_root = v; }
        if let Some(v) = parse_env("FILEDROP_SESSION_TTL_SECS") { cfg.session_ttl_secs = v; }
        if let Some(v) = non_empty_env("FILEDROP_KEY_STRENGTH").and_then(|s| KeyStrength::parse(&s)) { cfg.key_strength = v; }
        if let Some(v) = parse_env("FILEDROP_KEY_LENGTH") { cfg.key_length = v; }
        if let Some(v) = parse_env("FILEDROP_REGISTRY_TIMEOUT_MS") { cfg.registry_timeout_ms = v; }
        if let Some(v) = parse_env("FILEDROP_STORE_TIMEOUT_MS") { cfg.store_timeout_ms = v; }
        if let Some(v) = parse_env("FILEDROP_SWEEP_INTERVAL_SECS") { cfg.sweep_interval_secs = v; }
        cfg.normalized()
    }

    /// CLI arguments override whatever is already set.
    pub fn apply_args(mut self, args: &[String]) -> Self {
        if let Some(v) = flag_value(args, "--http-port").and_then(|s| s.parse().ok()) { self.http_port = v; }
        if let Some(v) = flag_value(args, "--registry-url") { self.registry_url = Some(v.to_string()); }
        if let Some(v) = flag_value(args, "--storage-root") { self.storage_root = v.to_string(); }
        if let Some(v) = flag_value(args, "--session-ttl").and_then(|s| s.parse().ok()) { self.session_ttl_secs = v; }
        if let Some(v) = flag_value(args, "--key-strength").and_then(KeyStrength::parse) { self.key_strength = v; }
        if let Some(v) = flag_value(args, "--key-length").and_then(|s| s.parse().ok()) { self.key_length = v; }
        self.normalized()
    }

    fn normalized(mut self) -> Self {
        if self.key_length < MIN_KEY_LEN { self.key_length = MIN_KEY_LEN; }
        if self.session_ttl_secs == 0 { self.session_ttl_secs = Self::default().session_ttl_secs; }
        if self.session_ttl_secs > MAX_SESSION_TTL_SECS { self.session_ttl_secs = MAX_SESSION_TTL_SECS; }
        self
    }

    /// Never negative and never beyond `MAX_SESSION_TTL_SECS`, even for a
    /// config built without `normalized()`.
    pub fn session_ttl(&self) -> chrono::Duration {
        let secs = i64::try_from(self.session_ttl_secs.min(MAX_SESSION_TTL_SECS)).unwrap_or(0);
        chrono::Duration::try_seconds(secs).unwrap_or_else(|| chrono::Duration::hours(24))
    }

    pub fn registry_timeout(&self) -> Duration { Duration::from_millis(self.registry_timeout_ms) }

    pub fn store_timeout(&self) -> Duration { Duration::from_millis(self.store_timeout_ms) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(v: &[&str]) -> Vec<String> { v.iter().map(|s| s.to_string()).collect() }

    #[test]
    fn defaults_match_legacy_service() {
        let cfg = ServiceConfig::default();
        assert_eq!(cfg.http_port, 8080);
        assert_eq!(cfg.session_ttl_secs, 86_400);
        assert_eq!(cfg.key_length, 6);
        assert_eq!(cfg.key_strength, KeyStrength::Short);
        assert!(cfg.registry_url.is_none());
    }

    #[test]
    fn args_override() {
        let cfg = ServiceConfig::default().apply_args(&args(&[
            "filedrop", "--http-port", "9000", "--registry-url", "http://cache:8080/cache-service",
            "--storage-root", "/tmp/fd", "--key-strength", "secure", "--session-ttl", "60",
        ]));
        assert_eq!(cfg.http_port, 9000);
        assert_eq!(cfg.registry_url.as_deref(), Some("http://cache:8080/cache-service"));
        assert_eq!(cfg.storage_root, "/tmp/fd");
        assert_eq!(cfg.key_strength, KeyStrength::Secure);
        assert_eq!(cfg.session_ttl(), chrono::Duration::seconds(60));
    }

    #[test]
    fn key_length_is_floored_and_bad_values_ignored() {
        let cfg = ServiceConfig::default().apply_args(&args(&["--key-length", "3", "--http-port", "nope"]));
        assert_eq!(cfg.key_length, MIN_KEY_LEN);
        assert_eq!(cfg.http_port, 8080);
    }

    #[test]
    fn oversized_session_ttl_is_clamped() {
        let max = u64::MAX.to_string();
        let cfg = ServiceConfig::default().apply_args(&args(&["--session-ttl", max.as_str()]));
        assert_eq!(cfg.session_ttl_secs, MAX_SESSION_TTL_SECS);
        assert!(cfg.session_ttl() > chrono::Duration::zero());
        assert_eq!(cfg.session_ttl(), chrono::Duration::days(365));

        let cfg = ServiceConfig::default().apply_args(&args(&["--session-ttl", "10000000000000000"]));
        assert_eq!(cfg.session_ttl(), chrono::Duration::days(365));

        // Bypassing normalization still yields a positive, bounded lifetime
        let raw = ServiceConfig { session_ttl_secs: u64::MAX, ..ServiceConfig::default() };
        assert_eq!(raw.session_ttl(), chrono::Duration::days(365));
    }

    #[test]
    fn key_strength_parse() {
        assert_eq!(KeyStrength::parse("SECURE"), Some(KeyStrength::Secure));
        assert_eq!(KeyStrength::parse("alnum"), Some(KeyStrength::Short));
        assert_eq!(KeyStrength::parse("weird"), None);
    }

    #[test]
    fn flag_helpers() {
        let a = args(&["--help"]);
        assert!(has_flag(&a, "--help"));
        assert_eq!(flag_value(&a, "--help"), None);
    }
}
