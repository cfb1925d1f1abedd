//! Centralized configuration for veggie.
//!
//! Goals:
//! - Single place to collect tunables instead of scattering env lookups.
//! - VeggieConfig::from_env() reads VEGGIE_* env vars on top of the defaults.
//! - Fluent `with_*` setters for tests and the CLI (flags override env).
//!
//! The profile directory is external configuration: the store never owns it,
//! selectors read it from here (see `state::selectors::profile_dir_sel`).

use std::fmt;
use std::path::{Path, PathBuf};

pub const DEFAULT_PROFILE_DIR: &str = "./profiles";
pub const DEFAULT_ADDR: &str = "127.0.0.1:1337";
pub const DEFAULT_API_PREFIX: &str = "/veggie/api/v1";

#[derive(Clone, Debug)]
pub struct VeggieConfig {
    /// Root directory for `<name>.json` profile files.
    /// Env: VEGGIE_PROFILE_DIR (default "./profiles")
    pub profile_dir: PathBuf,

    /// Listen address of the mock server.
    /// Env: VEGGIE_ADDR (default "127.0.0.1:1337")
    pub addr: String,

    /// Path prefix of the admin API. Requests outside of it go to the route table.
    /// Env: VEGGIE_API_PREFIX (default "/veggie/api/v1")
    pub api_prefix: String,

    /// Register every `*.json` found in profile_dir at startup (data loaded lazily).
    /// Env: VEGGIE_INDEX_PROFILES = 0|1 (default 0)
    pub index_profiles: bool,

    /// Create profile_dir on first save if it is missing.
    /// Env: VEGGIE_CREATE_PROFILE_DIR = 0|1 (default 1)
    pub create_profile_dir: bool,
}

impl Default for VeggieConfig {
    fn default() -> Self {
        Self {
            profile_dir: PathBuf::from(DEFAULT_PROFILE_DIR),
            addr: DEFAULT_ADDR.to_string(),
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            index_profiles: false,
            create_profile_dir: true,
        }
    }
}

fn env_flag(v: &str) -> bool {
    let s = v.trim().to_ascii_lowercase();
    s == "1" || s == "true" || s == "on" || s == "yes"
}

impl VeggieConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("VEGGIE_PROFILE_DIR") {
            let s = v.trim();
            if !s.is_empty() {
                cfg.profile_dir = PathBuf::from(s);
            }
        }

        if let Ok(v) = std::env::var("VEGGIE_ADDR") {
            let s = v.trim();
            if !s.is_empty() {
                cfg.addr = s.to_string();
            }
        }

        if let Ok(v) = std::env::var("VEGGIE_API_PREFIX") {
            let s = v.trim();
            if !s.is_empty() {
                cfg.api_prefix = normalize_prefix(s);
            }
        }

        if let Ok(v) = std::env::var("VEGGIE_INDEX_PROFILES") {
            cfg.index_profiles = env_flag(&v);
        }

        if let Ok(v) = std::env::var("VEGGIE_CREATE_PROFILE_DIR") {
            cfg.create_profile_dir = env_flag(&v);
        }

        cfg
    }

    pub fn with_profile_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.profile_dir = dir.into();
        self
    }

    pub fn with_addr<S: Into<String>>(mut self, addr: S) -> Self {
        self.addr = addr.into();
        self
    }

    pub fn with_api_prefix<S: AsRef<str>>(mut self, prefix: S) -> Self {
        self.api_prefix = normalize_prefix(prefix.as_ref());
        self
    }

    pub fn with_index_profiles(mut self, on: bool) -> Self {
        self.index_profiles = on;
        self
    }

    pub fn with_create_profile_dir(mut self, on: bool) -> Self {
        self.create_profile_dir = on;
        self
    }

    /// Finish the builder and obtain the configuration.
    pub fn build(self) -> Self {
        self
    }

    pub fn profile_dir(&self) -> &Path {
        &self.profile_dir
    }
}

/// "/x/y/" and "x/y" both become "/x/y".
fn normalize_prefix(s: &str) -> String {
    let trimmed = s.trim().trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

impl fmt::Display for VeggieConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "VeggieConfig {{ \
             profile_dir: {}, \
             addr: {}, \
             api_prefix: {}, \
             index_profiles: {}, \
             create_profile_dir: {} \
             }}",
            self.profile_dir.display(),
            self.addr,
            self.api_prefix,
            self.index_profiles,
            self.create_profile_dir,
        )
    }
}
