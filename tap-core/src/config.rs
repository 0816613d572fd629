//! # TAP Configuration
//!
//! A minimal string key/value store, read through an immutable snapshot
//! with typed getters.
//!
//! ```rust
//! use tap_core::TapConfig;
//! let mut config = TapConfig::new();
//!
//! config.set("ids.strategy", "sequential");
//! config.set("post.enforce_parent_path", "false");
//!
//! let snapshot = config.snapshot();
//! assert_eq!(snapshot.get("ids.strategy"), Some("sequential"));
//! assert_eq!(snapshot.get_bool("post.enforce_parent_path"), Some(false));
//! ```
//!
//! ## Environment overrides
//! `load_env` copies every variable starting with a prefix, lowercased and
//! with `__` turned into `.`:
//!
//! ```bash
//! export TAP__IDS__STRATEGY=sequential   # ids.strategy
//! ```

use std::collections::HashMap;

/// Keys understood by the resource servers.
pub mod keys {
    /// `uuid` (default) or `sequential`.
    pub const IDS_STRATEGY: &str = "ids.strategy";
    /// Reject POSTs whose path disagrees with the payload parent. Default `true`.
    pub const ENFORCE_PARENT_PATH: &str = "post.enforce_parent_path";
    /// Comma separated verbs accepted by the management server.
    pub const MANAGEMENT_METHODS: &str = "management.methods";
    /// Comma separated verbs accepted by the main server.
    pub const MAIN_METHODS: &str = "main.methods";
}

#[derive(Debug, Default, Clone)]
pub struct TapConfig {
    values: HashMap<String, String>,
}

impl TapConfig {
    /// Create an empty config store.
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    /// Set a configuration key to a string value.
    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.values.insert(key.into(), value.into());
    }

    /// Builder flavour of [`TapConfig::set`].
    pub fn with<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Load overrides from the process environment.
    ///
    /// `TAP__POST__ENFORCE_PARENT_PATH` with prefix `TAP__` becomes
    /// `post.enforce_parent_path`.
    pub fn load_env(&mut self, prefix: &str) {
        self.load_vars(prefix, std::env::vars());
    }

    fn load_vars(&mut self, prefix: &str, vars: impl IntoIterator<Item = (String, String)>) {
        for (key, value) in vars {
            if let Some(stripped) = key.strip_prefix(prefix) {
                let normalized = stripped.to_lowercase().replace("__", ".");
                self.set(normalized, value);
            }
        }
    }

    pub fn snapshot(&self) -> TapConfigSnapshot {
        TapConfigSnapshot::new(self.values.clone())
    }
}

#[derive(Debug, Clone, Default)]
pub struct TapConfigSnapshot {
    map: HashMap<String, String>,
}

impl TapConfigSnapshot {
    pub(crate) fn new(map: HashMap<String, String>) -> Self {
        Self { map }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(|s| s.as_str())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.trim().parse::<bool>().ok())
    }

    /// Comma separated list, entries trimmed, empties dropped.
    pub fn get_list(&self, key: &str) -> Option<Vec<String>> {
        self.get(key).map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
    }
}
