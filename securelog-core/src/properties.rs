//! Flat `key=value` property source for `securelog-ecc.properties`.
//!
//! Resolution order:
//! 1. explicit path handed to [`PropertyBag::load_from`]
//! 2. the `SECURELOG_ECC_CONFIG` environment variable
//! 3. `securelog-ecc.properties` in the working directory
//! 4. built-in defaults (every getter takes a fallback)
//!
//! Properties set programmatically via [`PropertyBag::set`] win over any
//! file-loaded value, including across reloads.

use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

use crate::error::SecureLogResult;

pub const DEFAULT_CONFIG_FILE: &str = "securelog-ecc.properties";
pub const CONFIG_PATH_ENV: &str = "SECURELOG_ECC_CONFIG";

#[derive(Debug, Clone, Default)]
pub struct PropertyBag {
    loaded: HashMap<String, String>,
    overrides: HashMap<String, String>,
}

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load properties using the default resolution order. Missing files are
    /// not an error; the bag simply stays at defaults.
    pub fn load() -> Self {
        let mut bag = Self::new();
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.into());
        if let Err(e) = bag.reload_from(&path) {
            warn!(path = %path, error = %e, "Property file unreadable, using defaults");
        }
        bag
    }

    /// Load properties from an explicit file path.
    pub fn load_from(path: impl AsRef<Path>) -> SecureLogResult<Self> {
        let mut bag = Self::new();
        bag.reload_from(path)?;
        Ok(bag)
    }

    /// Re-read the backing file. Programmatic overrides survive the reload.
    pub fn reload_from(&mut self, path: impl AsRef<Path>) -> SecureLogResult<()> {
        let path = path.as_ref();
        self.loaded.clear();
        if !path.exists() {
            info!(path = %path.display(), "Property file not found, using defaults");
            return Ok(());
        }
        let content = std::fs::read_to_string(path)?;
        let mut count = 0usize;
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            if let Some(eq) = line.find('=') {
                let key = line[..eq].trim();
                let value = line[eq + 1..].trim();
                if !key.is_empty() {
                    self.loaded.insert(key.to_string(), value.to_string());
                    count += 1;
                }
            }
        }
        info!(path = %path.display(), properties = count, "Configuration loaded");
        Ok(())
    }

    /// Set a property programmatically. Wins over file-loaded values.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.overrides.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.overrides
            .get(key)
            .or_else(|| self.loaded.get(key))
            .map(String::as_str)
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    pub fn get_int(&self, key: &str, default: i64) -> i64 {
        self.get(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    pub fn get_usize(&self, key: &str, default: usize) -> usize {
        self.get(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    pub fn get_f64(&self, key: &str, default: f64) -> f64 {
        self.get(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    /// Write the merged view back out in properties format.
    pub fn save(&self, path: impl AsRef<Path>) -> SecureLogResult<()> {
        let mut merged: Vec<(&str, &str)> = self
            .loaded
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        for (k, v) in &self.overrides {
            match merged.iter_mut().find(|(mk, _)| *mk == k.as_str()) {
                Some(slot) => slot.1 = v.as_str(),
                None => merged.push((k.as_str(), v.as_str())),
            }
        }
        merged.sort_by_key(|(k, _)| *k);
        let mut out = String::with_capacity(merged.len() * 48);
        out.push_str("# SecureLog ECC configuration\n");
        for (k, v) in merged {
            out.push_str(k);
            out.push('=');
            out.push_str(v);
            out.push('\n');
        }
        std::fs::write(path, out)?;
        Ok(())
    }
}
