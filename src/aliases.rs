// src/aliases.rs - Logical printer names used by callers -> OS printer names
use std::collections::HashMap;

use crate::config::ConfigError;

/// Static mapping from caller-facing printer names to installed printer names.
///
/// Built once from configuration. A name without a mapping passes through
/// unchanged and is treated as a literal OS printer name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrinterAliases {
    table: HashMap<String, String>,
}

impl PrinterAliases {
    /// Validate raw `[printer_aliases]` entries. Keys and targets are trimmed
    /// and must both be non-empty.
    pub fn from_entries<I, K, V>(entries: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut table = HashMap::new();
        for (key, value) in entries {
            let key = key.as_ref().trim();
            let value = value.as_ref().trim();
            if key.is_empty() {
                return Err(ConfigError::InvalidAlias("alias name is empty".to_string()));
            }
            if value.is_empty() {
                return Err(ConfigError::InvalidAlias(format!("alias '{}' has no target printer", key)));
            }
            table.insert(key.to_string(), value.to_string());
        }
        Ok(Self { table })
    }

    /// Resolve a requested printer. Empty input means "system default" and
    /// yields `None`.
    pub fn resolve(&self, requested: &str) -> Option<String> {
        let requested = requested.trim();
        if requested.is_empty() {
            return None;
        }
        Some(
            self.table
                .get(requested)
                .cloned()
                .unwrap_or_else(|| requested.to_string()),
        )
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
