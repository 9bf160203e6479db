//! Per-reading diagnostics.
//!
//! Collects keyed entries explaining why a value was or was not trusted,
//! plus the overall error flag. A fresh instance is created for every
//! pipeline run and handed to the caller at the end.

use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: BTreeMap<String, Value>,
    has_errors: bool,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an entry. A later write to the same key replaces the earlier one.
    pub fn record(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Marks this reading as untrustworthy.
    pub fn mark_error(&mut self) {
        self.has_errors = true;
    }

    pub fn has_errors(&self) -> bool {
        self.has_errors
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn entries(&self) -> &BTreeMap<String, Value> {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
