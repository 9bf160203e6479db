//! Last accepted value, persisted as a single decimal literal.
//!
//! The file's modification time doubles as the timestamp of that value.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local};
use std::fs;
use std::path::{Path, PathBuf};

use crate::ocr::normalize::{format_decimal, is_decimal_numeral};

/// The last accepted reading and when it was written.
#[derive(Debug, Clone, PartialEq)]
pub struct LastValue {
    pub value: f64,
    /// `None` if no value has been accepted yet
    pub updated_at: Option<DateTime<Local>>,
}

pub struct ValueCache {
    path: PathBuf,
}

impl ValueCache {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the last value. A missing file reads as 0 with no timestamp.
    pub fn read_last_value(&self) -> Result<LastValue> {
        if !self.path.exists() {
            crate::log(&format!(
                "No cached value at {}, starting from 0",
                self.path.display()
            ));
            return Ok(LastValue {
                value: 0.0,
                updated_at: None,
            });
        }

        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read cached value: {}", self.path.display()))?;
        let literal = contents.trim();
        if !is_decimal_numeral(literal) {
            bail!("Cached value is not a decimal number: {:?}", literal);
        }
        let value = literal
            .parse::<f64>()
            .with_context(|| format!("Cached value is not a number: {:?}", literal))?;

        let updated_at = fs::metadata(&self.path)
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Local>::from);

        Ok(LastValue { value, updated_at })
    }

    /// Replaces the cached value.
    pub fn write_last_value(&self, value: f64) -> Result<()> {
        fs::write(&self.path, format_decimal(value))
            .with_context(|| format!("Failed to write cached value: {}", self.path.display()))?;
        crate::log(&format!("Cached value updated: {}", value));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_reads_zero() {
        let dir = tempdir().unwrap();
        let cache = ValueCache::new(dir.path().join("lastValue.txt"));

        let last = cache.read_last_value().unwrap();

        assert_eq!(last.value, 0.0);
        assert!(last.updated_at.is_none());
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempdir().unwrap();
        let cache = ValueCache::new(dir.path().join("lastValue.txt"));

        cache.write_last_value(815.437).unwrap();
        let last = cache.read_last_value().unwrap();

        assert_eq!(last.value, 815.437);
        assert!(last.updated_at.is_some());
        assert_eq!(std::fs::read_to_string(cache.path()).unwrap(), "815.437");
    }

    #[test]
    fn test_reads_trailing_newline() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lastValue.txt");
        std::fs::write(&path, "100\n").unwrap();

        let last = ValueCache::new(path).read_last_value().unwrap();
        assert_eq!(last.value, 100.0);
    }

    #[test]
    fn test_garbage_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lastValue.txt");
        std::fs::write(&path, "abc").unwrap();

        assert!(ValueCache::new(path).read_last_value().is_err());
    }

    #[test]
    fn test_non_decimal_literals_are_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lastValue.txt");

        for literal in ["inf", "NaN", "1e5", "-infinity"] {
            std::fs::write(&path, literal).unwrap();
            let err = ValueCache::new(path.clone()).read_last_value().unwrap_err();
            assert!(err.to_string().contains("not a decimal number"), "{}", literal);
        }
    }
}
