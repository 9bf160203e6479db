//! Result envelope returned to the caller.

use chrono::{DateTime, Local};
use serde::Serialize;
use serde_json::Value;

use crate::cache::LastValue;
use crate::meter::Reading;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
    Exception,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readout: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<f64>,
    pub value: f64,
    pub status: Status,
    /// Diagnostics map, or `false` when the reading is trusted
    #[serde(rename = "errors")]
    pub diagnostics: Value,
    /// Error description, or `false`
    pub exception: Value,
    /// Unix timestamp of the value reported
    #[serde(rename = "lastUpdated")]
    pub timestamp_used: Option<i64>,
}

impl FinalResult {
    /// Builds the envelope for a completed pipeline run.
    ///
    /// Anything short of a trusted reading is an `error` carrying the
    /// diagnostics and the cached timestamp.
    pub fn from_reading(reading: &Reading, last: &LastValue, now: DateTime<Local>) -> Self {
        if !reading.is_trusted() {
            let diagnostics = serde_json::to_value(reading.diagnostics().entries())
                .unwrap_or(Value::Bool(true));
            FinalResult {
                readout: Some(reading.readout),
                offset: Some(reading.offset),
                value: reading.value,
                status: Status::Error,
                diagnostics,
                exception: Value::Bool(false),
                timestamp_used: last.updated_at.map(|t| t.timestamp()),
            }
        } else {
            FinalResult {
                readout: Some(reading.readout),
                offset: Some(reading.offset),
                value: reading.value,
                status: Status::Success,
                diagnostics: Value::Bool(false),
                exception: Value::Bool(false),
                timestamp_used: Some(now.timestamp()),
            }
        }
    }

    /// Builds the envelope for a run that could not complete.
    pub fn from_exception(error: &anyhow::Error, last: &LastValue) -> Self {
        FinalResult {
            readout: None,
            offset: None,
            value: last.value,
            status: Status::Exception,
            diagnostics: Value::Bool(false),
            exception: Value::String(format!("{:#}", error)),
            timestamp_used: last.updated_at.map(|t| t.timestamp()),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
