//! JSON wire format for batch requests.
//!
//! `{"service": "...", "records": [{"timestamp", "level", "message", "context"}]}`

use serde::Serialize;

use crate::context::Context;
use crate::level::Level;
use crate::log_record::LogRecord;

#[derive(Serialize)]
struct BatchPayload<'a> {
    service: &'a str,
    records: Vec<WireRecord<'a>>,
}

#[derive(Serialize)]
struct WireRecord<'a> {
    timestamp: String,
    level: Level,
    message: &'a str,
    context: &'a Context,
}

impl<'a> From<&'a LogRecord> for WireRecord<'a> {
    fn from(record: &'a LogRecord) -> Self {
        Self {
            timestamp: record.timestamp_rfc3339(),
            level: record.level(),
            message: record.message(),
            context: record.context(),
        }
    }
}

/// Serialise `records` for `service` into the request body.
pub fn serialise_batch(service: &str, records: &[LogRecord]) -> serde_json::Result<String> {
    let payload = BatchPayload {
        service,
        records: records.iter().map(WireRecord::from).collect(),
    };
    serde_json::to_string(&payload)
}
