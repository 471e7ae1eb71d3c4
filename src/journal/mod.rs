//! Journal tailing
//!
//! Structured records from the live system journal, one flat JSON object
//! per line. A record is unit-relevant iff it carries a non-empty `UNIT`
//! field; everything else is noise the engine skips over.

mod tailer;

pub use tailer::JournalctlTailer;

use async_trait::async_trait;
use serde_json::{Map, Value};

#[derive(Debug, thiserror::Error)]
pub enum TailError {
    #[error("failed to spawn `{0}`: {1}")]
    Spawn(String, #[source] std::io::Error),

    #[error("journal read error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed journal record: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("journal stream ended")]
    Ended,
}

/// One parsed journal entry.
#[derive(Debug, Clone)]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    /// Parse one `journalctl -o json` line.
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        let fields: Map<String, Value> = serde_json::from_str(line)?;
        Ok(Self { fields })
    }

    /// The unit this record concerns, if it concerns one.
    pub fn unit(&self) -> Option<&str> {
        match self.fields.get("UNIT") {
            Some(Value::String(name)) if !name.is_empty() => Some(name),
            _ => None,
        }
    }

    /// String field by name; non-string fields read as absent.
    pub fn field(&self, name: &str) -> Option<&str> {
        match self.fields.get(name) {
            Some(Value::String(value)) => Some(value),
            _ => None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        self.field("MESSAGE")
    }
}

/// A live, possibly-infinite sequence of journal records.
///
/// `Ok(None)` means the underlying source terminated; the engine treats
/// that the same as a stream error.
#[async_trait]
pub trait RecordStream: Send {
    async fn next_record(&mut self) -> Result<Option<Record>, TailError>;
}

/// Source of journal record streams. Each `follow` call starts a fresh
/// stream, so a failed stream can be abandoned and re-opened.
#[async_trait]
pub trait JournalTailer: Send + Sync {
    async fn follow(&self) -> Result<Box<dyn RecordStream>, TailError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_with_unit() {
        let record =
            Record::parse(r#"{"UNIT":"nginx.service","MESSAGE":"Started nginx."}"#).unwrap();
        assert_eq!(record.unit(), Some("nginx.service"));
        assert_eq!(record.message(), Some("Started nginx."));
    }

    #[test]
    fn test_record_without_unit() {
        let record = Record::parse(r#"{"MESSAGE":"kernel: oom-killer"}"#).unwrap();
        assert_eq!(record.unit(), None);
    }

    #[test]
    fn test_record_empty_unit_is_not_relevant() {
        let record = Record::parse(r#"{"UNIT":"","MESSAGE":"x"}"#).unwrap();
        assert_eq!(record.unit(), None);
    }

    #[test]
    fn test_record_non_string_unit_is_not_relevant() {
        let record = Record::parse(r#"{"UNIT":42}"#).unwrap();
        assert_eq!(record.unit(), None);
    }

    #[test]
    fn test_malformed_line() {
        assert!(Record::parse("not json").is_err());
        assert!(Record::parse(r#"["an","array"]"#).is_err());
    }

    #[test]
    fn test_field_lookup() {
        let record = Record::parse(r#"{"PRIORITY":"6","_PID":123}"#).unwrap();
        assert_eq!(record.field("PRIORITY"), Some("6"));
        assert_eq!(record.field("_PID"), None);
        assert_eq!(record.field("MISSING"), None);
    }
}
