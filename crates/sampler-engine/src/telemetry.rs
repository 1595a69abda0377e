//! Per-tick telemetry records
//!
//! One JSON object per line:
//!
//! ```text
//! {"timestamp":1700000000020,"out1":"0.42","out2":"--","out3":"3.1"}
//! ```

use std::io::{self, Write};

use serde::ser::{Serialize, SerializeMap, Serializer};

/// Value printed for a source with nothing new this tick
pub const NO_DATA: &str = "--";

/// Field carrying the tick timestamp; not available as a source label
pub const TIMESTAMP_FIELD: &str = "timestamp";

/// Snapshot of all sources at one tick boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryRecord {
    /// Nominal tick timestamp (ms since epoch)
    pub timestamp: u64,
    /// `(label, value)` per source, in source order
    pub fields: Vec<(String, String)>,
}

impl TelemetryRecord {
    /// Build a record, substituting [`NO_DATA`] for missing values
    pub fn new<'a, I>(timestamp: u64, samples: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, Option<&'a str>)>,
    {
        let fields = samples
            .into_iter()
            .map(|(label, value)| (label.to_string(), value.unwrap_or(NO_DATA).to_string()))
            .collect();
        Self { timestamp, fields }
    }

    /// Value recorded for `label`
    pub fn get(&self, label: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, v)| v.as_str())
    }
}

impl Serialize for TelemetryRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + 1))?;
        map.serialize_entry(TIMESTAMP_FIELD, &self.timestamp)?;
        for (label, value) in &self.fields {
            map.serialize_entry(label, value)?;
        }
        map.end()
    }
}

/// Writes telemetry records as JSON lines
pub struct TelemetryEmitter<W: Write> {
    writer: W,
    emitted: u64,
}

impl<W: Write> TelemetryEmitter<W> {
    /// Create an emitter writing to `writer`
    pub fn new(writer: W) -> Self {
        Self { writer, emitted: 0 }
    }

    /// Number of records written successfully
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Get a reference to the underlying writer
    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Write one record and flush
    pub fn emit(&mut self, record: &TelemetryRecord) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        self.emitted += 1;
        Ok(())
    }
}
