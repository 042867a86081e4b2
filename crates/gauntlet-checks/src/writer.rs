//! Incremental JSON array output
//!
//! Records are appended and flushed one at a time so an interrupted run
//! leaves every completed record on disk. The closing bracket is written by
//! [`JsonArrayWriter::finish`], or on drop if `finish` was never reached.

use crate::error::CheckResult;
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use tracing::warn;

/// Streams serializable records into a JSON array
#[derive(Debug)]
pub struct JsonArrayWriter<W: Write> {
    // None once finished
    out: Option<W>,
    count: usize,
}

impl JsonArrayWriter<BufWriter<File>> {
    /// Create (or truncate) `path` and write the opening bracket
    pub fn create(path: &Path) -> CheckResult<Self> {
        let file = File::create(path)?;
        Self::new(BufWriter::new(file))
    }
}

impl<W: Write> JsonArrayWriter<W> {
    /// Wrap `out` and write the opening bracket
    pub fn new(mut out: W) -> CheckResult<Self> {
        out.write_all(b"[\n")?;
        out.flush()?;
        Ok(Self {
            out: Some(out),
            count: 0,
        })
    }

    /// Append one record and flush
    pub fn append<T: Serialize>(&mut self, record: &T) -> CheckResult<()> {
        let out = self.out.as_mut().ok_or_else(finished)?;
        if self.count > 0 {
            out.write_all(b",\n")?;
        }
        serde_json::to_writer_pretty(&mut *out, record)?;
        out.flush()?;
        self.count += 1;
        Ok(())
    }

    /// Records written so far
    #[inline]
    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Write the closing bracket and hand back the sink
    pub fn finish(mut self) -> CheckResult<W> {
        let mut out = self.out.take().ok_or_else(finished)?;
        close(&mut out)?;
        Ok(out)
    }
}

impl<W: Write> Drop for JsonArrayWriter<W> {
    fn drop(&mut self) {
        if let Some(out) = self.out.as_mut() {
            if let Err(err) = close(out) {
                warn!(%err, "could not close JSON array");
            }
        }
    }
}

fn close<W: Write>(out: &mut W) -> io::Result<()> {
    out.write_all(b"\n]\n")?;
    out.flush()
}

fn finished() -> io::Error {
    io::Error::new(io::ErrorKind::Other, "JSON array already finished")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn finished_output_parses_as_array() {
        let mut writer = JsonArrayWriter::new(Vec::new()).unwrap();
        writer.append(&json!({"a": 1})).unwrap();
        writer.append(&json!({"a": 2})).unwrap();
        assert_eq!(writer.count(), 2);

        let bytes = writer.finish().unwrap();
        let parsed: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed, json!([{"a": 1}, {"a": 2}]));
    }

    #[test]
    fn empty_array_is_valid() {
        let bytes = JsonArrayWriter::new(Vec::new()).unwrap().finish().unwrap();
        let parsed: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed, json!([]));
    }

    #[test]
    fn early_drop_still_closes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        {
            let mut writer = JsonArrayWriter::create(&path).unwrap();
            writer.append(&json!({"scenario": 1})).unwrap();
        }
        let parsed: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed.as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn records_are_flushed_before_finish() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.json");
        let mut writer = JsonArrayWriter::create(&path).unwrap();
        writer.append(&json!({"n": 1})).unwrap();

        let partial = std::fs::read_to_string(&path).unwrap();
        assert!(partial.starts_with('['));
        assert!(partial.contains("\"n\": 1"));
        drop(writer);
    }
}
