use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::io::Write;

use crate::domain::ExportError;
use crate::trace_data::ProfileSnapshot;

/// Chrome Trace Event format
/// Spec: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU/preview
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChromeTraceEvent {
    /// Event name (qualified function name)
    name: String,
    /// Category for filtering/coloring
    cat: String,
    /// Phase: "X" = complete, "M" = metadata
    ph: String,
    /// Timestamp in microseconds
    ts: f64,
    /// Duration in microseconds, complete events only
    #[serde(skip_serializing_if = "Option::is_none")]
    dur: Option<f64>,
    /// Process ID
    pid: u32,
    /// Thread ID
    tid: u64,
    /// Optional arguments (metadata)
    #[serde(skip_serializing_if = "Option::is_none")]
    args: Option<BTreeMap<String, JsonValue>>,
}

/// Chrome Trace Format container
#[derive(Debug, Serialize)]
struct ChromeTrace<'a> {
    #[serde(rename = "traceEvents")]
    trace_events: &'a [ChromeTraceEvent],
    #[serde(rename = "displayTimeUnit")]
    display_time_unit: &'static str,
}

/// Chrome trace exporter for timeline visualization
#[derive(Debug)]
pub struct ChromeTraceExporter {
    events: Vec<ChromeTraceEvent>,
}

impl ChromeTraceExporter {
    /// Convert a finished profile: one complete event per call, one
    /// `thread_name` metadata event per thread.
    ///
    /// # Errors
    /// [`ExportError::StillRunning`] if the snapshot was taken before stop,
    /// since open calls have no duration yet.
    pub fn from_snapshot(snapshot: &ProfileSnapshot) -> Result<Self, ExportError> {
        if !snapshot.finished {
            return Err(ExportError::StillRunning);
        }
        let pid = std::process::id();

        let mut events: Vec<ChromeTraceEvent> = snapshot
            .threads
            .iter()
            .map(|(tid, name)| ChromeTraceEvent {
                name: "thread_name".to_string(),
                cat: String::new(),
                ph: "M".to_string(),
                ts: 0.0,
                dur: None,
                pid,
                tid: tid.0,
                args: Some(BTreeMap::from([("name".to_string(), serde_json::json!(name))])),
            })
            .collect();

        for record in &snapshot.records {
            let mut args = BTreeMap::new();
            args.insert("call_id".to_string(), serde_json::json!(record.call_id.0));
            args.insert("parent_id".to_string(), serde_json::json!(record.parent_id.map(|p| p.0)));
            args.insert("file".to_string(), serde_json::json!(record.file));
            args.insert("line".to_string(), serde_json::json!(record.line));

            events.push(ChromeTraceEvent {
                name: record.qualified_name.clone(),
                cat: "call".to_string(),
                ph: "X".to_string(),
                ts: record.start_time * 1_000_000.0,
                dur: Some(record.duration().unwrap_or(0.0) * 1_000_000.0),
                pid,
                tid: record.thread_id.0,
                args: Some(args),
            });
        }

        Ok(Self { events })
    }

    /// Export the trace to any writer (file, stdout, buffer, etc.)
    ///
    /// # Example
    /// ```no_run
    /// use callscope::export::ChromeTraceExporter;
    /// use callscope::{Profiler, ProfilerOptions};
    /// use std::fs::File;
    /// use std::io::BufWriter;
    ///
    /// # fn example() -> anyhow::Result<()> {
    /// let profiler = Profiler::new(ProfilerOptions::new())?;
    /// profiler.start()?;
    /// profiler.stop();
    ///
    /// let exporter = ChromeTraceExporter::from_snapshot(&profiler.snapshot())?;
    /// exporter.export(BufWriter::new(File::create("trace.json")?))?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    /// Propagates serialization and write errors.
    pub fn export<W: Write>(&self, writer: W) -> Result<(), ExportError> {
        let trace = ChromeTrace { trace_events: &self.events, display_time_unit: "ms" };
        serde_json::to_writer_pretty(writer, &trace)?;
        Ok(())
    }

    /// Number of events, metadata included.
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.events.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CallId, Tid};
    use crate::trace_data::CallRecord;

    fn snapshot(finished: bool) -> ProfileSnapshot {
        let records = vec![
            CallRecord {
                call_id: CallId(0),
                parent_id: None,
                thread_id: Tid(1),
                start_time: 0.5,
                end_time: Some(1.5),
                qualified_name: "Parser.parse".to_string(),
                file: "src/parser.rs".to_string(),
                line: 12,
            },
            CallRecord {
                call_id: CallId(1),
                parent_id: Some(CallId(0)),
                thread_id: Tid(1),
                start_time: 0.75,
                end_time: Some(1.0),
                qualified_name: "C:crc32".to_string(),
                file: "<C extension>".to_string(),
                line: 0,
            },
        ];
        let threads = BTreeMap::from([(Tid(1), "main".to_string())]);
        ProfileSnapshot::new(records, threads, 2.0, finished)
    }

    fn export_json(snapshot: &ProfileSnapshot) -> JsonValue {
        let mut buffer = Vec::new();
        ChromeTraceExporter::from_snapshot(snapshot).unwrap().export(&mut buffer).unwrap();
        serde_json::from_slice(&buffer).unwrap()
    }

    #[test]
    fn test_running_profile_is_rejected() {
        let err = ChromeTraceExporter::from_snapshot(&snapshot(false)).unwrap_err();
        assert!(matches!(err, ExportError::StillRunning));
    }

    #[test]
    fn test_complete_events_in_microseconds() {
        let json = export_json(&snapshot(true));
        assert_eq!(json["displayTimeUnit"], "ms");
        let events = json["traceEvents"].as_array().unwrap();
        assert_eq!(events.len(), 3);

        let parse = events.iter().find(|e| e["name"] == "Parser.parse").unwrap();
        assert_eq!(parse["ph"], "X");
        assert!((parse["ts"].as_f64().unwrap() - 500_000.0).abs() < 1e-6);
        assert!((parse["dur"].as_f64().unwrap() - 1_000_000.0).abs() < 1e-6);
        assert_eq!(parse["tid"], 1);
        assert_eq!(parse["args"]["parent_id"], JsonValue::Null);
        assert_eq!(parse["args"]["line"], 12);

        let crc = events.iter().find(|e| e["name"] == "C:crc32").unwrap();
        assert_eq!(crc["args"]["parent_id"], 0);
        assert_eq!(crc["args"]["file"], "<C extension>");
    }

    #[test]
    fn test_thread_name_metadata() {
        let json = export_json(&snapshot(true));
        let meta: Vec<_> = json["traceEvents"]
            .as_array()
            .unwrap()
            .iter()
            .filter(|e| e["ph"] == "M")
            .collect();
        assert_eq!(meta.len(), 1);
        assert_eq!(meta[0]["name"], "thread_name");
        assert_eq!(meta[0]["args"]["name"], "main");
        assert!(meta[0].get("dur").is_none());
    }

    #[test]
    fn test_event_count() {
        let exporter = ChromeTraceExporter::from_snapshot(&snapshot(true)).unwrap();
        assert_eq!(exporter.event_count(), 3);
    }
}
