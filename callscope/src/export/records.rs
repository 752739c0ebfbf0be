//! Plain JSON dump of a profile.
//!
//! ```json
//! {
//!   "duration": 1.25,
//!   "threads": { "1": "main", "2": "worker-0" },
//!   "records": [[0, null, 1, 0.0, 1.25, "main", "src/main.rs", 12], ...]
//! }
//! ```

use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;

use crate::domain::{ExportError, Tid};
use crate::trace_data::{CallRecord, ProfileSnapshot};

#[derive(Serialize)]
struct RecordsFile<'a> {
    duration: f64,
    threads: &'a BTreeMap<Tid, String>,
    records: &'a [CallRecord],
}

/// Write `snapshot` as `{ duration, threads, records }`, records in their
/// tuple wire shape.
///
/// # Errors
/// [`ExportError::StillRunning`] for a snapshot taken before stop;
/// otherwise serialization and write errors.
pub fn write_records_json<W: Write>(snapshot: &ProfileSnapshot, writer: W) -> Result<(), ExportError> {
    if !snapshot.finished {
        return Err(ExportError::StillRunning);
    }
    let file = RecordsFile {
        duration: snapshot.duration,
        threads: &snapshot.threads,
        records: &snapshot.records,
    };
    serde_json::to_writer(writer, &file)?;
    Ok(())
}
