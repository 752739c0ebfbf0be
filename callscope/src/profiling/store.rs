//! Call record store and thread table.
//!
//! Written concurrently by the hook on every observed thread, so both maps
//! sit behind one coarse mutex. The `accepting` gate is closed by `seal()`;
//! after that no write from a straggling hook invocation can change a record.
//! The profile's end time is read under that same lock, so every timestamp a
//! hook managed to store was taken before it.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::domain::{CallId, Tid};
use crate::trace_data::CallRecord;

/// What a return event found in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finish {
    /// The record existed and now carries an end time.
    Closed,
    /// The call was deeper than the depth limit and has no record.
    NotRecorded,
    /// The record exists but the store is sealed; nothing was written.
    Sealed,
}

/// Result of closing the store.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sealed {
    /// End of the profile, read while the store lock was held.
    pub end: f64,
    /// Calls still open at that point, now closed at `end`.
    pub closed: usize,
}

/// The recorded frame does not match the frame that returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameMismatch {
    pub recorded_name: String,
    pub recorded_file: String,
}

#[derive(Debug, Default)]
struct StoreInner {
    accepting: bool,
    records: HashMap<CallId, CallRecord>,
    threads: BTreeMap<Tid, String>,
}

#[derive(Debug, Default)]
pub struct RecordStore {
    inner: Mutex<StoreInner>,
}

impl RecordStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start accepting records.
    pub fn open(&self) {
        self.lock().accepting = true;
    }

    /// Remember a thread's name. The first name registered wins.
    pub fn register_thread(&self, tid: Tid, name: String) {
        let mut inner = self.lock();
        if inner.accepting {
            inner.threads.entry(tid).or_insert(name);
        }
    }

    /// Insert a new record. Returns false once the store is sealed.
    pub fn insert(&self, record: CallRecord) -> bool {
        let mut inner = self.lock();
        if !inner.accepting {
            return false;
        }
        inner.records.insert(record.call_id, record);
        true
    }

    /// Finalize the record for `call_id` after checking it describes the
    /// frame that is returning.
    ///
    /// # Errors
    /// Returns [`FrameMismatch`] when the recorded name or file differ.
    pub fn finish(
        &self,
        call_id: CallId,
        name: &str,
        file: &str,
        end_time: f64,
    ) -> Result<Finish, FrameMismatch> {
        let mut inner = self.lock();
        let accepting = inner.accepting;
        let Some(record) = inner.records.get_mut(&call_id) else {
            return Ok(Finish::NotRecorded);
        };
        if record.qualified_name != name || record.file != file {
            return Err(FrameMismatch {
                recorded_name: record.qualified_name.clone(),
                recorded_file: record.file.clone(),
            });
        }
        if !accepting {
            return Ok(Finish::Sealed);
        }
        record.end_time = Some(end_time);
        Ok(Finish::Closed)
    }

    /// Stop accepting writes, read the end time with `now` and close every
    /// unfinished call at it.
    pub fn seal(&self, now: impl FnOnce() -> f64) -> Sealed {
        let mut inner = self.lock();
        inner.accepting = false;
        let end = now();
        let mut closed = 0;
        for record in inner.records.values_mut() {
            if record.end_time.is_none() {
                record.end_time = Some(end);
                closed += 1;
            }
        }
        Sealed { end, closed }
    }

    /// Human-readable dump of a call stack, innermost call first.
    #[must_use]
    pub fn describe_stack(&self, stack: &[CallId]) -> String {
        let inner = self.lock();
        let mut out = String::new();
        for call_id in stack.iter().rev() {
            match inner.records.get(call_id) {
                Some(r) => {
                    let _ = writeln!(out, "  {call_id} {} ({}:{})", r.qualified_name, r.file, r.line);
                }
                None => {
                    let _ = writeln!(out, "  {call_id} <below depth limit>");
                }
            }
        }
        if out.is_empty() {
            out.push_str("  <empty>\n");
        }
        out
    }

    /// Copy of all records (unordered) and the thread table.
    #[must_use]
    pub fn snapshot(&self) -> (Vec<CallRecord>, BTreeMap<Tid, String>) {
        let inner = self.lock();
        (inner.records.values().cloned().collect(), inner.threads.clone())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().records.len()
    }
}
