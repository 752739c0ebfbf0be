//! # Profiling Hook
//!
//! The runtime calls [`ProfileHook::on_event`] synchronously on the thread
//! that entered or left a frame.
//!
//! ## Event Routing
//!
//! - `Call` / `NativeCall` → backfill on first observation, then push + record
//! - `Return` / `NativeReturn` → pop, verify against the record, finalize
//!
//! The hook does no I/O and never blocks on anything but the record store
//! mutex. Any failure (a returned fault or a panic) halts the profiler before
//! it is reported, so a broken session never keeps receiving events. The
//! `on_finished` callback of a failed session runs from `after_event`.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::Ordering;

use callscope_runtime::thread::current_name;
use callscope_runtime::{FrameInfo, HookError, HookEvent, ProfileHook};

use super::options::within_depth;
use super::profiler::ProfilerCore;
use super::tracker::{with_thread_stack, ThreadStack};
use crate::domain::{HookFault, Tid};
use crate::trace_data::CallRecord;

impl ProfileHook for ProfilerCore {
    fn on_event(&self, event: &HookEvent<'_>) -> Result<(), HookError> {
        if !self.is_recording() {
            return Ok(());
        }

        match panic::catch_unwind(AssertUnwindSafe(|| self.handle_event(event))) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(fault)) => {
                self.fail(fault.clone());
                Err(Box::new(fault))
            }
            Err(payload) => {
                self.fail(HookFault::Panicked { message: panic_message(payload.as_ref()) });
                panic::resume_unwind(payload)
            }
        }
    }

    fn after_event(&self) {
        self.finish_deferred();
    }
}

impl ProfilerCore {
    fn handle_event(&self, event: &HookEvent<'_>) -> Result<(), HookFault> {
        if event.kind.is_call() {
            self.on_call(event);
            Ok(())
        } else {
            self.on_return(event)
        }
    }

    fn on_call(&self, event: &HookEvent<'_>) {
        let Some(clock) = self.clock.get() else {
            return;
        };
        let tid = Tid::current();

        with_thread_stack(|stack| {
            if stack.adopt(self.session) {
                self.store.register_thread(tid, current_name());
            }

            // Thread was already running when first seen: synthesize its frames.
            if stack.is_empty() && !event.parents.is_empty() {
                let now = clock.elapsed_secs();
                for parent in event.parents {
                    self.push_frame(stack, tid, parent, now);
                }
                self.counters.backfilled.fetch_add(event.parents.len() as u64, Ordering::Relaxed);
            }

            self.push_frame(stack, tid, &event.frame, clock.elapsed_secs());
        });
    }

    fn push_frame(&self, stack: &mut ThreadStack, tid: Tid, frame: &FrameInfo, start_time: f64) {
        let call_id = self.ids.next_id();
        let parent_id = stack.top();
        stack.push(call_id);

        if within_depth(self.max_depth, stack.depth()) {
            self.store.insert(CallRecord {
                call_id,
                parent_id,
                thread_id: tid,
                start_time,
                end_time: None,
                qualified_name: frame.qualified_name(),
                file: frame.source_file().to_string(),
                line: frame.source_line(),
            });
        }
    }

    fn on_return(&self, event: &HookEvent<'_>) -> Result<(), HookFault> {
        let Some(clock) = self.clock.get() else {
            return Ok(());
        };
        let tid = Tid::current();

        with_thread_stack(|stack| {
            let popped = if stack.belongs_to(self.session) { stack.pop() } else { None };
            let Some(call_id) = popped else {
                // Return from a frame entered before this thread was observed.
                self.counters.orphan_returns.fetch_add(1, Ordering::Relaxed);
                return Ok(());
            };

            let end_time = clock.elapsed_secs();
            let name = event.frame.qualified_name();
            let file = event.frame.source_file();
            match self.store.finish(call_id, &name, file, end_time) {
                Ok(_) => Ok(()),
                Err(mismatch) => Err(HookFault::StackCorruption {
                    thread: tid,
                    expected: format!("{call_id} {} ({})", mismatch.recorded_name, mismatch.recorded_file),
                    found: format!("{name} ({file})"),
                    stack: self.store.describe_stack(stack.calls()),
                }),
            }
        })
        .unwrap_or(Ok(()))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CallId;
    use crate::profiling::testing::ScriptedRuntime;
    use crate::profiling::{Profiler, ProfilerOptions, ProfilerState};
    use callscope_runtime::{EventKind, FrameInfo};

    const MAIN: FrameInfo = FrameInfo::function("main", "src/main.rs", 1);
    const PARSE: FrameInfo = FrameInfo::function("parse", "src/parse.rs", 10);
    const LEX: FrameInfo = FrameInfo::function("lex", "src/lex.rs", 20);
    const CRC: FrameInfo = FrameInfo::native("crc32");

    fn started(options: ProfilerOptions) -> (Profiler, ScriptedRuntime) {
        let runtime = ScriptedRuntime::default();
        let profiler = Profiler::with_runtime(options, runtime.handle()).unwrap();
        profiler.start().unwrap();
        (profiler, runtime)
    }

    #[test]
    fn test_nested_calls_link_parents() {
        let (profiler, rt) = started(ProfilerOptions::new());
        rt.call(MAIN, &[]).unwrap();
        rt.call(PARSE, &[MAIN]).unwrap();
        rt.ret(PARSE, &[MAIN]).unwrap();
        rt.call(LEX, &[MAIN]).unwrap();
        rt.ret(LEX, &[MAIN]).unwrap();
        rt.ret(MAIN, &[]).unwrap();
        profiler.stop();

        let records = profiler.records();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].qualified_name, "main");
        assert_eq!(records[0].parent_id, None);
        assert_eq!(records[1].parent_id, Some(records[0].call_id));
        assert_eq!(records[2].parent_id, Some(records[0].call_id));
        assert!(records.iter().all(|r| r.end_time.is_some()));
    }

    #[test]
    fn test_native_call_sentinels() {
        let (profiler, rt) = started(ProfilerOptions::new());
        rt.event(EventKind::NativeCall, CRC, &[]).unwrap();
        rt.event(EventKind::NativeReturn, CRC, &[]).unwrap();
        profiler.stop();

        let records = profiler.records();
        assert_eq!(records[0].qualified_name, "C:crc32");
        assert_eq!(records[0].file, "<C extension>");
        assert_eq!(records[0].line, 0);
    }

    #[test]
    fn test_backfill_synthesizes_parents() {
        let (profiler, rt) = started(ProfilerOptions::new());
        rt.call(LEX, &[MAIN, PARSE]).unwrap();
        rt.ret(LEX, &[MAIN, PARSE]).unwrap();
        rt.ret(PARSE, &[MAIN]).unwrap();
        profiler.stop();

        let records = profiler.records();
        assert_eq!(records.len(), 3);
        let (main, parse, lex) = (&records[0], &records[1], &records[2]);
        assert_eq!(main.qualified_name, "main");
        assert_eq!(main.parent_id, None);
        assert_eq!(parse.parent_id, Some(main.call_id));
        assert_eq!(lex.parent_id, Some(parse.call_id));
        assert!((main.start_time - parse.start_time).abs() < f64::EPSILON);
        // main never returned while profiling; it is closed at stop.
        assert_eq!(main.end_time, profiler.duration());
    }

    #[test]
    fn test_depth_limit_tracks_without_recording() {
        let (profiler, rt) = started(ProfilerOptions::new().with_max_depth(1));
        rt.call(MAIN, &[]).unwrap();
        rt.call(PARSE, &[MAIN]).unwrap();
        rt.call(LEX, &[MAIN, PARSE]).unwrap();
        rt.ret(LEX, &[MAIN, PARSE]).unwrap();
        rt.ret(PARSE, &[MAIN]).unwrap();
        rt.ret(MAIN, &[]).unwrap();
        profiler.stop();

        assert_eq!(profiler.state(), ProfilerState::Stopped);
        let records = profiler.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].qualified_name, "main");
        assert!(records[0].end_time.unwrap() <= profiler.duration().unwrap());
    }

    #[test]
    fn test_orphan_return_is_ignored() {
        let (profiler, rt) = started(ProfilerOptions::new());
        assert!(rt.ret(PARSE, &[MAIN]).is_ok());
        rt.call(LEX, &[]).unwrap();
        rt.ret(LEX, &[]).unwrap();
        profiler.stop();
        assert_eq!(profiler.records().len(), 1);
        assert!(profiler.last_error().is_none());
    }

    #[test]
    fn test_mismatched_return_stops_profiler() {
        let finished = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = finished.clone();
        let (profiler, rt) = started(ProfilerOptions::new().with_on_finished(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        rt.call(MAIN, &[]).unwrap();
        rt.call(PARSE, &[MAIN]).unwrap();
        let err = rt.ret(LEX, &[MAIN]).unwrap_err();
        assert!(err.to_string().contains("Stack corruption"));

        assert_eq!(profiler.state(), ProfilerState::Failed);
        assert!(!rt.is_installed());
        assert_eq!(finished.load(Ordering::SeqCst), 1);
        match profiler.last_error() {
            Some(HookFault::StackCorruption { expected, found, stack, .. }) => {
                assert!(expected.contains("parse"));
                assert!(found.contains("lex"));
                assert!(stack.contains(&CallId(0).to_string()));
            }
            other => panic!("unexpected fault {other:?}"),
        }
        assert!(profiler.start().is_err());
    }

    #[test]
    fn test_failure_defers_callback_until_after_event() {
        let finished = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = finished.clone();
        let (profiler, rt) = started(ProfilerOptions::new().with_on_finished(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        rt.call(MAIN, &[]).unwrap();
        let hook = rt.last_hook().unwrap();

        let event = HookEvent { kind: EventKind::Return, frame: PARSE, parents: &[] };
        assert!(hook.on_event(&event).is_err());
        assert_eq!(profiler.state(), ProfilerState::Failed);
        assert_eq!(finished.load(Ordering::SeqCst), 0);

        hook.after_event();
        assert_eq!(finished.load(Ordering::SeqCst), 1);
        hook.after_event();
        profiler.stop();
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stop_runs_report_left_by_failed_hook() {
        let finished = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = finished.clone();
        let (profiler, rt) = started(ProfilerOptions::new().with_on_finished(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        rt.call(MAIN, &[]).unwrap();
        let event = HookEvent { kind: EventKind::Return, frame: LEX, parents: &[] };
        assert!(rt.last_hook().unwrap().on_event(&event).is_err());

        profiler.stop();
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_events_after_stop_are_ignored() {
        let (profiler, rt) = started(ProfilerOptions::new());
        rt.call(MAIN, &[]).unwrap();
        profiler.stop();
        let hook = rt.last_hook().unwrap();
        let event = HookEvent { kind: EventKind::Return, frame: MAIN, parents: &[] };
        assert!(hook.on_event(&event).is_ok());
        let records = profiler.records();
        assert_eq!(records[0].end_time, profiler.duration());
    }

    #[test]
    fn test_panic_message_extraction() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
