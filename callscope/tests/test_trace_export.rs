use callscope::export::{write_records_json, ChromeTraceExporter};
use callscope::{probe, CallRecord, ExportError, Profiler, ProfilerOptions};
use std::fs::File;
use std::io::BufReader;
use std::sync::{Mutex, MutexGuard, PoisonError};

static SERIAL: Mutex<()> = Mutex::new(());

fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(PoisonError::into_inner)
}

fn render_frame() {
    probe!("render_frame");
    draw();
    draw();
}

fn draw() {
    probe!("draw");
}

fn profiled() -> Profiler {
    let profiler = Profiler::new(ProfilerOptions::new()).unwrap();
    profiler.start().unwrap();
    std::thread::Builder::new()
        .name("painter".to_string())
        .spawn(render_frame)
        .unwrap()
        .join()
        .unwrap();
    profiler.stop();
    profiler
}

#[test]
fn test_export_creates_valid_json() {
    let _serial = serial();
    let profiler = profiled();
    let exporter = ChromeTraceExporter::from_snapshot(&profiler.snapshot()).unwrap();
    let mut buffer = Vec::new();
    exporter.export(&mut buffer).expect("Failed to export trace");

    let parsed: serde_json::Value = serde_json::from_slice(&buffer).expect("Invalid JSON");
    assert_eq!(parsed["displayTimeUnit"], "ms");
    let events = parsed["traceEvents"].as_array().unwrap();
    assert_eq!(events.len(), 4);
    assert_eq!(events.iter().filter(|e| e["ph"] == "X").count(), 3);

    let meta = events.iter().find(|e| e["ph"] == "M").unwrap();
    assert_eq!(meta["args"]["name"], "painter");
}

#[test]
fn test_export_to_file() {
    let _serial = serial();
    let profiler = profiled();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trace.json");

    ChromeTraceExporter::from_snapshot(&profiler.snapshot())
        .unwrap()
        .export(File::create(&path).unwrap())
        .unwrap();

    let parsed: serde_json::Value =
        serde_json::from_reader(BufReader::new(File::open(&path).unwrap())).unwrap();
    let draws = parsed["traceEvents"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|e| e["name"] == "draw")
        .count();
    assert_eq!(draws, 2);
}

#[test]
fn test_records_file_round_trips() {
    let _serial = serial();
    let profiler = profiled();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("records.json");
    write_records_json(&profiler.snapshot(), File::create(&path).unwrap()).unwrap();

    let parsed: serde_json::Value =
        serde_json::from_reader(BufReader::new(File::open(&path).unwrap())).unwrap();
    let records: Vec<CallRecord> = serde_json::from_value(parsed["records"].clone()).unwrap();
    assert_eq!(records, profiler.records());
    assert_eq!(parsed["threads"].as_object().unwrap().len(), 1);
}

#[test]
fn test_export_refuses_running_profile() {
    let _serial = serial();
    let profiler = Profiler::new(ProfilerOptions::new()).unwrap();
    profiler.start().unwrap();
    draw();
    let err = ChromeTraceExporter::from_snapshot(&profiler.snapshot()).unwrap_err();
    assert!(matches!(err, ExportError::StillRunning));
    profiler.stop();
    assert!(ChromeTraceExporter::from_snapshot(&profiler.snapshot()).is_ok());
}
