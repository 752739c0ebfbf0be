//! Built-in workload profiled by the demo binary.
//!
//! Worker threads are spawned and report ready from inside `worker_loop`.
//! The main thread waits for all of them, then starts the profiler from
//! inside `profile_session`, so every thread is first observed mid-call and
//! its tree begins with backfilled frames.
//!
//! ```text
//! main:      profile_session ─► dispatch ─► Job::new
//! worker-N:  worker_loop ─► Parser.parse ─► Parser.tokenize ─► C:crc32
//!                         └► Renderer.render ─► Renderer.layout
//! ```

use anyhow::{Context, Result};
use callscope::{probe, probe_method, probe_native, Profiler};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::thread::JoinHandle;

pub struct WorkloadConfig {
    pub threads: usize,
    pub iterations: usize,
}

struct Job {
    id: usize,
    text: String,
}

impl Job {
    fn new(id: usize) -> Self {
        probe_method!(Job, "new");
        let text = (0..16 + id % 32).map(|i| format!("tok{} ", (i * 7 + id) % 97)).collect();
        Self { id, text }
    }
}

struct Parser;

impl Parser {
    fn parse(job: &Job) -> Vec<u32> {
        probe_method!(Parser, "parse");
        Self::tokenize(&job.text).into_iter().map(|t| crc32(t.as_bytes())).collect()
    }

    fn tokenize(text: &str) -> Vec<&str> {
        probe_method!(Parser, "tokenize");
        text.split_whitespace().collect()
    }
}

struct Renderer;

impl Renderer {
    fn render(job_id: usize, hashes: &[u32]) -> u64 {
        probe_method!(Renderer, "render");
        Self::layout(hashes).wrapping_add(job_id as u64)
    }

    fn layout(hashes: &[u32]) -> u64 {
        probe_method!(Renderer, "layout");
        hashes.iter().fold(0_u64, |acc, &h| acc.rotate_left(5) ^ u64::from(h))
    }
}

/// Stands in for a call into a foreign library.
fn crc32(bytes: &[u8]) -> u32 {
    probe_native!("crc32");
    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in bytes {
        crc ^= u32::from(byte);
        for _ in 0..8 {
            let mask = (crc & 1).wrapping_neg();
            crc = (crc >> 1) ^ (0xEDB8_8320 & mask);
        }
    }
    !crc
}

fn worker_loop(jobs: &Receiver<Job>, ready: &Sender<()>) -> u64 {
    probe!("worker_loop");
    let _ = ready.send(());
    let mut digest = 0_u64;
    for job in jobs {
        let hashes = Parser::parse(&job);
        digest ^= Renderer::render(job.id, &hashes);
    }
    digest
}

fn dispatch(profiler: &Profiler, config: &WorkloadConfig) -> Result<Vec<u64>> {
    probe!("dispatch");
    let threads = config.threads.max(1);
    let (tx, rx) = bounded::<Job>(threads * 4);
    let (ready_tx, ready_rx) = bounded::<()>(threads);

    let workers = (0..threads)
        .map(|i| {
            let rx = rx.clone();
            let ready = ready_tx.clone();
            std::thread::Builder::new()
                .name(format!("worker-{i}"))
                .spawn(move || worker_loop(&rx, &ready))
                .with_context(|| format!("Failed to spawn worker-{i}"))
        })
        .collect::<Result<Vec<JoinHandle<u64>>>>()?;
    drop(rx);
    drop(ready_tx);

    // Every worker is inside `worker_loop` before the hook goes in.
    for _ in 0..threads {
        ready_rx.recv().context("Worker exited before it was ready")?;
    }

    profiler.start().context("Failed to start profiler")?;
    log::info!("profiling {} workers x {} jobs", workers.len(), config.iterations);

    for id in 0..config.iterations * workers.len() {
        // Workers exit early if the profiler panicked inside one of them.
        if tx.send(Job::new(id)).is_err() {
            break;
        }
    }
    drop(tx);

    workers
        .into_iter()
        .map(|w| w.join().map_err(|_| anyhow::anyhow!("worker thread panicked")))
        .collect()
}

/// Run the workload under `profiler`, which is started once every worker is
/// waiting for jobs. Returns the per-worker digests.
pub fn run(profiler: &Profiler, config: &WorkloadConfig) -> Result<Vec<u64>> {
    probe!("profile_session");
    dispatch(profiler, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use callscope::ProfilerOptions;

    #[test]
    fn test_workers_are_observed_mid_loop() {
        let profiler = Profiler::new(ProfilerOptions::new()).unwrap();
        let digests = run(&profiler, &WorkloadConfig { threads: 3, iterations: 4 }).unwrap();
        profiler.stop();
        assert_eq!(digests.len(), 3);

        let structure = profiler.hierarchical_structure();
        let workers: Vec<_> =
            structure.values().filter(|t| t.thread_info.name.starts_with("worker-")).collect();
        // A worker that got no job never fires an event while profiling.
        assert!(!workers.is_empty() && workers.len() <= 3);
        for tree in workers {
            let roots: Vec<_> = tree.roots().map(|r| r.qualified_name.as_str()).collect();
            assert_eq!(roots, vec!["worker_loop"]);
        }
    }
}
