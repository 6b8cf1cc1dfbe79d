//! The shared dispatch worker pool for the multiplexor. Every `/rev`
//! connection's reader pushes raw frames onto one shared job queue
//! instead of decoding and dispatching them inline; a fixed pool of
//! workers drains it, each running an identical, stateless
//! `recv -> process_job -> send` loop. This is what actually
//! parallelises the JSON encode/decode work across every multiplexed
//! client on the server, not just across `/rev` connections.

use std::num::NonZeroUsize;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use crate::multiplex::{process_job, Job};

pub const WORK_QUEUE_SIZE: usize = 1024;
const WORKER_COUNT_FALLBACK: usize = 128;

/// Number of available cores, or 128 if that can't be determined.
pub fn worker_count() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(WORKER_COUNT_FALLBACK)
}

/// Spawns `n` worker tasks draining `job_rx`. Workers hold no state
/// across items, so any of them can pick up any job; a shared
/// `Mutex`-guarded receiver is enough since only one worker needs to
/// win each `recv`.
pub fn spawn_workers(n: usize, job_rx: mpsc::Receiver<Job>) {
    let job_rx = Arc::new(Mutex::new(job_rx));
    for _ in 0..n {
        let job_rx = job_rx.clone();
        tokio::spawn(async move {
            loop {
                let job = job_rx.lock().await.recv().await;
                let Some(job) = job else { break };
                process_job(job).await;
            }
        });
    }
}
