//! Bounded-concurrency decode pipeline.
//!
//! Fans an archive's entries out across a fixed worker pool. Each worker
//! decodes whole entries into [`FileResult`]s and pushes them onto a bounded
//! completion channel; once the channel is full, finished workers block until
//! the consumer drains a result. Buffered memory is therefore capped at
//! `queue_capacity + workers` results no matter how large the archive is.

use std::io::{BufRead, BufReader, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded, unbounded};
use tracing::{debug, info, warn};

use crate::archive::{Archive, EntryInfo, EntryReader};
use crate::decode;
use crate::error::{Result, XvError};
use crate::model::Item;

/// Default completion channel capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 32;
/// Default run deadline in hours.
pub const DEFAULT_DEADLINE_HOURS: u64 = 48;

/// Most stream entries hold a few thousand lines.
const ITEM_CAPACITY: usize = 4096;

/// Tuning knobs for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Worker thread count; clamped to the number of scheduled entries.
    pub workers: usize,
    /// Completion channel capacity.
    pub queue_capacity: usize,
    /// Overall run deadline, guarding against indefinite hangs.
    pub deadline: Duration,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            workers: num_cpus::get(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            deadline: Duration::from_secs(DEFAULT_DEADLINE_HOURS * 3600),
        }
    }
}

/// The decode outcome of one archive entry: one slot per input line, in line
/// order, with `None` marking lines that failed to decode.
pub struct FileResult {
    path: String,
    items: Vec<Option<Item>>,
    completed_at: Instant,
}

impl FileResult {
    pub(crate) fn new(path: String, items: Vec<Option<Item>>) -> Self {
        Self {
            path,
            items,
            completed_at: Instant::now(),
        }
    }

    /// Entry path relative to the container root.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Per-line decode outcomes, in line order.
    #[must_use]
    pub fn items(&self) -> &[Option<Item>] {
        &self.items
    }

    /// Successfully decoded items, in line order.
    pub fn decoded(&self) -> impl Iterator<Item = &Item> {
        self.items.iter().flatten()
    }

    #[must_use]
    pub fn line_count(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn failed_lines(&self) -> usize {
        self.items.iter().filter(|item| item.is_none()).count()
    }

    /// When the producing worker finished decoding this entry.
    #[must_use]
    pub const fn completed_at(&self) -> Instant {
        self.completed_at
    }
}

/// Decode every entry of `archive` not filtered out by `skip`, delivering
/// each [`FileResult`] to `on_file` on the calling thread.
///
/// Returns `Ok(true)` after all scheduled entries were delivered and
/// accepted. Returns `Ok(false)` with a hard shutdown (in-flight work
/// cancelled, unfinished results discarded) when the callback returns
/// `Ok(false)`; a callback error propagates after the same shutdown.
pub fn run<S, F>(
    archive: &Archive,
    options: &PipelineOptions,
    mut skip: S,
    mut on_file: F,
) -> Result<bool>
where
    S: FnMut(&EntryInfo) -> bool,
    F: FnMut(FileResult) -> Result<bool>,
{
    let available = archive.entries()?;
    let available_count = available.len();
    let entries: Vec<EntryInfo> = available.into_iter().filter(|entry| !skip(entry)).collect();
    let total = entries.len();
    info!(
        archive = archive.name(),
        scheduled = total,
        skipped = available_count - total,
        "starting decode pipeline"
    );
    if entries.is_empty() {
        return Ok(true);
    }

    let worker_count = options.workers.clamp(1, total);
    let queue_capacity = options.queue_capacity.max(1);
    let deadline = Instant::now() + options.deadline;

    // Every worker gets its own container handle before any thread starts,
    // so handle failures abort the run instead of silently losing entries.
    let mut readers = Vec::with_capacity(worker_count);
    for _ in 0..worker_count {
        readers.push(archive.reader()?);
    }

    let (job_tx, job_rx) = unbounded();
    for entry in entries {
        job_tx
            .send(entry)
            .map_err(|_| XvError::pipeline("job queue closed before scheduling finished"))?;
    }
    drop(job_tx);

    let cancelled = AtomicBool::new(false);
    let (result_tx, result_rx) = bounded::<FileResult>(queue_capacity);

    thread::scope(|scope| {
        for reader in readers {
            let jobs = job_rx.clone();
            let results = result_tx.clone();
            let cancelled = &cancelled;
            scope.spawn(move || worker_loop(reader, &jobs, &results, cancelled));
        }
        drop(job_rx);
        drop(result_tx);

        let mut drained = 0usize;
        let outcome = loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match result_rx.recv_timeout(remaining) {
                Ok(result) => {
                    drained += 1;
                    debug!(
                        entry = result.path(),
                        queued = result_rx.len(),
                        queue_wait_ms = result.completed_at().elapsed().as_millis() as u64,
                        "drained result"
                    );
                    match on_file(result) {
                        Ok(true) => {
                            if drained == total {
                                break Ok(true);
                            }
                        }
                        Ok(false) => break Ok(false),
                        Err(error) => break Err(error),
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break Ok(true),
                Err(RecvTimeoutError::Timeout) => {
                    break Err(XvError::DeadlineExceeded {
                        hours: options.deadline.as_secs() / 3600,
                        outstanding: total - drained,
                    });
                }
            }
        };

        if !matches!(outcome, Ok(true)) {
            cancelled.store(true, Ordering::Relaxed);
            warn!(
                archive = archive.name(),
                drained, total, "hard pipeline shutdown"
            );
        }
        // Dropping the receiver unblocks any worker stuck in send.
        drop(result_rx);
        outcome
    })
}

fn worker_loop(
    mut reader: EntryReader,
    jobs: &Receiver<EntryInfo>,
    results: &Sender<FileResult>,
    cancelled: &AtomicBool,
) {
    while let Ok(entry) = jobs.recv() {
        if cancelled.load(Ordering::Relaxed) {
            return;
        }
        let result = decode_entry(&mut reader, &entry, cancelled);
        if results.send(result).is_err() {
            // Consumer went away; nothing left to produce for.
            return;
        }
    }
}

fn decode_entry(reader: &mut EntryReader, entry: &EntryInfo, cancelled: &AtomicBool) -> FileResult {
    let started = Instant::now();
    let mut items = Vec::with_capacity(ITEM_CAPACITY);
    match reader.open(entry) {
        Ok(stream) => read_lines(stream, entry, cancelled, &mut items),
        Err(error) => warn!(entry = entry.path(), %error, "could not open entry"),
    }
    debug!(
        entry = entry.path(),
        lines = items.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "decoded entry"
    );
    FileResult::new(entry.path().to_string(), items)
}

fn read_lines(
    stream: Box<dyn Read + '_>,
    entry: &EntryInfo,
    cancelled: &AtomicBool,
    items: &mut Vec<Option<Item>>,
) {
    let mut lines = BufReader::new(stream);
    let mut line = Vec::with_capacity(8 * 1024);
    loop {
        if cancelled.load(Ordering::Relaxed) {
            // The result will be discarded; no point finishing the entry.
            items.clear();
            return;
        }
        line.clear();
        match lines.read_until(b'\n', &mut line) {
            Ok(0) => return,
            Ok(_) => match decode::decode_line(&line) {
                Ok(item) => items.push(Some(item)),
                Err(error) => {
                    debug!(
                        entry = entry.path(),
                        line = items.len() + 1,
                        %error,
                        "skipping undecodable line"
                    );
                    items.push(None);
                }
            },
            Err(error) => {
                warn!(entry = entry.path(), %error, "read failed, abandoning rest of entry");
                return;
            }
        }
    }
}
