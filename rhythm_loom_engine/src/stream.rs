// Batching, progress cadence and cancellation for producer runs.
//
// Producers (the enumerator and the agglutination engine) never talk to a
// channel directly. They see a `Host`, which receives `WorkerEvent`s and
// answers whether the run should stop, and drive it through a `Streamer`:
//
// - `accept()` buffers a record; a full buffer (`BATCH_SIZE`) is flushed as
//   one `Batch` event.
// - `advance()` counts one evaluated item. Every `PROGRESS_EVERY` items, or
//   once the wall-clock `TIME_BUDGET` since the last yield is exceeded, the
//   streamer reaches a yield point: it flushes the buffer, emits `Progress`,
//   and polls `Host::should_stop`. Stop is only observed at yield points.
// - `finish()` flushes what is left, emits the final `Progress` and the
//   terminal `Done`. Every run ends through `finish`, cancelled or not.
//   A streamer dropped without `finish` (a producer unwinding from a panic)
//   still flushes its buffer and emits a last `Progress`, but no `Done`;
//   whoever caught the panic closes the stream.
//
// Because buffered records are flushed before every `Progress`, a host that
// has seen a progress event has also seen every record counted in it.
//
// `Collector` is an in-memory `Host` for synchronous callers and tests.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::debug;

use rhythm_loom_protocol::{RhythmRecord, WorkerEvent};

/// Records per `Batch` event.
pub const BATCH_SIZE: usize = 200;
/// Evaluated items between progress checkpoints.
pub const PROGRESS_EVERY: u64 = 2000;
/// Wall-clock budget between yields.
pub const TIME_BUDGET: Duration = Duration::from_millis(16);
/// Items between clock reads in `advance`.
const TIME_CHECK_INTERVAL: u32 = 256;

/// The outside world as a producer sees it.
pub trait Host {
    fn emit(&mut self, event: WorkerEvent);

    /// Polled at yield points only. Returning `true` ends the run after a
    /// final flush.
    fn should_stop(&mut self) -> bool;
}

/// How a run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Termination {
    /// The whole space was visited.
    Exhausted,
    /// `maxAccepted` records were emitted.
    LimitReached,
    /// The host asked to stop.
    Cancelled,
}

/// Final counters of a run, as reported in its last `Progress` event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub processed: u64,
    pub emitted: u64,
    pub termination: Termination,
}

pub struct Streamer<'a, H: Host + ?Sized> {
    host: &'a mut H,
    batch: Vec<RhythmRecord>,
    processed: u64,
    emitted: u64,
    last_yield: Instant,
    since_clock: u32,
    cancelled: bool,
    finished: bool,
}

impl<'a, H: Host + ?Sized> Streamer<'a, H> {
    pub fn new(host: &'a mut H) -> Self {
        Streamer {
            host,
            batch: Vec::with_capacity(BATCH_SIZE),
            processed: 0,
            emitted: 0,
            last_yield: Instant::now(),
            since_clock: 0,
            cancelled: false,
            finished: false,
        }
    }

    /// Announce the size of the item space. Must precede every other event.
    pub fn meta(&mut self, total_pairs: u64) {
        debug_assert!(self.processed == 0 && self.emitted == 0);
        self.host.emit(WorkerEvent::Meta { total_pairs });
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }

    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Buffer an accepted record.
    pub fn accept(&mut self, record: RhythmRecord) {
        self.batch.push(record);
        self.emitted += 1;
        if self.batch.len() >= BATCH_SIZE {
            self.flush();
        }
    }

    /// Count one evaluated item, yielding when the cadence or the time budget
    /// calls for it. Returns `false` once the host has asked to stop.
    pub fn advance(&mut self) -> bool {
        self.processed += 1;
        if self.processed % PROGRESS_EVERY == 0 {
            self.yield_point();
        } else {
            self.since_clock += 1;
            if self.since_clock >= TIME_CHECK_INTERVAL {
                self.since_clock = 0;
                if self.last_yield.elapsed() > TIME_BUDGET {
                    self.yield_point();
                }
            }
        }
        !self.cancelled
    }

    /// Yield if the time budget is spent, without counting an item. Used
    /// between coarse units of work (an agglutination row).
    pub fn check_time_budget(&mut self) -> bool {
        if self.last_yield.elapsed() > TIME_BUDGET {
            self.yield_point();
        }
        !self.cancelled
    }

    fn yield_point(&mut self) {
        self.flush();
        self.emit_progress();
        debug!(processed = self.processed, emitted = self.emitted, "progress");
        if !self.cancelled && self.host.should_stop() {
            self.cancelled = true;
        }
        self.last_yield = Instant::now();
        self.since_clock = 0;
    }

    fn flush(&mut self) {
        if !self.batch.is_empty() {
            let items = std::mem::replace(&mut self.batch, Vec::with_capacity(BATCH_SIZE));
            self.host.emit(WorkerEvent::Batch { items });
        }
    }

    fn emit_progress(&mut self) {
        self.host.emit(WorkerEvent::Progress {
            processed: self.processed,
            emitted: self.emitted,
        });
    }

    /// Close the stream: final batch, final progress, `Done`. A cancelled
    /// run reports `Cancelled` whatever the caller passes.
    pub fn finish(mut self, termination: Termination) -> RunSummary {
        self.flush();
        self.emit_progress();
        self.host.emit(WorkerEvent::Done);
        self.finished = true;
        RunSummary {
            processed: self.processed,
            emitted: self.emitted,
            termination: if self.cancelled {
                Termination::Cancelled
            } else {
                termination
            },
        }
    }
}

impl<H: Host + ?Sized> Drop for Streamer<'_, H> {
    fn drop(&mut self) {
        if !self.finished {
            self.flush();
            self.emit_progress();
        }
    }
}

/// In-memory host: keeps every event, optionally asks to stop after a number
/// of yield points.
#[derive(Debug, Default)]
pub struct Collector {
    pub events: Vec<WorkerEvent>,
    stop_after_yields: Option<u64>,
    yields: u64,
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    /// A collector that requests a stop at its `n`th yield point.
    pub fn stopping_after(n: u64) -> Self {
        Collector {
            stop_after_yields: Some(n),
            ..Self::default()
        }
    }

    /// Every record from every batch, in stream order.
    pub fn records(&self) -> impl Iterator<Item = &RhythmRecord> {
        self.events.iter().flat_map(|event| match event {
            WorkerEvent::Batch { items } => items.as_slice(),
            _ => &[] as &[RhythmRecord],
        })
    }

    /// `(processed, emitted)` of the most recent progress event.
    pub fn last_progress(&self) -> Option<(u64, u64)> {
        self.events.iter().rev().find_map(|event| match event {
            WorkerEvent::Progress { processed, emitted } => Some((*processed, *emitted)),
            _ => None,
        })
    }

    pub fn total_pairs(&self) -> Option<u64> {
        self.events.iter().find_map(|event| match event {
            WorkerEvent::Meta { total_pairs } => Some(*total_pairs),
            _ => None,
        })
    }
}

impl Host for Collector {
    fn emit(&mut self, event: WorkerEvent) {
        self.events.push(event);
    }

    fn should_stop(&mut self) -> bool {
        self.yields += 1;
        self.stop_after_yields.is_some_and(|n| self.yields >= n)
    }
}
