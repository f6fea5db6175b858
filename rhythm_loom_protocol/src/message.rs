// Messages exchanged between a host and a rhythm producer.
//
// Two enums define the full vocabulary:
// - `WorkerEvent`: producer to host, one ordered stream per run:
//   `Meta` (agglutination only, at most once, first) → `Batch` / `Progress`
//   interleaved → exactly one terminal `Done`.
// - `ControlMessage`: host to producer. `Start` begins a run, `Stop` requests
//   cooperative cancellation. A stopped run still flushes its buffered
//   records and ends with `Done`.
//
// All types serialize as internally tagged JSON (`{"type": "batch", ...}`)
// so a persisted stream reads naturally and can be replayed by `framing.rs`.

use serde::{Deserialize, Serialize};

use crate::config::FilterConfig;
use crate::types::RhythmRecord;

/// Producer-to-host stream events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum WorkerEvent {
    /// Size of the pair space, sent before any other event by agglutination
    /// runs so hosts can show determinate progress.
    Meta { total_pairs: u64 },
    /// Accepted records, in enumeration/pair order.
    Batch { items: Vec<RhythmRecord> },
    /// Running counters; both fields never decrease within a run.
    Progress { processed: u64, emitted: u64 },
    /// Terminal event. Nothing follows it within the run.
    Done,
}

impl WorkerEvent {
    pub fn is_done(&self) -> bool {
        matches!(self, WorkerEvent::Done)
    }
}

/// What a `Start` asks the producer to do.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum StartPayload {
    /// Exhaustive single-rhythm enumeration.
    Generate { filters: FilterConfig },
    /// Pairwise concatenation of `items`. The filters' numerator and
    /// denominator serve as the fallback meter for items that carry none.
    Agglutinate {
        items: Vec<RhythmRecord>,
        filters: FilterConfig,
    },
}

impl StartPayload {
    pub fn filters(&self) -> &FilterConfig {
        match self {
            StartPayload::Generate { filters } | StartPayload::Agglutinate { filters, .. } => {
                filters
            }
        }
    }
}

/// Host-to-producer control messages.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ControlMessage {
    Start { payload: StartPayload },
    Stop,
}
