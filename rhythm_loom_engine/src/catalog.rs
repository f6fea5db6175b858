// Append-only catalog of accepted rhythms with cross-run deduplication.
//
// Records are keyed by `{radix}:{grouped}` (see `RhythmRecord::catalog_key`),
// not by id: ids carry a per-run index, so the same rhythm found by two runs
// has two ids but one key. `accept` inserts a record only if its key is new.
// The catalog only grows; `clear` is the one way to drop records.
//
// The catalog is owned by a single consumer loop (a host draining a worker,
// or a test), so it needs no interior locking. It is also the pool handed to
// agglutination runs.

use std::io::Read;

use rustc_hash::FxHashSet;

use rhythm_loom_protocol::{RhythmRecord, WorkerEvent, read_event};

use crate::error::EngineError;

#[derive(Debug, Default, Clone)]
pub struct Catalog {
    records: Vec<RhythmRecord>,
    keys: FxHashSet<String>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `record` unless a record with the same key is present. Returns
    /// whether it was inserted.
    pub fn accept(&mut self, record: RhythmRecord) -> bool {
        if !self.keys.insert(record.catalog_key()) {
            return false;
        }
        self.records.push(record);
        true
    }

    /// Accept every record in order; returns how many were new.
    pub fn accept_all(&mut self, records: impl IntoIterator<Item = RhythmRecord>) -> usize {
        let mut added = 0;
        for record in records {
            if self.accept(record) {
                added += 1;
            }
        }
        added
    }

    /// Feed one stream event. Only `Batch` events carry records; returns the
    /// number of new records.
    pub fn ingest(&mut self, event: WorkerEvent) -> usize {
        match event {
            WorkerEvent::Batch { items } => self.accept_all(items),
            _ => 0,
        }
    }

    /// Replay a persisted framed event stream until end of input. Returns the
    /// number of new records.
    pub fn ingest_stream<R: Read>(&mut self, reader: &mut R) -> Result<usize, EngineError> {
        let mut added = 0;
        while let Some(event) = read_event(reader)? {
            added += self.ingest(event);
        }
        Ok(added)
    }

    pub fn contains(&self, record: &RhythmRecord) -> bool {
        self.keys.contains(&record.catalog_key())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn get(&self, id: &str) -> Option<&RhythmRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in insertion order.
    pub fn records(&self) -> &[RhythmRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &RhythmRecord> {
        self.records.iter()
    }

    /// Drop every record and the key index.
    pub fn clear(&mut self) {
        self.records.clear();
        self.keys.clear();
    }
}
