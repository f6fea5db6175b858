// rhythm_loom_engine: enumeration, classification and agglutination of
// cyclic binary rhythms.
//
// A rhythm is a digit string (binary, octal or hex) read as onsets on a
// circular timeline. This crate searches the space of such strings, keeps
// the ones that pass a configurable battery of music-theoretic predicates,
// and streams them to a host as `WorkerEvent`s (from `rhythm_loom_protocol`).
//
// Module overview:
// - `bits.rs`:         Digit strings ↔ onsets ↔ grouped text; record helpers.
// - `contour.rs`:      Canonical U/D/S contours under rotation/reflection,
//                      shadow contours, shadow-contour isomorphism.
// - `predicates.rs`:   Maximal evenness, rhythmic oddity, antipodes, entropy,
//                      interval vectors, flatness, ordinal blocks.
// - `pipeline.rs`:     `FilterPipeline`: the enabled predicates in short-circuit
//                      order, with memoized per-length constants.
// - `stream.rs`:       `Host` trait, `Streamer` (batches, progress cadence,
//                      time budget, cancellation), `Collector`.
// - `enumerate.rs`:    Odometer-driven exhaustive enumerator.
// - `agglutinate.rs`:  Pairwise concatenation within meter groups.
// - `catalog.rs`:      Append-only, key-deduplicated record store.
// - `worker.rs`:       Background thread + channels; `WorkerHandle`.
// - `relations.rs`:    Subset/superset/overlap between records.
// - `syncopation.rs`:  Metrical weights and syncopation metrics.
// - `error.rs`:        `EngineError`.
//
// Producers are synchronous functions over a `&mut impl Host`. The worker
// puts them on a thread; tests and the CLI's synchronous paths call them
// directly with a `Collector`. No state is global: caches live in a run's
// `FilterPipeline`, records live in whatever `Catalog` the host owns.

pub mod agglutinate;
pub mod bits;
pub mod catalog;
pub mod contour;
pub mod enumerate;
pub mod error;
pub mod pipeline;
pub mod predicates;
pub mod relations;
pub mod stream;
pub mod syncopation;
pub mod worker;

pub use agglutinate::{MeterGroup, agglutinate, partition_by_meter};
pub use catalog::Catalog;
pub use contour::{canonical_contour, is_shadow_isomorphic, shadow_contour};
pub use enumerate::{Odometer, enumerate};
pub use error::EngineError;
pub use pipeline::{FilterPipeline, Stage};
pub use stream::{BATCH_SIZE, Collector, Host, PROGRESS_EVERY, RunSummary, Streamer, TIME_BUDGET, Termination};
pub use worker::{EVENT_CAPACITY, WorkerHandle, spawn_worker};

#[cfg(test)]
mod tests {
    use super::*;
    use rhythm_loom_protocol::{FilterConfig, Radix};

    /// Records from an enumeration feed straight into agglutination, and the
    /// combined records keep the onset/contour invariants.
    #[test]
    fn enumerate_then_agglutinate() {
        let config = FilterConfig {
            radix: Radix::Binary,
            numerator: 2,
            denominator: 2,
            max_accepted: 0,
            ..FilterConfig::default()
        };
        let mut first = Collector::new();
        enumerate(&config, &mut first);
        let mut catalog = Catalog::new();
        catalog.accept_all(first.records().cloned());
        assert_eq!(catalog.len(), 6);

        let mut second = Collector::new();
        let summary = agglutinate(catalog.records(), &config, &mut second);
        assert_eq!(second.total_pairs(), Some(36));
        assert_eq!(summary.processed, 36);

        let opts = config.contour_options();
        for record in second.records() {
            let (onsets, len) = bits::record_onsets(record);
            assert_eq!(len, 8);
            assert_eq!(record.onset_count, onsets.len());
            assert_eq!(record.canonical_contour, canonical_contour(&onsets, len, opts));
            assert!(is_shadow_isomorphic(&onsets, len, opts));
            assert_eq!(record.numerator, Some(4));
            assert!(record.id.starts_with("aggl:binary:"));
        }

        // Feeding the results back adds each new rhythm once.
        let before = catalog.len();
        let added = catalog.accept_all(second.records().cloned());
        assert_eq!(catalog.len(), before + added);
        assert_eq!(catalog.accept_all(second.records().cloned()), 0);
    }
}
