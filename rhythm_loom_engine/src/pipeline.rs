// Acceptance pipeline shared by the enumerator and the agglutination engine.
//
// `FilterPipeline` holds one run's `FilterConfig` and applies the enabled
// checks to an onset set in a fixed short-circuit order, cheapest and most
// selective first:
//
//   onset bounds → triviality → isomorphism → maximal evenness → oddity →
//   low entropy → no gaps → relative flatness → ordinal
//
// The order only affects speed; acceptance is the AND of every enabled check.
// `first_rejection` reports which stage failed, which the CLI's inspect
// command prints and tests use to pin behavior.
//
// Derived constants that depend only on a key (the entropy bound per
// timeline length, the ordinal word set per block length) are memoized in
// per-pipeline maps, filled lazily. Agglutination sees several lengths in
// one run, so the caches are keyed rather than computed once up front.

use rustc_hash::{FxHashMap, FxHashSet};

use rhythm_loom_protocol::{ContourOptions, FilterConfig, OddityType};

use crate::contour::{canonical_contour, is_shadow_isomorphic};
use crate::predicates;

/// One check of the pipeline, in evaluation order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    OnsetBounds,
    Trivial,
    Isomorphism,
    MaximallyEven,
    Oddity,
    LowEntropy,
    NoGaps,
    RelativelyFlat,
    Ordinal,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::OnsetBounds => "onset-bounds",
            Stage::Trivial => "trivial",
            Stage::Isomorphism => "isomorphism",
            Stage::MaximallyEven => "maximally-even",
            Stage::Oddity => "oddity",
            Stage::LowEntropy => "low-entropy",
            Stage::NoGaps => "no-gaps",
            Stage::RelativelyFlat => "relatively-flat",
            Stage::Ordinal => "ordinal",
        }
    }
}

pub struct FilterPipeline {
    config: FilterConfig,
    contour: ContourOptions,
    entropy_bounds: FxHashMap<usize, f64>,
    ordinal_words: FxHashMap<usize, FxHashSet<Vec<u8>>>,
}

impl FilterPipeline {
    pub fn new(config: &FilterConfig) -> Self {
        FilterPipeline {
            contour: config.contour_options(),
            config: config.clone(),
            entropy_bounds: FxHashMap::default(),
            ordinal_words: FxHashMap::default(),
        }
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    pub fn contour_options(&self) -> ContourOptions {
        self.contour
    }

    /// The canonical contour recorded for an accepted rhythm.
    pub fn contour_of(&self, onsets: &[usize], len: usize) -> String {
        canonical_contour(onsets, len, self.contour)
    }

    pub fn accepts(&mut self, onsets: &[usize], len: usize) -> bool {
        self.first_rejection(onsets, len).is_none()
    }

    /// The first enabled check that rejects the rhythm, or `None` if it
    /// passes all of them.
    pub fn first_rejection(&mut self, onsets: &[usize], len: usize) -> Option<Stage> {
        let count = onsets.len();
        let cfg = &self.config;

        if count < cfg.min_onsets || count > cfg.max_onsets {
            return Some(Stage::OnsetBounds);
        }
        if cfg.exclude_trivial && (count == 0 || count == len) {
            return Some(Stage::Trivial);
        }
        if cfg.only_isomorphic && !is_shadow_isomorphic(onsets, len, self.contour) {
            return Some(Stage::Isomorphism);
        }
        if cfg.only_maximally_even && !predicates::is_maximally_even(onsets, len) {
            return Some(Stage::MaximallyEven);
        }
        if cfg.oddity_type != OddityType::Off
            && !predicates::passes_oddity(cfg.oddity_type, onsets, len)
        {
            return Some(Stage::Oddity);
        }
        if cfg.only_low_entropy {
            let bound = *self
                .entropy_bounds
                .entry(len)
                .or_insert_with(|| predicates::low_entropy_bound(len));
            if !predicates::is_low_entropy_with_bound(onsets, len, bound) {
                return Some(Stage::LowEntropy);
            }
        }
        if cfg.only_has_no_gaps && !predicates::has_no_gaps(onsets, len) {
            return Some(Stage::NoGaps);
        }
        if cfg.only_relatively_flat && !predicates::relatively_flat(onsets, len) {
            return Some(Stage::RelativelyFlat);
        }
        if cfg.ordinal_enabled && cfg.ordinal_n >= 2 {
            let n = cfg.ordinal_n;
            let words = self
                .ordinal_words
                .entry(n)
                .or_insert_with(|| predicates::ordinal_words(n));
            if !predicates::has_ordinal_with(words, onsets, len, n) {
                return Some(Stage::Ordinal);
            }
        }
        None
    }
}
