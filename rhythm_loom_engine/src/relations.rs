// Onset-set relations between catalog records.
//
// For a selected record, every other record of the same timeline length is
// classified by its onset mask: a strict subset of the selection, a strict
// superset, or overlapping (shares at least one onset, neither contains the
// other). Equal masks share onsets without being strict containment, so they
// land in `overlaps`. Records of other lengths, records with an empty
// intersection, and the selected record itself (matched by id) are skipped.
//
// Masks are multi-word bitsets, so any timeline length works.

use rhythm_loom_protocol::RhythmRecord;

use crate::bits::record_onsets;

/// Onset bitset over a timeline of `bit_len` steps.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OnsetMask {
    words: Vec<u64>,
    bit_len: usize,
}

impl OnsetMask {
    /// Onsets at or past `bit_len` are dropped.
    pub fn from_onsets(onsets: &[usize], bit_len: usize) -> Self {
        let mut words = vec![0u64; bit_len.div_ceil(64)];
        for &p in onsets.iter().filter(|&&p| p < bit_len) {
            words[p / 64] |= 1u64 << (p % 64);
        }
        OnsetMask { words, bit_len }
    }

    pub fn from_record(record: &RhythmRecord) -> Self {
        let (onsets, bit_len) = record_onsets(record);
        Self::from_onsets(&onsets, bit_len)
    }

    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    pub fn count_ones(&self) -> u32 {
        self.words.iter().map(|w| w.count_ones()).sum()
    }

    /// Every onset of `self` is an onset of `other`. Masks of different
    /// lengths are never subsets of each other.
    pub fn is_subset_of(&self, other: &OnsetMask) -> bool {
        self.bit_len == other.bit_len
            && self.words.iter().zip(&other.words).all(|(a, b)| a & !b == 0)
    }

    pub fn intersects(&self, other: &OnsetMask) -> bool {
        self.words.iter().zip(&other.words).any(|(a, b)| a & b != 0)
    }
}

/// Records related to a selection, in input order.
#[derive(Debug, Default)]
pub struct Relations<'a> {
    pub subsets: Vec<&'a RhythmRecord>,
    pub supersets: Vec<&'a RhythmRecord>,
    pub overlaps: Vec<&'a RhythmRecord>,
}

pub fn compute_relations<'a>(selected: &RhythmRecord, items: &'a [RhythmRecord]) -> Relations<'a> {
    let target = OnsetMask::from_record(selected);
    let mut relations = Relations::default();
    for item in items {
        if item.id == selected.id {
            continue;
        }
        let mask = OnsetMask::from_record(item);
        if mask.bit_len() != target.bit_len() {
            continue;
        }
        let equal = mask == target;
        if !equal && mask.is_subset_of(&target) {
            relations.subsets.push(item);
        } else if !equal && target.is_subset_of(&mask) {
            relations.supersets.push(item);
        } else if mask.intersects(&target) {
            relations.overlaps.push(item);
        }
    }
    relations
}
