// Syncopation metrics from a hierarchical metrical grid.
//
// Each timeline step gets a metrical weight. Beat starts are strongest, then
// positions on successively halved subdivisions of the beat (floor halving,
// so beats of non-power-of-two length still work), then everything else at
// weight 1. The measure downbeat gets +1 on top.
//
// Metrics over an onset set:
// - `lhl_approx`: for each onset, find the nearest earlier step with a
//   strictly greater weight; if that step is a rest, add the weight
//   difference (a Longuet-Higgins/Lee style count, without wrapping).
// - `offbeat_weighted`: sum of `max_weight - weight` over onsets.
// - on-beat and off-beat onset counts, mean onset weight, max weight.

use serde::Serialize;

use rhythm_loom_protocol::{Meter, RhythmRecord};

use crate::bits::{bits_per_beat, record_onsets};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncopationMetrics {
    pub lhl_approx: u32,
    pub offbeat_weighted: u32,
    pub on_beat_count: usize,
    pub off_beat_count: usize,
    pub mean_onset_weight: f64,
    pub max_weight: u32,
}

/// Weight of every step of a `total_bits` timeline with `beats` beats of
/// `steps_per_beat` steps. `steps_per_beat` is clamped to at least 1.
pub fn build_metrical_weights(total_bits: usize, beats: usize, steps_per_beat: usize) -> Vec<u32> {
    let spb = steps_per_beat.max(1);
    let mut levels = vec![spb];
    let mut step = spb;
    while step > 1 {
        step /= 2;
        levels.push(step);
    }
    let strongest = levels.len() as u32;
    let measure = beats * spb;

    (0..total_bits)
        .map(|i| {
            let pos = i % spb;
            let mut weight = levels
                .iter()
                .position(|&level| pos % level == 0)
                .map_or(1, |s| strongest - s as u32);
            if measure > 0 && i % measure == 0 {
                weight += 1;
            }
            weight
        })
        .collect()
}

pub fn compute_syncopation(
    onsets: &[usize],
    total_bits: usize,
    beats: usize,
    steps_per_beat: usize,
) -> SyncopationMetrics {
    let spb = steps_per_beat.max(1);
    let weights = build_metrical_weights(total_bits, beats, spb);
    let max_weight = weights.iter().copied().max().unwrap_or(0);

    let mut is_onset = vec![false; total_bits];
    for &p in onsets.iter().filter(|&&p| p < total_bits) {
        is_onset[p] = true;
    }

    let mut lhl_approx = 0;
    let mut offbeat_weighted = 0;
    let mut on_beat_count = 0;
    let mut off_beat_count = 0;
    let mut weight_sum = 0u64;

    for (i, &weight) in weights.iter().enumerate() {
        if !is_onset[i] {
            continue;
        }
        weight_sum += u64::from(weight);
        offbeat_weighted += max_weight.saturating_sub(weight);
        if i % spb == 0 {
            on_beat_count += 1;
        } else {
            off_beat_count += 1;
        }
        let stronger = (0..i).rev().find(|&j| weights[j] > weight);
        if let Some(j) = stronger.filter(|&j| !is_onset[j]) {
            lhl_approx += weights[j] - weight;
        }
    }

    let onset_total = on_beat_count + off_beat_count;
    SyncopationMetrics {
        lhl_approx,
        offbeat_weighted,
        on_beat_count,
        off_beat_count,
        mean_onset_weight: if onset_total > 0 {
            weight_sum as f64 / onset_total as f64
        } else {
            0.0
        },
        max_weight,
    }
}

/// Metrics for a catalog record, laid out by its own meter (or `fallback`
/// when it has none).
pub fn syncopation_for_record(record: &RhythmRecord, fallback: Meter) -> SyncopationMetrics {
    let meter = record.meter().unwrap_or(fallback).normalized();
    let (onsets, total_bits) = record_onsets(record);
    let spb = bits_per_beat(record.radix, meter.denominator as usize);
    compute_syncopation(&onsets, total_bits, meter.numerator as usize, spb)
}
