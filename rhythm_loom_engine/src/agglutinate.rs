// Pairwise agglutination engine.
//
// Takes a pool of accepted records and concatenates every ordered pair that
// shares a meter. The pool is partitioned by `(radix, numerator,
// denominator)` in first-seen order; records without a meter take the run
// config's meter, and zero meter fields are clamped to 1. Each member's
// grouped string, onsets and bit length are computed once per run.
//
// For every ordered pair (A, B) in a group, self-pairs included, the
// concatenation has onsets `A ∪ (B + A.len)` on a timeline of
// `A.len + B.len` steps and goes through the same `FilterPipeline` as the
// enumerator. Accepted concatenations become records with id
// `aggl:{radix}:{grouped}:{index}`, the two grouped strings joined by a
// space, and the group's meter with its numerator doubled.
//
// The run opens with one `Meta { total_pairs }` event (the sum of |group|²)
// and otherwise streams exactly like the enumerator. The time budget is also
// checked after every row of a group. `maxAccepted` does not bound
// agglutination; the pool size does.

use rustc_hash::FxHashMap;
use tracing::{debug, info};

use rhythm_loom_protocol::{FilterConfig, Meter, Radix, RhythmRecord};

use crate::bits::record_onsets;
use crate::pipeline::FilterPipeline;
use crate::stream::{Host, RunSummary, Streamer, Termination};

struct Member {
    grouped: String,
    onsets: Vec<usize>,
    total_bits: usize,
}

/// Pool records sharing one radix and meter.
pub struct MeterGroup {
    pub radix: Radix,
    pub meter: Meter,
    members: Vec<Member>,
}

impl MeterGroup {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Ordered pairs in this group, self-pairs included.
    pub fn pair_count(&self) -> u64 {
        let n = self.members.len() as u64;
        n * n
    }
}

/// Group pool records by radix and normalized meter, in first-seen order.
pub fn partition_by_meter(items: &[RhythmRecord], fallback: Meter) -> Vec<MeterGroup> {
    let mut groups: Vec<MeterGroup> = Vec::new();
    let mut index: FxHashMap<(Radix, Meter), usize> = FxHashMap::default();
    for record in items {
        let meter = Meter::new(
            record.numerator.unwrap_or(fallback.numerator),
            record.denominator.unwrap_or(fallback.denominator),
        )
        .normalized();
        let slot = *index.entry((record.radix, meter)).or_insert_with(|| {
            groups.push(MeterGroup {
                radix: record.radix,
                meter,
                members: Vec::new(),
            });
            groups.len() - 1
        });
        let (onsets, total_bits) = record_onsets(record);
        groups[slot].members.push(Member {
            grouped: record
                .grouped_digits_string
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" "),
            onsets,
            total_bits,
        });
    }
    groups
}

fn join_grouped(a: &str, b: &str) -> String {
    match (a.is_empty(), b.is_empty()) {
        (true, _) => b.to_string(),
        (_, true) => a.to_string(),
        _ => format!("{a} {b}"),
    }
}

/// Run one agglutination pass over `items`, streaming into `host`.
pub fn agglutinate<H: Host + ?Sized>(
    items: &[RhythmRecord],
    config: &FilterConfig,
    host: &mut H,
) -> RunSummary {
    let groups = partition_by_meter(items, config.meter());
    let total_pairs: u64 = groups.iter().map(MeterGroup::pair_count).sum();
    info!(
        pool = items.len(),
        groups = groups.len(),
        total_pairs,
        "agglutination started"
    );

    let mut pipeline = FilterPipeline::new(config);
    let mut streamer = Streamer::new(host);
    streamer.meta(total_pairs);
    let mut onsets = Vec::new();

    'groups: for group in &groups {
        debug!(
            radix = %group.radix,
            meter = %group.meter,
            members = group.len(),
            "agglutinating group"
        );
        let meter = Meter::new(group.meter.numerator.saturating_mul(2), group.meter.denominator);
        for a in &group.members {
            for b in &group.members {
                let len = a.total_bits + b.total_bits;
                onsets.clear();
                onsets.extend_from_slice(&a.onsets);
                onsets.extend(b.onsets.iter().map(|&p| p + a.total_bits));

                if pipeline.accepts(&onsets, len) {
                    let grouped = join_grouped(&a.grouped, &b.grouped);
                    let record = RhythmRecord {
                        id: format!("aggl:{}:{grouped}:{}", group.radix, streamer.emitted()),
                        radix: group.radix,
                        onset_count: onsets.len(),
                        canonical_contour: pipeline.contour_of(&onsets, len),
                        grouped_digits_string: grouped,
                        numerator: Some(meter.numerator),
                        denominator: Some(meter.denominator),
                        digits: None,
                    };
                    streamer.accept(record);
                }
                if !streamer.advance() {
                    break 'groups;
                }
            }
            if !streamer.check_time_budget() {
                break 'groups;
            }
        }
    }

    let termination = if streamer.is_cancelled() {
        Termination::Cancelled
    } else {
        Termination::Exhausted
    };
    let summary = streamer.finish(termination);
    info!(
        processed = summary.processed,
        emitted = summary.emitted,
        termination = ?summary.termination,
        "agglutination finished"
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::group_digits;
    use crate::stream::{Collector, PROGRESS_EVERY};
    use rhythm_loom_protocol::WorkerEvent;

    fn item(radix: Radix, grouped: &str, meter: Option<(u32, u32)>) -> RhythmRecord {
        RhythmRecord {
            id: format!("{radix}:{grouped}:0"),
            radix,
            grouped_digits_string: grouped.into(),
            onset_count: 0,
            canonical_contour: String::new(),
            numerator: meter.map(|m| m.0),
            denominator: meter.map(|m| m.1),
            digits: None,
        }
    }

    fn grouped(host: &Collector) -> Vec<&str> {
        host.records()
            .map(|r| r.grouped_digits_string.as_str())
            .collect()
    }

    #[test]
    fn pairs_are_counted_per_meter_group() {
        let pool = vec![
            item(Radix::Binary, "10 01", Some((2, 2))),
            item(Radix::Octal, "3", Some((1, 2))),
            item(Radix::Binary, "11 00", Some((2, 2))),
            item(Radix::Binary, "01 10", Some((2, 2))),
            item(Radix::Octal, "5", Some((1, 2))),
        ];
        let groups = partition_by_meter(&pool, Meter::new(2, 2));
        assert_eq!(groups.len(), 2);
        assert_eq!((groups[0].radix, groups[0].len()), (Radix::Binary, 3));
        assert_eq!((groups[1].radix, groups[1].len()), (Radix::Octal, 2));

        let mut host = Collector::new();
        let summary = agglutinate(&pool, &FilterConfig::exhaustive(), &mut host);
        assert_eq!(host.events[0], WorkerEvent::Meta { total_pairs: 13 });
        assert_eq!(summary.processed, 13);
        assert_eq!(summary.termination, Termination::Exhausted);
    }

    #[test]
    fn every_ordered_pair_including_self_pairs() {
        let pool = vec![
            item(Radix::Binary, "10", Some((1, 2))),
            item(Radix::Binary, "01", Some((1, 2))),
        ];
        let mut host = Collector::new();
        agglutinate(&pool, &FilterConfig::exhaustive(), &mut host);
        assert_eq!(grouped(&host), vec!["10 10", "10 01", "01 10", "01 01"]);
        for record in host.records() {
            assert_eq!(record.numerator, Some(2), "numerator doubles");
            assert_eq!(record.denominator, Some(2));
            assert_eq!(record.onset_count, 2);
        }
    }

    #[test]
    fn concatenations_go_through_the_filters() {
        let pool = vec![
            item(Radix::Binary, "10", Some((1, 2))),
            item(Radix::Binary, "01", Some((1, 2))),
        ];
        let config = FilterConfig {
            only_maximally_even: true,
            ..FilterConfig::exhaustive()
        };
        let mut host = Collector::new();
        let summary = agglutinate(&pool, &config, &mut host);
        let ids: Vec<&str> = host.records().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["aggl:binary:10 10:0", "aggl:binary:01 01:1"]);
        assert_eq!(summary.processed, 4);
        assert_eq!(summary.emitted, 2);
    }

    #[test]
    fn different_meters_never_combine() {
        let pool = vec![
            item(Radix::Binary, "1", Some((1, 1))),
            item(Radix::Binary, "10", Some((1, 2))),
            item(Radix::Hex, "1", Some((1, 1))),
        ];
        let mut host = Collector::new();
        agglutinate(&pool, &FilterConfig::exhaustive(), &mut host);
        assert_eq!(host.total_pairs(), Some(3));
        assert_eq!(grouped(&host), vec!["1 1", "10 10", "1 1"]);
        let radices: Vec<Radix> = host.records().map(|r| r.radix).collect();
        assert_eq!(radices, vec![Radix::Binary, Radix::Binary, Radix::Hex]);
    }

    #[test]
    fn missing_meters_fall_back_to_the_config() {
        let pool = vec![
            item(Radix::Binary, "10", None),
            item(Radix::Binary, "01", Some((1, 2))),
            // A zero numerator is clamped to 1.
            item(Radix::Binary, "11", Some((0, 2))),
        ];
        let config = FilterConfig {
            numerator: 1,
            denominator: 2,
            ..FilterConfig::exhaustive()
        };
        let groups = partition_by_meter(&pool, config.meter());
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].meter, Meter::new(1, 2));
        assert_eq!(groups[0].pair_count(), 9);
    }

    #[test]
    fn stop_request_ends_mid_group() {
        let pool: Vec<RhythmRecord> = (0..60u8)
            .map(|v| item(Radix::Hex, &group_digits(&[v / 16, v % 16], Radix::Hex, 2), Some((1, 2))))
            .collect();
        let mut host = Collector::stopping_after(1);
        let summary = agglutinate(&pool, &FilterConfig::exhaustive(), &mut host);
        assert_eq!(host.total_pairs(), Some(3600));
        assert_eq!(summary.termination, Termination::Cancelled);
        assert!(summary.processed <= PROGRESS_EVERY);
        assert!(host.events.last().unwrap().is_done());
    }
}
