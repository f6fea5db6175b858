// Music-theoretic predicates over an onset set on a circular timeline.
//
// Every function takes sorted onsets in `[0, len)` and the timeline length.
// They are pure and infallible. Unsorted or out-of-range onsets are a caller
// bug and trip `debug_assert!`; in release builds each function documents
// what it does with them (usually: positions are reduced modulo `len`).
//
// Classifiers:
// - Maximal evenness: every circular interval is floor(L/k) or ceil(L/k),
//   with exactly L mod k of the ceiling intervals (Euclidean rhythms).
// - Rhythmic oddity: L even, intervals restricted ({2,3} or all odd), and
//   no contiguous run of intervals short of the full cycle sums to L/2, so
//   the circle cannot be cut into two equal halves at onsets.
// - Antipodal-pair freedom: no onset sits opposite another.
// - Low entropy: Shannon entropy (nats) of the interval multiset below
//   ln(rtn(L) / 2), rtn being the reverse triangular number.
// - Interval-vector shape: no gaps between nonzero entries; relative
//   flatness of the nonzero entries around T(k)/n.
// - Ordinal structure: the reversed bitstring splits into length-n blocks
//   drawn from a word set built from the divisors of n.
//
// `ordinal_words` and `low_entropy_bound` depend only on their key; the
// filter pipeline memoizes them per run.

use rustc_hash::FxHashSet;

use rhythm_loom_protocol::OddityType;

fn debug_check(onsets: &[usize], len: usize) {
    debug_assert!(onsets.windows(2).all(|w| w[0] < w[1]), "onsets must be sorted");
    debug_assert!(onsets.iter().all(|&p| p < len), "onsets must lie in [0, {len})");
}

/// Gap from each onset to the next, wrapping the last onset to the first.
/// A gap of zero modulo `len` (one onset lapping itself) counts as `len`.
/// Empty for fewer than 2 onsets.
pub fn circular_intervals(onsets: &[usize], len: usize) -> Vec<usize> {
    debug_check(onsets, len);
    let n = onsets.len();
    if n < 2 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let gap = (onsets[(i + 1) % n] + len - onsets[i]) % len;
            if gap == 0 { len } else { gap }
        })
        .collect()
}

/// Euclidean spacing. One onset is maximally even; zero onsets are not.
pub fn is_maximally_even(onsets: &[usize], len: usize) -> bool {
    let k = onsets.len();
    match k {
        0 => return false,
        1 => return true,
        _ => {}
    }
    let floor = len / k;
    let ceil = len.div_ceil(k);
    let expected_ceil = len % k;

    let mut floor_count = 0;
    let mut ceil_count = 0;
    for interval in circular_intervals(onsets, len) {
        // When k divides len, floor == ceil and every interval counts as floor.
        if interval == floor {
            floor_count += 1;
        } else if interval == ceil {
            ceil_count += 1;
        } else {
            return false;
        }
    }
    ceil_count == expected_ceil && floor_count == k - expected_ceil
}

/// True when no contiguous run of 1..n-1 intervals (wrapping) sums to L/2.
fn no_half_arc(intervals: &[usize], len: usize) -> bool {
    if len % 2 != 0 {
        return true;
    }
    let half = len / 2;
    let n = intervals.len();
    for start in 0..n {
        let mut sum = 0;
        for run in 0..n.saturating_sub(1) {
            sum += intervals[(start + run) % n];
            if sum == half {
                return false;
            }
            if sum > half {
                break;
            }
        }
    }
    true
}

/// Classic {2,3} rhythmic oddity property. False for fewer than 2 onsets and
/// for odd `len`.
pub fn has_rop23(onsets: &[usize], len: usize) -> bool {
    if onsets.len() < 2 || len % 2 != 0 {
        return false;
    }
    let intervals = circular_intervals(onsets, len);
    intervals.iter().all(|&i| i == 2 || i == 3) && no_half_arc(&intervals, len)
}

/// Odd-interval rhythmic oddity: every interval odd, no half-cycle arc.
/// False for fewer than 2 onsets and for odd `len`.
pub fn has_odd_intervals_oddity(onsets: &[usize], len: usize) -> bool {
    if onsets.len() < 2 || len % 2 != 0 {
        return false;
    }
    let intervals = circular_intervals(onsets, len);
    intervals.iter().all(|&i| i % 2 == 1) && no_half_arc(&intervals, len)
}

/// No onset has another onset exactly half a cycle away. Always true for odd
/// `len`. In release builds an out-of-range onset is looked up modulo `len`.
pub fn no_antipodal_pairs(onsets: &[usize], len: usize) -> bool {
    debug_check(onsets, len);
    if len % 2 != 0 {
        return true;
    }
    let half = len / 2;
    !onsets
        .iter()
        .any(|&p| onsets.binary_search(&((p + half) % len)).is_ok())
}

/// Dispatch on the configured oddity style. `Off` always passes.
pub fn passes_oddity(oddity: OddityType, onsets: &[usize], len: usize) -> bool {
    match oddity {
        OddityType::Off => true,
        OddityType::Rop23 => has_rop23(onsets, len),
        OddityType::OddIntervals => has_odd_intervals_oddity(onsets, len),
        OddityType::NoAntipodes => no_antipodal_pairs(onsets, len),
    }
}

/// `n(n+1)/2`.
pub fn triangular_number(n: usize) -> usize {
    n * (n + 1) / 2
}

/// Largest `k` with `triangular_number(k) <= n`.
pub fn reverse_triangular_number(n: usize) -> usize {
    // Float estimate, then correct for rounding in either direction.
    let mut k = (((8.0 * n as f64 + 1.0).sqrt() - 1.0) / 2.0) as usize;
    while triangular_number(k + 1) <= n {
        k += 1;
    }
    while k > 0 && triangular_number(k) > n {
        k -= 1;
    }
    k
}

/// Shannon entropy, in nats, of the multiset of circular intervals. Zero for
/// fewer than 2 onsets.
pub fn interval_entropy(onsets: &[usize], len: usize) -> f64 {
    let mut intervals = circular_intervals(onsets, len);
    if intervals.is_empty() {
        return 0.0;
    }
    intervals.sort_unstable();
    let total = intervals.len() as f64;
    let mut entropy = 0.0;
    for run in intervals.chunk_by(|a, b| a == b) {
        let p = run.len() as f64 / total;
        entropy -= p * p.ln();
    }
    entropy
}

/// Entropy threshold for a timeline of `len` steps. Non-positive (nothing
/// qualifies) when `len < 3`.
pub fn low_entropy_bound(len: usize) -> f64 {
    (reverse_triangular_number(len) as f64 * 0.5).ln()
}

/// Interval entropy strictly below `low_entropy_bound(len)`.
pub fn is_low_entropy(onsets: &[usize], len: usize) -> bool {
    is_low_entropy_with_bound(onsets, len, low_entropy_bound(len))
}

/// `is_low_entropy` against a precomputed bound.
pub fn is_low_entropy_with_bound(onsets: &[usize], len: usize, bound: f64) -> bool {
    interval_entropy(onsets, len) < bound
}

/// Entry `i - 1` counts onset pairs `i` steps apart, for `i` in
/// `1..=len/2`. The antipodal entry of an even `len` is halved so each
/// opposite pair counts once. Out-of-range onsets are reduced modulo `len`
/// in release builds.
pub fn interval_vector(onsets: &[usize], len: usize) -> Vec<usize> {
    debug_check(onsets, len);
    if len == 0 {
        return Vec::new();
    }
    let mut hit = vec![false; len];
    for &p in onsets {
        hit[p % len] = true;
    }
    (1..=len / 2)
        .map(|i| {
            let count = onsets.iter().filter(|&&j| hit[(j + i) % len]).count();
            if len % 2 == 0 && i == len / 2 {
                count / 2
            } else {
                count
            }
        })
        .collect()
}

/// The nonzero entries of an interval vector form one contiguous block. An
/// all-zero vector has no gaps.
pub fn vector_has_no_gaps(vector: &[usize]) -> bool {
    let Some(first) = vector.iter().position(|&v| v != 0) else {
        return true;
    };
    let last = vector.iter().rposition(|&v| v != 0).unwrap_or(first);
    vector[first..=last].iter().all(|&v| v != 0)
}

pub fn has_no_gaps(onsets: &[usize], len: usize) -> bool {
    vector_has_no_gaps(&interval_vector(onsets, len))
}

/// Gap-free interval vector whose nonzero entries all lie within 50% of
/// `T(k) / n` (k onsets, n nonzero entries), bounds inclusive. False when
/// every entry is zero.
pub fn relatively_flat(onsets: &[usize], len: usize) -> bool {
    let vector = interval_vector(onsets, len);
    if !vector_has_no_gaps(&vector) {
        return false;
    }
    let nonzero: Vec<usize> = vector.into_iter().filter(|&v| v != 0).collect();
    if nonzero.is_empty() {
        return false;
    }
    let mean = triangular_number(onsets.len()) as f64 / nonzero.len() as f64;
    let tolerance = mean * 0.5;
    nonzero
        .iter()
        .all(|&v| (v as f64 - mean).abs() <= tolerance)
}

/// Allowed length-`n` blocks for the ordinal filter: the zero word, and for
/// every divisor `f` of `n` and every `i` in `1..=n/f`, the word with onsets
/// at `0, f, .., (i-1)f` together with its reversal.
pub fn ordinal_words(n: usize) -> FxHashSet<Vec<u8>> {
    let mut words = FxHashSet::default();
    words.insert(vec![0; n]);
    for f in (1..=n).filter(|f| n % f == 0) {
        for i in 1..=n / f {
            let mut word = vec![0u8; n];
            for m in 0..i {
                word[m * f] = 1;
            }
            let mut reversed = word.clone();
            reversed.reverse();
            words.insert(word);
            words.insert(reversed);
        }
    }
    words
}

/// Ordinal block structure with block length `n`. False when `n < 2` or
/// `len` is not a multiple of `n`.
pub fn has_ordinal(onsets: &[usize], len: usize, n: usize) -> bool {
    if n < 2 {
        return false;
    }
    has_ordinal_with(&ordinal_words(n), onsets, len, n)
}

/// `has_ordinal` against a prebuilt word set for `n`. Out-of-range onsets
/// are reduced modulo `len` in release builds.
pub fn has_ordinal_with(words: &FxHashSet<Vec<u8>>, onsets: &[usize], len: usize, n: usize) -> bool {
    debug_check(onsets, len);
    if n < 2 || len % n != 0 {
        return false;
    }
    let mut bits = vec![0u8; len];
    for &p in onsets {
        bits[p % len] = 1;
    }
    bits.reverse();
    bits.chunks(n).all(|block| words.contains(block))
}
