// Contour canonicalizer.
//
// A rhythm's contour is the up/down/same shape of its inter-onset intervals:
// for each consecutive interval pair (a, b) emit `U` if b > a, `D` if b < a,
// `S` if equal. Circular contours wrap (n onsets give n intervals and n
// symbols); linear contours do not (n onsets give n-1 intervals and n-2
// symbols).
//
// The canonical contour is the lexicographically smallest string among the
// contour itself, all its rotations (rotation invariance), and the reflected
// contour (reversed with U and D swapped) with all of its rotations
// (reflection invariance). Smallest rotations are found with the linear-time
// minimum-expression scan, so canonicalization is O(n) per candidate family.
//
// Symbols are handled as ASCII bytes. `D` < `S` < `U` in byte order, which is
// also their character order, so byte comparison equals string comparison.
//
// The shadow contour is the canonical contour of the complement onset set
// (the rests). A rhythm is shadow-contour isomorphic when both agree.

use rhythm_loom_protocol::{ContourOptions, Radix};

use crate::bits::{complement_onsets, digits_to_onsets};

const UP: u8 = b'U';
const DOWN: u8 = b'D';
const SAME: u8 = b'S';

/// Interval sequence for the contour, or `None` when no contour is defined.
///
/// Onsets must be sorted and below `len` (checked in debug builds). In
/// release builds an out-of-range onset still yields an interval, computed
/// modulo `len`.
fn contour_intervals(onsets: &[usize], len: usize, circular: bool) -> Option<Vec<usize>> {
    debug_assert!(onsets.windows(2).all(|w| w[0] < w[1]), "onsets must be sorted");
    debug_assert!(onsets.iter().all(|&p| p < len), "onsets must lie in [0, {len})");
    if onsets.len() < 2 {
        return None;
    }
    if circular {
        let n = onsets.len();
        let intervals = (0..n)
            .map(|i| {
                let gap = (onsets[(i + 1) % n] + len - onsets[i]) % len;
                if gap == 0 { len } else { gap }
            })
            .collect();
        Some(intervals)
    } else {
        let intervals: Vec<usize> = onsets.windows(2).map(|w| w[1] - w[0]).collect();
        (intervals.len() >= 2).then_some(intervals)
    }
}

fn compare_intervals(intervals: &[usize], circular: bool) -> Vec<u8> {
    let n = intervals.len();
    let limit = if circular { n } else { n - 1 };
    (0..limit)
        .map(|i| {
            let a = intervals[i];
            let b = intervals[(i + 1) % n];
            if b == a {
                SAME
            } else if b > a {
                UP
            } else {
                DOWN
            }
        })
        .collect()
}

/// Retrograde inversion: reverse, then swap U and D.
fn reflect(symbols: &[u8]) -> Vec<u8> {
    symbols
        .iter()
        .rev()
        .map(|&s| match s {
            UP => DOWN,
            DOWN => UP,
            other => other,
        })
        .collect()
}

/// Start index of the lexicographically smallest rotation.
fn least_rotation(s: &[u8]) -> usize {
    let n = s.len();
    let (mut i, mut j, mut k) = (0, 1, 0);
    while i < n && j < n && k < n {
        let a = s[(i + k) % n];
        let b = s[(j + k) % n];
        if a == b {
            k += 1;
            continue;
        }
        if a > b {
            i += k + 1;
        } else {
            j += k + 1;
        }
        if i == j {
            j += 1;
        }
        k = 0;
    }
    i.min(j)
}

fn smallest_rotation(s: &[u8]) -> Vec<u8> {
    let start = least_rotation(s);
    let mut out = Vec::with_capacity(s.len());
    out.extend_from_slice(&s[start..]);
    out.extend_from_slice(&s[..start]);
    out
}

/// Raw (non-canonicalized) contour symbols for an onset set.
pub fn contour_symbols(onsets: &[usize], len: usize, circular: bool) -> String {
    match contour_intervals(onsets, len, circular) {
        Some(intervals) => to_string(&compare_intervals(&intervals, circular)),
        None => String::new(),
    }
}

/// Canonical contour of an onset set on a timeline of `len` steps. Empty for
/// fewer than 2 onsets, and for linear contours with fewer than 2 intervals.
pub fn canonical_contour(onsets: &[usize], len: usize, opts: ContourOptions) -> String {
    let Some(intervals) = contour_intervals(onsets, len, opts.circular) else {
        return String::new();
    };
    let contour = compare_intervals(&intervals, opts.circular);

    let mut best = if opts.rotation_invariant {
        smallest_rotation(&contour)
    } else {
        contour.clone()
    };
    if opts.reflection_invariant {
        let reflected = smallest_rotation(&reflect(&contour));
        if reflected < best {
            best = reflected;
        }
    }
    to_string(&best)
}

/// Canonical contour of the rests of an onset set.
pub fn shadow_contour(onsets: &[usize], len: usize, opts: ContourOptions) -> String {
    canonical_contour(&complement_onsets(onsets, len), len, opts)
}

/// Whether a rhythm and its rests share a canonical contour.
///
/// Fewer than 2 onsets is vacuously isomorphic. Otherwise both contours must
/// be defined (non-empty) and equal, so a rhythm with fewer than 2 rests is
/// not isomorphic.
pub fn is_shadow_isomorphic(onsets: &[usize], len: usize, opts: ContourOptions) -> bool {
    if onsets.len() < 2 {
        return true;
    }
    let contour = canonical_contour(onsets, len, opts);
    !contour.is_empty() && contour == shadow_contour(onsets, len, opts)
}

/// `is_shadow_isomorphic` for a digit string.
pub fn is_shadow_isomorphic_digits(digits: &[u8], radix: Radix, opts: ContourOptions) -> bool {
    let (onsets, len) = digits_to_onsets(digits, radix);
    is_shadow_isomorphic(&onsets, len, opts)
}

fn to_string(symbols: &[u8]) -> String {
    symbols.iter().map(|&b| char::from(b)).collect()
}
