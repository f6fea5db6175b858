// Bit/onset model: digit strings, their bit expansion, and grouped text.
//
// A digit string of radix 2, 8 or 16 expands digit by digit, most significant
// bit first, into `bits_per_digit` timeline steps. Digit `j` bit `i` (0 = MSB)
// is step `j * bits_per_digit + i`; set bits are onsets. The timeline length
// is `digits.len() * bits_per_digit`.
//
// The grouped-digit string ("AF 2B", "17 03", "1010 1100") is the display and
// identity form of a digit string: digits encoded one character each (hex
// upper-cased), chunked by digits-per-beat, chunks joined by single spaces.
// `group_digits` and `parse_digits_from_grouped_string` are inverses modulo hex
// case and spacing.
//
// Out-of-range digits are clamped to the radix maximum on expansion and on
// encoding, so both views of a malformed digit agree. Parsing does not
// validate: characters that are not digits of the radix decode to 0 (hex) or
// saturate (octal/binary).

use rhythm_loom_protocol::{Radix, RhythmRecord};

/// Expand digits into onset positions. Returns `(onsets, total_bits)`;
/// onsets are strictly increasing and all below `total_bits`.
pub fn digits_to_onsets(digits: &[u8], radix: Radix) -> (Vec<usize>, usize) {
    let bpd = radix.bits_per_digit();
    let max = radix.max_digit();
    let mut onsets = Vec::new();
    for (j, &digit) in digits.iter().enumerate() {
        let value = digit.min(max);
        for i in 0..bpd {
            if (value >> (bpd - 1 - i)) & 1 == 1 {
                onsets.push(j * bpd + i);
            }
        }
    }
    (onsets, digits.len() * bpd)
}

/// Expand digits into a 0/1 flag per timeline step.
pub fn digits_to_bits(digits: &[u8], radix: Radix) -> Vec<u8> {
    let bpd = radix.bits_per_digit();
    let max = radix.max_digit();
    let mut bits = Vec::with_capacity(digits.len() * bpd);
    for &digit in digits {
        let value = digit.min(max);
        bits.extend((0..bpd).rev().map(|shift| (value >> shift) & 1));
    }
    bits
}

/// Number of set flags in a bit vector.
pub fn count_onsets(bits: &[u8]) -> usize {
    bits.iter().filter(|&&b| b & 1 == 1).count()
}

/// Positions of the set flags in a bit vector.
pub fn bits_to_onsets(bits: &[u8]) -> Vec<usize> {
    bits.iter()
        .enumerate()
        .filter(|&(_, &b)| b & 1 == 1)
        .map(|(i, _)| i)
        .collect()
}

/// Every position of `[0, len)` that is not an onset: the rhythm's rests,
/// read as a rhythm of their own.
///
/// Expects sorted onsets; positions at or past `len` are ignored.
pub fn complement_onsets(onsets: &[usize], len: usize) -> Vec<usize> {
    let mut out = Vec::with_capacity(len.saturating_sub(onsets.len()));
    let mut next = onsets.iter().copied().peekable();
    for position in 0..len {
        if next.peek() == Some(&position) {
            next.next();
        } else {
            out.push(position);
        }
    }
    out
}

/// Timeline steps per beat for a meter with `digits_per_beat` digits.
pub fn bits_per_beat(radix: Radix, digits_per_beat: usize) -> usize {
    digits_per_beat * radix.bits_per_digit()
}

fn encode_digit(digit: u8, radix: Radix) -> char {
    char::from_digit(u32::from(digit.min(radix.max_digit())), 16)
        .unwrap_or('0')
        .to_ascii_uppercase()
}

/// Render digits as the grouped-digit string, `group_size` digits per group.
/// A `group_size` of 0 puts everything in one group.
pub fn group_digits(digits: &[u8], radix: Radix, group_size: usize) -> String {
    let group_size = if group_size == 0 {
        digits.len().max(1)
    } else {
        group_size
    };
    let mut out = String::with_capacity(digits.len() + digits.len() / group_size);
    for (g, chunk) in digits.chunks(group_size).enumerate() {
        if g > 0 {
            out.push(' ');
        }
        out.extend(chunk.iter().map(|&d| encode_digit(d, radix)));
    }
    out
}

/// Parse a grouped-digit string back into digits, ignoring all whitespace.
pub fn parse_digits_from_grouped_string(s: &str, radix: Radix) -> Vec<u8> {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| match radix {
            Radix::Hex => c.to_digit(16).map_or(0, |d| d as u8),
            Radix::Binary | Radix::Octal => {
                u8::try_from((c as u32).saturating_sub('0' as u32)).unwrap_or(u8::MAX)
            }
        })
        .collect()
}

/// A record's digits: the stored copy if the host kept one, otherwise parsed
/// from the grouped string.
pub fn record_digits(record: &RhythmRecord) -> Vec<u8> {
    match &record.digits {
        Some(digits) => digits.clone(),
        None => parse_digits_from_grouped_string(&record.grouped_digits_string, record.radix),
    }
}

/// A record's onsets and timeline length.
pub fn record_onsets(record: &RhythmRecord) -> (Vec<usize>, usize) {
    digits_to_onsets(&record_digits(record), record.radix)
}

/// Per-digit-value onset offsets, precomputed once per run so the enumerator
/// expands a digit string without shifting bits.
#[derive(Debug, Clone)]
pub struct DigitLookup {
    bits_per_digit: usize,
    max_digit: u8,
    offsets: Vec<Vec<usize>>,
}

impl DigitLookup {
    pub fn new(radix: Radix) -> Self {
        let bpd = radix.bits_per_digit();
        let offsets = (0..radix.base())
            .map(|value| {
                (0..bpd)
                    .filter(|&i| (value >> (bpd - 1 - i)) & 1 == 1)
                    .collect()
            })
            .collect();
        DigitLookup {
            bits_per_digit: bpd,
            max_digit: radix.max_digit(),
            offsets,
        }
    }

    /// Write the onsets of `digits` into `out`, replacing its contents.
    pub fn fill_onsets(&self, digits: &[u8], out: &mut Vec<usize>) {
        out.clear();
        for (j, &digit) in digits.iter().enumerate() {
            let base = j * self.bits_per_digit;
            let offsets = &self.offsets[usize::from(digit.min(self.max_digit))];
            out.extend(offsets.iter().map(|&i| base + i));
        }
    }
}
