// Core data types for cyclic binary rhythms.
//
// A rhythm is a fixed-length digit string in one of three radices. Each digit
// expands into `bits_per_digit` steps of a circular timeline; a set bit is an
// onset. `Meter` records how the digit string is laid out musically: how many
// beats (`numerator`) and how many digits per beat (`denominator`).
//
// `RhythmRecord` is the accepted-rhythm record that producers stream to hosts
// and that the catalog stores. Its serde shape (camelCase keys, optional keys
// omitted) is the persisted record shape, stable across runs.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Digit radix of a rhythm's digit string.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Radix {
    Binary,
    Octal,
    Hex,
}

impl Radix {
    pub const ALL: [Radix; 3] = [Radix::Binary, Radix::Octal, Radix::Hex];

    /// Number of distinct digit values (2, 8 or 16).
    pub fn base(self) -> u8 {
        match self {
            Radix::Binary => 2,
            Radix::Octal => 8,
            Radix::Hex => 16,
        }
    }

    /// Timeline steps contributed by one digit.
    pub fn bits_per_digit(self) -> usize {
        match self {
            Radix::Binary => 1,
            Radix::Octal => 3,
            Radix::Hex => 4,
        }
    }

    /// Largest digit value; every bit of its expansion is an onset.
    pub fn max_digit(self) -> u8 {
        self.base() - 1
    }

    pub fn name(self) -> &'static str {
        match self {
            Radix::Binary => "binary",
            Radix::Octal => "octal",
            Radix::Hex => "hex",
        }
    }
}

impl fmt::Display for Radix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Radix {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "binary" | "bin" | "2" => Ok(Radix::Binary),
            "octal" | "oct" | "8" => Ok(Radix::Octal),
            "hex" | "hexadecimal" | "16" => Ok(Radix::Hex),
            other => Err(ConfigError::UnknownRadix(other.to_string())),
        }
    }
}

/// Musical meter of a digit string: `numerator` beats of `denominator`
/// digits each.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Meter {
    pub numerator: u32,
    pub denominator: u32,
}

impl Meter {
    pub fn new(numerator: u32, denominator: u32) -> Self {
        Meter {
            numerator,
            denominator,
        }
    }

    /// Clamp both fields to at least 1. Pool items with a zero field would
    /// otherwise produce an empty grouping.
    pub fn normalized(self) -> Self {
        Meter {
            numerator: self.numerator.max(1),
            denominator: self.denominator.max(1),
        }
    }

    /// Length of the digit string this meter lays out.
    pub fn digits_count(self) -> usize {
        self.numerator as usize * self.denominator as usize
    }
}

impl fmt::Display for Meter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// An accepted rhythm.
///
/// Invariants maintained by every producer: `onset_count` equals the number
/// of set bits implied by `grouped_digits_string` under `radix`, and
/// `canonical_contour` is the dihedral-canonical contour under the contour
/// options of the run that produced the record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RhythmRecord {
    pub id: String,
    pub radix: Radix,
    pub grouped_digits_string: String,
    pub onset_count: usize,
    pub canonical_contour: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numerator: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denominator: Option<u32>,
    /// Raw digits, when a host chose to keep them. Producers leave this empty;
    /// the grouped string is authoritative.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digits: Option<Vec<u8>>,
}

impl RhythmRecord {
    /// The record's meter, if both parts are known.
    pub fn meter(&self) -> Option<Meter> {
        match (self.numerator, self.denominator) {
            (Some(numerator), Some(denominator)) => Some(Meter::new(numerator, denominator)),
            _ => None,
        }
    }

    /// Catalog identity: radix plus grouped digits. Ids carry a per-run index
    /// and are not suitable for deduplication across runs.
    pub fn catalog_key(&self) -> String {
        catalog_key(self.radix, &self.grouped_digits_string)
    }
}

/// Build the catalog identity key for a radix and grouped-digit string.
pub fn catalog_key(radix: Radix, grouped_digits: &str) -> String {
    format!("{radix}:{grouped_digits}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radix_geometry() {
        assert_eq!(Radix::Binary.bits_per_digit(), 1);
        assert_eq!(Radix::Octal.bits_per_digit(), 3);
        assert_eq!(Radix::Hex.bits_per_digit(), 4);
        for radix in Radix::ALL {
            // Every digit value fits exactly in bits_per_digit bits.
            assert_eq!(1usize << radix.bits_per_digit(), radix.base() as usize);
        }
    }

    #[test]
    fn radix_parses_names_and_bases() {
        assert_eq!("hex".parse::<Radix>().unwrap(), Radix::Hex);
        assert_eq!(" Octal ".parse::<Radix>().unwrap(), Radix::Octal);
        assert_eq!("2".parse::<Radix>().unwrap(), Radix::Binary);
        assert!("ternary".parse::<Radix>().is_err());
    }

    #[test]
    fn record_uses_persisted_shape() {
        let record = RhythmRecord {
            id: "hex:AF 2B:0".into(),
            radix: Radix::Hex,
            grouped_digits_string: "AF 2B".into(),
            onset_count: 10,
            canonical_contour: "DSU".into(),
            numerator: Some(2),
            denominator: Some(2),
            digits: None,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["radix"], "hex");
        assert_eq!(json["groupedDigitsString"], "AF 2B");
        assert_eq!(json["onsetCount"], 10);
        assert_eq!(json["canonicalContour"], "DSU");
        assert!(json.get("digits").is_none(), "absent digits must be omitted");
        assert_eq!(record.catalog_key(), "hex:AF 2B");
        assert_eq!(record.meter(), Some(Meter::new(2, 2)));
    }

    #[test]
    fn record_without_meter_deserializes() {
        let json = r#"{
            "id": "binary:10 10:3",
            "radix": "binary",
            "groupedDigitsString": "10 10",
            "onsetCount": 2,
            "canonicalContour": "SS"
        }"#;
        let record: RhythmRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.meter(), None);
        assert_eq!(record.digits, None);
    }

    #[test]
    fn meter_normalization() {
        assert_eq!(Meter::new(0, 3).normalized(), Meter::new(1, 3));
        assert_eq!(Meter::new(3, 4).digits_count(), 12);
        assert_eq!(Meter::new(3, 4).to_string(), "3/4");
    }
}
