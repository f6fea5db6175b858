// Data-driven filter configuration for enumeration and agglutination runs.
//
// `FilterConfig` is the full bag of options a host hands to a producer: the
// digit-string shape (radix, meter), result limits, onset-count bounds,
// contour invariance options, and one toggle per classification predicate.
// It is passed by value into each run and never mutated mid-run.
//
// Configs are loaded from JSON. Every field has a default (`#[serde(default)]`),
// so a document only needs the keys it changes. Named preset constructors
// (`FilterConfig::exhaustive()`, `::euclidean()`, `::african_oddity()`)
// produce common starting points by tuning the same parameter set.
//
// `validate()` rejects configurations a producer cannot run meaningfully;
// the worker validates before starting a run.

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Meter, Radix};

/// Longest digit string a run may enumerate. 64 hex digits is a 256-step
/// timeline, far beyond anything exhaustively searchable, but agglutination
/// doubles lengths so the bound stays generous.
pub const MAX_DIGITS: usize = 64;

/// Errors from loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("meter must have a positive numerator and denominator, got {numerator}/{denominator}")]
    ZeroMeter { numerator: u32, denominator: u32 },
    #[error("minOnsets ({min}) exceeds maxOnsets ({max})")]
    OnsetBounds { min: usize, max: usize },
    #[error("the ordinal filter needs ordinalN >= 2, got {0}")]
    OrdinalTooSmall(usize),
    #[error("a digit string of {digits} digits exceeds the maximum of {max}")]
    TooManyDigits { digits: usize, max: usize },
    #[error("unknown radix '{0}' (expected binary, octal or hex)")]
    UnknownRadix(String),
    #[error("unknown oddity type '{0}' (expected off, rop23, odd-intervals or no-antipodes)")]
    UnknownOddity(String),
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Which rhythmic-oddity style predicate gates acceptance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OddityType {
    #[default]
    Off,
    /// Classic rhythmic oddity: intervals in {2, 3}, no half-cycle arc.
    Rop23,
    /// All intervals odd, no half-cycle arc.
    OddIntervals,
    /// No two onsets diametrically opposite.
    NoAntipodes,
}

impl FromStr for OddityType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "none" => Ok(OddityType::Off),
            "rop23" => Ok(OddityType::Rop23),
            "odd-intervals" => Ok(OddityType::OddIntervals),
            "no-antipodes" => Ok(OddityType::NoAntipodes),
            other => Err(ConfigError::UnknownOddity(other.to_string())),
        }
    }
}

/// How contours are built and canonicalized.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContourOptions {
    /// Treat the interval sequence as a cycle (wrap last onset to first).
    pub circular: bool,
    /// Identify contours that are rotations of each other.
    pub rotation_invariant: bool,
    /// Identify contours with their retrograde inversion (and its rotations).
    pub reflection_invariant: bool,
}

impl Default for ContourOptions {
    fn default() -> Self {
        ContourOptions {
            circular: true,
            rotation_invariant: true,
            reflection_invariant: true,
        }
    }
}

/// Complete filter configuration for one producer run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FilterConfig {
    pub radix: Radix,
    /// Musical beats.
    pub numerator: u32,
    /// Digits per beat; also the grouping size of the grouped-digit string.
    pub denominator: u32,
    /// Stop after this many accepted rhythms. 0 = unlimited.
    pub max_accepted: u64,
    pub min_onsets: usize,
    pub max_onsets: usize,
    pub circular: bool,
    pub rotation_invariant: bool,
    pub reflection_invariant: bool,
    /// Skip the all-rest and all-onset patterns.
    pub exclude_trivial: bool,
    /// Require the rhythm's contour to equal the contour of its rests.
    pub only_isomorphic: bool,
    pub only_maximally_even: bool,
    pub oddity_type: OddityType,
    pub only_low_entropy: bool,
    pub only_has_no_gaps: bool,
    pub only_relatively_flat: bool,
    pub ordinal_enabled: bool,
    pub ordinal_n: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        FilterConfig {
            radix: Radix::Hex,
            numerator: 2,
            denominator: 2,
            max_accepted: 60,
            // 2 keeps empty contours out of the default catalog.
            min_onsets: 2,
            max_onsets: 99,
            circular: true,
            rotation_invariant: true,
            reflection_invariant: true,
            exclude_trivial: true,
            only_isomorphic: true,
            only_maximally_even: false,
            oddity_type: OddityType::Off,
            only_low_entropy: false,
            only_has_no_gaps: false,
            only_relatively_flat: false,
            ordinal_enabled: false,
            ordinal_n: 2,
        }
    }
}

impl FilterConfig {
    /// Every digit string of the default shape, no predicates, no limit.
    pub fn exhaustive() -> Self {
        FilterConfig {
            max_accepted: 0,
            min_onsets: 0,
            max_onsets: usize::MAX,
            exclude_trivial: false,
            only_isomorphic: false,
            ..Default::default()
        }
    }

    /// Maximally even (Euclidean) rhythms only.
    pub fn euclidean() -> Self {
        FilterConfig {
            max_accepted: 0,
            only_isomorphic: false,
            only_maximally_even: true,
            ..Default::default()
        }
    }

    /// Binary 2/8 timelines with the classic {2,3} rhythmic oddity property.
    pub fn african_oddity() -> Self {
        FilterConfig {
            radix: Radix::Binary,
            numerator: 2,
            denominator: 8,
            max_accepted: 0,
            only_isomorphic: false,
            oddity_type: OddityType::Rop23,
            ..Default::default()
        }
    }

    /// Parse a configuration from a JSON document. Missing keys take their
    /// default values.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_json(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.numerator == 0 || self.denominator == 0 {
            return Err(ConfigError::ZeroMeter {
                numerator: self.numerator,
                denominator: self.denominator,
            });
        }
        if self.min_onsets > self.max_onsets {
            return Err(ConfigError::OnsetBounds {
                min: self.min_onsets,
                max: self.max_onsets,
            });
        }
        if self.ordinal_enabled && self.ordinal_n < 2 {
            return Err(ConfigError::OrdinalTooSmall(self.ordinal_n));
        }
        let digits = self.digits_count();
        if digits > MAX_DIGITS {
            return Err(ConfigError::TooManyDigits {
                digits,
                max: MAX_DIGITS,
            });
        }
        Ok(())
    }

    pub fn meter(&self) -> Meter {
        Meter::new(self.numerator, self.denominator)
    }

    /// Digit-string length: beats times digits per beat.
    pub fn digits_count(&self) -> usize {
        self.meter().digits_count()
    }

    /// Timeline length in steps.
    pub fn total_bits(&self) -> usize {
        self.digits_count() * self.radix.bits_per_digit()
    }

    pub fn contour_options(&self) -> ContourOptions {
        ContourOptions {
            circular: self.circular,
            rotation_invariant: self.rotation_invariant,
            reflection_invariant: self.reflection_invariant,
        }
    }

    /// Number of digit strings an exhaustive enumeration visits, or `None`
    /// if it does not fit in a `u128`.
    pub fn state_space_size(&self) -> Option<u128> {
        let digits = u32::try_from(self.digits_count()).ok()?;
        u128::from(self.radix.base()).checked_pow(digits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_fills_defaults() {
        let config = FilterConfig::from_json(
            r#"{ "radix": "binary", "denominator": 4, "oddityType": "odd-intervals" }"#,
        )
        .unwrap();
        assert_eq!(config.radix, Radix::Binary);
        assert_eq!(config.numerator, 2);
        assert_eq!(config.denominator, 4);
        assert_eq!(config.oddity_type, OddityType::OddIntervals);
        assert_eq!(config.max_accepted, 60);
        assert!(config.only_isomorphic);
        assert_eq!(config.total_bits(), 8);
    }

    #[test]
    fn full_json_roundtrips() {
        let config = FilterConfig {
            ordinal_enabled: true,
            ordinal_n: 4,
            oddity_type: OddityType::NoAntipodes,
            ..FilterConfig::euclidean()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"oddityType\":\"no-antipodes\""));
        assert!(json.contains("\"ordinalN\":4"));
        assert_eq!(FilterConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn validation_rejects_bad_shapes() {
        let zero = FilterConfig {
            denominator: 0,
            ..Default::default()
        };
        assert!(matches!(zero.validate(), Err(ConfigError::ZeroMeter { .. })));

        let bounds = FilterConfig {
            min_onsets: 5,
            max_onsets: 4,
            ..Default::default()
        };
        assert!(matches!(bounds.validate(), Err(ConfigError::OnsetBounds { min: 5, max: 4 })));

        let ordinal = FilterConfig {
            ordinal_enabled: true,
            ordinal_n: 1,
            ..Default::default()
        };
        assert!(matches!(ordinal.validate(), Err(ConfigError::OrdinalTooSmall(1))));

        let long = FilterConfig {
            numerator: 9,
            denominator: 8,
            ..Default::default()
        };
        assert!(matches!(long.validate(), Err(ConfigError::TooManyDigits { digits: 72, .. })));

        assert!(FilterConfig::default().validate().is_ok());
        assert!(FilterConfig::african_oddity().validate().is_ok());
    }

    #[test]
    fn state_space_size_counts_digit_strings() {
        let binary = FilterConfig {
            radix: Radix::Binary,
            ..FilterConfig::exhaustive()
        };
        assert_eq!(binary.state_space_size(), Some(16));
        assert_eq!(FilterConfig::default().state_space_size(), Some(65_536));

        let huge = FilterConfig {
            numerator: 8,
            denominator: 8,
            ..Default::default()
        };
        // 16^64 = 2^256 does not fit.
        assert_eq!(huge.state_space_size(), None);
    }

    #[test]
    fn oddity_parses_cli_names() {
        assert_eq!("rop23".parse::<OddityType>().unwrap(), OddityType::Rop23);
        assert_eq!("No-Antipodes".parse::<OddityType>().unwrap(), OddityType::NoAntipodes);
        assert!("maybe".parse::<OddityType>().is_err());
    }
}
