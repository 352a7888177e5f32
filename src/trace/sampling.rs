//! Size-class sampling rates and the scale factors derived from them.
//!
//! The sampler records an allocation of `n` bytes with a probability that
//! depends on the size class of `n`. Multiplying every sampled size by the
//! inverse of that probability gives an unbiased estimate of the true bytes.

use crate::utils::config::{DEFAULT_SAMPLING_RATE, PROBABILITY_SCALE};
use crate::utils::error::{ConfigError, DecodeError};
use serde::Serialize;

/// One size class: sizes strictly below `upper_bound` (and at or above the
/// previous bound) are sampled with `probability`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SamplingRange {
    pub upper_bound: u32,
    pub probability: f64,
}

/// Sorted list of size classes. Sizes at or beyond the last bound are
/// always sampled.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SamplingConfig {
    ranges: Vec<SamplingRange>,
}

impl SamplingConfig {
    /// Build a configuration from `(upper_bound, probability)` pairs in any order
    ///
    /// **Public** - used by the metadata decoder and writer
    ///
    /// # Errors
    /// * `ConfigError::InvalidConfig` - a probability is outside `[0, 1]` or a bound repeats
    pub fn new(ranges: impl IntoIterator<Item = (u32, f64)>) -> Result<Self, ConfigError> {
        let mut ranges: Vec<SamplingRange> = ranges
            .into_iter()
            .map(|(upper_bound, probability)| SamplingRange {
                upper_bound,
                probability,
            })
            .collect();

        for range in &ranges {
            if !(0.0..=1.0).contains(&range.probability) {
                return Err(ConfigError::InvalidConfig(format!(
                    "probability {} for sizes below {} is outside [0, 1]",
                    range.probability, range.upper_bound
                )));
            }
        }

        ranges.sort_by_key(|range| range.upper_bound);
        if let Some(pair) = ranges
            .windows(2)
            .find(|pair| pair[0].upper_bound == pair[1].upper_bound)
        {
            return Err(ConfigError::InvalidConfig(format!(
                "bound {} appears more than once",
                pair[0].upper_bound
            )));
        }

        Ok(Self { ranges })
    }

    /// Every allocation is sampled
    pub fn always() -> Self {
        Self::default()
    }

    /// The rate the sampler uses unless told otherwise
    pub fn default_rate() -> Self {
        Self {
            ranges: DEFAULT_SAMPLING_RATE
                .iter()
                .map(|&(upper_bound, probability)| SamplingRange {
                    upper_bound,
                    probability,
                })
                .collect(),
        }
    }

    pub fn ranges(&self) -> &[SamplingRange] {
        &self.ranges
    }

    /// Probability that an allocation of `|size|` bytes is recorded
    pub fn probability(&self, size: i64) -> f64 {
        let magnitude = size.unsigned_abs();
        self.ranges
            .iter()
            .find(|range| magnitude < u64::from(range.upper_bound))
            .map_or(1.0, |range| range.probability)
    }

    /// Inverse sampling probability for `|size|`.
    ///
    /// Returns `0.0` for a size class that is never sampled.
    pub fn scale_factor(&self, size: i64) -> f64 {
        let probability = self.probability(size);
        if probability > 0.0 {
            1.0 / probability
        } else {
            0.0
        }
    }

    /// Like [`scale_factor`](Self::scale_factor), but a recorded event in a
    /// size class with probability 0 is corrupt input
    pub fn checked_scale_factor(&self, size: i64) -> Result<f64, DecodeError> {
        match self.scale_factor(size) {
            scale if scale > 0.0 => Ok(scale),
            _ => Err(DecodeError::UnsampledSize { size }),
        }
    }
}

/// Probability as stored on disk: fixed point with 32 fractional bits
pub fn encode_probability(probability: f64) -> u64 {
    (probability * PROBABILITY_SCALE).round() as u64
}

pub fn decode_probability(raw: u64) -> f64 {
    raw as f64 / PROBABILITY_SCALE
}
