//! Per-channel numeric policies.
//!
//! Exactly one policy is active for a run:
//! - `passthrough`: samples are emitted unchanged
//! - `round`: each sample is rounded to a fixed number of decimals
//! - `spectrum`: Hann window, forward FFT, half-spectrum magnitudes

use super::fft::{Normalization, SpectrumTransform};
use crate::error::TransformError;
use crate::measurement::Samples;
use serde::{Deserialize, Serialize};

/// Policy selector as it appears in configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    /// Samples copied unchanged.
    Passthrough,
    /// Samples rounded half away from zero to `decimals`.
    Round,
    /// Hann-windowed magnitude half-spectrum.
    #[default]
    Spectrum,
}

/// The numeric policy applied to every channel of a file.
#[derive(Debug)]
pub enum ChannelPolicy {
    /// Copy samples unchanged.
    Passthrough,
    /// Round to a fixed number of decimal places.
    Round {
        /// Digits kept after the decimal point.
        decimals: u32,
    },
    /// Replace samples with their magnitude spectrum.
    Spectrum(SpectrumTransform),
}

impl ChannelPolicy {
    /// Policy for a configured kind.
    pub fn from_kind(kind: PolicyKind, decimals: u32, normalization: Normalization) -> Self {
        match kind {
            PolicyKind::Passthrough => ChannelPolicy::Passthrough,
            PolicyKind::Round => ChannelPolicy::Round { decimals },
            PolicyKind::Spectrum => ChannelPolicy::Spectrum(SpectrumTransform::new(normalization)),
        }
    }

    /// Configuration selector this policy was built from.
    pub fn kind(&self) -> PolicyKind {
        match self {
            ChannelPolicy::Passthrough => PolicyKind::Passthrough,
            ChannelPolicy::Round { .. } => PolicyKind::Round,
            ChannelPolicy::Spectrum(_) => PolicyKind::Spectrum,
        }
    }

    /// Applies the policy to one channel's raw samples.
    ///
    /// `round` and `spectrum` reject NaN and infinite samples.
    pub fn apply(&self, channel: &str, samples: &[f64]) -> Result<Samples, TransformError> {
        match self {
            ChannelPolicy::Passthrough => Ok(Samples::F64(samples.to_vec())),
            ChannelPolicy::Round { decimals } => {
                ensure_finite(channel, samples)?;
                Ok(Samples::F64(
                    samples.iter().map(|&v| round_to(v, *decimals)).collect(),
                ))
            }
            ChannelPolicy::Spectrum(transform) => {
                ensure_finite(channel, samples)?;
                Ok(Samples::F32(transform.magnitude_half_spectrum(samples)))
            }
        }
    }
}

fn ensure_finite(channel: &str, samples: &[f64]) -> Result<(), TransformError> {
    match samples.iter().position(|v| !v.is_finite()) {
        Some(index) => Err(TransformError::NonFinite {
            channel: channel.to_string(),
            index,
        }),
        None => Ok(()),
    }
}

/// Values at or above this magnitude have no fractional digits in `f64`.
const EXACT_INTEGER_LIMIT: f64 = 4_503_599_627_370_496.0; // 2^52

/// Rounds half away from zero to `decimals` digits.
///
/// Magnitudes too large to carry `decimals` fractional digits are returned
/// unchanged, so a finite input always yields a finite output.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    let scaled = value * factor;
    if !scaled.is_finite() || scaled.abs() >= EXACT_INTEGER_LIMIT {
        return value;
    }
    scaled.round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounding_keeps_three_decimals() {
        assert_eq!(round_to(1.23456, 3), 1.235);
        assert_eq!(round_to(-0.0004, 3), -0.0);
        assert_eq!(round_to(2.0, 3), 2.0);
    }

    #[test]
    fn rounding_large_values_stays_finite() {
        assert_eq!(round_to(1e306, 3), 1e306);
        assert_eq!(round_to(-1e300, 3), -1e300);
        assert_eq!(round_to(f64::MAX, 15), f64::MAX);
        assert_eq!(round_to(1e13 + 0.25, 3), 1e13 + 0.25);

        let policy = ChannelPolicy::Round { decimals: 3 };
        let out = policy.apply("Temp", &[1e306, 0.0005]).unwrap();
        assert_eq!(out, Samples::F64(vec![1e306, 0.001]));
    }

    #[test]
    fn round_policy_leaves_short_values_unchanged() {
        let policy = ChannelPolicy::Round { decimals: 3 };
        let out = policy.apply("Temp", &[0.0, 1.0, 2.0, 3.0]).unwrap();
        assert_eq!(out, Samples::F64(vec![0.0, 1.0, 2.0, 3.0]));
    }

    #[test]
    fn passthrough_emits_input() {
        let out = ChannelPolicy::Passthrough
            .apply("Temp", &[0.12345, f64::NAN])
            .unwrap();
        match out {
            Samples::F64(v) => {
                assert_eq!(v[0], 0.12345);
                assert!(v[1].is_nan());
            }
            Samples::F32(_) => panic!("passthrough must keep f64"),
        }
    }

    #[test]
    fn spectrum_policy_halves_length() {
        let policy = ChannelPolicy::from_kind(PolicyKind::Spectrum, 3, Normalization::Symmetric);
        let out = policy.apply("Temp", &[0.0, 1.0, 2.0, 3.0, 4.0]).unwrap();
        assert!(matches!(out, Samples::F32(ref v) if v.len() == 2));
    }

    #[test]
    fn non_finite_samples_are_rejected() {
        let policy = ChannelPolicy::Round { decimals: 3 };
        let err = policy.apply("Temp", &[1.0, f64::INFINITY]).unwrap_err();
        assert_eq!(
            err,
            TransformError::NonFinite {
                channel: "Temp".into(),
                index: 1
            }
        );
    }

    #[test]
    fn kind_round_trips_through_policy() {
        for kind in [PolicyKind::Passthrough, PolicyKind::Round, PolicyKind::Spectrum] {
            let policy = ChannelPolicy::from_kind(kind, 3, Normalization::None);
            assert_eq!(policy.kind(), kind);
        }
    }
}
