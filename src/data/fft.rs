//! Windowed magnitude spectrum of a channel's samples.
//!
//! The transform runs in three steps:
//! 1. multiply each sample by a symmetric Hann window of the same length
//! 2. forward FFT of the windowed sequence (imaginary part zero)
//! 3. magnitudes of bins `0..N/2`, narrowed to `f32`
//!
//! The output therefore has `floor(N/2)` entries. Inputs shorter than two
//! samples produce an empty spectrum.

use num_complex::Complex;
use rustfft::FftPlanner;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::sync::Mutex;

/// Scaling applied to the forward transform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Normalization {
    /// Scale by `1/sqrt(N)`.
    #[default]
    Symmetric,
    /// Raw `rustfft` output.
    None,
}

impl Normalization {
    fn factor(self, n: usize) -> f64 {
        match self {
            Normalization::Symmetric => 1.0 / (n as f64).sqrt(),
            Normalization::None => 1.0,
        }
    }
}

/// Symmetric Hann window of length `n`.
///
/// `w[i] = 0.5 * (1 - cos(2*pi*i / (n - 1)))`. For `n <= 1` the formula
/// would divide by zero, so the window is all ones.
pub fn hann_window(n: usize) -> Vec<f64> {
    if n <= 1 {
        return vec![1.0; n];
    }
    let denom = (n - 1) as f64;
    (0..n)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f64 / denom).cos()))
        .collect()
}

/// Computes Hann-windowed half-spectrum magnitudes.
///
/// Holds an `FftPlanner` so channels of the same length reuse their plan.
/// The planner is the only state; results depend on the input alone.
pub struct SpectrumTransform {
    normalization: Normalization,
    planner: Mutex<FftPlanner<f64>>,
}

impl std::fmt::Debug for SpectrumTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectrumTransform")
            .field("normalization", &self.normalization)
            .finish_non_exhaustive()
    }
}

impl Default for SpectrumTransform {
    fn default() -> Self {
        Self::new(Normalization::default())
    }
}

impl SpectrumTransform {
    /// Transform with its own FFT planner cache.
    pub fn new(normalization: Normalization) -> Self {
        Self {
            normalization,
            planner: Mutex::new(FftPlanner::new()),
        }
    }

    /// Scaling applied to the spectrum.
    pub fn normalization(&self) -> Normalization {
        self.normalization
    }

    /// Magnitudes of the lower half of the windowed spectrum.
    pub fn magnitude_half_spectrum(&self, samples: &[f64]) -> Vec<f32> {
        let n = samples.len();
        let num_bins = n / 2;
        if num_bins == 0 {
            return Vec::new();
        }

        let window = hann_window(n);
        let mut buffer: Vec<Complex<f64>> = samples
            .iter()
            .zip(window.iter())
            .map(|(&val, &win_val)| Complex::new(val * win_val, 0.0))
            .collect();

        let fft = {
            // A poisoned planner cache is still a valid cache.
            let mut planner = self.planner.lock().unwrap_or_else(|p| p.into_inner());
            planner.plan_fft_forward(n)
        };
        fft.process(&mut buffer);

        let scale = self.normalization.factor(n);
        buffer[..num_bins]
            .iter()
            .map(|c| (c.norm() * scale) as f32)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f32, expected: f64) {
        assert!(
            (f64::from(actual) - expected).abs() < 1e-5,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn degenerate_windows_are_ones() {
        assert!(hann_window(0).is_empty());
        assert_eq!(hann_window(1), vec![1.0]);
    }

    #[test]
    fn hann_window_is_symmetric_with_zero_ends() {
        let w = hann_window(5);
        assert_eq!(w.len(), 5);
        assert!(w[0].abs() < 1e-12);
        assert!(w[4].abs() < 1e-12);
        assert!((w[2] - 1.0).abs() < 1e-12);
        assert!((w[1] - w[3]).abs() < 1e-12);
    }

    #[test]
    fn output_length_is_half_input() {
        let transform = SpectrumTransform::default();
        for n in 0..40 {
            let samples: Vec<f64> = (0..n).map(|i| i as f64).collect();
            assert_eq!(transform.magnitude_half_spectrum(&samples).len(), n / 2);
        }
    }

    #[test]
    fn short_inputs_do_not_divide_by_zero() {
        let transform = SpectrumTransform::default();
        assert!(transform.magnitude_half_spectrum(&[]).is_empty());
        assert!(transform.magnitude_half_spectrum(&[3.0]).is_empty());
    }

    #[test]
    fn four_point_reference_values() {
        // window [0, .75, .75, 0] -> windowed [0, .75, 1.5, 0]
        // X0 = 2.25, X1 = -1.5 - 0.75i, |X1| = sqrt(2.8125)
        let samples = [0.0, 1.0, 2.0, 3.0];

        let raw = SpectrumTransform::new(Normalization::None).magnitude_half_spectrum(&samples);
        assert_eq!(raw.len(), 2);
        assert_close(raw[0], 2.25);
        assert_close(raw[1], 2.8125_f64.sqrt());

        let symmetric =
            SpectrumTransform::new(Normalization::Symmetric).magnitude_half_spectrum(&samples);
        assert_close(symmetric[0], 2.25 / 2.0);
        assert_close(symmetric[1], 2.8125_f64.sqrt() / 2.0);
    }

    #[test]
    fn sine_peak_lands_in_expected_bin() {
        let n = 256;
        let bin = 16;
        let samples: Vec<f64> = (0..n)
            .map(|i| (2.0 * PI * bin as f64 * i as f64 / n as f64).sin())
            .collect();
        let spectrum = SpectrumTransform::default().magnitude_half_spectrum(&samples);

        let peak = spectrum
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, bin);
    }
}
