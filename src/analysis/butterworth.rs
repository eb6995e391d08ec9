// Butterworth band-pass design and zero-phase IIR filtering
//
// Design follows the classic analog route: Butterworth prototype poles,
// frequency pre-warping, low-pass to band-pass transform, bilinear
// transform (fs = 2 convention, normalised cutoffs), then zeros/poles/gain
// expanded into transfer-function coefficients.
//
// Filtering is direct-form II transposed. `filtfilt` runs it forward and
// backward over an odd-extended copy of the input, starting each pass from
// steady-state initial conditions, so the result has zero phase delay.

use std::f64::consts::PI;

use nalgebra::DMatrix;
use rustfft::num_complex::Complex64;

use crate::analysis::linalg::solve_dense;
use crate::error::{DetectionError, Result};

/// Rational transfer function b(z) / a(z), normalised so that a[0] == 1
///
/// `b` and `a` are zero-padded to the same length.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferFunction {
    b: Vec<f64>,
    a: Vec<f64>,
}

impl TransferFunction {
    /// # Errors
    /// `InvalidParameter` when either coefficient list is empty or `a[0] == 0`.
    pub fn new(b: Vec<f64>, a: Vec<f64>) -> Result<Self> {
        if b.is_empty() || a.is_empty() {
            return Err(DetectionError::invalid_parameter(
                "coefficients",
                "numerator and denominator must be non-empty",
            ));
        }
        let a0 = a[0];
        if a0 == 0.0 || !a0.is_finite() {
            return Err(DetectionError::invalid_parameter(
                "coefficients",
                format!("leading denominator coefficient must be non-zero (got {})", a0),
            ));
        }

        let len = b.len().max(a.len());
        let mut b: Vec<f64> = b.into_iter().map(|v| v / a0).collect();
        let mut a: Vec<f64> = a.into_iter().map(|v| v / a0).collect();
        b.resize(len, 0.0);
        a.resize(len, 0.0);
        Ok(Self { b, a })
    }

    pub fn b(&self) -> &[f64] {
        &self.b
    }

    pub fn a(&self) -> &[f64] {
        &self.a
    }

    /// Number of delay elements
    pub fn state_len(&self) -> usize {
        self.b.len() - 1
    }

    /// Apply the filter once (direct form II transposed)
    ///
    /// `zi` sets the initial delay-line state; `None` starts from rest.
    pub fn lfilter(&self, x: &[f64], zi: Option<&[f64]>) -> Vec<f64> {
        let m = self.state_len();
        let mut z = match zi {
            Some(state) => {
                debug_assert_eq!(state.len(), m);
                state.to_vec()
            }
            None => vec![0.0; m],
        };

        let mut y = Vec::with_capacity(x.len());
        for &xi in x {
            let yi = self.b[0] * xi + z.first().copied().unwrap_or(0.0);
            for k in 0..m {
                let carry = if k + 1 < m { z[k + 1] } else { 0.0 };
                z[k] = self.b[k + 1] * xi + carry - self.a[k + 1] * yi;
            }
            y.push(yi);
        }
        y
    }

    /// Delay-line state for the steady-state response to a unit step
    ///
    /// Solves (I - C') zi = b[1..] - a[1..] * b[0], C being the companion
    /// matrix of `a`.
    pub fn lfilter_zi(&self) -> Result<Vec<f64>> {
        let m = self.state_len();
        if m == 0 {
            return Ok(Vec::new());
        }

        let system = DMatrix::from_fn(m, m, |i, j| {
            let mut v = if i == j { 1.0 } else { 0.0 };
            if j == 0 {
                v += self.a[i + 1];
            }
            if j == i + 1 {
                v -= 1.0;
            }
            v
        });
        let rhs: Vec<f64> = (0..m)
            .map(|i| self.b[i + 1] - self.a[i + 1] * self.b[0])
            .collect();

        solve_dense(system, &rhs).map_err(|err| match err {
            DetectionError::NumericFailure { reason, .. } => DetectionError::numeric_failure(
                "Butterworth",
                format!("initial conditions: {}", reason),
            ),
            other => other,
        })
    }

    /// Edge extension length used by `filtfilt`
    pub fn padlen(&self) -> usize {
        3 * self.b.len()
    }

    /// Zero-phase forward-backward filtering
    ///
    /// # Errors
    /// `InvalidParameter` for an empty signal, `DegenerateInput` when the
    /// signal is not longer than `padlen()`.
    pub fn filtfilt(&self, x: &[f64]) -> Result<Vec<f64>> {
        let edge = self.padlen();
        let n = x.len();
        if n == 0 {
            return Err(DetectionError::invalid_parameter(
                "signal",
                "cannot filter an empty signal",
            ));
        }
        if n <= edge {
            return Err(DetectionError::degenerate_input(format!(
                "zero-phase filtering needs more than {} samples (got {})",
                edge, n
            )));
        }

        let extended = odd_extension(x, edge);
        let zi = self.lfilter_zi()?;

        let scaled = |scale: f64| -> Vec<f64> { zi.iter().map(|v| v * scale).collect() };

        let forward = self.lfilter(&extended, Some(&scaled(extended[0])));
        let reversed: Vec<f64> = forward.iter().rev().copied().collect();
        let backward = self.lfilter(&reversed, Some(&scaled(reversed[0])));

        let mut out: Vec<f64> = backward.into_iter().rev().collect();
        out.truncate(edge + n);
        out.drain(..edge);

        if let Some(i) = out.iter().position(|v| !v.is_finite()) {
            return Err(DetectionError::numeric_failure(
                "Butterworth",
                format!("non-finite filter output at index {}", i),
            ));
        }
        Ok(out)
    }

    /// H(e^{jw}) for `omega` in radians per sample
    pub fn frequency_response(&self, omega: f64) -> Complex64 {
        let eval = |coeffs: &[f64]| -> Complex64 {
            coeffs
                .iter()
                .enumerate()
                .map(|(k, &c)| Complex64::from_polar(c, -omega * k as f64))
                .sum()
        };
        eval(&self.b) / eval(&self.a)
    }
}

/// Design a digital Butterworth band-pass filter
///
/// # Arguments
/// * `order` - prototype order; the resulting filter has `2 * order` poles
/// * `low_cut`, `high_cut` - pass-band edges in Hz
/// * `sample_rate` - sampling frequency in Hz
///
/// # Errors
/// `InvalidParameter` unless `order >= 1` and
/// `0 < low_cut < high_cut < sample_rate / 2`.
pub fn butter_bandpass(
    order: usize,
    low_cut: f64,
    high_cut: f64,
    sample_rate: f64,
) -> Result<TransferFunction> {
    if order < 1 {
        return Err(DetectionError::invalid_parameter(
            "filter_order",
            "must be at least 1",
        ));
    }
    if !(sample_rate > 0.0) || !sample_rate.is_finite() {
        return Err(DetectionError::invalid_parameter(
            "sample_rate",
            format!("must be positive and finite (got {})", sample_rate),
        ));
    }
    let nyquist = sample_rate / 2.0;
    if !(low_cut > 0.0 && low_cut < high_cut && high_cut < nyquist) {
        return Err(DetectionError::invalid_parameter(
            "cutoff",
            format!(
                "need 0 < low_cut < high_cut < {} (got low_cut={}, high_cut={})",
                nyquist, low_cut, high_cut
            ),
        ));
    }

    // Bilinear transform constant for the fs = 2 convention
    const FS2: f64 = 4.0;

    let warp = |wn: f64| FS2 * (PI * wn / 2.0).tan();
    let w1 = warp(low_cut / nyquist);
    let w2 = warp(high_cut / nyquist);
    let bw = w2 - w1;
    let wo = (w1 * w2).sqrt();

    let prototype_poles = (0..order).map(|k| {
        let m = (2 * k) as f64 - order as f64 + 1.0;
        -Complex64::from_polar(1.0, PI * m / (2.0 * order as f64))
    });

    let mut analog_poles = Vec::with_capacity(2 * order);
    let mut upper = Vec::with_capacity(order);
    for p in prototype_poles {
        let scaled = p * (bw / 2.0);
        let root = (scaled * scaled - wo * wo).sqrt();
        analog_poles.push(scaled + root);
        upper.push(scaled - root);
    }
    analog_poles.extend(upper);

    // order zeros at s = 0 map to z = 1, the remaining order go to z = -1
    let mut digital_zeros = vec![Complex64::new(1.0, 0.0); order];
    digital_zeros.extend(std::iter::repeat(Complex64::new(-1.0, 0.0)).take(order));

    let digital_poles: Vec<Complex64> = analog_poles
        .iter()
        .map(|&p| (FS2 + p) / (FS2 - p))
        .collect();

    let analog_gain = bw.powi(order as i32);
    let pole_factor: Complex64 = analog_poles.iter().map(|&p| FS2 - p).product();
    let gain = analog_gain * (Complex64::new(FS2.powi(order as i32), 0.0) / pole_factor).re;

    let b: Vec<f64> = poly(&digital_zeros).into_iter().map(|c| gain * c).collect();
    let a = poly(&digital_poles);

    log::debug!(
        "[Butterworth] order={} low_cut={} high_cut={} sample_rate={} b={:?} a={:?}",
        order,
        low_cut,
        high_cut,
        sample_rate,
        b,
        a
    );
    TransferFunction::new(b, a)
}

/// Real coefficients (highest power first) of prod(z - r)
fn poly(roots: &[Complex64]) -> Vec<f64> {
    let mut coeffs = vec![Complex64::new(1.0, 0.0)];
    for &r in roots {
        let mut next = vec![Complex64::new(0.0, 0.0); coeffs.len() + 1];
        for (i, &c) in coeffs.iter().enumerate() {
            next[i] += c;
            next[i + 1] -= r * c;
        }
        coeffs = next;
    }
    coeffs.into_iter().map(|c| c.re).collect()
}

/// Odd extension by `edge` samples at both ends: 2*x[0] - x[edge..0]
fn odd_extension(x: &[f64], edge: usize) -> Vec<f64> {
    let n = x.len();
    let first = x[0];
    let last = x[n - 1];

    let mut out = Vec::with_capacity(n + 2 * edge);
    out.extend((1..=edge).rev().map(|i| 2.0 * first - x[i]));
    out.extend_from_slice(x);
    out.extend((1..=edge).map(|i| 2.0 * last - x[n - 1 - i]));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Digital centre frequency (rad/sample) of a band-pass design
    fn centre_omega(low_cut: f64, high_cut: f64, sample_rate: f64) -> f64 {
        let nyquist = sample_rate / 2.0;
        let w1 = 4.0 * (PI * low_cut / nyquist / 2.0).tan();
        let w2 = 4.0 * (PI * high_cut / nyquist / 2.0).tan();
        2.0 * ((w1 * w2).sqrt() / 4.0).atan()
    }

    #[test]
    fn test_first_order_design_matches_closed_form() {
        let tf = butter_bandpass(1, 0.01, 0.1, 10.0).unwrap();

        let k = 4.0;
        let w1 = k * (PI * 0.002 / 2.0).tan();
        let w2 = k * (PI * 0.02 / 2.0).tan();
        let bw = w2 - w1;
        let wo2 = w1 * w2;
        let d0 = k * k + bw * k + wo2;
        let expected_b = [bw * k / d0, 0.0, -bw * k / d0];
        let expected_a = [1.0, 2.0 * (wo2 - k * k) / d0, (k * k - bw * k + wo2) / d0];

        for (got, want) in tf.b().iter().zip(expected_b) {
            assert!((got - want).abs() < 1e-12, "b: {} vs {}", got, want);
        }
        for (got, want) in tf.a().iter().zip(expected_a) {
            assert!((got - want).abs() < 1e-12, "a: {} vs {}", got, want);
        }
    }

    #[test]
    fn test_bandpass_rejects_dc_and_nyquist() {
        let tf = butter_bandpass(3, 0.5, 1.5, 10.0).unwrap();
        assert_eq!(tf.b().len(), 7);
        assert_eq!(tf.a().len(), 7);
        assert!(tf.frequency_response(0.0).norm() < 1e-9);
        assert!(tf.frequency_response(PI).norm() < 1e-9);
    }

    #[test]
    fn test_unit_gain_at_centre_frequency() {
        let tf = butter_bandpass(2, 0.5, 1.5, 10.0).unwrap();
        let gain = tf.frequency_response(centre_omega(0.5, 1.5, 10.0)).norm();
        assert!((gain - 1.0).abs() < 1e-9, "gain {}", gain);
    }

    #[test]
    fn test_poles_are_stable() {
        let tf = butter_bandpass(4, 0.2, 2.0, 10.0).unwrap();
        // A stable filter's impulse response decays
        let mut impulse = vec![0.0; 2000];
        impulse[0] = 1.0;
        let response = tf.lfilter(&impulse, None);
        let tail: f64 = response[1800..].iter().map(|v| v.abs()).sum();
        assert!(tail < 1e-6, "tail energy {}", tail);
    }

    #[test]
    fn test_lfilter_first_order_recursion() {
        let tf = TransferFunction::new(vec![1.0], vec![1.0, -0.5]).unwrap();
        let y = tf.lfilter(&[1.0, 0.0, 0.0, 0.0], None);
        assert_eq!(y, vec![1.0, 0.5, 0.25, 0.125]);
    }

    #[test]
    fn test_lfilter_zi_gives_steady_state_step_response() {
        let tf = TransferFunction::new(vec![0.5, 0.5], vec![1.0, -0.5]).unwrap();
        let zi = tf.lfilter_zi().unwrap();
        assert!((zi[0] - 1.5).abs() < 1e-12);

        let y = tf.lfilter(&[1.0; 10], Some(&zi));
        for v in y {
            assert!((v - 2.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_normalises_leading_denominator() {
        let tf = TransferFunction::new(vec![2.0, 2.0], vec![2.0, -1.0]).unwrap();
        assert_eq!(tf.b(), &[1.0, 1.0]);
        assert_eq!(tf.a(), &[1.0, -0.5]);
        assert!(TransferFunction::new(vec![1.0], vec![0.0, 1.0]).is_err());
    }

    #[test]
    fn test_filtfilt_removes_constant_offset() {
        let tf = butter_bandpass(1, 0.01, 0.1, 10.0).unwrap();
        let y = tf.filtfilt(&vec![3.0; 200]).unwrap();
        for v in y {
            assert!(v.abs() < 1e-9, "residual {}", v);
        }
    }

    #[test]
    fn test_filtfilt_passes_centre_tone_without_delay() {
        let tf = butter_bandpass(2, 0.5, 1.5, 10.0).unwrap();
        let omega = centre_omega(0.5, 1.5, 10.0);
        let x: Vec<f64> = (0..2000).map(|i| (omega * i as f64).sin()).collect();
        let y = tf.filtfilt(&x).unwrap();
        assert_eq!(y.len(), x.len());
        for i in 500..1500 {
            assert!((y[i] - x[i]).abs() < 1e-3, "index {}: {} vs {}", i, y[i], x[i]);
        }
    }

    #[test]
    fn test_filtfilt_rejects_short_signal() {
        let tf = butter_bandpass(1, 0.01, 0.1, 10.0).unwrap();
        assert_eq!(tf.padlen(), 9);
        let err = tf.filtfilt(&[1.0; 9]).unwrap_err();
        assert!(matches!(err, DetectionError::DegenerateInput { .. }));
        assert!(tf.filtfilt(&[1.0; 10]).is_ok());

        let err = tf.filtfilt(&[]).unwrap_err();
        assert!(matches!(err, DetectionError::InvalidParameter { .. }));
    }

    #[test]
    fn test_rejects_invalid_cutoffs() {
        assert!(butter_bandpass(0, 0.1, 1.0, 10.0).is_err());
        assert!(butter_bandpass(1, 1.0, 0.5, 10.0).is_err());
        assert!(butter_bandpass(1, 0.1, 5.0, 10.0).is_err());
        assert!(butter_bandpass(1, 0.0, 1.0, 10.0).is_err());
    }

    #[test]
    fn test_odd_extension() {
        let ext = odd_extension(&[1.0, 2.0, 4.0, 7.0], 2);
        assert_eq!(ext, vec![-2.0, 0.0, 1.0, 2.0, 4.0, 7.0, 10.0, 12.0]);
    }
}
