// Full linear convolution
//
// Short kernels are convolved by direct summation. Once the work
// (len(x) * len(kernel)) exceeds FFT_WORK_THRESHOLD the product is computed
// in the frequency domain with rustfft, zero-padded to the next power of two.
// Both paths are deterministic for a given input.

use rustfft::{num_complex::Complex, FftPlanner};

use crate::error::{DetectionError, Result};

/// Direct summation is used up to this many multiply-adds
pub const FFT_WORK_THRESHOLD: usize = 1 << 16;

/// Full convolution, `len(x) + len(kernel) - 1` samples
///
/// # Errors
/// `InvalidParameter` when either input is empty.
pub fn convolve_full(x: &[f64], kernel: &[f64]) -> Result<Vec<f64>> {
    if x.is_empty() || kernel.is_empty() {
        let name = if x.is_empty() { "signal" } else { "kernel" };
        return Err(DetectionError::invalid_parameter(
            name,
            "convolution needs non-empty signal and kernel",
        ));
    }

    if x.len().saturating_mul(kernel.len()) <= FFT_WORK_THRESHOLD {
        Ok(convolve_direct(x, kernel))
    } else {
        Ok(convolve_fft(x, kernel))
    }
}

pub(crate) fn convolve_direct(x: &[f64], kernel: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; x.len() + kernel.len() - 1];
    for (i, &xi) in x.iter().enumerate() {
        for (j, &kj) in kernel.iter().enumerate() {
            out[i + j] += xi * kj;
        }
    }
    out
}

pub(crate) fn convolve_fft(x: &[f64], kernel: &[f64]) -> Vec<f64> {
    let out_len = x.len() + kernel.len() - 1;
    let fft_size = out_len.next_power_of_two();

    let to_buffer = |values: &[f64]| -> Vec<Complex<f64>> {
        let mut buffer: Vec<Complex<f64>> = values.iter().map(|&v| Complex::new(v, 0.0)).collect();
        buffer.resize(fft_size, Complex::new(0.0, 0.0));
        buffer
    };

    let mut planner = FftPlanner::<f64>::new();
    let forward = planner.plan_fft_forward(fft_size);
    let inverse = planner.plan_fft_inverse(fft_size);

    let mut signal_spectrum = to_buffer(x);
    let mut kernel_spectrum = to_buffer(kernel);
    forward.process(&mut signal_spectrum);
    forward.process(&mut kernel_spectrum);

    for (s, k) in signal_spectrum.iter_mut().zip(&kernel_spectrum) {
        *s *= k;
    }
    inverse.process(&mut signal_spectrum);

    // rustfft leaves the inverse unnormalised
    let scale = 1.0 / fft_size as f64;
    signal_spectrum[..out_len]
        .iter()
        .map(|c| c.re * scale)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_convolution_small_example() {
        let y = convolve_full(&[1.0, 2.0, 3.0], &[0.0, 1.0, 0.5]).unwrap();
        assert_eq!(y, vec![0.0, 1.0, 2.5, 4.0, 1.5]);
    }

    #[test]
    fn test_impulse_reproduces_kernel() {
        let kernel = [0.25, 0.5, 1.0, 0.5, 0.25];
        let mut x = vec![0.0; 10];
        x[3] = 2.0;
        let y = convolve_full(&x, &kernel).unwrap();
        assert_eq!(y.len(), 14);
        for (j, &k) in kernel.iter().enumerate() {
            assert_eq!(y[3 + j], 2.0 * k);
        }
    }

    #[test]
    fn test_fft_path_matches_direct() {
        let x: Vec<f64> = (0..3000).map(|i| ((i * 7919) % 97) as f64 / 97.0 - 0.5).collect();
        let kernel: Vec<f64> = (0..61).map(|i| (-((i as f64 - 30.0) / 8.0).powi(2)).exp()).collect();
        assert!(x.len() * kernel.len() > FFT_WORK_THRESHOLD);

        let via_fft = convolve_full(&x, &kernel).unwrap();
        let direct = convolve_direct(&x, &kernel);
        assert_eq!(via_fft.len(), direct.len());
        for (a, b) in via_fft.iter().zip(&direct) {
            assert!((a - b).abs() < 1e-9, "{} vs {}", a, b);
        }
    }

    #[test]
    fn test_rejects_empty_inputs() {
        let err = convolve_full(&[], &[1.0]).unwrap_err();
        assert!(matches!(err, DetectionError::InvalidParameter { ref name, .. } if name == "signal"));
        let err = convolve_full(&[1.0], &[]).unwrap_err();
        assert!(matches!(err, DetectionError::InvalidParameter { ref name, .. } if name == "kernel"));
    }
}
