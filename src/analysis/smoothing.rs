// Savitzky-Golay smoothing
//
// Fits a polynomial of order `poly_order` to every window of `window_len`
// samples by least squares and keeps the fitted value at the window centre.
// The fit reduces to a fixed convolution kernel: row 0 of the pseudo-inverse
// of the Vandermonde design matrix over offsets -h..=h.
//
// Edges are padded by reflecting the absolute deviation from the boundary
// value (below the first sample at the start, above the last sample at the
// end), then a single valid-mode convolution yields exactly N samples.

use nalgebra::DMatrix;

use crate::error::{DetectionError, Result};

/// Singular values below this (relative to the largest) are treated as zero
const PINV_EPSILON: f64 = 1e-12;

/// Savitzky-Golay smoother with a precomputed kernel
#[derive(Debug, Clone)]
pub struct SavitzkyGolay {
    window_len: usize,
    poly_order: usize,
    kernel: Vec<f64>,
}

impl SavitzkyGolay {
    /// Design the smoothing kernel
    ///
    /// # Errors
    /// `InvalidParameter` when `window_len` is even, smaller than 3, or not
    /// greater than `poly_order`.
    pub fn new(window_len: usize, poly_order: usize) -> Result<Self> {
        if window_len < 3 {
            return Err(DetectionError::invalid_parameter(
                "window_len",
                format!("must be at least 3 (got {})", window_len),
            ));
        }
        if window_len % 2 == 0 {
            return Err(DetectionError::invalid_parameter(
                "window_len",
                format!("must be odd (got {})", window_len),
            ));
        }
        if window_len <= poly_order {
            return Err(DetectionError::invalid_parameter(
                "poly_order",
                format!(
                    "must be less than window_len (got poly_order={}, window_len={})",
                    poly_order, window_len
                ),
            ));
        }

        let kernel = design_kernel(window_len, poly_order)?;
        Ok(Self {
            window_len,
            poly_order,
            kernel,
        })
    }

    pub fn window_len(&self) -> usize {
        self.window_len
    }

    pub fn poly_order(&self) -> usize {
        self.poly_order
    }

    pub fn half_window(&self) -> usize {
        (self.window_len - 1) / 2
    }

    /// Convolution kernel, index 0 corresponds to offset -h
    pub fn kernel(&self) -> &[f64] {
        &self.kernel
    }

    /// Smooth a signal, returning exactly `signal.len()` samples
    ///
    /// # Errors
    /// `InvalidParameter` for an empty signal, `DegenerateInput` when the
    /// signal is shorter than the window.
    pub fn smooth(&self, signal: &[f64]) -> Result<Vec<f64>> {
        let n = signal.len();
        if n == 0 {
            return Err(DetectionError::invalid_parameter(
                "signal",
                "cannot smooth an empty signal",
            ));
        }
        if self.window_len > n {
            return Err(DetectionError::degenerate_input(format!(
                "window_len {} exceeds signal length {}",
                self.window_len, n
            )));
        }

        let padded = pad_edges(signal, self.half_window());
        let smoothed = padded
            .windows(self.window_len)
            .map(|window| {
                window
                    .iter()
                    .zip(self.kernel.iter())
                    .map(|(v, c)| v * c)
                    .sum()
            })
            .collect::<Vec<f64>>();

        debug_assert_eq!(smoothed.len(), n);
        log::debug!(
            "[Smoother] window_len={} poly_order={} samples={}",
            self.window_len,
            self.poly_order,
            n
        );
        Ok(smoothed)
    }
}

/// Smooth `signal` with a freshly designed Savitzky-Golay kernel
pub fn smooth(signal: &[f64], window_len: usize, poly_order: usize) -> Result<Vec<f64>> {
    SavitzkyGolay::new(window_len, poly_order)?.smooth(signal)
}

/// Row 0 of pinv(A) with A[k][i] = k^i over offsets -h..=h
///
/// Offsets are scaled to [-1, 1] before the decomposition. Column scaling
/// leaves the constant-term row of the pseudo-inverse unchanged and keeps
/// the design matrix well conditioned for long windows.
fn design_kernel(window_len: usize, poly_order: usize) -> Result<Vec<f64>> {
    let half = ((window_len - 1) / 2) as f64;
    let design = DMatrix::from_fn(window_len, poly_order + 1, |row, col| {
        let offset = (row as f64 - half) / half;
        offset.powi(col as i32)
    });

    let pinv = design.pseudo_inverse(PINV_EPSILON).map_err(|reason| {
        DetectionError::numeric_failure("Smoother", format!("pseudo-inverse failed: {}", reason))
    })?;

    let kernel: Vec<f64> = pinv.row(0).iter().copied().collect();
    if kernel.iter().any(|c| !c.is_finite()) {
        return Err(DetectionError::numeric_failure(
            "Smoother",
            "kernel contains non-finite coefficients",
        ));
    }
    Ok(kernel)
}

/// Pad `h` samples on each side by reflecting |x - edge|
///
/// start: x[0] - |x[h - j] - x[0]| for j in 0..h
/// end:   x[n-1] + |x[n-2-j] - x[n-1]| for j in 0..h
fn pad_edges(signal: &[f64], half: usize) -> Vec<f64> {
    let n = signal.len();
    let first = signal[0];
    let last = signal[n - 1];

    let mut padded = Vec::with_capacity(n + 2 * half);
    padded.extend((1..=half).rev().map(|i| first - (signal[i] - first).abs()));
    padded.extend_from_slice(signal);
    padded.extend((1..=half).map(|j| last + (signal[n - 1 - j] - last).abs()));
    padded
}
