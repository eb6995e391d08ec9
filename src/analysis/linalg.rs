// Banded symmetric matrices and the solvers behind the ALS baseline
//
// The baseline system (W + lambda * D'D) is symmetric positive definite and
// pentadiagonal, so it is stored as lower bands only. Solvers implement
// `LinearSolver`, which lets the baseline estimator switch between the
// banded Cholesky factorisation and a dense LU reference without touching
// the surrounding algorithm.

use nalgebra::{DMatrix, DVector};

use crate::error::{DetectionError, Result};

/// Symmetric banded matrix stored by lower diagonals
///
/// `bands[d][i]` holds `A[i + d][i]`; `bands[0]` is the main diagonal.
#[derive(Debug, Clone, PartialEq)]
pub struct BandedMatrix {
    n: usize,
    bands: Vec<Vec<f64>>,
}

impl BandedMatrix {
    /// Zero matrix of size `n` with `half_bandwidth` sub-diagonals
    pub fn zeros(n: usize, half_bandwidth: usize) -> Self {
        let bands = (0..=half_bandwidth)
            .map(|d| vec![0.0; n.saturating_sub(d)])
            .collect();
        Self { n, bands }
    }

    /// `lambda * D'D` for the (n-2) x n second-difference operator D
    pub fn second_difference_gram(n: usize, lambda: f64) -> Self {
        const STENCIL: [f64; 3] = [1.0, -2.0, 1.0];

        let mut gram = Self::zeros(n, 2);
        for row in 0..n.saturating_sub(2) {
            for a in 0..3 {
                for b in 0..=a {
                    gram.add(row + a, row + b, lambda * STENCIL[a] * STENCIL[b]);
                }
            }
        }
        gram
    }

    pub fn size(&self) -> usize {
        self.n
    }

    pub fn half_bandwidth(&self) -> usize {
        self.bands.len() - 1
    }

    /// Entry (i, j); zero outside the band
    pub fn get(&self, i: usize, j: usize) -> f64 {
        let (row, col) = if i >= j { (i, j) } else { (j, i) };
        let d = row - col;
        if d > self.half_bandwidth() || row >= self.n {
            return 0.0;
        }
        self.bands[d][col]
    }

    /// Add `value` to entry (i, j) and, by symmetry, (j, i)
    ///
    /// Panics if the entry lies outside the band.
    pub fn add(&mut self, i: usize, j: usize, value: f64) {
        let (row, col) = if i >= j { (i, j) } else { (j, i) };
        let d = row - col;
        assert!(
            d <= self.half_bandwidth() && row < self.n,
            "entry ({}, {}) outside band",
            i,
            j
        );
        self.bands[d][col] += value;
    }

    /// Copy of this matrix with `diag` added to the main diagonal
    pub fn with_added_diagonal(&self, diag: &[f64]) -> Self {
        debug_assert_eq!(diag.len(), self.n);
        let mut out = self.clone();
        for (a, w) in out.bands[0].iter_mut().zip(diag) {
            *a += w;
        }
        out
    }

    /// Matrix-vector product
    pub fn mul_vec(&self, v: &[f64]) -> Vec<f64> {
        debug_assert_eq!(v.len(), self.n);
        let mut out = vec![0.0; self.n];
        for (d, band) in self.bands.iter().enumerate() {
            for (col, &a) in band.iter().enumerate() {
                let row = col + d;
                out[row] += a * v[col];
                if d > 0 {
                    out[col] += a * v[row];
                }
            }
        }
        out
    }

    pub fn to_dense(&self) -> DMatrix<f64> {
        DMatrix::from_fn(self.n, self.n, |i, j| self.get(i, j))
    }
}

/// Strategy for solving `A x = b` with a symmetric banded `A`
pub trait LinearSolver: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Solve the system, failing with `NumericFailure` when the result is
    /// not finite or the matrix is not positive definite
    fn solve(&self, matrix: &BandedMatrix, rhs: &[f64]) -> Result<Vec<f64>>;
}

/// Banded Cholesky (L L') factorisation, O(n * p^2)
#[derive(Debug, Clone, Copy, Default)]
pub struct BandedCholeskySolver;

impl LinearSolver for BandedCholeskySolver {
    fn name(&self) -> &'static str {
        "banded-cholesky"
    }

    fn solve(&self, matrix: &BandedMatrix, rhs: &[f64]) -> Result<Vec<f64>> {
        let n = matrix.size();
        check_rhs(n, rhs)?;
        let p = matrix.half_bandwidth();

        // lower[d][j] = L[j + d][j]
        let mut lower: Vec<Vec<f64>> = (0..=p).map(|d| vec![0.0; n.saturating_sub(d)]).collect();

        for j in 0..n {
            let k_start = j.saturating_sub(p);
            let mut pivot = matrix.get(j, j);
            for k in k_start..j {
                let l_jk = lower[j - k][k];
                pivot -= l_jk * l_jk;
            }
            if !(pivot > 0.0) || !pivot.is_finite() {
                return Err(DetectionError::numeric_failure(
                    "LinearSolver",
                    format!("matrix not positive definite at row {} (pivot {})", j, pivot),
                ));
            }
            let l_jj = pivot.sqrt();
            lower[0][j] = l_jj;

            for i in (j + 1)..n.min(j + p + 1) {
                let mut sum = matrix.get(i, j);
                for k in i.saturating_sub(p)..j {
                    sum -= lower[i - k][k] * lower[j - k][k];
                }
                lower[i - j][j] = sum / l_jj;
            }
        }

        // Forward substitution: L y = b
        let mut y = rhs.to_vec();
        for i in 0..n {
            let mut sum = y[i];
            for k in i.saturating_sub(p)..i {
                sum -= lower[i - k][k] * y[k];
            }
            y[i] = sum / lower[0][i];
        }

        // Back substitution: L' x = y
        let mut x = y;
        for i in (0..n).rev() {
            let mut sum = x[i];
            for k in (i + 1)..n.min(i + p + 1) {
                sum -= lower[k - i][i] * x[k];
            }
            x[i] = sum / lower[0][i];
        }

        check_finite(&x)?;
        Ok(x)
    }
}

/// Dense LU reference solver, O(n^3); intended for small systems
#[derive(Debug, Clone, Copy, Default)]
pub struct DenseSolver;

impl LinearSolver for DenseSolver {
    fn name(&self) -> &'static str {
        "dense-lu"
    }

    fn solve(&self, matrix: &BandedMatrix, rhs: &[f64]) -> Result<Vec<f64>> {
        check_rhs(matrix.size(), rhs)?;
        solve_dense(matrix.to_dense(), rhs)
    }
}

/// Solve a small dense system `a x = b` by LU
pub(crate) fn solve_dense(a: DMatrix<f64>, b: &[f64]) -> Result<Vec<f64>> {
    let rhs = DVector::from_column_slice(b);
    let solution = a.lu().solve(&rhs).ok_or_else(|| {
        DetectionError::numeric_failure("LinearSolver", "singular dense system")
    })?;
    let x: Vec<f64> = solution.iter().copied().collect();
    check_finite(&x)?;
    Ok(x)
}

fn check_rhs(n: usize, rhs: &[f64]) -> Result<()> {
    if rhs.len() != n {
        return Err(DetectionError::invalid_parameter(
            "rhs",
            format!("length {} does not match matrix size {}", rhs.len(), n),
        ));
    }
    Ok(())
}

fn check_finite(x: &[f64]) -> Result<()> {
    if let Some(i) = x.iter().position(|v| !v.is_finite()) {
        return Err(DetectionError::numeric_failure(
            "LinearSolver",
            format!("non-finite solution at index {}", i),
        ));
    }
    Ok(())
}
