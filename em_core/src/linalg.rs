//! Small dense linear algebra for the closed-form M-steps.
//!
//! The systems solved here are H×H (normal equations of the dictionary
//! update) or at most gamma×gamma (the GSC amplitude posterior), so a
//! hand-rolled solver is used instead of a LAPACK-backed crate.

use std::fmt;

use ndarray::Array2;

/// The coefficient matrix was numerically singular.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SingularMatrix;

impl fmt::Display for SingularMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "matrix is numerically singular")
    }
}

impl std::error::Error for SingularMatrix {}

const PIVOT_EPS: f64 = 1e-12;

/// Solves `A X = B` by Gaussian elimination with partial pivoting.
///
/// `a` must be n×n and `b` n×m; both are copied, the inputs stay intact.
///
/// # Errors
/// Returns `SingularMatrix` when no acceptable pivot exists.
pub fn solve(a: &Array2<f64>, b: &Array2<f64>) -> Result<Array2<f64>, SingularMatrix> {
    let n = a.nrows();
    debug_assert_eq!(a.ncols(), n);
    debug_assert_eq!(b.nrows(), n);
    let m = b.ncols();

    let mut lhs = a.clone();
    let mut rhs = b.clone();

    for col in 0..n {
        // Partial pivot: largest magnitude entry on or below the diagonal.
        let mut pivot_row = col;
        let mut pivot_mag = lhs[[col, col]].abs();
        for row in col + 1..n {
            let mag = lhs[[row, col]].abs();
            if mag > pivot_mag {
                pivot_row = row;
                pivot_mag = mag;
            }
        }

        if !pivot_mag.is_finite() || pivot_mag < PIVOT_EPS {
            return Err(SingularMatrix);
        }

        if pivot_row != col {
            for j in 0..n {
                lhs.swap([col, j], [pivot_row, j]);
            }
            for j in 0..m {
                rhs.swap([col, j], [pivot_row, j]);
            }
        }

        let pivot = lhs[[col, col]];
        for row in col + 1..n {
            let factor = lhs[[row, col]] / pivot;
            if factor == 0.0 {
                continue;
            }
            for j in col..n {
                let v = lhs[[col, j]];
                lhs[[row, j]] -= factor * v;
            }
            for j in 0..m {
                let v = rhs[[col, j]];
                rhs[[row, j]] -= factor * v;
            }
        }
    }

    // Back substitution.
    for col in (0..n).rev() {
        let pivot = lhs[[col, col]];
        for j in 0..m {
            let mut acc = rhs[[col, j]];
            for k in col + 1..n {
                acc -= lhs[[col, k]] * rhs[[k, j]];
            }
            rhs[[col, j]] = acc / pivot;
        }
    }

    Ok(rhs)
}

/// Solves `A X = B` with a ridge retry: on a singular `A`, adds
/// `ridge` to the diagonal once and solves again.
pub fn solve_ridged(
    a: &Array2<f64>,
    b: &Array2<f64>,
    ridge: f64,
) -> Result<Array2<f64>, SingularMatrix> {
    match solve(a, b) {
        Ok(x) => Ok(x),
        Err(SingularMatrix) => {
            let mut damped = a.clone();
            for i in 0..damped.nrows() {
                damped[[i, i]] += ridge;
            }
            solve(&damped, b)
        }
    }
}

/// Cholesky factor (lower triangular, row-major) of a k×k SPD matrix.
///
/// # Errors
/// Returns `SingularMatrix` when the matrix is not positive definite.
pub fn cholesky(a: &[f64], k: usize) -> Result<Vec<f64>, SingularMatrix> {
    debug_assert_eq!(a.len(), k * k);
    let mut l = vec![0.0; k * k];

    for i in 0..k {
        for j in 0..=i {
            let mut sum = a[i * k + j];
            for p in 0..j {
                sum -= l[i * k + p] * l[j * k + p];
            }

            if i == j {
                if !(sum > PIVOT_EPS) {
                    return Err(SingularMatrix);
                }
                l[i * k + i] = sum.sqrt();
            } else {
                l[i * k + j] = sum / l[j * k + j];
            }
        }
    }

    Ok(l)
}

/// log det(A) from its Cholesky factor.
pub fn cholesky_logdet(l: &[f64], k: usize) -> f64 {
    (0..k).map(|i| l[i * k + i].ln()).sum::<f64>() * 2.0
}

/// Solves `A x = b` in place given the Cholesky factor of `A`.
pub fn cholesky_solve(l: &[f64], k: usize, b: &mut [f64]) {
    debug_assert_eq!(b.len(), k);

    // Forward: L y = b.
    for i in 0..k {
        let mut acc = b[i];
        for j in 0..i {
            acc -= l[i * k + j] * b[j];
        }
        b[i] = acc / l[i * k + i];
    }

    // Backward: L' x = y.
    for i in (0..k).rev() {
        let mut acc = b[i];
        for j in i + 1..k {
            acc -= l[j * k + i] * b[j];
        }
        b[i] = acc / l[i * k + i];
    }
}

/// Inverse of a k×k SPD matrix from its Cholesky factor, row-major.
pub fn cholesky_inverse(l: &[f64], k: usize) -> Vec<f64> {
    let mut inv = vec![0.0; k * k];
    let mut col = vec![0.0; k];

    for j in 0..k {
        col.fill(0.0);
        col[j] = 1.0;
        cholesky_solve(l, k, &mut col);
        for i in 0..k {
            inv[i * k + j] = col[i];
        }
    }

    inv
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn solve_2x2() {
        let a = array![[2.0, 1.0], [1.0, 3.0]];
        let b = array![[5.0], [10.0]];
        let x = solve(&a, &b).unwrap();
        assert!((x[[0, 0]] - 1.0).abs() < 1e-12);
        assert!((x[[1, 0]] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn solve_requires_pivoting() {
        let a = array![[0.0, 1.0], [1.0, 0.0]];
        let b = array![[2.0], [3.0]];
        let x = solve(&a, &b).unwrap();
        assert!((x[[0, 0]] - 3.0).abs() < 1e-12);
        assert!((x[[1, 0]] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn singular_matrix_is_reported_and_ridge_recovers() {
        let a = array![[1.0, 1.0], [1.0, 1.0]];
        let b = array![[1.0], [1.0]];
        assert_eq!(solve(&a, &b), Err(SingularMatrix));
        assert!(solve_ridged(&a, &b, 1e-6).is_ok());
    }

    #[test]
    fn cholesky_solve_and_logdet() {
        // A = [[4, 2], [2, 3]], det = 8.
        let a = [4.0, 2.0, 2.0, 3.0];
        let l = cholesky(&a, 2).unwrap();
        assert!((cholesky_logdet(&l, 2) - 8.0f64.ln()).abs() < 1e-12);

        let mut b = [2.0, 3.0];
        cholesky_solve(&l, 2, &mut b);
        // A x = [2, 3] -> x = [0, 1].
        assert!(b[0].abs() < 1e-12);
        assert!((b[1] - 1.0).abs() < 1e-12);

        let inv = cholesky_inverse(&l, 2);
        // A^{-1} = 1/8 [[3, -2], [-2, 4]].
        assert!((inv[0] - 3.0 / 8.0).abs() < 1e-12);
        assert!((inv[1] + 2.0 / 8.0).abs() < 1e-12);
        assert!((inv[3] - 4.0 / 8.0).abs() < 1e-12);
    }

    #[test]
    fn cholesky_rejects_indefinite() {
        let a = [1.0, 2.0, 2.0, 1.0];
        assert!(cholesky(&a, 2).is_err());
    }
}
