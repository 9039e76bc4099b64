use crate::error::LinalgError;
use nalgebra::{DMatrix, DVector};

/// Pivots smaller than this (relative to the largest matrix entry) mark the system as singular
const SINGULARITY_TOLERANCE: f64 = 1e-13;

/// Solve `Ax = b` with an LU decomposition (partial pivoting)
///
/// ```
/// use hp_fem_2d::linalg::lu_solve;
/// use nalgebra::{DMatrix, DVector};
///
/// let a = DMatrix::from_row_slice(2, 2, &[0.0, 2.0, 1.0, 1.0]);
/// let b = DVector::from_vec(vec![4.0, 3.0]);
/// let x = lu_solve(a, b).unwrap();
///
/// assert!((x[0] - 1.0).abs() < 1e-14);
/// assert!((x[1] - 2.0).abs() < 1e-14);
/// ```
pub fn lu_solve(a: DMatrix<f64>, b: DVector<f64>) -> Result<DVector<f64>, LinalgError> {
    check_dimensions(&a, &b)?;

    let scale = a.amax();
    let lu = a.lu();
    if scale == 0.0
        || lu
            .u()
            .diagonal()
            .iter()
            .any(|pivot| !pivot.is_finite() || pivot.abs() <= scale * SINGULARITY_TOLERANCE)
    {
        return Err(LinalgError::Singular);
    }

    lu.solve(&b).ok_or(LinalgError::Singular)
}

/// Solve `Ax = b` for a symmetric positive definite `A` with a Cholesky decomposition
///
/// Falls back to [lu_solve] if the decomposition fails
pub fn spd_solve(a: DMatrix<f64>, b: DVector<f64>) -> Result<DVector<f64>, LinalgError> {
    check_dimensions(&a, &b)?;

    match a.clone().cholesky() {
        Some(cholesky_decomp) => Ok(cholesky_decomp.solve(&b)),
        None => lu_solve(a, b),
    }
}

fn check_dimensions(a: &DMatrix<f64>, b: &DVector<f64>) -> Result<(), LinalgError> {
    if a.nrows() != a.ncols() || a.nrows() != b.len() {
        Err(LinalgError::DimensionMismatch {
            rows: a.nrows(),
            cols: a.ncols(),
            rhs: b.len(),
        })
    } else {
        Ok(())
    }
}
