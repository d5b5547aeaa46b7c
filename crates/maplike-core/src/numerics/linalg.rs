//! Solves for the per-pixel amplitude information systems.
//!
//! Every system `N · x = y` is Jacobi-equilibrated first, `S = D N D` with
//! `D = diag(N)^(-1/2)`, so `S` has a unit diagonal and the near-singularity
//! test below does not depend on the units each component is expressed in.

use faer::linalg::solvers::{Llt, Solve};
use faer::{Mat, Side};

/// Smallest squared Cholesky pivot accepted for an equilibrated matrix.
///
/// The pivots of a unit-diagonal matrix lie in `(0, 1]`; their product is its
/// determinant.
const MIN_SCALED_PIVOT: f64 = 1.0e-12;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SolveError {
    #[error("information matrix diagonal entry {index} is {value}, expected positive")]
    NonPositiveDiagonal { index: usize, value: f64 },
    #[error("information matrix is not positive definite")]
    NotPositiveDefinite,
    #[error("information matrix is near-singular at pivot {index} (scaled pivot {pivot:e})")]
    NearSingular { index: usize, pivot: f64 },
    #[error("solution component {index} is not finite")]
    NonFiniteSolution { index: usize },
}

/// Solves the symmetric positive-definite system `matrix · x = rhs`.
///
/// `rhs.len()` must equal the dimension of the square `matrix`. Only the lower
/// triangle of `matrix` is read.
pub fn solve_information_system(
    matrix: &Mat<f64>,
    rhs: &[f64],
) -> Result<Vec<f64>, SolveError> {
    let dimension = matrix.nrows();
    let mut scale = Vec::with_capacity(dimension);
    for index in 0..dimension {
        let value = matrix[(index, index)];
        if !(value.is_finite() && value > 0.0) {
            return Err(SolveError::NonPositiveDiagonal { index, value });
        }
        scale.push(value.sqrt().recip());
    }

    let scaled = Mat::from_fn(dimension, dimension, |row, col| {
        matrix[(row, col)] * scale[row] * scale[col]
    });
    let llt = Llt::new(scaled.as_ref(), Side::Lower)
        .map_err(|_| SolveError::NotPositiveDefinite)?;

    let factor = llt.L().to_owned();
    for index in 0..dimension {
        let pivot = factor[(index, index)] * factor[(index, index)];
        if pivot.is_nan() || pivot < MIN_SCALED_PIVOT {
            return Err(SolveError::NearSingular { index, pivot });
        }
    }

    let scaled_rhs = Mat::from_fn(dimension, 1, |row, _| rhs[row] * scale[row]);
    let scaled_solution = llt.solve(scaled_rhs.as_ref());

    (0..dimension)
        .map(|index| {
            let value = scaled_solution[(index, 0)] * scale[index];
            if value.is_finite() {
                Ok(value)
            } else {
                Err(SolveError::NonFiniteSolution { index })
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{SolveError, solve_information_system};
    use faer::Mat;

    fn matrix(rows: &[&[f64]]) -> Mat<f64> {
        Mat::from_fn(rows.len(), rows.len(), |row, col| rows[row][col])
    }

    fn assert_close(actual: &[f64], expected: &[f64], relative: f64) {
        assert_eq!(actual.len(), expected.len());
        for (index, (a, e)) in actual.iter().zip(expected).enumerate() {
            assert!(
                (a - e).abs() <= relative * e.abs().max(1.0),
                "component {index}: {a} vs {e}"
            );
        }
    }

    #[test]
    fn recovers_known_solution() {
        let system = matrix(&[&[4.0, 1.0, 0.5], &[1.0, 3.0, 0.25], &[0.5, 0.25, 2.0]]);
        let expected = [1.0, -2.0, 0.5];
        let rhs: Vec<f64> = (0..3)
            .map(|row| (0..3).map(|col| system[(row, col)] * expected[col]).sum())
            .collect();

        let solution = solve_information_system(&system, &rhs).expect("solve");
        assert_close(&solution, &expected, 1.0e-12);
    }

    #[test]
    fn rescaled_component_is_solved_in_its_own_units() {
        // N for F = [[1, 1, 1], [1e-7, 2e-7, 3e-7]] with unit weights.
        let system = matrix(&[&[3.0, 6.0e-7], &[6.0e-7, 14.0e-14]]);
        let rhs = [
            3.0 * 2.0 + 6.0e-7 * 5.0e6,
            6.0e-7 * 2.0 + 14.0e-14 * 5.0e6,
        ];

        let solution =
            solve_information_system(&system, &rhs).expect("well-posed after scaling");
        assert_close(&solution, &[2.0, 5.0e6], 1.0e-9);
    }

    #[test]
    fn unweighted_component_reports_its_diagonal() {
        let system = matrix(&[&[2.0, 0.0], &[0.0, 0.0]]);
        assert_eq!(
            solve_information_system(&system, &[1.0, 1.0]),
            Err(SolveError::NonPositiveDiagonal {
                index: 1,
                value: 0.0
            })
        );
    }

    #[test]
    fn collinear_components_are_rejected() {
        for system in [
            matrix(&[&[1.0, 2.0], &[2.0, 4.0]]),
            matrix(&[&[1.0, 1.0], &[1.0, 1.0 + 1.0e-14]]),
            matrix(&[&[1.0e-8, 1.0e-3], &[1.0e-3, 1.0e2]]),
        ] {
            let error = solve_information_system(&system, &[1.0, 1.0])
                .expect_err("collinear columns should fail");
            assert!(
                matches!(
                    error,
                    SolveError::NotPositiveDefinite | SolveError::NearSingular { index: 1, .. }
                ),
                "unexpected error: {error:?}"
            );
        }
    }

    #[test]
    fn non_finite_diagonal_is_rejected() {
        let system = matrix(&[&[f64::INFINITY]]);
        assert!(matches!(
            solve_information_system(&system, &[1.0]),
            Err(SolveError::NonPositiveDiagonal { index: 0, .. })
        ));
    }
}
