//! Generalized least-squares solve for per-pixel component amplitudes.
//!
//! For every polarization channel `p` and pixel `x` the information matrix is
//! `N_T⁻¹[p, x] = Σ_ν n_ivar[ν, p, x] · F[·, p, ν] F[·, p, ν]ᵀ` and the
//! maximum-likelihood amplitudes solve `N_T⁻¹[p, x] · T̄[p, x] = y[p, x]` with
//! `y[p, x, a] = Σ_ν F[a, p, ν] · n_ivar[ν, p, x] · d[ν, p, x]`.

use crate::domain::{
    AmplitudeCovarianceInverse, AmplitudeMean, FrequencyMap, MapLikeError, MapLikeResult,
    MixingMatrix, ShapeError, SingularSlice,
};
use crate::numerics::linalg::solve_information_system;
use faer::Mat;
use ndarray::{Array3, Array4};

/// Caller-held intermediates that skip recomputation when supplied.
#[derive(Debug, Clone, Copy, Default)]
pub struct Precomputed<'a> {
    pub mixing_matrix: Option<&'a MixingMatrix>,
    pub covariance_inverse: Option<&'a AmplitudeCovarianceInverse>,
}

impl<'a> Precomputed<'a> {
    pub fn with_mixing_matrix(mixing_matrix: &'a MixingMatrix) -> Self {
        Self {
            mixing_matrix: Some(mixing_matrix),
            covariance_inverse: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AmplitudeSolution {
    pub mean: AmplitudeMean,
    pub covariance_inverse: AmplitudeCovarianceInverse,
}

pub fn amplitude_covariance_inverse(
    n_ivar: &FrequencyMap,
    mixing: &MixingMatrix,
) -> Result<AmplitudeCovarianceInverse, ShapeError> {
    let (n_comp, n_pol, n_freq) = check_mixing_against_maps(mixing, n_ivar)?;
    let n_pix = n_ivar.dim().2;

    let mut outer = Array4::<f64>::zeros((n_pol, n_freq, n_comp, n_comp));
    for p in 0..n_pol {
        for nu in 0..n_freq {
            for a in 0..n_comp {
                for b in 0..n_comp {
                    outer[[p, nu, a, b]] = mixing[[a, p, nu]] * mixing[[b, p, nu]];
                }
            }
        }
    }

    let mut covariance_inverse = Array4::<f64>::zeros((n_pol, n_pix, n_comp, n_comp));
    for p in 0..n_pol {
        for x in 0..n_pix {
            for nu in 0..n_freq {
                let weight = n_ivar[[nu, p, x]];
                for a in 0..n_comp {
                    for b in 0..n_comp {
                        covariance_inverse[[p, x, a, b]] += outer[[p, nu, a, b]] * weight;
                    }
                }
            }
        }
    }

    Ok(covariance_inverse)
}

/// Noise-weighted projection `Fᵀ N⁻¹ d`, shaped `(n_pol, n_pix, n_comp)`.
pub fn weighted_data(
    d_map: &FrequencyMap,
    n_ivar: &FrequencyMap,
    mixing: &MixingMatrix,
) -> Result<Array3<f64>, ShapeError> {
    check_map_pair(d_map, n_ivar)?;
    let (n_comp, n_pol, n_freq) = check_mixing_against_maps(mixing, n_ivar)?;
    let n_pix = n_ivar.dim().2;

    let mut projected = Array3::<f64>::zeros((n_pol, n_pix, n_comp));
    for p in 0..n_pol {
        for x in 0..n_pix {
            for nu in 0..n_freq {
                let weighted = n_ivar[[nu, p, x]] * d_map[[nu, p, x]];
                for a in 0..n_comp {
                    projected[[p, x, a]] += mixing[[a, p, nu]] * weighted;
                }
            }
        }
    }

    Ok(projected)
}

/// Solves every (polarization, pixel) system; all failing slices are reported.
pub fn amplitude_mean(
    d_map: &FrequencyMap,
    n_ivar: &FrequencyMap,
    mixing: &MixingMatrix,
    covariance_inverse: &AmplitudeCovarianceInverse,
) -> MapLikeResult<AmplitudeMean> {
    let projected = weighted_data(d_map, n_ivar, mixing)?;
    let (n_pol, n_pix, n_comp) = projected.dim();
    if covariance_inverse.dim() != (n_pol, n_pix, n_comp, n_comp) {
        return Err(ShapeError::mismatch(
            "amplitude covariance inverse",
            &[n_pol, n_pix, n_comp, n_comp],
            covariance_inverse.shape(),
        )
        .into());
    }

    let mut mean = Array3::<f64>::zeros((n_pol, n_pix, n_comp));
    let mut failures = Vec::new();
    let mut system = Mat::<f64>::zeros(n_comp, n_comp);
    let mut rhs = vec![0.0; n_comp];

    for p in 0..n_pol {
        for x in 0..n_pix {
            for a in 0..n_comp {
                rhs[a] = projected[[p, x, a]];
                for b in 0..n_comp {
                    system[(a, b)] = covariance_inverse[[p, x, a, b]];
                }
            }

            match solve_information_system(&system, &rhs) {
                Ok(solution) => {
                    for (a, value) in solution.into_iter().enumerate() {
                        mean[[p, x, a]] = value;
                    }
                }
                Err(reason) => failures.push(SingularSlice {
                    polarization: p,
                    pixel: x,
                    reason,
                }),
            }
        }
    }

    if !failures.is_empty() {
        tracing::debug!(
            failing = failures.len(),
            total = n_pol * n_pix,
            "amplitude solve failed"
        );
        return Err(MapLikeError::SingularSystem { slices: failures });
    }

    Ok(mean)
}

/// Computes the information matrix and solves for the amplitudes in one pass.
pub fn solve_amplitudes(
    d_map: &FrequencyMap,
    n_ivar: &FrequencyMap,
    mixing: &MixingMatrix,
) -> MapLikeResult<AmplitudeSolution> {
    let covariance_inverse = amplitude_covariance_inverse(n_ivar, mixing)?;
    let mean = amplitude_mean(d_map, n_ivar, mixing, &covariance_inverse)?;
    Ok(AmplitudeSolution {
        mean,
        covariance_inverse,
    })
}

pub(crate) fn check_map_pair(
    d_map: &FrequencyMap,
    n_ivar: &FrequencyMap,
) -> Result<(), ShapeError> {
    if d_map.shape() != n_ivar.shape() {
        return Err(ShapeError::mismatch(
            "inverse-variance map",
            d_map.shape(),
            n_ivar.shape(),
        ));
    }
    Ok(())
}

pub(crate) fn check_mixing_against_maps(
    mixing: &MixingMatrix,
    map: &FrequencyMap,
) -> Result<(usize, usize, usize), ShapeError> {
    let (n_comp, n_pol, n_freq) = mixing.dim();
    let (map_freq, map_pol, _) = map.dim();
    if n_comp == 0 {
        return Err(ShapeError::EmptyAxis {
            operand: "mixing matrix",
        });
    }
    if n_pol != map_pol || n_freq != map_freq {
        return Err(ShapeError::mismatch(
            "mixing matrix",
            &[n_comp, map_pol, map_freq],
            mixing.shape(),
        ));
    }
    Ok((n_comp, n_pol, n_freq))
}
