use super::amplitude::{check_map_pair, check_mixing_against_maps, solve_amplitudes};
use crate::domain::{
    AmplitudeCovarianceInverse, AmplitudeMean, FrequencyMap, MapLikeError, MapLikeResult,
    MixingMatrix, ShapeError,
};
use serde::Serialize;
use statrs::distribution::{ChiSquared, ContinuousCDF};

/// Goodness-of-fit figures for one region at one parameter point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitSummary {
    pub marginal_likelihood: f64,
    pub chi_squared: f64,
    pub degrees_of_freedom: i64,
    pub reduced_chi_squared: Option<f64>,
    pub p_value: Option<f64>,
}

/// `Σ T̄ᵀ N_T⁻¹ T̄` over every polarization and pixel slice.
pub fn marginal_likelihood(
    amplitude_mean: &AmplitudeMean,
    covariance_inverse: &AmplitudeCovarianceInverse,
) -> Result<f64, ShapeError> {
    let (n_pol, n_pix, n_comp) = amplitude_mean.dim();
    if covariance_inverse.dim() != (n_pol, n_pix, n_comp, n_comp) {
        return Err(ShapeError::mismatch(
            "amplitude covariance inverse",
            &[n_pol, n_pix, n_comp, n_comp],
            covariance_inverse.shape(),
        ));
    }

    let mut total = 0.0;
    for p in 0..n_pol {
        for x in 0..n_pix {
            for a in 0..n_comp {
                for b in 0..n_comp {
                    total += amplitude_mean[[p, x, a]]
                        * covariance_inverse[[p, x, a, b]]
                        * amplitude_mean[[p, x, b]];
                }
            }
        }
    }
    Ok(total)
}

/// `d − F·T̄`, shaped like the data.
pub fn residuals(
    d_map: &FrequencyMap,
    mixing: &MixingMatrix,
    amplitude_mean: &AmplitudeMean,
) -> Result<FrequencyMap, ShapeError> {
    let (n_comp, n_pol, n_freq) = check_mixing_against_maps(mixing, d_map)?;
    let n_pix = d_map.dim().2;
    if amplitude_mean.dim() != (n_pol, n_pix, n_comp) {
        return Err(ShapeError::mismatch(
            "amplitude mean",
            &[n_pol, n_pix, n_comp],
            amplitude_mean.shape(),
        ));
    }

    let mut residual = d_map.clone();
    for nu in 0..n_freq {
        for p in 0..n_pol {
            for x in 0..n_pix {
                let mut model = 0.0;
                for a in 0..n_comp {
                    model += mixing[[a, p, nu]] * amplitude_mean[[p, x, a]];
                }
                residual[[nu, p, x]] -= model;
            }
        }
    }
    Ok(residual)
}

/// Noise-weighted residual sum of squares.
pub fn chi_squared(
    d_map: &FrequencyMap,
    n_ivar: &FrequencyMap,
    mixing: &MixingMatrix,
    amplitude_mean: &AmplitudeMean,
) -> Result<f64, ShapeError> {
    check_map_pair(d_map, n_ivar)?;
    let residual = residuals(d_map, mixing, amplitude_mean)?;
    Ok(residual
        .iter()
        .zip(n_ivar.iter())
        .map(|(r, w)| r * w * r)
        .sum())
}

pub fn degrees_of_freedom(
    d_map: &FrequencyMap,
    variable_count: usize,
    amplitude_mean: &AmplitudeMean,
) -> i64 {
    d_map.len() as i64 - variable_count as i64 - amplitude_mean.len() as i64
}

pub fn reduced_chi_squared(chi_squared: f64, degrees_of_freedom: i64) -> MapLikeResult<f64> {
    ensure_positive_dof(degrees_of_freedom)?;
    Ok(chi_squared / degrees_of_freedom as f64)
}

/// Chi-squared survival probability `1 − CDF(chi_squared; dof)`.
pub fn p_value(chi_squared: f64, degrees_of_freedom: i64) -> MapLikeResult<f64> {
    ensure_positive_dof(degrees_of_freedom)?;
    if !chi_squared.is_finite() || chi_squared < 0.0 {
        return Err(MapLikeError::Statistics(format!(
            "chi-squared must be finite and non-negative, got {chi_squared}"
        )));
    }

    let distribution = ChiSquared::new(degrees_of_freedom as f64)
        .map_err(|error| MapLikeError::Statistics(error.to_string()))?;
    Ok(distribution.sf(chi_squared).clamp(0.0, 1.0))
}

/// Solves the region with a known mixing matrix and collects every statistic.
///
/// Reduced chi-squared and p-value are `None` when the fit has no degrees of
/// freedom left.
pub fn summarize_fit(
    d_map: &FrequencyMap,
    n_ivar: &FrequencyMap,
    mixing: &MixingMatrix,
    variable_count: usize,
) -> MapLikeResult<FitSummary> {
    let solution = solve_amplitudes(d_map, n_ivar, mixing)?;
    let marginal_likelihood = marginal_likelihood(&solution.mean, &solution.covariance_inverse)?;
    let chi_squared = chi_squared(d_map, n_ivar, mixing, &solution.mean)?;
    let degrees_of_freedom = degrees_of_freedom(d_map, variable_count, &solution.mean);

    let (reduced_chi_squared, p_value) = if degrees_of_freedom > 0 {
        (
            Some(reduced_chi_squared(chi_squared, degrees_of_freedom)?),
            Some(p_value(chi_squared, degrees_of_freedom)?),
        )
    } else {
        (None, None)
    };

    Ok(FitSummary {
        marginal_likelihood,
        chi_squared,
        degrees_of_freedom,
        reduced_chi_squared,
        p_value,
    })
}

fn ensure_positive_dof(degrees_of_freedom: i64) -> MapLikeResult<()> {
    if degrees_of_freedom <= 0 {
        return Err(MapLikeError::DegenerateFit { degrees_of_freedom });
    }
    Ok(())
}
