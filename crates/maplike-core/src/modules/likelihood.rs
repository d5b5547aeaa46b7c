//! The composed likelihood: configuration, spectral model and maps bound together.
//!
//! [`MapLike`] validates its inputs once at construction. Every evaluation
//! afterwards takes the variable spectral parameters positionally, in the
//! order of `var_pars`, and works on caller-supplied `(d, n_ivar)` slices so
//! the same object serves the whole sky or any single region.

use super::SpectralModel;
use super::amplitude::{self, Precomputed};
use super::binning::{Region, RegionSelection, Regions, SpatialBinning};
use super::mixing::MixingMatrixBuilder;
use super::statistics::{self, FitSummary};
use crate::common::LikelihoodConfig;
use crate::domain::{
    AmplitudeCovarianceInverse, AmplitudeMean, FrequencyMap, FrequencyMaps, MapLikeResult,
    MixingMatrix, ShapeError,
};
use crate::numerics::healpix::nside_to_npix;
use rayon::prelude::*;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// One region together with its slice of the stored maps.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionData {
    pub index: usize,
    pub base_pixels: Vec<usize>,
    /// `(n_freq, n_pol, base_pixels.len())`
    pub mean: FrequencyMap,
    pub ivar: FrequencyMap,
}

impl RegionData {
    fn select(maps: &FrequencyMaps, region: Region) -> Self {
        let (mean, ivar) = maps.select_pixels(&region.base_pixels);
        Self {
            index: region.index,
            base_pixels: region.base_pixels,
            mean,
            ivar,
        }
    }
}

/// Lazily slices the maps one region at a time; clone it to restart.
#[derive(Debug, Clone)]
pub struct RegionSlices<'a> {
    maps: &'a FrequencyMaps,
    regions: Regions,
}

impl Iterator for RegionSlices<'_> {
    type Item = RegionData;

    fn next(&mut self) -> Option<Self::Item> {
        let region = self.regions.next()?;
        Some(RegionData::select(self.maps, region))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.regions.size_hint()
    }
}

impl ExactSizeIterator for RegionSlices<'_> {}

/// Applies `evaluate` to every selected region in parallel.
///
/// Results come back in selection order. When several regions fail, the error
/// of the earliest one in selection order is returned.
pub fn evaluate_regions<T, F>(
    maps: &FrequencyMaps,
    binning: &SpatialBinning,
    selection: impl Into<RegionSelection>,
    evaluate: F,
) -> MapLikeResult<Vec<T>>
where
    T: Send,
    F: Fn(&RegionData) -> MapLikeResult<T> + Sync + Send,
{
    check_binning_against_maps(maps, binning)?;
    let regions: Vec<Region> = binning.regions(selection)?.collect();
    tracing::debug!(regions = regions.len(), "evaluating regions");

    let outcomes: Vec<MapLikeResult<T>> = regions
        .into_par_iter()
        .map(|region| evaluate(&RegionData::select(maps, region)))
        .collect();
    outcomes.into_iter().collect()
}

/// Chi-squared together with the amplitudes it was computed from.
#[derive(Debug, Clone, PartialEq)]
pub struct ChiSquaredFit {
    pub chi_squared: f64,
    pub amplitude_mean: AmplitudeMean,
    pub degrees_of_freedom: i64,
}

pub struct MapLike {
    config: LikelihoodConfig,
    model: Arc<dyn SpectralModel>,
    maps: FrequencyMaps,
    binning: SpatialBinning,
}

impl fmt::Debug for MapLike {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapLike")
            .field("config", &self.config)
            .field("maps", &self.maps.mean().shape())
            .field("binning", &self.binning)
            .finish_non_exhaustive()
    }
}

impl MapLike {
    pub fn new(
        config: LikelihoodConfig,
        model: Arc<dyn SpectralModel>,
        maps: FrequencyMaps,
    ) -> MapLikeResult<Self> {
        config.validate()?;
        config.validate_parameters(&model.required_parameter_names())?;

        if maps.frequency_count() != config.frequency_count() {
            return Err(ShapeError::mismatch(
                "data maps",
                &[
                    config.frequency_count(),
                    maps.polarization_count(),
                    maps.pixel_count(),
                ],
                maps.mean().shape(),
            )
            .into());
        }
        let binning = SpatialBinning::new(config.nside_spec, maps.nside())?;

        tracing::debug!(
            nside_spec = binning.nside_spec(),
            nside_base = binning.nside_base(),
            regions = binning.region_count(),
            variables = config.variable_count(),
            "likelihood ready"
        );

        Ok(Self {
            config,
            model,
            maps,
            binning,
        })
    }

    pub fn config(&self) -> &LikelihoodConfig {
        &self.config
    }

    pub fn maps(&self) -> &FrequencyMaps {
        &self.maps
    }

    pub fn binning(&self) -> &SpatialBinning {
        &self.binning
    }

    pub fn nside_base(&self) -> u32 {
        self.binning.nside_base()
    }

    pub fn mixing_matrix(&self, values: &[f64]) -> MapLikeResult<MixingMatrix> {
        MixingMatrixBuilder::from_config(&self.config).build(self.model.as_ref(), values)
    }

    /// `values` is ignored when `mixing` is supplied.
    pub fn amplitude_covariance_inverse(
        &self,
        values: &[f64],
        n_ivar: &FrequencyMap,
        mixing: Option<&MixingMatrix>,
    ) -> MapLikeResult<AmplitudeCovarianceInverse> {
        let mixing = self.resolve_mixing(values, mixing)?;
        Ok(amplitude::amplitude_covariance_inverse(n_ivar, &mixing)?)
    }

    pub fn amplitude_mean(
        &self,
        values: &[f64],
        d_map: &FrequencyMap,
        n_ivar: &FrequencyMap,
        precomputed: Precomputed<'_>,
    ) -> MapLikeResult<AmplitudeMean> {
        let mixing = self.resolve_mixing(values, precomputed.mixing_matrix)?;
        let covariance_inverse = match precomputed.covariance_inverse {
            Some(covariance_inverse) => Cow::Borrowed(covariance_inverse),
            None => Cow::Owned(amplitude::amplitude_covariance_inverse(n_ivar, &mixing)?),
        };
        amplitude::amplitude_mean(d_map, n_ivar, &mixing, &covariance_inverse)
    }

    /// `Σ T̄ᵀ N_T⁻¹ T̄`; larger is better.
    pub fn marginal_spectral_likelihood(
        &self,
        values: &[f64],
        d_map: &FrequencyMap,
        n_ivar: &FrequencyMap,
    ) -> MapLikeResult<f64> {
        let mixing = self.mixing_matrix(values)?;
        let solution = amplitude::solve_amplitudes(d_map, n_ivar, &mixing)?;
        Ok(statistics::marginal_likelihood(
            &solution.mean,
            &solution.covariance_inverse,
        )?)
    }

    pub fn chi_squared(
        &self,
        values: &[f64],
        d_map: &FrequencyMap,
        n_ivar: &FrequencyMap,
        precomputed: Precomputed<'_>,
    ) -> MapLikeResult<ChiSquaredFit> {
        let mixing = self.resolve_mixing(values, precomputed.mixing_matrix)?;
        let amplitude_mean = self.amplitude_mean(
            values,
            d_map,
            n_ivar,
            Precomputed {
                mixing_matrix: Some(&*mixing),
                covariance_inverse: precomputed.covariance_inverse,
            },
        )?;
        let chi_squared = statistics::chi_squared(d_map, n_ivar, &mixing, &amplitude_mean)?;
        let degrees_of_freedom = statistics::degrees_of_freedom(
            d_map,
            self.config.variable_count(),
            &amplitude_mean,
        );

        Ok(ChiSquaredFit {
            chi_squared,
            amplitude_mean,
            degrees_of_freedom,
        })
    }

    pub fn reduced_chi_squared(
        &self,
        values: &[f64],
        d_map: &FrequencyMap,
        n_ivar: &FrequencyMap,
        precomputed: Precomputed<'_>,
    ) -> MapLikeResult<f64> {
        let fit = self.chi_squared(values, d_map, n_ivar, precomputed)?;
        statistics::reduced_chi_squared(fit.chi_squared, fit.degrees_of_freedom)
    }

    pub fn p_value(
        &self,
        values: &[f64],
        d_map: &FrequencyMap,
        n_ivar: &FrequencyMap,
        precomputed: Precomputed<'_>,
    ) -> MapLikeResult<f64> {
        let fit = self.chi_squared(values, d_map, n_ivar, precomputed)?;
        statistics::p_value(fit.chi_squared, fit.degrees_of_freedom)
    }

    /// Every statistic for one `(d, n_ivar)` slice at one parameter point.
    pub fn summarize(
        &self,
        values: &[f64],
        d_map: &FrequencyMap,
        n_ivar: &FrequencyMap,
    ) -> MapLikeResult<FitSummary> {
        let mixing = self.mixing_matrix(values)?;
        statistics::summarize_fit(d_map, n_ivar, &mixing, self.config.variable_count())
    }

    pub fn regions(
        &self,
        selection: impl Into<RegionSelection>,
    ) -> MapLikeResult<RegionSlices<'_>> {
        Ok(RegionSlices {
            maps: &self.maps,
            regions: self.binning.regions(selection)?,
        })
    }

    pub fn evaluate_regions<T, F>(
        &self,
        selection: impl Into<RegionSelection>,
        evaluate: F,
    ) -> MapLikeResult<Vec<T>>
    where
        T: Send,
        F: Fn(&RegionData) -> MapLikeResult<T> + Sync + Send,
    {
        evaluate_regions(&self.maps, &self.binning, selection, evaluate)
    }

    fn resolve_mixing<'m>(
        &self,
        values: &[f64],
        mixing: Option<&'m MixingMatrix>,
    ) -> MapLikeResult<Cow<'m, MixingMatrix>> {
        match mixing {
            Some(mixing) => Ok(Cow::Borrowed(mixing)),
            None => self.mixing_matrix(values).map(Cow::Owned),
        }
    }
}

fn check_binning_against_maps(
    maps: &FrequencyMaps,
    binning: &SpatialBinning,
) -> Result<(), ShapeError> {
    if binning.nside_base() != maps.nside() {
        return Err(ShapeError::mismatch(
            "data maps",
            &[
                maps.frequency_count(),
                maps.polarization_count(),
                nside_to_npix(binning.nside_base()),
            ],
            maps.mean().shape(),
        ));
    }
    Ok(())
}
