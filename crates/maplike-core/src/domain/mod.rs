pub mod errors;

pub use errors::{
    ConfigError, ErrorCategory, MapLikeError, MapLikeResult, ModelError, ShapeError, SingularSlice,
};

use crate::numerics::healpix::npix_to_nside;
use ndarray::{Array3, Array4, Axis};
use std::collections::BTreeMap;

/// Per-component response, shaped `(n_comp, n_pol, n_freq)`.
pub type MixingMatrix = Array3<f64>;
/// Noise-weighted information matrix, shaped `(n_pol, n_pix, n_comp, n_comp)`.
pub type AmplitudeCovarianceInverse = Array4<f64>;
/// Maximum-likelihood amplitudes, shaped `(n_pol, n_pix, n_comp)`.
pub type AmplitudeMean = Array3<f64>;
/// Per-frequency pixel values, shaped `(n_freq, n_pol, n_pix)`.
pub type FrequencyMap = Array3<f64>;
/// Spectral parameter values keyed by name.
pub type SpectralParameters = BTreeMap<String, f64>;

/// Observed mean and inverse noise variance maps at the base resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyMaps {
    mean: FrequencyMap,
    ivar: FrequencyMap,
    nside: u32,
}

impl FrequencyMaps {
    pub fn new(mean: FrequencyMap, ivar: FrequencyMap) -> MapLikeResult<Self> {
        if mean.shape() != ivar.shape() {
            return Err(
                ShapeError::mismatch("inverse-variance maps", mean.shape(), ivar.shape()).into(),
            );
        }
        let (n_freq, n_pol, n_pix) = mean.dim();
        if n_freq == 0 || n_pol == 0 {
            return Err(ShapeError::EmptyAxis { operand: "data maps" }.into());
        }
        let nside = npix_to_nside(n_pix).ok_or(ConfigError::InvalidPixelCount { npix: n_pix })?;

        Ok(Self { mean, ivar, nside })
    }

    /// Builds maps from `[freq][pol][pix]` nested rows, as read from JSON.
    pub fn from_nested(mean: Vec<Vec<Vec<f64>>>, ivar: Vec<Vec<Vec<f64>>>) -> MapLikeResult<Self> {
        let mean = array3_from_nested("data mean maps", mean)?;
        let ivar = array3_from_nested("inverse-variance maps", ivar)?;
        Self::new(mean, ivar)
    }

    pub fn mean(&self) -> &FrequencyMap {
        &self.mean
    }

    pub fn ivar(&self) -> &FrequencyMap {
        &self.ivar
    }

    /// Base resolution implied by the pixel count.
    pub fn nside(&self) -> u32 {
        self.nside
    }

    pub fn frequency_count(&self) -> usize {
        self.mean.dim().0
    }

    pub fn polarization_count(&self) -> usize {
        self.mean.dim().1
    }

    pub fn pixel_count(&self) -> usize {
        self.mean.dim().2
    }

    /// Copies the mean and inverse-variance values of `pixels`, in that order.
    pub fn select_pixels(&self, pixels: &[usize]) -> (FrequencyMap, FrequencyMap) {
        (
            self.mean.select(Axis(2), pixels),
            self.ivar.select(Axis(2), pixels),
        )
    }
}

pub fn array3_from_nested(
    operand: &'static str,
    nested: Vec<Vec<Vec<f64>>>,
) -> Result<Array3<f64>, ShapeError> {
    let outer = nested.len();
    let middle = nested.first().map_or(0, Vec::len);
    let inner = nested
        .first()
        .and_then(|rows| rows.first())
        .map_or(0, Vec::len);
    if outer == 0 || middle == 0 || inner == 0 {
        return Err(ShapeError::EmptyAxis { operand });
    }

    let mut flat = Vec::with_capacity(outer * middle * inner);
    for rows in nested {
        if rows.len() != middle {
            return Err(ShapeError::Ragged {
                operand,
                expected: middle,
                actual: rows.len(),
            });
        }
        for row in rows {
            if row.len() != inner {
                return Err(ShapeError::Ragged {
                    operand,
                    expected: inner,
                    actual: row.len(),
                });
            }
            flat.extend(row);
        }
    }

    Array3::from_shape_vec((outer, middle, inner), flat)
        .map_err(|_| ShapeError::mismatch(operand, &[outer, middle, inner], &[]))
}
