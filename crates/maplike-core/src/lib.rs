//! Map-based multi-frequency component separation.
//!
//! Observed frequency maps are modelled as `d = F·T + n`, where the mixing
//! matrix `F` follows from a parametric [`SpectralModel`] and `T` holds the
//! per-pixel component amplitudes. For a point in spectral-parameter space the
//! crate solves the amplitude problem in closed form and reports the marginal
//! spectral likelihood and goodness-of-fit statistics, region by region.

pub mod common;
pub mod domain;
pub mod modules;
pub mod numerics;

pub use common::LikelihoodConfig;
pub use domain::{FrequencyMaps, MapLikeError, MapLikeResult, SpectralParameters};
pub use modules::{MapLike, RegionSelection, SpatialBinning, SpectralModel};
