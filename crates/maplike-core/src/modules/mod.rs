pub mod amplitude;
pub mod binning;
pub mod likelihood;
pub mod mixing;
pub mod statistics;

mod traits;

pub use amplitude::{AmplitudeSolution, Precomputed, solve_amplitudes};
pub use binning::{Region, RegionSelection, Regions, SpatialBinning};
pub use likelihood::{ChiSquaredFit, MapLike, RegionData, RegionSlices, evaluate_regions};
pub use mixing::MixingMatrixBuilder;
pub use statistics::{FitSummary, summarize_fit};
pub use traits::SpectralModel;
