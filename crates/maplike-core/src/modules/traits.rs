use crate::domain::{MixingMatrix, ModelError, SpectralParameters};
use std::collections::BTreeSet;

/// Parametric sky model consumed by the likelihood.
///
/// Implementations map observing frequencies and a full set of spectral
/// parameter values to the per-component response of every polarization
/// channel.
pub trait SpectralModel: Send + Sync {
    /// Names of every spectral parameter [`SpectralModel::response`] reads.
    fn required_parameter_names(&self) -> BTreeSet<String>;

    /// Returns an array shaped `(n_comp, n_pol, frequencies.len())`.
    fn response(
        &self,
        frequencies: &[f64],
        parameters: &SpectralParameters,
    ) -> Result<MixingMatrix, ModelError>;
}
