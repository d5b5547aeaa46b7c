use super::SpectralModel;
use crate::common::LikelihoodConfig;
use crate::domain::{MapLikeError, MapLikeResult, MixingMatrix, ShapeError, SpectralParameters};
use std::collections::BTreeMap;

/// Merges fixed and positional variable parameters and evaluates the model.
#[derive(Debug, Clone, Copy)]
pub struct MixingMatrixBuilder<'a> {
    frequencies: &'a [f64],
    fixed_pars: &'a BTreeMap<String, f64>,
    var_pars: &'a [String],
}

impl<'a> MixingMatrixBuilder<'a> {
    pub fn new(
        frequencies: &'a [f64],
        fixed_pars: &'a BTreeMap<String, f64>,
        var_pars: &'a [String],
    ) -> Self {
        Self {
            frequencies,
            fixed_pars,
            var_pars,
        }
    }

    pub fn from_config(config: &'a LikelihoodConfig) -> Self {
        Self::new(&config.frequencies, &config.fixed_pars, &config.var_pars)
    }

    pub fn merge_parameters(&self, values: &[f64]) -> Result<SpectralParameters, ShapeError> {
        if values.len() != self.var_pars.len() {
            return Err(ShapeError::mismatch(
                "spectral parameter values",
                &[self.var_pars.len()],
                &[values.len()],
            ));
        }

        let mut parameters: SpectralParameters = self
            .var_pars
            .iter()
            .cloned()
            .zip(values.iter().copied())
            .collect();
        parameters.extend(
            self.fixed_pars
                .iter()
                .map(|(name, value)| (name.clone(), *value)),
        );
        Ok(parameters)
    }

    pub fn build(&self, model: &dyn SpectralModel, values: &[f64]) -> MapLikeResult<MixingMatrix> {
        let parameters = self.merge_parameters(values)?;
        let mixing = model
            .response(self.frequencies, &parameters)
            .map_err(MapLikeError::spectral_model)?;

        let (n_comp, n_pol, n_freq) = mixing.dim();
        if n_comp == 0 || n_pol == 0 {
            return Err(ShapeError::EmptyAxis {
                operand: "mixing matrix",
            }
            .into());
        }
        if n_freq != self.frequencies.len() {
            return Err(ShapeError::mismatch(
                "mixing matrix",
                &[n_comp, n_pol, self.frequencies.len()],
                mixing.shape(),
            )
            .into());
        }
        Ok(mixing)
    }
}
