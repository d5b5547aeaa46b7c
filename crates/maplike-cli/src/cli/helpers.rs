use super::CliError;
use anyhow::Context;
use maplike_core::common::LikelihoodConfig;
use maplike_core::domain::{
    ConfigError, FrequencyMaps, MapLikeError, MapLikeResult, MixingMatrix, ShapeError,
    array3_from_nested,
};
use maplike_core::modules::{FitSummary, RegionData, RegionSelection, SpatialBinning};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing_subscriber::EnvFilter;

pub(super) fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    // A subscriber may already be installed when running in-process.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub(super) fn region_selection(regions: Vec<usize>) -> RegionSelection {
    if regions.is_empty() {
        RegionSelection::All
    } else {
        RegionSelection::List(regions)
    }
}

#[derive(Debug, Deserialize)]
struct ProblemFile {
    config: LikelihoodConfig,
    /// `[comp][pol][freq]`
    mixing_matrix: Vec<Vec<Vec<f64>>>,
    /// `[freq][pol][pix]`, RING ordered
    data_mean: Vec<Vec<Vec<f64>>>,
    data_ivar: Vec<Vec<Vec<f64>>>,
}

#[derive(Debug)]
pub(super) struct Problem {
    pub(super) config: LikelihoodConfig,
    pub(super) mixing: MixingMatrix,
    pub(super) maps: FrequencyMaps,
}

pub(super) fn load_problem(path: &Path) -> Result<Problem, CliError> {
    let content = fs::read_to_string(path).map_err(|error| {
        MapLikeError::from(ConfigError::Io {
            path: path.display().to_string(),
            message: error.to_string(),
        })
    })?;
    let file: ProblemFile = serde_json::from_str(&content).map_err(|error| {
        MapLikeError::from(ConfigError::Parse {
            message: format!("problem file '{}': {error}", path.display()),
        })
    })?;
    Ok(build_problem(file)?)
}

fn build_problem(file: ProblemFile) -> MapLikeResult<Problem> {
    file.config.validate()?;
    let mixing = array3_from_nested("mixing matrix", file.mixing_matrix)?;
    let maps = FrequencyMaps::from_nested(file.data_mean, file.data_ivar)?;

    let n_freq = file.config.frequency_count();
    if maps.frequency_count() != n_freq {
        return Err(ShapeError::mismatch(
            "data maps",
            &[n_freq, maps.polarization_count(), maps.pixel_count()],
            maps.mean().shape(),
        )
        .into());
    }
    let (n_comp, n_pol, mixing_freq) = mixing.dim();
    if n_pol != maps.polarization_count() || mixing_freq != n_freq {
        return Err(ShapeError::mismatch(
            "mixing matrix",
            &[n_comp, maps.polarization_count(), n_freq],
            mixing.shape(),
        )
        .into());
    }

    tracing::debug!(
        frequencies = n_freq,
        polarizations = n_pol,
        components = n_comp,
        nside_base = maps.nside(),
        "problem loaded"
    );

    Ok(Problem {
        config: file.config,
        mixing,
        maps,
    })
}

#[derive(Debug, Serialize)]
pub(super) struct RegionReport {
    pub(super) region: usize,
    pub(super) pixels: Vec<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) summary: Option<FitSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) error: Option<String>,
}

impl RegionReport {
    /// Singular regions are kept in the report; every other failure aborts.
    pub(super) fn from_outcome(
        region: &RegionData,
        outcome: MapLikeResult<FitSummary>,
    ) -> MapLikeResult<Self> {
        let (summary, error) = match outcome {
            Ok(summary) => (Some(summary), None),
            Err(error @ MapLikeError::SingularSystem { .. }) => {
                tracing::debug!(region = region.index, %error, "region masked");
                (None, Some(error.to_string()))
            }
            Err(error) => return Err(error),
        };

        Ok(Self {
            region: region.index,
            pixels: region.base_pixels.clone(),
            summary,
            error,
        })
    }
}

#[derive(Debug, Serialize)]
pub(super) struct EvaluationReport {
    pub(super) nside_spec: u32,
    pub(super) nside_base: u32,
    pub(super) failed_regions: usize,
    pub(super) regions: Vec<RegionReport>,
}

impl EvaluationReport {
    pub(super) fn new(binning: &SpatialBinning, regions: Vec<RegionReport>) -> Self {
        Self {
            nside_spec: binning.nside_spec(),
            nside_base: binning.nside_base(),
            failed_regions: regions.iter().filter(|region| region.error.is_some()).count(),
            regions,
        }
    }
}

pub(super) fn render_json<T: Serialize>(value: &T) -> Result<String, CliError> {
    serde_json::to_string_pretty(value)
        .context("failed to serialize JSON output")
        .map_err(CliError::from)
}

pub(super) fn write_report(path: &Path, rendered: &str) -> Result<(), CliError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create report directory '{}'", parent.display()))?;
    }
    fs::write(path, format!("{rendered}\n"))
        .with_context(|| format!("failed to write report '{}'", path.display()))?;
    Ok(())
}
