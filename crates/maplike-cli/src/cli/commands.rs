use super::CliError;
use super::helpers::*;
use maplike_core::common::LikelihoodConfig;
use maplike_core::domain::MapLikeError;
use maplike_core::modules::{SpatialBinning, evaluate_regions, summarize_fit};
use std::collections::BTreeSet;
use std::path::PathBuf;

#[derive(clap::Args)]
pub(super) struct RegionsArgs {
    /// Resolution at which spectral parameters are constant
    #[arg(long)]
    nside_spec: u32,

    /// Resolution of the data maps
    #[arg(long)]
    nside_base: u32,

    /// Region to print; repeat for several, omit for all
    #[arg(long = "region")]
    regions: Vec<usize>,
}

#[derive(clap::Args)]
pub(super) struct CheckConfigArgs {
    /// Likelihood configuration JSON
    #[arg(long)]
    config: PathBuf,

    /// Parameter names the spectral model requires, comma separated
    #[arg(long, value_delimiter = ',', required = true)]
    required: Vec<String>,
}

#[derive(clap::Args)]
pub(super) struct EvaluateArgs {
    /// Problem JSON holding config, mixing matrix and data maps
    #[arg(long)]
    problem: PathBuf,

    /// Also write the JSON report to this path
    #[arg(long)]
    report: Option<PathBuf>,

    /// Region to evaluate; repeat for several, omit for all
    #[arg(long = "region")]
    regions: Vec<usize>,
}

pub(super) fn run_regions_command(args: RegionsArgs) -> Result<i32, CliError> {
    let binning =
        SpatialBinning::new(args.nside_spec, args.nside_base).map_err(MapLikeError::from)?;
    let regions = binning
        .regions(region_selection(args.regions))
        .map_err(MapLikeError::from)?
        .collect::<Vec<_>>();

    println!("{}", render_json(&regions)?);
    Ok(0)
}

pub(super) fn run_check_config_command(args: CheckConfigArgs) -> Result<i32, CliError> {
    let config = LikelihoodConfig::from_path(&args.config).map_err(MapLikeError::from)?;
    config.validate().map_err(MapLikeError::from)?;

    let required: BTreeSet<String> = args
        .required
        .into_iter()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect();
    config
        .validate_parameters(&required)
        .map_err(MapLikeError::from)?;

    println!("configuration OK");
    Ok(0)
}

pub(super) fn run_evaluate_command(args: EvaluateArgs) -> Result<i32, CliError> {
    let problem = load_problem(&args.problem)?;
    let binning = SpatialBinning::new(problem.config.nside_spec, problem.maps.nside())
        .map_err(MapLikeError::from)?;
    let variable_count = problem.config.variable_count();

    let regions = evaluate_regions(
        &problem.maps,
        &binning,
        region_selection(args.regions),
        |region| {
            let outcome =
                summarize_fit(&region.mean, &region.ivar, &problem.mixing, variable_count);
            RegionReport::from_outcome(region, outcome)
        },
    )?;

    let report = EvaluationReport::new(&binning, regions);
    if report.failed_regions > 0 {
        tracing::warn!(
            failed = report.failed_regions,
            total = report.regions.len(),
            "some regions could not be solved"
        );
    }

    let rendered = render_json(&report)?;
    println!("{rendered}");
    if let Some(path) = &args.report {
        write_report(path, &rendered)?;
    }

    if report.failed_regions == 0 { Ok(0) } else { Ok(1) }
}
