use maplike_core::domain::{ConfigError, MixingMatrix, ModelError};
use maplike_core::modules::amplitude::Precomputed;
use maplike_core::modules::statistics::FitSummary;
use maplike_core::numerics::nside_to_npix;
use maplike_core::{
    FrequencyMaps, LikelihoodConfig, MapLike, MapLikeError, RegionSelection, SpatialBinning,
    SpectralModel, SpectralParameters,
};
use ndarray::Array3;
use std::collections::BTreeSet;
use std::sync::Arc;

/// One component with the same response in every channel.
struct Flat;

impl SpectralModel for Flat {
    fn required_parameter_names(&self) -> BTreeSet<String> {
        BTreeSet::new()
    }

    fn response(
        &self,
        frequencies: &[f64],
        _parameters: &SpectralParameters,
    ) -> Result<MixingMatrix, ModelError> {
        Ok(Array3::ones((1, 1, frequencies.len())))
    }
}

/// Synchrotron-like power law with a flat CMB-like term, for two polarizations.
struct PowerLawWithFlat;

impl SpectralModel for PowerLawWithFlat {
    fn required_parameter_names(&self) -> BTreeSet<String> {
        ["beta_s", "nu_ref_s"].into_iter().map(String::from).collect()
    }

    fn response(
        &self,
        frequencies: &[f64],
        parameters: &SpectralParameters,
    ) -> Result<MixingMatrix, ModelError> {
        let beta = parameters.get("beta_s").copied().ok_or("beta_s missing")?;
        let nu_ref = parameters.get("nu_ref_s").copied().ok_or("nu_ref_s missing")?;
        Ok(Array3::from_shape_fn((2, 2, frequencies.len()), |(a, _, nu)| {
            if a == 0 {
                (frequencies[nu] / nu_ref).powf(beta)
            } else {
                1.0
            }
        }))
    }
}

fn flat_likelihood(channel_values: [f64; 3]) -> MapLike {
    let mean = Array3::from_shape_fn((3, 1, 12), |(nu, _, x)| {
        if x == 5 { channel_values[nu] } else { 2.0 }
    });
    let maps = FrequencyMaps::new(mean, Array3::ones((3, 1, 12))).expect("maps");
    MapLike::new(
        LikelihoodConfig::new(vec![30.0, 90.0, 150.0], 1),
        Arc::new(Flat),
        maps,
    )
    .expect("likelihood")
}

#[test]
fn partition_covers_every_base_pixel_exactly_once() {
    for (nside_spec, nside_base) in [(1, 1), (1, 4), (2, 8), (4, 16), (8, 8)] {
        let binning = SpatialBinning::new(nside_spec, nside_base).expect("binning");
        let npix = nside_to_npix(nside_base);
        let mut seen = vec![0_u32; npix];
        for region in binning.regions(RegionSelection::All).expect("regions") {
            assert_eq!(region.base_pixels.len(), binning.pixels_per_region());
            for pixel in region.base_pixels {
                seen[pixel] += 1;
            }
        }
        assert!(
            seen.iter().all(|&count| count == 1),
            "nside_spec={nside_spec} nside_base={nside_base}"
        );
    }
}

#[test]
fn validation_gate_accepts_only_the_exact_parameter_set() {
    let maps = || {
        FrequencyMaps::new(Array3::ones((3, 2, 48)), Array3::ones((3, 2, 48))).expect("maps")
    };
    let base = || LikelihoodConfig::new(vec![23.0, 33.0, 41.0], 1).with_fixed("nu_ref_s", 23.0);

    MapLike::new(base().with_variable("beta_s"), Arc::new(PowerLawWithFlat), maps())
        .expect("exact partition");

    let error = MapLike::new(base(), Arc::new(PowerLawWithFlat), maps())
        .expect_err("beta_s unaccounted for");
    assert!(matches!(
        error,
        MapLikeError::Config(ConfigError::ParameterMismatch { ref missing, .. })
            if missing == &["beta_s"]
    ));
    assert_eq!(error.code(), "CONFIG.PARAMETER_MISMATCH");
    assert!(
        error
            .diagnostic_line()
            .starts_with("ERROR: [CONFIG.PARAMETER_MISMATCH]")
    );
}

#[test]
fn consistent_channels_fit_exactly_per_region() {
    let like = flat_likelihood([2.0, 2.0, 2.0]);
    let summaries: Vec<FitSummary> = like
        .evaluate_regions(RegionSelection::All, |region| {
            like.summarize(&[], &region.mean, &region.ivar)
        })
        .expect("evaluation");

    assert_eq!(summaries.len(), 12);
    for summary in summaries {
        // N_T⁻¹ = 3, T̄ = 2
        assert!((summary.marginal_likelihood - 12.0).abs() < 1.0e-12);
        assert!(summary.chi_squared.abs() < 1.0e-24);
        assert_eq!(summary.degrees_of_freedom, 2);
        assert_eq!(summary.p_value, Some(1.0));
    }
}

#[test]
fn outlying_channel_raises_chi_squared_in_its_region_only() {
    let like = flat_likelihood([2.0, 2.0, 4.0]);
    let regions: Vec<_> = like.regions(RegionSelection::All).expect("regions").collect();
    let outlier = regions
        .iter()
        .find(|region| region.base_pixels == [5])
        .expect("pixel 5 has its own region");

    let fit = like
        .chi_squared(&[], &outlier.mean, &outlier.ivar, Precomputed::default())
        .expect("fit");
    assert!((fit.amplitude_mean[[0, 0, 0]] - 8.0 / 3.0).abs() < 1.0e-12);
    assert!((fit.chi_squared - 8.0 / 3.0).abs() < 1.0e-12);
    let reduced = like
        .reduced_chi_squared(&[], &outlier.mean, &outlier.ivar, Precomputed::default())
        .expect("reduced");
    assert!((reduced - 4.0 / 3.0).abs() < 1.0e-12);

    for region in regions.iter().filter(|region| region.index != outlier.index) {
        let fit = like
            .chi_squared(&[], &region.mean, &region.ivar, Precomputed::default())
            .expect("fit");
        assert!(fit.chi_squared.abs() < 1.0e-24);
    }
}

#[test]
fn noiseless_two_polarization_sky_is_recovered() {
    let frequencies = vec![23.0, 33.0, 41.0, 61.0, 94.0];
    let truth_parameters: SpectralParameters =
        [("beta_s".to_string(), -3.1), ("nu_ref_s".to_string(), 23.0)].into();
    let mixing = PowerLawWithFlat
        .response(&frequencies, &truth_parameters)
        .expect("mixing");
    let amplitude = |p: usize, x: usize, a: usize| ((p + 1) * (x + 3) + 7 * a) as f64 * 0.25;
    let mean = Array3::from_shape_fn((frequencies.len(), 2, 48), |(nu, p, x)| {
        amplitude(p, x, 0) * mixing[[0, p, nu]] + amplitude(p, x, 1) * mixing[[1, p, nu]]
    });
    let ivar =
        Array3::from_shape_fn((frequencies.len(), 2, 48), |(nu, p, _)| 2.0 + (nu + p) as f64);
    let maps = FrequencyMaps::new(mean, ivar).expect("maps");

    let config = LikelihoodConfig::new(frequencies, 1)
        .with_fixed("nu_ref_s", 23.0)
        .with_variable("beta_s");
    let like = MapLike::new(config, Arc::new(PowerLawWithFlat), maps).expect("likelihood");
    assert_eq!(like.nside_base(), 2);

    let fits = like
        .evaluate_regions(vec![0_usize, 11, 4], |region| {
            let fit =
                like.chi_squared(&[-3.1], &region.mean, &region.ivar, Precomputed::default())?;
            Ok((region.base_pixels.clone(), fit))
        })
        .expect("evaluation");

    for (pixels, fit) in fits {
        // 5 channels x 2 pols x 4 pixels, minus beta_s, minus 2 comps x 2 pols x 4 pixels
        assert_eq!(fit.degrees_of_freedom, 40 - 1 - 16);
        assert!(fit.chi_squared < 1.0e-14, "chi2={}", fit.chi_squared);
        for (slot, &pixel) in pixels.iter().enumerate() {
            for p in 0..2 {
                for a in 0..2 {
                    let recovered = fit.amplitude_mean[[p, slot, a]];
                    assert!((recovered - amplitude(p, pixel, a)).abs() < 1.0e-9);
                }
            }
        }
    }
}

/// Deterministic noise in [-1, 1].
fn unit_noise(k: usize) -> f64 {
    let mut state = (k as u64)
        .wrapping_mul(6_364_136_223_846_793_005)
        .wrapping_add(1_442_695_040_888_963_407);
    state ^= state >> 33;
    (state % 2001) as f64 / 1000.0 - 1.0
}

#[test]
fn recovery_error_shrinks_as_inverse_variance_grows() {
    let truth = |x: usize| 1.0 + 0.5 * x as f64;
    let mut errors = Vec::new();

    for weight in [1.0, 1.0e2, 1.0e4, 1.0e6] {
        let sigma = 1.0 / f64::sqrt(weight);
        let mean = Array3::from_shape_fn((3, 1, 12), |(nu, _, x)| {
            truth(x) + sigma * unit_noise(nu * 12 + x)
        });
        let maps = FrequencyMaps::new(mean, Array3::from_elem((3, 1, 12), weight)).expect("maps");
        let like = MapLike::new(
            LikelihoodConfig::new(vec![30.0, 90.0, 150.0], 1),
            Arc::new(Flat),
            maps,
        )
        .expect("likelihood");

        let squared: Vec<f64> = like
            .evaluate_regions(RegionSelection::All, |region| {
                let fit =
                    like.chi_squared(&[], &region.mean, &region.ivar, Precomputed::default())?;
                let pixel = region.base_pixels[0];
                Ok((fit.amplitude_mean[[0, 0, 0]] - truth(pixel)).powi(2))
            })
            .expect("evaluation");
        errors.push((squared.iter().sum::<f64>() / squared.len() as f64).sqrt());
    }

    assert!(errors[0] > 0.0);
    for pair in errors.windows(2) {
        assert!(pair[1] < pair[0], "errors: {errors:?}");
    }
    assert!(errors[3] < 1.0e-2 * errors[0], "errors: {errors:?}");
}

#[test]
fn evaluations_do_not_depend_on_call_history() {
    let like = flat_likelihood([1.0, 2.0, 6.0]);
    let region = like
        .regions(5_usize)
        .expect("region")
        .next()
        .expect("one region");

    let first = like.summarize(&[], &region.mean, &region.ivar).expect("first");
    like.regions(RegionSelection::All)
        .expect("regions")
        .for_each(|other| {
            like.summarize(&[], &other.mean, &other.ivar).expect("other");
        });
    let second = like.summarize(&[], &region.mean, &region.ivar).expect("second");
    assert_eq!(first, second);
}

#[test]
fn unweighted_region_reports_the_failing_slice() {
    let mut ivar = Array3::ones((3, 1, 12));
    for nu in 0..3 {
        ivar[[nu, 0, 9]] = 0.0;
    }
    let maps = FrequencyMaps::new(Array3::ones((3, 1, 12)), ivar).expect("maps");
    let like = MapLike::new(
        LikelihoodConfig::new(vec![30.0, 90.0, 150.0], 1),
        Arc::new(Flat),
        maps,
    )
    .expect("likelihood");

    let error = like
        .evaluate_regions(RegionSelection::All, |region| {
            like.summarize(&[], &region.mean, &region.ivar)
        })
        .expect_err("region 9 has no weight");
    assert_eq!(error.code(), "SOLVE.SINGULAR");
    assert_eq!(error.exit_code(), 4);
    assert!(
        error.to_string().contains("polarization 0, pixel 0"),
        "{error}"
    );
}
