//! End-to-end fits of quasi-elastic lineshapes

use approx::assert_relative_eq;
use ndarray::Array1;
use qef_rs::constants::HBAR;
use qef_rs::fit::{fit, fit_weighted, FitConfig};
use qef_rs::model::Model;
use qef_rs::models::peak::{gaussian, lorentzian};
use qef_rs::models::{
    add, ConstantModel, DeltaDiracModel, GaussianModel, LorentzianModel, TabulatedModel,
    TeixeiraWaterModel,
};
use qef_rs::operators::convolve;
use qef_rs::utils::interpolate::ExtrapolationPolicy;
use rand_distr::{Distribution, Normal};

use super::init_logging;
use crate::test_helpers::seeded_rng;

fn grid(de: f64, start: i64, stop: i64) -> Array1<f64> {
    (start..stop).map(|i| i as f64 * de).collect()
}

#[test]
fn test_delta_resolution_recovers_lorentzian() {
    init_logging();
    let e = grid(0.004, -150, 350);
    let data = lorentzian(&e, 42.0, 0.0003, 0.042);

    let forward = convolve(
        DeltaDiracModel::new().with_prefix("r_"),
        LorentzianModel::new().with_prefix("l_"),
    )
    .unwrap();
    let reversed = convolve(
        LorentzianModel::new().with_prefix("l_"),
        DeltaDiracModel::new().with_prefix("r_"),
    )
    .unwrap();

    for model in [&forward, &reversed] {
        let mut params = model.make_params().unwrap();
        params.set_vary("r_amplitude", false).unwrap();
        params.set_vary("r_center", false).unwrap();
        params.set_value("l_amplitude", 30.0).unwrap();
        params.set_value("l_center", 0.01).unwrap();
        params.set_value("l_sigma", 0.06).unwrap();

        let result = fit(model, &params, &e, &data).unwrap();
        assert_eq!(result.var_names, vec!["l_amplitude", "l_center", "l_sigma"]);
        assert_relative_eq!(result.value("l_amplitude").unwrap(), 42.0, max_relative = 0.01);
        assert_relative_eq!(result.value("l_center").unwrap(), 0.0003, epsilon = 1e-4);
        assert_relative_eq!(result.value("l_sigma").unwrap(), 0.042, max_relative = 0.01);
        assert_relative_eq!(result.value("l_fwhm").unwrap(), 0.084, max_relative = 0.01);
        assert_eq!(result.value("r_center"), Some(0.0));
    }
}

#[test]
fn test_tabulated_resolution_fit() {
    init_logging();
    let e = grid(0.002, -150, 250);
    let resolution = TabulatedModel::resolution(
        &e,
        &gaussian(&e, 1.0, 0.0, 0.02),
        ExtrapolationPolicy::Clamp,
    )
    .unwrap()
    .with_prefix("r_");
    let physical = add(
        LorentzianModel::new().with_prefix("l_"),
        ConstantModel::new().with_prefix("bg_"),
    )
    .unwrap();
    let model = convolve(resolution, physical).unwrap();

    let mut truth = model.make_params().unwrap();
    truth.set_value("l_amplitude", 2.0).unwrap();
    truth.set_value("l_center", 0.015).unwrap();
    truth.set_value("l_sigma", 0.05).unwrap();
    truth.set_value("bg_c", 0.1).unwrap();
    let data = model.eval(&truth, &e).unwrap();

    let mut params = model.make_params().unwrap();
    params.set_value("l_amplitude", 1.0).unwrap();
    params.set_value("l_sigma", 0.1).unwrap();

    let result = fit(&model, &params, &e, &data).unwrap();
    for (name, value) in [("l_amplitude", 2.0), ("l_sigma", 0.05), ("bg_c", 0.1)] {
        assert_relative_eq!(result.value(name).unwrap(), value, max_relative = 1e-4);
    }
    assert_relative_eq!(result.value("l_center").unwrap(), 0.015, epsilon = 1e-6);
    assert!(result.chisqr < 1e-12);
    assert_eq!(result.nvarys, 4);
}

#[test]
fn test_tabulated_guess_then_fit_recovers_shift_and_scale() {
    init_logging();
    let table_x = Array1::linspace(-2.0, 2.0, 4001);
    let model = TabulatedModel::new(
        &table_x,
        &gaussian(&table_x, 1.0, 0.0, 0.2),
        ExtrapolationPolicy::Clamp,
    )
    .unwrap()
    .with_prefix("t_");

    let x = Array1::linspace(-1.5, 1.5, 301);
    let mut truth = model.make_params().unwrap();
    truth.set_value("t_amplitude", 2.5).unwrap();
    truth.set_value("t_center", 0.313).unwrap();
    let y = model.eval(&truth, &x).unwrap();

    let start = model.guess(&y, &x).unwrap();
    assert_relative_eq!(start.get("t_center").unwrap().value(), 0.31, epsilon = 1e-9);

    let result = fit(&model, &start, &x, &y).unwrap();
    assert_relative_eq!(result.value("t_amplitude").unwrap(), 2.5, max_relative = 1e-3);
    assert_relative_eq!(result.value("t_center").unwrap(), 0.313, epsilon = 1e-3);
}

#[test]
fn test_teixeira_fit_recovers_diffusion() {
    init_logging();
    let (q, tau, diff) = (0.5, 1.25, 0.3);
    let dq2 = diff * q * q;
    let sigma = HBAR * dq2 / (1.0 + tau * dq2);

    let e = Array1::linspace(-1.0, 1.0, 401);
    let data = lorentzian(&e, 1.0, 0.0, sigma);

    let model = TeixeiraWaterModel::new(q).with_prefix("w_");
    let mut params = model.make_params().unwrap();
    // τ and D enter only through one width at a single q
    params.set_value("w_tau", tau).unwrap();
    params.set_vary("w_tau", false).unwrap();
    params.set_value("w_amplitude", 0.7).unwrap();

    let result = fit(&model, &params, &e, &data).unwrap();
    assert_relative_eq!(result.value("w_diff").unwrap(), diff, max_relative = 1e-4);
    assert_relative_eq!(result.value("w_sigma").unwrap(), sigma, max_relative = 1e-4);
    assert_relative_eq!(result.value("w_amplitude").unwrap(), 1.0, max_relative = 1e-4);
    assert_eq!(result.value("w_tau"), Some(tau));

    // derived parameters report propagated errors, fixed ones none
    assert!(result.stderr("w_sigma").is_some());
    assert!(result.stderr("w_tau").is_none());
}

#[test]
fn test_noisy_fit_is_within_uncertainties() {
    init_logging();
    let noise_level = 0.02;
    let x = Array1::linspace(-1.0, 1.0, 201);
    let truth = [("g_amplitude", 2.0), ("g_center", 0.1), ("g_sigma", 0.15), ("bg_c", 0.3)];

    let normal = Normal::new(0.0, noise_level).unwrap();
    let mut rng = seeded_rng(7);
    let y = gaussian(&x, 2.0, 0.1, 0.15) + 0.3 + x.mapv(|_| normal.sample(&mut rng));
    let errors = Array1::from_elem(x.len(), noise_level);

    let peak = GaussianModel::new().with_prefix("g_");
    let background = ConstantModel::new().with_prefix("bg_");
    let model = add(peak.clone(), background).unwrap();

    let mut params = peak.guess(&y, &x).unwrap();
    params.extend(ConstantModel::new().with_prefix("bg_").make_params().unwrap()).unwrap();

    let weights = errors.mapv(|v| 1.0 / v);
    let result = fit_weighted(&model, &params, &x, &y, &weights, &FitConfig::default()).unwrap();

    assert_eq!(result.nfree, 197);
    // weighted by the true errors, χ²ᵣ is near one
    assert!(result.redchi > 0.7 && result.redchi < 1.3, "redchi = {}", result.redchi);
    for (name, value) in truth {
        let fitted = result.value(name).unwrap();
        let stderr = result.stderr(name).unwrap();
        assert!(stderr > 0.0);
        assert!(
            (fitted - value).abs() < 4.0 * stderr,
            "{} = {} +/- {}, expected {}",
            name,
            fitted,
            stderr,
            value
        );
    }

    let correlation = result.correlation().unwrap();
    for i in 0..4 {
        assert_relative_eq!(correlation[[i, i]], 1.0, epsilon = 1e-12);
    }
    assert!(result.aic < result.bic);
    assert!(format!("{}", result).contains("[[Variables]]"));
}

#[test]
fn test_fitted_widths_follow_composition_laws() {
    init_logging();
    // Lorentzian widths add
    let (s1, s2) = (0.011, 0.163);
    let e = grid(0.004, -250, 1500);
    let model = convolve(
        LorentzianModel::new().with_prefix("r_"),
        LorentzianModel::new().with_prefix("l_"),
    )
    .unwrap();
    let mut params = model.make_params().unwrap();
    params.set_value("r_sigma", s1).unwrap();
    params.set_value("l_sigma", s2).unwrap();
    let data = model.eval(&params, &e).unwrap();

    let family = LorentzianModel::new();
    let result = fit(&family, &family.guess(&data, &e).unwrap(), &e, &data).unwrap();
    assert_relative_eq!(result.value("sigma").unwrap(), s1 + s2, max_relative = 0.01);

    // Gaussian widths add in quadrature
    let (s1, s2) = (0.011, 0.063);
    let e = grid(0.0004, -1000, 1000);
    let model = convolve(
        GaussianModel::new().with_prefix("r_"),
        GaussianModel::new().with_prefix("g_"),
    )
    .unwrap();
    let mut params = model.make_params().unwrap();
    params.set_value("r_sigma", s1).unwrap();
    params.set_value("g_sigma", s2).unwrap();
    let data = model.eval(&params, &e).unwrap();

    let family = GaussianModel::new();
    let result = fit(&family, &family.guess(&data, &e).unwrap(), &e, &data).unwrap();
    assert_relative_eq!(
        result.value("sigma").unwrap(),
        (s1 * s1 + s2 * s2).sqrt(),
        max_relative = 0.01
    );
}
