use crate::error::SolverError;
use crate::model::ResidualModel;
use crate::nl_fit::curve_fit::{CurveFitResult, CurveFitTrait};

use cobyla::{Func, RhoBeg, StopTols, SuccessStatus, minimize};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// COBYLA (Constrained Optimization BY Linear Approximations) sum-of-squares minimizer
///
/// COBYLA is a derivative-free method: it keeps a simplex of `n_free + 1` points, builds linear
/// approximations of the objective over it and shrinks the trust region until the requested
/// tolerance is reached. It is slower and less precise than the gradient-based solvers, but it
/// needs nothing but the sum of squared residuals and is always available, so it is the default
/// fallback.
///
/// The initial simplex size is `rhobeg` relative to each starting parameter, `rhobeg` itself for
/// parameters starting at zero.
///
/// A noise-free spot drives the sum of squares to zero, where the relative tolerances are never
/// met. `fit_tol` is the absolute scale of the stop: it is measured in units of the image total
/// sum of squares about its mean. The minimization stops once an improvement is below
/// `fit_tol` in these units, and a run exhausting `niterations` still counts as converged if its
/// sum of squares is below it.
///
/// The algorithm is described in M.J.D. Powell's 1994 paper "A direct search optimization method
/// that models the objective and constraint functions by linear interpolation".
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename = "Cobyla")]
pub struct CobylaCurveFit {
    pub niterations: u32,
    pub rhobeg: f64,
    pub ftol_rel: f64,
    pub xtol_rel: f64,
    #[serde(default = "CobylaCurveFit::default_fit_tol")]
    pub fit_tol: f64,
}

impl CobylaCurveFit {
    pub const NAME: &'static str = "COBYLA";

    /// Create a new [CobylaCurveFit].
    ///
    /// # Arguments
    /// - `niterations`: maximum number of function evaluations
    /// - `rhobeg`: initial relative change of parameters (controls initial simplex size)
    /// - `ftol_rel`: relative tolerance on function value for convergence
    /// - `xtol_rel`: relative tolerance on parameter values for convergence
    /// - `fit_tol`: absolute tolerance on the sum of squares relative to the image total sum of
    ///   squares
    pub fn new(niterations: u32, rhobeg: f64, ftol_rel: f64, xtol_rel: f64, fit_tol: f64) -> Self {
        assert!(niterations > 0, "niterations must be positive");
        assert!(rhobeg > 0.0, "rhobeg must be positive");
        assert!(rhobeg.is_finite(), "rhobeg must be finite");
        assert!(ftol_rel >= 0.0, "ftol_rel must be non-negative");
        assert!(ftol_rel.is_finite(), "ftol_rel must be finite");
        assert!(xtol_rel >= 0.0, "xtol_rel must be non-negative");
        assert!(xtol_rel.is_finite(), "xtol_rel must be finite");
        assert!(fit_tol >= 0.0, "fit_tol must be non-negative");
        assert!(fit_tol.is_finite(), "fit_tol must be finite");
        Self {
            niterations,
            rhobeg,
            ftol_rel,
            xtol_rel,
            fit_tol,
        }
    }

    #[inline]
    pub fn default_niterations() -> u32 {
        4000
    }

    #[inline]
    pub fn default_rhobeg() -> f64 {
        0.1
    }

    #[inline]
    pub fn default_ftol_rel() -> f64 {
        1e-8
    }

    #[inline]
    pub fn default_xtol_rel() -> f64 {
        1e-8
    }

    #[inline]
    pub fn default_fit_tol() -> f64 {
        1e-8
    }
}

impl Default for CobylaCurveFit {
    fn default() -> Self {
        Self::new(
            Self::default_niterations(),
            Self::default_rhobeg(),
            Self::default_ftol_rel(),
            Self::default_xtol_rel(),
            Self::default_fit_tol(),
        )
    }
}

impl CurveFitTrait for CobylaCurveFit {
    fn curve_fit(
        &self,
        model: &ResidualModel,
        x0: &[f64],
    ) -> Result<CurveFitResult, SolverError> {
        let objective = |x: &[f64], _user_data: &mut ()| -> f64 {
            let sum_of_squares = model.sum_of_squares(x);
            if sum_of_squares.is_finite() {
                sum_of_squares
            } else {
                f64::MAX
            }
        };

        let bounds = vec![(f64::NEG_INFINITY, f64::INFINITY); x0.len()];
        // No constraints beyond the trivial bounds
        let constraints: Vec<&dyn Func<()>> = vec![];
        let rhobeg = x0
            .iter()
            .map(|&x| {
                if x == 0.0 {
                    self.rhobeg
                } else {
                    self.rhobeg * x.abs()
                }
            })
            .collect();
        // Zero for a flat image or an image with NaN pixels
        let ftol_abs = {
            let total = model.image().total_sum_of_squares();
            if total.is_finite() {
                self.fit_tol * total
            } else {
                0.0
            }
        };
        let stop_tol = StopTols {
            ftol_rel: self.ftol_rel,
            ftol_abs,
            xtol_rel: self.xtol_rel,
            ..StopTols::default()
        };

        let (x, status) = match minimize(
            objective,
            x0,
            &bounds,
            &constraints,
            (),
            self.niterations as usize,
            RhoBeg::Set(rhobeg),
            Some(stop_tol),
        ) {
            Ok((status, x, _)) => (x, Ok(status)),
            Err((status, x, _)) => {
                tracing::debug!(?status, "COBYLA failed");
                (x, Err(status))
            }
        };

        let sum_of_squares = model.sum_of_squares(&x);
        let exit_flag = match status {
            _ if !sum_of_squares.is_finite() => -1,
            Ok(SuccessStatus::Success) => 1,
            Ok(SuccessStatus::XtolReached) => 2,
            Ok(SuccessStatus::FtolReached) => 3,
            Ok(SuccessStatus::MaxEvalReached) if sum_of_squares <= ftol_abs => 4,
            Ok(_) => 0,
            Err(_) => -1,
        };
        Ok(CurveFitResult {
            x,
            sum_of_squares,
            exit_flag,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::SpotImage;
    use crate::layout::ParameterLayout;
    use crate::params::{FitMode, GaussianParams};

    use approx::assert_abs_diff_eq;

    #[test]
    fn exact_spot() {
        let truth = GaussianParams::new(7.2, 6.6, 0.15, 0.25, 20.0, 500.0);
        let start = GaussianParams::new(7.0, 7.0, 0.2, 0.2, 15.0, 450.0);
        let image = SpotImage::new(&truth.surface((15, 14))).unwrap();
        let model = ResidualModel::new(image, ParameterLayout::new(FitMode::Full, false, start));

        let result = CobylaCurveFit::default()
            .curve_fit(&model, &model.layout().free_vector())
            .unwrap();
        println!("COBYLA result: {:?}", result);

        assert!(result.success(), "Optimization should succeed");
        // Derivative-free, so tolerances are relaxed compared to Levenberg-Marquardt
        for (actual, (desired, tol)) in result
            .x
            .iter()
            .zip(truth.to_array().into_iter().zip([0.01, 0.01, 0.003, 0.003, 0.5, 2.0]))
        {
            assert_abs_diff_eq!(*actual, desired, epsilon = tol);
        }
    }

    #[test]
    fn background_only_is_linear() {
        let truth = GaussianParams::new(4.0, 5.0, 0.2, 0.2, 30.0, 120.0);
        let seed = GaussianParams {
            background: 10.0,
            amplitude: 200.0,
            ..truth
        };
        let image = SpotImage::new(&truth.surface((10, 9))).unwrap();
        let model = ResidualModel::new(
            image,
            ParameterLayout::new(FitMode::BackgroundOnly, true, seed),
        );

        let result = CobylaCurveFit::default()
            .curve_fit(&model, &model.layout().free_vector())
            .unwrap();
        assert!(result.success());
        assert_abs_diff_eq!(&result.x[..], &[30.0, 120.0][..], epsilon = 1e-3);
        assert!(result.sum_of_squares < 1e-4);
    }

    #[test]
    fn exhausted_evaluations_on_exact_spot_converge() {
        let truth = GaussianParams::new(6.7, 8.2, 0.18, 0.11, 40.0, 800.0);
        let image = SpotImage::new(&truth.surface((17, 15))).unwrap();
        let seed = GaussianParams::initial_guess(&image);
        let model = ResidualModel::new(image, ParameterLayout::new(FitMode::Full, false, seed));

        let result = CobylaCurveFit::default()
            .curve_fit(&model, &model.layout().free_vector())
            .unwrap();
        assert!(result.success(), "exit flag {}", result.exit_flag);
        assert_abs_diff_eq!(result.x[0], truth.x_cen, epsilon = 0.01);
        assert_abs_diff_eq!(result.x[1], truth.y_cen, epsilon = 0.01);
    }

    #[test]
    fn exhausted_evaluations_far_from_minimum_fail() {
        let truth = GaussianParams::new(6.7, 8.2, 0.18, 0.11, 40.0, 800.0);
        let image = SpotImage::new(&truth.surface((17, 15))).unwrap();
        let seed = GaussianParams::initial_guess(&image);
        let model = ResidualModel::new(image, ParameterLayout::new(FitMode::Full, false, seed));

        let fitter = CobylaCurveFit {
            niterations: 10,
            ..CobylaCurveFit::default()
        };
        let result = fitter
            .curve_fit(&model, &model.layout().free_vector())
            .unwrap();
        assert_eq!(result.exit_flag, 0);
    }

    #[test]
    fn nan_pixel_fails() {
        let truth = GaussianParams::new(4.0, 4.0, 0.3, 0.3, 1.0, 10.0);
        let mut image = truth.surface((9, 9));
        image[(0, 0)] = f64::NAN;
        let image = SpotImage::new(&image).unwrap();
        let model = ResidualModel::new(image, ParameterLayout::new(FitMode::Full, false, truth));

        let result = CobylaCurveFit::default()
            .curve_fit(&model, &model.layout().free_vector())
            .unwrap();
        assert!(!result.success());
    }
}
