use crate::error::SolverError;
use crate::model::ResidualModel;
use crate::nl_fit::curve_fit::{CurveFitResult, CurveFitTrait};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Ceres-Solver non-linear least-squares wrapper
///
/// Requires `ceres-source` or `ceres-system` Cargo feature
///
/// Trust-region solver using the analytic Jacobian, no bounds.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename = "Ceres")]
pub struct CeresCurveFit {
    pub niterations: u16,
    pub loss_factor: Option<f64>,
}

impl CeresCurveFit {
    pub const NAME: &'static str = "Ceres";

    /// Create a new [CeresCurveFit].
    ///
    /// # Arguments
    /// - `niterations`: number of iterations
    /// - `loss_factor`: if specified, use Cauchy loss function with the given factor to transform
    ///   the squared norm of the residuals. This is useful to reduce the influence of hot pixels.
    pub fn new(niterations: u16, loss_factor: Option<f64>) -> Self {
        if let Some(loss_factor) = loss_factor {
            assert!(loss_factor > 0.0, "loss_factor must be positive");
        }
        Self {
            niterations,
            loss_factor,
        }
    }

    #[inline]
    pub fn default_niterations() -> u16 {
        50
    }

    #[inline]
    pub fn default_loss_factor() -> Option<f64> {
        None
    }
}

impl Default for CeresCurveFit {
    fn default() -> Self {
        Self::new(Self::default_niterations(), Self::default_loss_factor())
    }
}

#[cfg(any(feature = "ceres-source", feature = "ceres-system"))]
mod imp {
    use super::*;

    use ceres_solver::{CurveFitProblem1D, CurveFunctionType, LossFunction, SolverOptions};
    use std::rc::Rc;

    const PARAMETER_TOLERANCE: f64 = 1e-10;

    fn failed(message: impl ToString) -> SolverError {
        SolverError::Failed {
            solver: CeresCurveFit::NAME,
            message: message.to_string(),
        }
    }

    pub(super) fn curve_fit(
        fitter: &CeresCurveFit,
        model: &ResidualModel,
        x0: &[f64],
    ) -> Result<CurveFitResult, SolverError> {
        if model.n_residuals() < x0.len() {
            return Ok(CurveFitResult::unmoved(model, x0, -2));
        }

        // Abscissa is the flat pixel index
        let func: CurveFunctionType = {
            let model = Rc::new(model.clone());
            let n_free = x0.len();
            Box::new(move |t, parameters, y, jacobians| {
                let index = t as usize;
                *y = model.model_at(index, parameters);
                if !y.is_finite() {
                    *y = f64::MAX.sqrt();
                    return false;
                }
                if let Some(jacobians) = jacobians {
                    let mut der = vec![0.0; n_free];
                    model.model_gradient_at(index, parameters, &mut der);
                    for (input, output) in der.into_iter().zip(jacobians.iter_mut()) {
                        if let Some(output) = output {
                            if !input.is_finite() {
                                return false;
                            }
                            *output = input;
                        }
                    }
                }
                true
            })
        };

        let t: Vec<_> = (0..model.n_residuals()).map(|i| i as f64).collect();
        let m: Vec<_> = model.image().view().iter().copied().collect();
        let inv_err = vec![1.0; m.len()];
        let bounds: Vec<Option<f64>> = vec![None; x0.len()];

        let options = SolverOptions::builder()
            .parameter_tolerance(PARAMETER_TOLERANCE)
            .max_num_iterations(fitter.niterations as i32)
            .build()
            .map_err(failed)?;

        let mut problem_builder = CurveFitProblem1D::builder()
            .x(t.as_slice())
            .y(m.as_slice())
            .inverse_error(inv_err.as_slice())
            .func(func)
            .parameters(x0)
            .lower_bounds(&bounds)
            .upper_bounds(&bounds);
        if let Some(loss_factor) = fitter.loss_factor {
            problem_builder = problem_builder.loss(LossFunction::cauchy(loss_factor));
        };
        let solution = problem_builder.build().map_err(failed)?.solve(&options);
        let exit_flag = if solution.summary.is_solution_usable() {
            1
        } else {
            0
        };
        let x = solution.parameters;
        let sum_of_squares = model.sum_of_squares(&x);
        Ok(CurveFitResult {
            x,
            sum_of_squares,
            exit_flag,
        })
    }
}

impl CurveFitTrait for CeresCurveFit {
    fn check_available(&self) -> Result<(), SolverError> {
        if cfg!(any(feature = "ceres-source", feature = "ceres-system")) {
            Ok(())
        } else {
            Err(unavailable())
        }
    }

    #[cfg(any(feature = "ceres-source", feature = "ceres-system"))]
    fn curve_fit(
        &self,
        model: &ResidualModel,
        x0: &[f64],
    ) -> Result<CurveFitResult, SolverError> {
        imp::curve_fit(self, model, x0)
    }

    #[cfg(not(any(feature = "ceres-source", feature = "ceres-system")))]
    fn curve_fit(
        &self,
        _model: &ResidualModel,
        _x0: &[f64],
    ) -> Result<CurveFitResult, SolverError> {
        Err(unavailable())
    }
}

fn unavailable() -> SolverError {
    SolverError::Unavailable {
        solver: CeresCurveFit::NAME,
        reason: "crate is built without `ceres-source` or `ceres-system` feature",
    }
}
