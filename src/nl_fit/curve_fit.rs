use crate::error::SolverError;
use crate::model::ResidualModel;
use crate::nl_fit::{CeresCurveFit, CobylaCurveFit, LmCurveFit};

use enum_dispatch::enum_dispatch;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Outcome of a single solver run
#[derive(Clone, Debug, PartialEq)]
pub struct CurveFitResult {
    /// Final optimizer vector
    pub x: Vec<f64>,
    /// Sum of squared residuals at `x`
    pub sum_of_squares: f64,
    /// Solver-specific termination code, non-positive values mean the fit failed
    pub exit_flag: i32,
}

impl CurveFitResult {
    #[inline]
    pub fn success(&self) -> bool {
        self.exit_flag > 0
    }

    /// Result for a run which never moved from the starting point
    pub(crate) fn unmoved(model: &ResidualModel, x0: &[f64], exit_flag: i32) -> Self {
        Self {
            x: x0.to_vec(),
            sum_of_squares: model.sum_of_squares(x0),
            exit_flag,
        }
    }
}

#[enum_dispatch]
pub trait CurveFitTrait: Clone {
    /// Capability probe: `Err` if the solver can not run in this build
    fn check_available(&self) -> Result<(), SolverError> {
        Ok(())
    }

    /// Minimize the residuals of `model` starting from `x0`
    ///
    /// `Err` is returned only when the solver could not run at all, non-convergence is reported
    /// through [CurveFitResult::exit_flag].
    fn curve_fit(&self, model: &ResidualModel, x0: &[f64])
    -> Result<CurveFitResult, SolverError>;
}

/// Optimization algorithm
#[enum_dispatch(CurveFitTrait)]
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[non_exhaustive]
pub enum CurveFitAlgorithm {
    Lm(LmCurveFit),
    Ceres(CeresCurveFit),
    Cobyla(CobylaCurveFit),
}

impl CurveFitAlgorithm {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Lm(_) => LmCurveFit::NAME,
            Self::Ceres(_) => CeresCurveFit::NAME,
            Self::Cobyla(_) => CobylaCurveFit::NAME,
        }
    }
}
