use crate::error::SolverError;
use crate::model::ResidualModel;
use crate::nl_fit::curve_fit::{CurveFitResult, CurveFitTrait};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Levenberg-Marquardt non-linear least-squares wrapper
///
/// Requires `levenberg-marquardt` Cargo feature, enabled by default
///
/// MINPACK-style Levenberg-Marquardt with analytic Jacobian, no bounds. `patience` limits the
/// number of residual evaluations to `patience * (n_free + 1)`.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename = "Lm")]
pub struct LmCurveFit {
    pub patience: usize,
}

impl LmCurveFit {
    pub const NAME: &'static str = "Levenberg-Marquardt";

    pub fn new(patience: usize) -> Self {
        assert!(patience > 0, "patience must be positive");
        Self { patience }
    }

    #[inline]
    pub fn default_patience() -> usize {
        100
    }
}

impl Default for LmCurveFit {
    fn default() -> Self {
        Self::new(Self::default_patience())
    }
}

#[cfg(feature = "levenberg-marquardt")]
mod imp {
    use super::*;

    use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt, TerminationReason};
    use nalgebra::storage::Owned;
    use nalgebra::{DMatrix, DVector, Dyn};

    #[derive(Clone)]
    struct SpotProblem<'a> {
        model: &'a ResidualModel,
        x: DVector<f64>,
    }

    impl LeastSquaresProblem<f64, Dyn, Dyn> for SpotProblem<'_> {
        type ResidualStorage = Owned<f64, Dyn>;
        type JacobianStorage = Owned<f64, Dyn, Dyn>;
        type ParameterStorage = Owned<f64, Dyn>;

        fn set_params(&mut self, x: &DVector<f64>) {
            self.x.copy_from(x);
        }

        fn params(&self) -> DVector<f64> {
            self.x.clone()
        }

        fn residuals(&self) -> Option<DVector<f64>> {
            let r = self.model.residuals(self.x.as_slice());
            if !r.iter().all(|v| v.is_finite()) {
                return None;
            }
            Some(DVector::from_iterator(r.len(), r.iter().copied()))
        }

        fn jacobian(&self) -> Option<DMatrix<f64>> {
            let jac = self.model.jacobian(self.x.as_slice());
            if !jac.iter().all(|v| v.is_finite()) {
                return None;
            }
            let (nrows, ncols) = jac.dim();
            Some(DMatrix::from_fn(nrows, ncols, |i, j| jac[(i, j)]))
        }
    }

    fn exit_flag(termination: &TerminationReason) -> i32 {
        match termination {
            TerminationReason::ResidualsZero => 1,
            TerminationReason::Converged { xtol: true, .. } => 2,
            TerminationReason::Converged { .. } => 3,
            TerminationReason::Orthogonal => 4,
            // Tolerances are below machine precision, x is as good as it gets
            TerminationReason::NoImprovementPossible(_) => 5,
            TerminationReason::LostPatience => 0,
            TerminationReason::Numerical(_) | TerminationReason::User(_) => -1,
            _ => -2,
        }
    }

    pub(super) fn curve_fit(
        fitter: &LmCurveFit,
        model: &ResidualModel,
        x0: &[f64],
    ) -> CurveFitResult {
        if model.n_residuals() < x0.len() {
            tracing::debug!(
                n_residuals = model.n_residuals(),
                n_free = x0.len(),
                "fewer pixels than free parameters"
            );
            return CurveFitResult::unmoved(model, x0, -2);
        }

        let problem = SpotProblem {
            model,
            x: DVector::from_column_slice(x0),
        };
        let (problem, report) = LevenbergMarquardt::new()
            .with_patience(fitter.patience)
            .minimize(problem);
        tracing::trace!(
            termination = ?report.termination,
            evaluations = report.number_of_evaluations,
            "Levenberg-Marquardt finished"
        );

        let x = problem.x.as_slice().to_vec();
        let sum_of_squares = model.sum_of_squares(&x);
        CurveFitResult {
            x,
            sum_of_squares,
            exit_flag: exit_flag(&report.termination),
        }
    }
}

impl CurveFitTrait for LmCurveFit {
    fn check_available(&self) -> Result<(), SolverError> {
        if cfg!(feature = "levenberg-marquardt") {
            Ok(())
        } else {
            Err(unavailable())
        }
    }

    #[cfg(feature = "levenberg-marquardt")]
    fn curve_fit(
        &self,
        model: &ResidualModel,
        x0: &[f64],
    ) -> Result<CurveFitResult, SolverError> {
        Ok(imp::curve_fit(self, model, x0))
    }

    #[cfg(not(feature = "levenberg-marquardt"))]
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
        solver: LmCurveFit::NAME,
        reason: "crate is built without `levenberg-marquardt` feature",
    }
}
