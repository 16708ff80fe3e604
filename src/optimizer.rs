use crate::model::ResidualModel;
use crate::nl_fit::{CurveFitResult, CurveFitTrait};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Which of the two solvers produced the result
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SolverPath {
    Primary,
    Fallback,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OptimizerOutcome {
    pub result: CurveFitResult,
    pub path: SolverPath,
}

/// Run `primary`, switch to `fallback` only if `primary` can not run
///
/// Non-convergence of the primary solver is returned as is, it is not a reason to try the
/// fallback. If the fallback can not run either, the outcome is `x0` with exit flag `-1`.
pub fn optimize<P, F>(model: &ResidualModel, x0: &[f64], primary: &P, fallback: &F) -> OptimizerOutcome
where
    P: CurveFitTrait,
    F: CurveFitTrait,
{
    let primary_error = match primary
        .check_available()
        .and_then(|_| primary.curve_fit(model, x0))
    {
        Ok(result) => {
            return OptimizerOutcome {
                result,
                path: SolverPath::Primary,
            };
        }
        Err(error) => error,
    };
    tracing::warn!(%primary_error, "switching to fallback solver");

    let result = fallback
        .check_available()
        .and_then(|_| fallback.curve_fit(model, x0))
        .unwrap_or_else(|fallback_error| {
            tracing::warn!(%fallback_error, "fallback solver can not run either");
            CurveFitResult::unmoved(model, x0, -1)
        });
    OptimizerOutcome {
        result,
        path: SolverPath::Fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SolverError;
    use crate::image::SpotImage;
    use crate::layout::ParameterLayout;
    use crate::nl_fit::CobylaCurveFit;
    use crate::params::{FitMode, GaussianParams};

    use std::cell::Cell;

    #[derive(Clone, Default)]
    struct Probe {
        available: bool,
        raises: bool,
        exit_flag: i32,
        calls: Cell<usize>,
    }

    impl CurveFitTrait for Probe {
        fn check_available(&self) -> Result<(), SolverError> {
            if self.available {
                Ok(())
            } else {
                Err(SolverError::Unavailable {
                    solver: "probe",
                    reason: "test",
                })
            }
        }

        fn curve_fit(
            &self,
            model: &ResidualModel,
            x0: &[f64],
        ) -> Result<CurveFitResult, SolverError> {
            self.calls.set(self.calls.get() + 1);
            if self.raises {
                return Err(SolverError::Failed {
                    solver: "probe",
                    message: "raised".to_owned(),
                });
            }
            Ok(CurveFitResult::unmoved(model, x0, self.exit_flag))
        }
    }

    fn model() -> ResidualModel {
        let seed = GaussianParams::new(3.0, 3.0, 0.3, 0.3, 1.0, 10.0);
        let image = SpotImage::new(&seed.surface((7, 7))).unwrap();
        ResidualModel::new(image, ParameterLayout::new(FitMode::Full, false, seed))
    }

    #[test]
    fn primary_result_is_kept() {
        let model = model();
        let x0 = model.layout().free_vector();
        let primary = Probe {
            available: true,
            exit_flag: 1,
            ..Probe::default()
        };
        let fallback = Probe {
            available: true,
            exit_flag: 2,
            ..Probe::default()
        };
        let outcome = optimize(&model, &x0, &primary, &fallback);
        assert_eq!(outcome.path, SolverPath::Primary);
        assert_eq!(outcome.result.exit_flag, 1);
        assert_eq!(fallback.calls.get(), 0);
    }

    #[test]
    fn non_convergence_does_not_switch() {
        let model = model();
        let x0 = model.layout().free_vector();
        let primary = Probe {
            available: true,
            exit_flag: 0,
            ..Probe::default()
        };
        let fallback = Probe {
            available: true,
            exit_flag: 2,
            ..Probe::default()
        };
        let outcome = optimize(&model, &x0, &primary, &fallback);
        assert_eq!(outcome.path, SolverPath::Primary);
        assert!(!outcome.result.success());
        assert_eq!(fallback.calls.get(), 0);
    }

    #[test]
    fn unavailable_primary_is_not_called() {
        let model = model();
        let x0 = model.layout().free_vector();
        let primary = Probe::default();
        let fallback = Probe {
            available: true,
            exit_flag: 2,
            ..Probe::default()
        };
        let outcome = optimize(&model, &x0, &primary, &fallback);
        assert_eq!(outcome.path, SolverPath::Fallback);
        assert_eq!(outcome.result.exit_flag, 2);
        assert_eq!(primary.calls.get(), 0);
        assert_eq!(fallback.calls.get(), 1);
    }

    #[test]
    fn raising_primary_switches() {
        let model = model();
        let x0 = model.layout().free_vector();
        let primary = Probe {
            available: true,
            raises: true,
            ..Probe::default()
        };
        let outcome = optimize(&model, &x0, &primary, &CobylaCurveFit::default());
        assert_eq!(outcome.path, SolverPath::Fallback);
        assert!(outcome.result.success());
        assert_eq!(primary.calls.get(), 1);
    }

    #[test]
    fn both_unavailable() {
        let model = model();
        let x0 = model.layout().free_vector();
        let outcome = optimize(&model, &x0, &Probe::default(), &Probe::default());
        assert_eq!(outcome.path, SolverPath::Fallback);
        assert_eq!(outcome.result.exit_flag, -1);
        assert_eq!(outcome.result.x, x0);
    }
}
