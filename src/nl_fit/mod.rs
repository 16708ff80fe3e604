//! Non-linear least-squares solvers for the spot model.
//!
//! Every solver minimizes the same objective, [ResidualModel](crate::model::ResidualModel):
//! gradient-based ones consume its residual vector and analytic Jacobian, derivative-free ones
//! consume the sum of squares.
//!
//! - [`LmCurveFit`] (requires `levenberg-marquardt`, default): Levenberg-Marquardt.
//!   Uses derivatives. The default primary solver.
//! - [`CeresCurveFit`] (requires `ceres-source` or `ceres-system`): Trust-region. Uses
//!   derivatives.
//! - [`CobylaCurveFit`]: COBYLA, a derivative-free method over a simplex of linear
//!   interpolation points. The default fallback solver, always available.
//!
//! A solver whose Cargo feature is disabled is still a valid [`CurveFitAlgorithm`] value, but its
//! [`CurveFitTrait::check_available`] returns [SolverError::Unavailable](crate::SolverError).

pub mod ceres;
pub use ceres::CeresCurveFit;

pub mod cobyla;
pub use cobyla::CobylaCurveFit;

pub mod curve_fit;
pub use curve_fit::{CurveFitAlgorithm, CurveFitResult, CurveFitTrait};

pub mod lm;
pub use lm::LmCurveFit;
