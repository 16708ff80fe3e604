#![doc = include_str!("../README.md")]

mod error;
pub use error::{FitError, SolverError};

mod fit;
pub use fit::{
    FitConfig, FitReport, FitResult, NOT_A_FIT_AMPLITUDE, SpotGaussianFitter, assemble, fit,
    fit_image,
};

mod image;
pub use image::SpotImage;

mod layout;
pub use layout::{FreeParam, ParameterLayout};

mod model;
pub use model::{Residual, ResidualModel, ResidualOutput};

pub mod nl_fit;
pub use nl_fit::{
    CeresCurveFit, CobylaCurveFit, CurveFitAlgorithm, CurveFitResult, CurveFitTrait, LmCurveFit,
};

mod optimizer;
pub use optimizer::{OptimizerOutcome, SolverPath, optimize};

mod params;
pub use params::{FitMode, GaussianParams, NPARAMS, gaussian_surface};

pub use ndarray;
