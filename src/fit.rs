use crate::error::FitError;
use crate::image::SpotImage;
use crate::layout::ParameterLayout;
use crate::model::ResidualModel;
use crate::nl_fit::{CobylaCurveFit, CurveFitAlgorithm, LmCurveFit};
use crate::optimizer::{OptimizerOutcome, SolverPath, optimize};
use crate::params::{FitMode, GaussianParams, NPARAMS};

use ndarray::{Array2, ArrayBase, Data, Dimension};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Amplitude reported for a failed fit
///
/// Failed fits never raise an error, they return the starting parameters with this amplitude, so
/// batch pipelines check amplitude against it instead.
pub const NOT_A_FIT_AMPLITUDE: f64 = 1e-4;

/// Fit configuration
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct FitConfig {
    pub mode: FitMode,
    /// Fit a single width for both axes, `y_var` always equals `x_var`
    pub symmetric: bool,
    /// Log the per-fit summary at `INFO` level instead of `DEBUG`
    pub debug: bool,
    /// Starting parameters replacing the heuristic guess as a whole
    ///
    /// Pinned parameters of [FitMode::VarsOnly] and [FitMode::BackgroundOnly] come from here, so
    /// these modes are expected to be seeded by the caller. Without it the heuristic guess is
    /// used, which usually gives poor results.
    pub start_params: Option<GaussianParams>,
    /// Primary solver
    pub algorithm: CurveFitAlgorithm,
    /// Solver used when the primary one can not run
    pub fallback: CurveFitAlgorithm,
}

impl FitConfig {
    pub fn new(mode: FitMode, symmetric: bool, start_params: Option<GaussianParams>) -> Self {
        Self {
            mode,
            symmetric,
            start_params,
            ..Self::default()
        }
    }

    #[inline]
    pub fn default_algorithm() -> CurveFitAlgorithm {
        LmCurveFit::default().into()
    }

    #[inline]
    pub fn default_fallback() -> CurveFitAlgorithm {
        CobylaCurveFit::default().into()
    }
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            mode: FitMode::default(),
            symmetric: false,
            debug: false,
            start_params: None,
            algorithm: Self::default_algorithm(),
            fallback: Self::default_fallback(),
        }
    }
}

/// How the result was obtained
#[derive(Clone, Copy, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct FitReport {
    pub solver: SolverPath,
    /// Exit flag of the solver, non-positive means the fit failed
    pub exit_flag: i32,
    /// Sum of squared residuals of the reported parameters
    pub sum_of_squares: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct FitResult {
    pub params: GaussianParams,
    pub report: FitReport,
}

impl FitResult {
    /// Amplitude is above [NOT_A_FIT_AMPLITUDE]
    pub fn is_good_fit(&self) -> bool {
        self.params.amplitude > NOT_A_FIT_AMPLITUDE
    }

    /// `(x_cen, y_cen, x_var, y_var, background, amplitude)`
    pub fn to_array(&self) -> [f64; NPARAMS] {
        self.params.to_array()
    }

    /// Fitted surface over the image grid
    pub fn surface(&self, shape: (usize, usize)) -> Array2<f64> {
        self.params.surface(shape)
    }
}

/// Final six parameters from the optimizer outcome
///
/// A failed outcome gives the layout seed with [NOT_A_FIT_AMPLITUDE]. Otherwise amplitude and
/// background are the last two optimizer vector elements, the rest is read from the vector or
/// from the seed depending on the fit mode.
pub fn assemble(outcome: &OptimizerOutcome, layout: &ParameterLayout) -> GaussianParams {
    let x = &outcome.result.x;
    if !outcome.result.success() || x.len() != layout.n_free() {
        return GaussianParams {
            amplitude: NOT_A_FIT_AMPLITUDE,
            ..*layout.seed()
        };
    }
    let params = layout.reconstruct(x);
    debug_assert_eq!(params.amplitude, x[x.len() - 1]);
    debug_assert_eq!(params.background, x[x.len() - 2]);
    params
}

/// Reusable fitter owning its [FitConfig]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SpotGaussianFitter {
    config: FitConfig,
}

impl SpotGaussianFitter {
    pub fn new(config: FitConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FitConfig {
        &self.config
    }

    pub fn fit<S, D, A>(&self, image: &ArrayBase<S, D>) -> Result<FitResult, FitError>
    where
        S: Data<Elem = A>,
        D: Dimension,
        A: Copy + Into<f64>,
    {
        fit(image, &self.config)
    }

    pub fn fit_image(&self, image: SpotImage) -> FitResult {
        fit_image(image, &self.config)
    }
}

/// Fit a 2D Gaussian to a single spot image
///
/// `image` may be of any dimensionality as long as it holds a single frame, see [SpotImage::new].
/// Invalid input is the only error, a failed fit is reported through [NOT_A_FIT_AMPLITUDE].
pub fn fit<S, D, A>(image: &ArrayBase<S, D>, config: &FitConfig) -> Result<FitResult, FitError>
where
    S: Data<Elem = A>,
    D: Dimension,
    A: Copy + Into<f64>,
{
    let image = SpotImage::new(image)?;
    Ok(fit_image(image, config))
}

/// Fit an already validated image, never fails
pub fn fit_image(image: SpotImage, config: &FitConfig) -> FitResult {
    let seed = match config.start_params {
        Some(start_params) => start_params,
        None => {
            if config.mode != FitMode::Full {
                tracing::debug!(mode = %config.mode, "no start parameters, pinning heuristic guess");
            }
            GaussianParams::initial_guess(&image)
        }
    };
    let layout = ParameterLayout::new(config.mode, config.symmetric, seed);
    let x0 = layout.free_vector();
    let model = ResidualModel::new(image, layout);

    let outcome = optimize(&model, &x0, &config.algorithm, &config.fallback);
    let params = assemble(&outcome, model.layout());
    let report = FitReport {
        solver: outcome.path,
        exit_flag: outcome.result.exit_flag,
        sum_of_squares: model.sum_of_squares(&model.layout().free_vector_of(&params)),
    };

    if config.debug {
        tracing::info!(seed = ?model.layout().seed(), ?params, ?report, "spot fit");
    } else {
        tracing::debug!(seed = ?model.layout().seed(), ?params, ?report, "spot fit");
    }
    FitResult { params, report }
}
