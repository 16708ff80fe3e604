use crate::params::{FitMode, GaussianParams};

use itertools::Itertools;

/// Physical meaning of one element of the optimizer's parameter vector
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FreeParam {
    XCen,
    YCen,
    XVar,
    YVar,
    /// Shared width of a symmetric spot, drives both `x_var` and `y_var`
    Var,
    Background,
    Amplitude,
}

impl FreeParam {
    fn get(self, params: &GaussianParams) -> f64 {
        match self {
            Self::XCen => params.x_cen,
            Self::YCen => params.y_cen,
            Self::XVar | Self::Var => params.x_var,
            Self::YVar => params.y_var,
            Self::Background => params.background,
            Self::Amplitude => params.amplitude,
        }
    }

    fn set(self, params: &mut GaussianParams, value: f64) {
        match self {
            Self::XCen => params.x_cen = value,
            Self::YCen => params.y_cen = value,
            Self::XVar => params.x_var = value,
            Self::YVar => params.y_var = value,
            Self::Var => {
                params.x_var = value;
                params.y_var = value;
            }
            Self::Background => params.background = value,
            Self::Amplitude => params.amplitude = value,
        }
    }
}

// Background and amplitude always close the vector, in this order.
const FULL: &[FreeParam] = &[
    FreeParam::XCen,
    FreeParam::YCen,
    FreeParam::XVar,
    FreeParam::YVar,
    FreeParam::Background,
    FreeParam::Amplitude,
];
const FULL_SYMMETRIC: &[FreeParam] = &[
    FreeParam::XCen,
    FreeParam::YCen,
    FreeParam::Var,
    FreeParam::Background,
    FreeParam::Amplitude,
];
const VARS_ONLY: &[FreeParam] = &[
    FreeParam::XVar,
    FreeParam::YVar,
    FreeParam::Background,
    FreeParam::Amplitude,
];
const VARS_ONLY_SYMMETRIC: &[FreeParam] = &[
    FreeParam::Var,
    FreeParam::Background,
    FreeParam::Amplitude,
];
const BACKGROUND_ONLY: &[FreeParam] = &[FreeParam::Background, FreeParam::Amplitude];

/// Split of the six physical parameters into optimized and pinned ones
///
/// Pinned values come from the seed the layout was built with, i.e. from user-supplied start
/// parameters or from [GaussianParams::initial_guess].
#[derive(Clone, Debug, PartialEq)]
pub struct ParameterLayout {
    mode: FitMode,
    symmetric: bool,
    seed: GaussianParams,
}

impl ParameterLayout {
    /// For a symmetric layout the seed is symmetrized
    pub fn new(mode: FitMode, symmetric: bool, seed: GaussianParams) -> Self {
        let seed = if symmetric { seed.symmetrized() } else { seed };
        Self {
            mode,
            symmetric,
            seed,
        }
    }

    #[inline]
    pub fn mode(&self) -> FitMode {
        self.mode
    }

    #[inline]
    pub fn symmetric(&self) -> bool {
        self.symmetric
    }

    /// Starting parameters, also the source of all pinned values
    #[inline]
    pub fn seed(&self) -> &GaussianParams {
        &self.seed
    }

    /// Meaning of each optimizer vector element, in order
    pub fn free_params(&self) -> &'static [FreeParam] {
        match (self.mode, self.symmetric) {
            (FitMode::Full, false) => FULL,
            (FitMode::Full, true) => FULL_SYMMETRIC,
            (FitMode::VarsOnly, false) => VARS_ONLY,
            (FitMode::VarsOnly, true) => VARS_ONLY_SYMMETRIC,
            (FitMode::BackgroundOnly, _) => BACKGROUND_ONLY,
        }
    }

    #[inline]
    pub fn n_free(&self) -> usize {
        self.free_params().len()
    }

    /// Optimizer starting vector
    pub fn free_vector(&self) -> Vec<f64> {
        self.free_vector_of(&self.seed)
    }

    /// Optimizer vector corresponding to `params`
    pub fn free_vector_of(&self, params: &GaussianParams) -> Vec<f64> {
        self.free_params().iter().map(|p| p.get(params)).collect()
    }

    /// Pinned values, in the `(x_cen, y_cen, x_var, y_var)` order, without the ones being optimized
    pub fn fixed_vector(&self) -> Vec<f64> {
        let free = self.free_params();
        let (x_var_free, y_var_free) = (
            free.iter().any(|p| matches!(p, FreeParam::XVar | FreeParam::Var)),
            free.iter().any(|p| matches!(p, FreeParam::YVar | FreeParam::Var)),
        );
        [
            (free.contains(&FreeParam::XCen), self.seed.x_cen),
            (free.contains(&FreeParam::YCen), self.seed.y_cen),
            (x_var_free, self.seed.x_var),
            (y_var_free, self.seed.y_var),
        ]
        .into_iter()
        .filter_map(|(is_free, value)| (!is_free).then_some(value))
        .collect()
    }

    /// Full parameter set from an optimizer vector
    ///
    /// # Panics
    /// If `free` length differs from [ParameterLayout::n_free]
    pub fn reconstruct(&self, free: &[f64]) -> GaussianParams {
        let mut params = self.seed;
        for (p, &value) in self.free_params().iter().zip_eq(free) {
            p.set(&mut params, value);
        }
        if self.symmetric {
            params.y_var = params.x_var;
        }
        params
    }
}
