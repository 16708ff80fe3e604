use crate::error::FitError;
use crate::image::SpotImage;

use ndarray::Array2;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of physical parameters of the spot model
pub const NPARAMS: usize = 6;

/// Parameters of the 2D Gaussian spot model
///
/// $$
/// G(x, y) = B + A \exp\left(-v_x (x - x_0)^2 - v_y (y - y_0)^2\right),
/// $$
///
/// `x_var` and `y_var` are the exponent coefficients $v_x$ and $v_y$, i.e. inverse widths, not
/// statistical variances. Use [GaussianParams::sigma_x] and friends to get conventional widths.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GaussianParams {
    pub x_cen: f64,
    pub y_cen: f64,
    pub x_var: f64,
    pub y_var: f64,
    pub background: f64,
    pub amplitude: f64,
}

impl GaussianParams {
    pub fn new(
        x_cen: f64,
        y_cen: f64,
        x_var: f64,
        y_var: f64,
        background: f64,
        amplitude: f64,
    ) -> Self {
        Self {
            x_cen,
            y_cen,
            x_var,
            y_var,
            background,
            amplitude,
        }
    }

    /// Heuristic starting guess from image statistics
    ///
    /// Amplitude is the brightest pixel, background is the dimmest one, center is the geometric
    /// center of the patch and widths assume the spot covers about a half of the patch.
    pub fn initial_guess(image: &SpotImage) -> Self {
        let (height, width) = image.shape();
        let (height, width) = (height as f64, width as f64);
        Self {
            x_cen: 0.5 * width,
            y_cen: 0.5 * height,
            x_var: (0.25 * width).recip(),
            y_var: (0.25 * height).recip(),
            background: image.min(),
            amplitude: image.max(),
        }
    }

    /// Copy with `y_var` replaced by `x_var`
    pub fn symmetrized(self) -> Self {
        Self {
            y_var: self.x_var,
            ..self
        }
    }

    /// `(x_cen, y_cen, x_var, y_var, background, amplitude)`
    pub fn to_array(&self) -> [f64; NPARAMS] {
        [
            self.x_cen,
            self.y_cen,
            self.x_var,
            self.y_var,
            self.background,
            self.amplitude,
        ]
    }

    pub fn from_array(a: [f64; NPARAMS]) -> Self {
        Self::new(a[0], a[1], a[2], a[3], a[4], a[5])
    }

    /// Model value at the given pixel coordinates
    #[inline]
    pub fn value_at(&self, x: f64, y: f64) -> f64 {
        self.background + self.amplitude * self.exp_at(x, y)
    }

    #[inline]
    pub(crate) fn exp_at(&self, x: f64, y: f64) -> f64 {
        let dx = x - self.x_cen;
        let dy = y - self.y_cen;
        f64::exp(-self.x_var * dx.powi(2) - self.y_var * dy.powi(2))
    }

    /// Model surface over a `(height, width)` pixel grid
    pub fn surface(&self, shape: (usize, usize)) -> Array2<f64> {
        Array2::from_shape_fn(shape, |(y, x)| self.value_at(x as f64, y as f64))
    }

    /// Conventional standard deviation along `x`, $1/\sqrt{2 v_x}$
    pub fn sigma_x(&self) -> f64 {
        (2.0 * self.x_var).sqrt().recip()
    }

    /// Conventional standard deviation along `y`, $1/\sqrt{2 v_y}$
    pub fn sigma_y(&self) -> f64 {
        (2.0 * self.y_var).sqrt().recip()
    }

    /// Full width at half maximum along `x`
    pub fn fwhm_x(&self) -> f64 {
        2.0 * (std::f64::consts::LN_2 / self.x_var).sqrt()
    }

    /// Full width at half maximum along `y`
    pub fn fwhm_y(&self) -> f64 {
        2.0 * (std::f64::consts::LN_2 / self.y_var).sqrt()
    }

    /// Volume under the Gaussian above background, $\pi A / \sqrt{v_x v_y}$
    pub fn integrated_intensity(&self) -> f64 {
        std::f64::consts::PI * self.amplitude / (self.x_var * self.y_var).sqrt()
    }
}

/// Render `params` over a `(height, width)` grid, see [GaussianParams::surface]
pub fn gaussian_surface(params: &GaussianParams, shape: (usize, usize)) -> Array2<f64> {
    params.surface(shape)
}

/// Which parameters are optimized, the rest is pinned to the starting values
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FitMode {
    /// Center, widths, background and amplitude
    #[default]
    Full,
    /// Widths, background and amplitude, center is pinned
    #[serde(alias = "varsonly")]
    VarsOnly,
    /// Background and amplitude, center and widths are pinned
    #[serde(alias = "bkgndonly", alias = "backgroundonly")]
    BackgroundOnly,
}

impl FitMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::VarsOnly => "varsonly",
            Self::BackgroundOnly => "bkgndonly",
        }
    }
}

impl fmt::Display for FitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FitMode {
    type Err = FitError;

    /// Case-insensitive, `_` and `-` are ignored
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, '_' | '-'))
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match normalized.as_str() {
            "full" => Ok(Self::Full),
            "varsonly" => Ok(Self::VarsOnly),
            "bkgndonly" | "backgroundonly" => Ok(Self::BackgroundOnly),
            _ => Err(FitError::UnknownFitMode(s.to_owned())),
        }
    }
}
