use crate::image::SpotImage;
use crate::layout::{FreeParam, ParameterLayout};
use crate::params::GaussianParams;

use ndarray::{Array1, Array2};

/// What [ResidualModel::evaluate] returns
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResidualOutput {
    /// Per-pixel `image - G`, for least-squares solvers
    Vector,
    /// Sum of squared residuals, for derivative-free minimizers
    Scalar,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Residual {
    Vector(Array1<f64>),
    Scalar(f64),
}

/// Objective shared by all solvers
///
/// Holds the image and the [ParameterLayout], so any optimizer vector can be turned into the
/// full parameter set and compared to the pixels. Residuals are ordered as the row-major
/// flattened image.
#[derive(Clone, Debug)]
pub struct ResidualModel {
    image: SpotImage,
    layout: ParameterLayout,
}

impl ResidualModel {
    pub fn new(image: SpotImage, layout: ParameterLayout) -> Self {
        Self { image, layout }
    }

    pub fn image(&self) -> &SpotImage {
        &self.image
    }

    pub fn layout(&self) -> &ParameterLayout {
        &self.layout
    }

    /// Number of residuals, i.e. pixels
    #[inline]
    pub fn n_residuals(&self) -> usize {
        self.image.len()
    }

    /// Length of the optimizer vector
    #[inline]
    pub fn n_free(&self) -> usize {
        self.layout.n_free()
    }

    pub fn evaluate(&self, free: &[f64], output: ResidualOutput) -> Residual {
        match output {
            ResidualOutput::Vector => Residual::Vector(self.residuals(free)),
            ResidualOutput::Scalar => Residual::Scalar(self.sum_of_squares(free)),
        }
    }

    pub fn residuals(&self, free: &[f64]) -> Array1<f64> {
        let params = self.layout.reconstruct(free);
        let width = self.image.width();
        Array1::from_shape_fn(self.n_residuals(), |i| {
            self.image.flat(i) - params.value_at((i % width) as f64, (i / width) as f64)
        })
    }

    pub fn sum_of_squares(&self, free: &[f64]) -> f64 {
        let params = self.layout.reconstruct(free);
        self.image
            .view()
            .indexed_iter()
            .map(|((y, x), &m)| (m - params.value_at(x as f64, y as f64)).powi(2))
            .sum()
    }

    /// Model value at the pixel with the given row-major flat index
    pub fn model_at(&self, index: usize, free: &[f64]) -> f64 {
        let params = self.layout.reconstruct(free);
        let (x, y) = self.coordinates(index);
        params.value_at(x, y)
    }

    /// Derivatives of the model value at a pixel with respect to the optimizer vector
    ///
    /// Residual derivatives are the same with the opposite sign.
    pub fn model_gradient_at(&self, index: usize, free: &[f64], grad: &mut [f64]) {
        let params = self.layout.reconstruct(free);
        let (x, y) = self.coordinates(index);
        self.gradient(&params, x, y, grad);
    }

    /// Jacobian of [ResidualModel::residuals], `n_residuals x n_free`
    pub fn jacobian(&self, free: &[f64]) -> Array2<f64> {
        let params = self.layout.reconstruct(free);
        let mut jac = Array2::zeros((self.n_residuals(), self.n_free()));
        let mut grad = vec![0.0; self.n_free()];
        for (i, mut row) in jac.rows_mut().into_iter().enumerate() {
            let (x, y) = self.coordinates(i);
            self.gradient(&params, x, y, &mut grad);
            row.iter_mut().zip(&grad).for_each(|(r, &g)| *r = -g);
        }
        jac
    }

    #[inline]
    fn coordinates(&self, index: usize) -> (f64, f64) {
        let width = self.image.width();
        ((index % width) as f64, (index / width) as f64)
    }

    fn gradient(&self, params: &GaussianParams, x: f64, y: f64, grad: &mut [f64]) {
        let dx = x - params.x_cen;
        let dy = y - params.y_cen;
        let e = params.exp_at(x, y);
        let ae = params.amplitude * e;
        for (g, p) in grad.iter_mut().zip(self.layout.free_params()) {
            *g = match p {
                FreeParam::XCen => 2.0 * ae * params.x_var * dx,
                FreeParam::YCen => 2.0 * ae * params.y_var * dy,
                FreeParam::XVar => -ae * dx.powi(2),
                FreeParam::YVar => -ae * dy.powi(2),
                FreeParam::Var => -ae * (dx.powi(2) + dy.powi(2)),
                FreeParam::Background => 1.0,
                FreeParam::Amplitude => e,
            };
        }
    }
}
