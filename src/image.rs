use crate::error::FitError;
use crate::params::GaussianParams;

use ndarray::{Array2, ArrayBase, ArrayView2, Axis, Data, Dimension, Ix2, Zip};

/// Single-frame spot image
///
/// Pixel values are converted to `f64` once on construction, rows are `y` and columns are `x`,
/// both zero-based.
#[derive(Clone, Debug, PartialEq)]
pub struct SpotImage {
    data: Array2<f64>,
}

impl SpotImage {
    /// Build an image from an array of any dimensionality
    ///
    /// Arrays with less than two axes are rejected. Axes after the first two must all have length
    /// one, anything else is a stack of frames and is rejected with [FitError::MultiFrame].
    /// At least one pixel must be finite, otherwise there is nothing to seed the fit from.
    pub fn new<S, D, A>(image: &ArrayBase<S, D>) -> Result<Self, FitError>
    where
        S: Data<Elem = A>,
        D: Dimension,
        A: Copy + Into<f64>,
    {
        let shape = image.shape();
        if shape.len() < 2 {
            return Err(FitError::NotAnImage { ndim: shape.len() });
        }
        if shape[2..].iter().any(|&n| n != 1) {
            return Err(FitError::MultiFrame {
                shape: shape.to_vec(),
            });
        }
        let (height, width) = (shape[0], shape[1]);
        if height == 0 || width == 0 {
            return Err(FitError::EmptyImage { height, width });
        }

        let mut view = image.view().into_dyn();
        while view.ndim() > 2 {
            view = view.index_axis_move(Axis(2), 0);
        }
        let view = view
            .into_dimensionality::<Ix2>()
            .map_err(|_| FitError::NotAnImage { ndim: shape.len() })?;
        let data: Array2<f64> = view.mapv(Into::into);
        if !data.iter().any(|v| v.is_finite()) {
            return Err(FitError::NoFinitePixels { height, width });
        }
        Ok(Self { data })
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.data.nrows()
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    /// `(height, width)`
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always false, empty images are rejected on construction
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn view(&self) -> ArrayView2<'_, f64> {
        self.data.view()
    }

    /// Smallest pixel value, NaN pixels are skipped
    pub fn min(&self) -> f64 {
        self.data.fold(f64::INFINITY, |acc, &x| acc.min(x))
    }

    /// Largest pixel value, NaN pixels are skipped
    pub fn max(&self) -> f64 {
        self.data.fold(f64::NEG_INFINITY, |acc, &x| acc.max(x))
    }

    /// Pixel value by row-major flat index
    #[inline]
    pub(crate) fn flat(&self, index: usize) -> f64 {
        let width = self.width();
        self.data[(index / width, index % width)]
    }

    /// Sum of squared deviations of the pixels from their mean, NaN for images with NaN pixels
    pub fn total_sum_of_squares(&self) -> f64 {
        let mean = self.data.sum() / self.len() as f64;
        self.data.fold(0.0, |acc, &m| acc + (m - mean).powi(2))
    }

    /// `image - G` for every pixel, the residual surface of a debug plot
    pub fn residual_image(&self, params: &GaussianParams) -> Array2<f64> {
        let mut residual = params.surface(self.shape());
        Zip::from(&mut residual)
            .and(&self.data)
            .for_each(|g, &m| *g = m - *g);
        residual
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ndarray::{Array, Array3, array};

    #[test]
    fn from_integer_pixels() {
        let a = array![[0u16, 1, 2], [3, 4, 5]];
        let image = SpotImage::new(&a).unwrap();
        assert_eq!(image.shape(), (2, 3));
        assert_eq!(image.min(), 0.0);
        assert_eq!(image.max(), 5.0);
        assert_eq!(image.flat(4), 4.0);
    }

    #[test]
    fn transposed_view_keeps_logical_order() {
        let a = array![[0.0f32, 1.0], [2.0, 3.0], [4.0, 5.0]];
        let t = a.t();
        let image = SpotImage::new(&t).unwrap();
        assert_eq!(image.shape(), (2, 3));
        assert_eq!(image.view(), array![[0.0, 2.0, 4.0], [1.0, 3.0, 5.0]]);
    }

    #[test]
    fn trailing_singleton_axis_is_single_frame() {
        let a = Array3::<f64>::from_shape_fn((4, 5, 1), |(y, x, _)| (y * 5 + x) as f64);
        let image = SpotImage::new(&a).unwrap();
        assert_eq!(image.shape(), (4, 5));
        assert_eq!(image.flat(7), 7.0);
    }

    #[test]
    fn movie_is_rejected() {
        let a = Array3::<f64>::zeros((4, 5, 3));
        assert_eq!(
            SpotImage::new(&a),
            Err(FitError::MultiFrame {
                shape: vec![4, 5, 3]
            })
        );
    }

    #[test]
    fn one_dimensional_is_rejected() {
        let a = Array::linspace(0.0, 1.0, 10);
        assert_eq!(SpotImage::new(&a), Err(FitError::NotAnImage { ndim: 1 }));
    }

    #[test]
    fn empty_is_rejected() {
        let a = Array2::<f64>::zeros((0, 4));
        assert_eq!(
            SpotImage::new(&a),
            Err(FitError::EmptyImage {
                height: 0,
                width: 4
            })
        );
    }

    #[test]
    fn no_finite_pixels_is_rejected() {
        let a = Array2::from_elem((3, 4), f64::NAN);
        assert_eq!(
            SpotImage::new(&a),
            Err(FitError::NoFinitePixels {
                height: 3,
                width: 4
            })
        );
        let a = array![[f64::INFINITY, f64::NAN], [f64::NEG_INFINITY, f64::NAN]];
        assert!(matches!(
            SpotImage::new(&a),
            Err(FitError::NoFinitePixels { .. })
        ));
    }

    #[test]
    fn total_sum_of_squares_about_mean() {
        let image = SpotImage::new(&array![[1.0, 2.0], [3.0, 6.0]]).unwrap();
        assert_eq!(image.total_sum_of_squares(), 14.0);
    }

    #[test]
    fn nan_pixels_are_skipped_by_min_max() {
        let a = array![[f64::NAN, 1.0], [2.0, 3.0]];
        let image = SpotImage::new(&a).unwrap();
        assert_eq!(image.min(), 1.0);
        assert_eq!(image.max(), 3.0);
    }

    #[test]
    fn residual_of_exact_model_is_zero() {
        let params = GaussianParams::new(2.0, 3.0, 0.3, 0.2, 5.0, 40.0);
        let image = SpotImage::new(&params.surface((6, 5))).unwrap();
        let residual = image.residual_image(&params);
        assert!(residual.iter().all(|&r| r == 0.0));
    }
}
