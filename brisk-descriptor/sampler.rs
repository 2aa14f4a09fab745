use crate::pattern::PatternTable;
use crate::warp::Warp;
use brisk_core::{BriskResult, ImageView, IntegralImage, Pixel};

/// Fixed-point factor of every smoothed intensity.
pub const INTENSITY_SCALE: i32 = 1024;

/// Returned for samples whose support leaves the image.
pub const OUT_OF_BOUNDS: i32 = -1;

/// Below this sigma a sample is a bilinear interpolation instead of an area mean.
pub const BILINEAR_SIGMA: f32 = 0.5;

/// Reads smoothed pattern intensities around keypoints of one image.
#[derive(Debug, Clone, Copy)]
pub struct Sampler<'a, P> {
    image: ImageView<'a, P>,
    integral: &'a IntegralImage,
    table: &'a PatternTable,
}

impl<'a, P: Pixel> Sampler<'a, P> {
    pub fn new(image: ImageView<'a, P>, integral: &'a IntegralImage, table: &'a PatternTable) -> BriskResult<Self> {
        integral.ensure_matches(image.width(), image.height())?;
        Ok(Self { image, integral, table })
    }

    /// Intensity of pattern point `point` at (`scale`, `rot`) around `(key_x, key_y)`.
    #[inline]
    pub fn sample(&self, key_x: f32, key_y: f32, scale: usize, rot: usize, point: usize, warp: Option<&Warp>) -> i32 {
        let p = self.table.point(scale, rot, point);
        let p = match warp {
            Some(w) => w.apply(p),
            None => p,
        };
        smoothed_intensity(&self.image, self.integral, key_x + p.x, key_y + p.y, p.sigma)
    }

    /// Samples every pattern point into `out`.
    pub fn sample_all(&self, key_x: f32, key_y: f32, scale: usize, rot: usize, warp: Option<&Warp>, out: &mut [i32]) {
        for (point, value) in out.iter_mut().enumerate().take(self.table.n_points()) {
            *value = self.sample(key_x, key_y, scale, rot, point, warp);
        }
    }
}

/// Mean intensity (x1024) of the box of half-width `sigma` centred on
/// `(xf, yf)`, or the bilinear interpolation when `sigma < 0.5`.
///
/// Returns [`OUT_OF_BOUNDS`] when the support does not fit in the image.
pub fn smoothed_intensity<P: Pixel>(image: &ImageView<'_, P>, integral: &IntegralImage, xf: f32, yf: f32, sigma: f32) -> i32 {
    if sigma < BILINEAR_SIGMA {
        return bilinear(image, xf, yf);
    }
    match AreaWindow::new(image.width(), image.height(), xf, yf, sigma) {
        Some(window) if window.dx + window.dy > 2 => window.integral_sum(image, integral),
        Some(window) => window.pixel_sum(image),
        None => OUT_OF_BOUNDS,
    }
}

fn bilinear<P: Pixel>(image: &ImageView<'_, P>, xf: f32, yf: f32) -> i32 {
    let x = xf.floor();
    let y = yf.floor();
    if x < 0.0 || y < 0.0 || x > (image.width() as f32 - 2.0) || y > (image.height() as f32 - 2.0) {
        return OUT_OF_BOUNDS;
    }
    let (xi, yi) = (x as usize, y as usize);
    let scale = INTENSITY_SCALE as i64;
    let r_x = ((xf - x) * INTENSITY_SCALE as f32) as i64;
    let r_y = ((yf - y) * INTENSITY_SCALE as f32) as i64;
    let r_x_1 = scale - r_x;
    let r_y_1 = scale - r_y;

    let ret = r_x_1 * r_y_1 * image.at(xi, yi)
        + r_x * r_y_1 * image.at(xi + 1, yi)
        + r_x * r_y * image.at(xi + 1, yi + 1)
        + r_x_1 * r_y * image.at(xi, yi + 1);
    (ret / scale) as i32
}

/// Pixel footprint and fixed-point weights of one area sample.
///
/// The box covers whole pixels `x_left+1 ..= x_left+dx` (likewise in y)
/// plus a partially weighted border ring.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct AreaWindow {
    x_left: usize,
    y_top: usize,
    pub(crate) dx: usize,
    pub(crate) dy: usize,
    scaling: i64,
    scaling2: i64,
    corner_a: i64,
    corner_b: i64,
    corner_c: i64,
    corner_d: i64,
    left: i64,
    right: i64,
    top: i64,
    bottom: i64,
}

impl AreaWindow {
    pub(crate) fn new(width: usize, height: usize, xf: f32, yf: f32, sigma: f32) -> Option<Self> {
        let area = 4.0 * sigma * sigma;
        let x_1 = xf - sigma;
        let x1 = xf + sigma;
        let y_1 = yf - sigma;
        let y1 = yf + sigma;
        let max_x = (width - 1) as f32;
        let max_y = (height - 1) as f32;
        if x_1 < 0.0 || y_1 < 0.0 || x1 > max_x || y1 > max_y {
            return None;
        }

        // Boxes wider than 2048 px keep unit weights instead of truncating to zero.
        let scaling = ((4_194_304.0 / area) as i64).max(1);
        let scaling2 = (scaling as f32 * area / 1024.0) as i64;
        if scaling2 == 0 {
            return None;
        }

        let x_left = (x_1 + 0.5) as usize;
        let y_top = (y_1 + 0.5) as usize;
        // Rounding can collapse a unit-wide box onto a single pixel column.
        let x_right = ((x1 + 0.5) as usize).max(x_left + 1);
        let y_bottom = ((y1 + 0.5) as usize).max(y_top + 1);
        if x_right >= width || y_bottom >= height {
            return None;
        }

        let r_x_1 = x_left as f32 - x_1 + 0.5;
        let r_y_1 = y_top as f32 - y_1 + 0.5;
        let r_x1 = x1 - x_right as f32 + 0.5;
        let r_y1 = y1 - y_bottom as f32 + 0.5;
        let s = scaling as f32;

        Some(Self {
            x_left,
            y_top,
            dx: x_right - x_left - 1,
            dy: y_bottom - y_top - 1,
            scaling,
            scaling2,
            corner_a: (r_x_1 * r_y_1 * s) as i64,
            corner_b: (r_x1 * r_y_1 * s) as i64,
            corner_c: (r_x1 * r_y1 * s) as i64,
            corner_d: (r_x_1 * r_y1 * s) as i64,
            left: (r_x_1 * s) as i64,
            right: (r_x1 * s) as i64,
            top: (r_y_1 * s) as i64,
            bottom: (r_y1 * s) as i64,
        })
    }

    fn x_right(&self) -> usize {
        self.x_left + self.dx + 1
    }

    fn y_bottom(&self) -> usize {
        self.y_top + self.dy + 1
    }

    fn corners<P: Pixel>(&self, image: &ImageView<'_, P>) -> i64 {
        let (xl, xr, yt, yb) = (self.x_left, self.x_right(), self.y_top, self.y_bottom());
        self.corner_a * image.at(xl, yt)
            + self.corner_b * image.at(xr, yt)
            + self.corner_c * image.at(xr, yb)
            + self.corner_d * image.at(xl, yb)
    }

    /// Weighted sum from box sums over the integral image.
    pub(crate) fn integral_sum<P: Pixel>(&self, image: &ImageView<'_, P>, integral: &IntegralImage) -> i32 {
        let (xl, xr, yt, yb) = (self.x_left, self.x_right(), self.y_top, self.y_bottom());
        let mut ret = self.corners(image);
        ret += integral.rect_sum(xl + 1, yt, xr, yt + 1) * self.top;
        ret += integral.rect_sum(xl + 1, yt + 1, xr, yb) * self.scaling;
        ret += integral.rect_sum(xl, yt + 1, xl + 1, yb) * self.left;
        ret += integral.rect_sum(xr, yt + 1, xr + 1, yb) * self.right;
        ret += integral.rect_sum(xl + 1, yb, xr, yb + 1) * self.bottom;
        (ret / self.scaling2) as i32
    }

    /// Same weighted sum, walking the pixels directly.
    pub(crate) fn pixel_sum<P: Pixel>(&self, image: &ImageView<'_, P>) -> i32 {
        let (xl, xr, yt, yb) = (self.x_left, self.x_right(), self.y_top, self.y_bottom());
        let mut ret = self.corners(image);

        let row_sum = |y: usize| -> i64 { (xl + 1..xr).map(|x| image.at(x, y)).sum() };
        ret += row_sum(yt) * self.top;
        ret += row_sum(yb) * self.bottom;
        for y in yt + 1..yb {
            ret += row_sum(y) * self.scaling;
            ret += image.at(xl, y) * self.left;
            ret += image.at(xr, y) * self.right;
        }
        (ret / self.scaling2) as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::{Discretization, RingPattern};
    use proptest::prelude::*;

    fn create_test_image(width: usize, height: usize) -> Vec<u8> {
        (0..width * height)
            .map(|i| {
                let (x, y) = (i % width, i / width);
                ((x * 13 + y * 7 + (x * y) % 11) % 256) as u8
            })
            .collect()
    }

    #[test]
    fn test_constant_image() {
        let data = vec![100u8; 40 * 40];
        let view = ImageView::new(&data, 40, 40).unwrap();
        let integral = IntegralImage::compute(&view);
        for &sigma in &[0.2f32, 0.6, 1.0, 2.5, 6.0] {
            let v = smoothed_intensity(&view, &integral, 20.3, 19.7, sigma);
            assert!((v as f32 / INTENSITY_SCALE as f32 - 100.0).abs() < 0.5, "sigma {sigma}: {v}");
        }
    }

    #[test]
    fn test_bilinear_interpolation() {
        let data = create_test_image(10, 10);
        let view = ImageView::new(&data, 10, 10).unwrap();
        let integral = IntegralImage::compute(&view);

        let v = smoothed_intensity(&view, &integral, 4.0, 5.0, 0.0);
        assert_eq!(v, view.at(4, 5) as i32 * INTENSITY_SCALE);

        let v = smoothed_intensity(&view, &integral, 4.5, 5.0, 0.3);
        let mean = (view.at(4, 5) + view.at(5, 5)) as i32 * INTENSITY_SCALE / 2;
        assert_eq!(v, mean);
    }

    #[test]
    fn test_out_of_bounds() {
        let data = create_test_image(10, 10);
        let view = ImageView::new(&data, 10, 10).unwrap();
        let integral = IntegralImage::compute(&view);

        assert_eq!(smoothed_intensity(&view, &integral, -0.5, 3.0, 0.0), OUT_OF_BOUNDS);
        assert_eq!(smoothed_intensity(&view, &integral, 9.2, 3.0, 0.0), OUT_OF_BOUNDS);
        assert_eq!(smoothed_intensity(&view, &integral, 1.0, 5.0, 1.5), OUT_OF_BOUNDS);
        assert_eq!(smoothed_intensity(&view, &integral, 5.0, 8.0, 1.5), OUT_OF_BOUNDS);
        assert_ne!(smoothed_intensity(&view, &integral, 5.0, 5.0, 1.5), OUT_OF_BOUNDS);
    }

    #[test]
    fn test_very_large_box_is_sampled() {
        let side = 2100;
        let data = vec![100u8; side * side];
        let view = ImageView::new(&data, side, side).unwrap();
        let integral = IntegralImage::compute(&view);
        let v = smoothed_intensity(&view, &integral, 1050.0, 1050.0, 1030.0);
        assert_ne!(v, OUT_OF_BOUNDS);
        assert!((v - 100 * INTENSITY_SCALE).abs() < INTENSITY_SCALE, "{v}");
    }

    #[test]
    fn test_unit_box_averages_one_pixel() {
        let data = create_test_image(10, 10);
        let view = ImageView::new(&data, 10, 10).unwrap();
        let integral = IntegralImage::compute(&view);
        // Box [3.5, 4.5]^2 centred on pixel (4, 4).
        let v = smoothed_intensity(&view, &integral, 4.0, 4.0, 0.5);
        assert!((v - view.at(4, 4) as i32 * INTENSITY_SCALE).abs() <= 2);
    }

    #[test]
    fn test_sixteen_bit_scales_linearly() {
        let narrow = create_test_image(16, 16);
        let wide: Vec<u16> = narrow.iter().map(|&v| v as u16 * 257).collect();
        let v8 = ImageView::new(&narrow, 16, 16).unwrap();
        let v16 = ImageView::new(&wide, 16, 16).unwrap();
        let (i8_, i16_) = (IntegralImage::compute(&v8), IntegralImage::compute(&v16));
        for &(x, y, s) in &[(7.3f32, 8.1f32, 0.3f32), (7.5, 7.5, 2.0), (8.2, 6.9, 4.4)] {
            let a = smoothed_intensity(&v8, &i8_, x, y, s) as i64;
            let b = smoothed_intensity(&v16, &i16_, x, y, s) as i64;
            assert!(b >= 257 * a && b < 257 * (a + 1), "{a} vs {b}");
        }
    }

    #[test]
    fn test_sampler_warp() {
        let disc = Discretization {
            scales: 4,
            rotations: 8,
            scale_range: 30.0,
        };
        let table = PatternTable::from_rings(&RingPattern::standard(1.0), disc).unwrap();
        let data = create_test_image(64, 64);
        let view = ImageView::new(&data, 64, 64).unwrap();
        let integral = IntegralImage::compute(&view);
        let sampler = Sampler::new(view, &integral, &table).unwrap();

        let mut plain = vec![0; table.n_points()];
        let mut warped = vec![0; table.n_points()];
        sampler.sample_all(32.0, 32.0, 0, 0, None, &mut plain);
        sampler.sample_all(32.0, 32.0, 0, 0, Some(&Warp::identity()), &mut warped);
        assert_eq!(plain, warped);

        // Doubling the warp reaches the same offsets as scale factor two.
        let double = Warp::new([2.0, 0.0, 0.0, 2.0]);
        let p = double.apply(table.point(0, 0, 30));
        let direct = smoothed_intensity(&view, &integral, 32.0 + p.x, 32.0 + p.y, p.sigma);
        assert_eq!(sampler.sample(32.0, 32.0, 0, 0, 30, Some(&double)), direct);
    }

    #[test]
    fn test_sampler_rejects_foreign_integral() {
        let disc = Discretization {
            scales: 2,
            rotations: 4,
            scale_range: 30.0,
        };
        let table = PatternTable::from_rings(&RingPattern::standard(1.0), disc).unwrap();
        let data = create_test_image(20, 20);
        let other = create_test_image(21, 20);
        let view = ImageView::new(&data, 20, 20).unwrap();
        let integral = IntegralImage::compute(&ImageView::new(&other, 21, 20).unwrap());
        assert!(Sampler::new(view, &integral, &table).is_err());
    }

    proptest! {
        #[test]
        fn prop_integral_and_pixel_paths_agree(
            x in 0.0f32..40.0,
            y in 0.0f32..40.0,
            sigma in 0.5f32..8.0,
        ) {
            let data = create_test_image(48, 48);
            let view = ImageView::new(&data, 48, 48).unwrap();
            let integral = IntegralImage::compute(&view);
            if let Some(window) = AreaWindow::new(48, 48, x, y, sigma) {
                prop_assert_eq!(window.integral_sum(&view, &integral), window.pixel_sum(&view));
            }
        }

        #[test]
        fn prop_samples_stay_in_range(
            x in -5.0f32..50.0,
            y in -5.0f32..50.0,
            sigma in 0.0f32..6.0,
        ) {
            let data = create_test_image(40, 40);
            let view = ImageView::new(&data, 40, 40).unwrap();
            let integral = IntegralImage::compute(&view);
            let v = smoothed_intensity(&view, &integral, x, y, sigma);
            prop_assert!(v == OUT_OF_BOUNDS || (0..=255 * INTENSITY_SCALE + 256).contains(&v));
        }
    }
}
