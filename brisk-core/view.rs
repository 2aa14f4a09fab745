use crate::error::{BriskError, BriskResult};
use image::{DynamicImage, GrayImage};

/// Single-channel pixel depth the sampler can read.
pub trait Pixel: Copy + Send + Sync + 'static {
    /// Bits per pixel, reported in errors and summaries.
    const BITS: u32;

    fn widen(self) -> i64;
}

impl Pixel for u8 {
    const BITS: u32 = 8;

    #[inline(always)]
    fn widen(self) -> i64 {
        self as i64
    }
}

impl Pixel for u16 {
    const BITS: u32 = 16;

    #[inline(always)]
    fn widen(self) -> i64 {
        self as i64
    }
}

/// Borrowed row-major single-channel image with a row stride in pixels.
#[derive(Debug, Clone, Copy)]
pub struct ImageView<'a, P> {
    data: &'a [P],
    width: usize,
    height: usize,
    stride: usize,
}

impl<'a, P: Pixel> ImageView<'a, P> {
    /// Densely packed view (`stride == width`).
    pub fn new(data: &'a [P], width: usize, height: usize) -> BriskResult<Self> {
        Self::with_stride(data, width, height, width)
    }

    pub fn with_stride(data: &'a [P], width: usize, height: usize, stride: usize) -> BriskResult<Self> {
        if width == 0 || height == 0 {
            return Err(BriskError::InvalidImage(format!(
                "dimensions {}x{} must be non-zero",
                width, height
            )));
        }
        if stride < width {
            return Err(BriskError::InvalidImage(format!(
                "stride {} is smaller than width {}",
                stride, width
            )));
        }
        let required = stride * (height - 1) + width;
        if data.len() < required {
            return Err(BriskError::InvalidImage(format!(
                "buffer holds {} pixels, {}x{} with stride {} needs {}",
                data.len(),
                width,
                height,
                stride,
                required
            )));
        }
        Ok(Self { data, width, height, stride })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Pixel value at column `x`, row `y`. Callers bounds-check.
    #[inline(always)]
    pub fn at(&self, x: usize, y: usize) -> i64 {
        self.data[y * self.stride + x].widen()
    }

    pub fn row(&self, y: usize) -> &'a [P] {
        let start = y * self.stride;
        &self.data[start..start + self.width]
    }
}

/// An 8-bit or 16-bit grayscale image accepted by the extractor.
#[derive(Debug, Clone, Copy)]
pub enum ImageRef<'a> {
    Gray8(ImageView<'a, u8>),
    Gray16(ImageView<'a, u16>),
}

impl<'a> ImageRef<'a> {
    pub fn width(&self) -> usize {
        match self {
            ImageRef::Gray8(v) => v.width(),
            ImageRef::Gray16(v) => v.width(),
        }
    }

    pub fn height(&self) -> usize {
        match self {
            ImageRef::Gray8(v) => v.height(),
            ImageRef::Gray16(v) => v.height(),
        }
    }

    pub fn bit_depth(&self) -> u32 {
        match self {
            ImageRef::Gray8(_) => <u8 as Pixel>::BITS,
            ImageRef::Gray16(_) => <u16 as Pixel>::BITS,
        }
    }
}

impl<'a> From<ImageView<'a, u8>> for ImageRef<'a> {
    fn from(view: ImageView<'a, u8>) -> Self {
        ImageRef::Gray8(view)
    }
}

impl<'a> From<ImageView<'a, u16>> for ImageRef<'a> {
    fn from(view: ImageView<'a, u16>) -> Self {
        ImageRef::Gray16(view)
    }
}

impl<'a> TryFrom<&'a GrayImage> for ImageRef<'a> {
    type Error = BriskError;

    fn try_from(img: &'a GrayImage) -> BriskResult<Self> {
        let (w, h) = img.dimensions();
        Ok(ImageRef::Gray8(ImageView::new(img.as_raw(), w as usize, h as usize)?))
    }
}

impl<'a> TryFrom<&'a DynamicImage> for ImageRef<'a> {
    type Error = BriskError;

    /// Only `Luma8` and `Luma16` images are accepted; anything else is a
    /// precondition violation rather than something to convert silently.
    fn try_from(img: &'a DynamicImage) -> BriskResult<Self> {
        match img {
            DynamicImage::ImageLuma8(buf) => ImageRef::try_from(buf),
            DynamicImage::ImageLuma16(buf) => {
                let (w, h) = buf.dimensions();
                Ok(ImageRef::Gray16(ImageView::new(buf.as_raw(), w as usize, h as usize)?))
            }
            other => Err(BriskError::UnsupportedImageFormat(format!("{:?}", other.color()))),
        }
    }
}

/// Prefix-sum table with one leading zero row and column:
/// `at(x, y)` is the sum of all pixels above and left of `(x, y)`.
#[derive(Debug, Clone)]
pub struct IntegralImage {
    data: Vec<u64>,
    width: usize,
    height: usize,
}

impl IntegralImage {
    pub fn compute<P: Pixel>(image: &ImageView<'_, P>) -> Self {
        let (w, h) = (image.width(), image.height());
        let cols = w + 1;
        let mut data = vec![0u64; cols * (h + 1)];
        for y in 0..h {
            let mut row_sum = 0u64;
            for (x, &p) in image.row(y).iter().enumerate() {
                row_sum += p.widen() as u64;
                data[(y + 1) * cols + x + 1] = data[y * cols + x + 1] + row_sum;
            }
        }
        Self { data, width: w, height: h }
    }

    pub fn from_image(image: &ImageRef<'_>) -> Self {
        match image {
            ImageRef::Gray8(v) => Self::compute(v),
            ImageRef::Gray16(v) => Self::compute(v),
        }
    }

    /// Wraps a table computed elsewhere for an image of `width`x`height`.
    pub fn from_raw(width: usize, height: usize, data: Vec<u64>) -> BriskResult<Self> {
        let expected = (width + 1) * (height + 1);
        if data.len() != expected {
            return Err(BriskError::InvalidImage(format!(
                "integral table holds {} entries, {}x{} image needs {}",
                data.len(),
                width,
                height,
                expected
            )));
        }
        Ok(Self { data, width, height })
    }

    /// Width of the source image (the table is one wider).
    pub fn image_width(&self) -> usize {
        self.width
    }

    pub fn image_height(&self) -> usize {
        self.height
    }

    pub fn ensure_matches(&self, width: usize, height: usize) -> BriskResult<()> {
        if self.width != width || self.height != height {
            return Err(BriskError::IntegralMismatch {
                expected_width: width + 1,
                expected_height: height + 1,
                actual_width: self.width + 1,
                actual_height: self.height + 1,
            });
        }
        Ok(())
    }

    #[inline(always)]
    pub fn at(&self, x: usize, y: usize) -> i64 {
        self.data[y * (self.width + 1) + x] as i64
    }

    /// Sum of the pixels in columns `x0..x1` and rows `y0..y1`.
    #[inline(always)]
    pub fn rect_sum(&self, x0: usize, y0: usize, x1: usize, y1: usize) -> i64 {
        self.at(x1, y1) - self.at(x1, y0) - self.at(x0, y1) + self.at(x0, y0)
    }
}
