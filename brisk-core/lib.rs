pub mod error;
pub mod view;

pub use error::{BriskError, BriskResult};
pub use view::{ImageRef, ImageView, IntegralImage, Pixel};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Key-point ≙ detector location + characteristic size + orientation (degrees)
///
/// `angle == None` asks the extractor to estimate the orientation; the
/// estimate is written back into the keypoint.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub size: f32,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub angle: Option<f32>,
}

impl Keypoint {
    pub fn new(x: f32, y: f32, size: f32) -> Self {
        Self { x, y, size, angle: None }
    }

    pub fn with_angle(mut self, degrees: f32) -> Self {
        self.angle = Some(degrees);
        self
    }
}

/// Row-major matrix of packed binary descriptors, one row per keypoint.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Descriptors {
    rows: usize,
    cols: usize,
    data: Vec<u8>,
}

impl Descriptors {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self { rows, cols, data: vec![0; rows * cols] }
    }

    pub fn empty(cols: usize) -> Self {
        Self::zeros(0, cols)
    }

    /// Wraps `data` as rows of `cols` bytes.
    pub fn from_vec(cols: usize, data: Vec<u8>) -> BriskResult<Self> {
        if cols == 0 {
            if data.is_empty() {
                return Ok(Self::empty(0));
            }
            return Err(BriskError::InvalidDescriptorLength(0));
        }
        if data.len() % cols != 0 {
            return Err(BriskError::DescriptorLengthMismatch(data.len(), cols));
        }
        Ok(Self { rows: data.len() / cols, cols, data })
    }

    /// Checks `rows * cols` against the stored bytes, e.g. after deserializing.
    pub fn validate(&self) -> BriskResult<()> {
        if self.rows * self.cols != self.data.len() {
            return Err(BriskError::DescriptorLengthMismatch(self.data.len(), self.rows * self.cols));
        }
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Bytes per descriptor.
    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn row(&self, i: usize) -> &[u8] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    pub fn row_mut(&mut self, i: usize) -> &mut [u8] {
        &mut self.data[i * self.cols..(i + 1) * self.cols]
    }

    pub fn iter_rows(&self) -> impl ExactSizeIterator<Item = &[u8]> + '_ {
        self.data.chunks_exact(self.cols.max(1)).take(self.rows)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn push_row(&mut self, row: &[u8]) -> BriskResult<()> {
        if row.len() != self.cols {
            return Err(BriskError::DescriptorLengthMismatch(row.len(), self.cols));
        }
        self.data.extend_from_slice(row);
        self.rows += 1;
        Ok(())
    }
}

/// One correspondence between a query row and a row of train set `img_idx`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Match {
    pub query_idx: usize,
    pub train_idx: usize,
    pub img_idx: usize,
    pub distance: u32,
}

/// Default worker count: every available core.
pub fn default_threads() -> usize {
    num_cpus::get().max(1)
}

/// Initialize Rayon thread pool with the specified number of threads
pub fn init_thread_pool(n_threads: usize) -> BriskResult<()> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(n_threads)
        .build_global()?;
    Ok(())
}
