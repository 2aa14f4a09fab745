use thiserror::Error;

/// Errors raised by pattern construction, extraction and matching.
///
/// Border rejection of keypoints and out-of-image samples are not errors;
/// they shrink the output or yield a sentinel intensity instead.
#[derive(Debug, Error)]
pub enum BriskError {
    #[error("ring radius and point-count lists differ in length ({radii} vs {counts})")]
    RingMismatch { radii: usize, counts: usize },

    #[error("pattern definition has no points")]
    EmptyPattern,

    #[error("serialized pattern declares {actual} short pairs, expected {expected}")]
    ShortPairCount { expected: usize, actual: usize },

    #[error("malformed pattern stream: {0}")]
    PatternParse(String),

    #[error("pair ({i}, {j}) references a point outside the {points}-point pattern")]
    PairIndexOutOfRange { i: usize, j: usize, points: usize },

    #[error("short-pair index remapping is not a permutation of 0..{expected}")]
    InvalidIndexRemap { expected: usize },

    #[error("unsupported extractor version {0} (expected 1 or 2)")]
    UnsupportedVersion(u32),

    #[error("version 2 extraction requires a serialized pattern file")]
    MissingPatternFile,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid image: {0}")]
    InvalidImage(String),

    #[error("unsupported image format {0}: expected single-channel 8-bit or 16-bit")]
    UnsupportedImageFormat(String),

    #[error("integral image is {actual_width}x{actual_height}, expected {expected_width}x{expected_height}")]
    IntegralMismatch {
        expected_width: usize,
        expected_height: usize,
        actual_width: usize,
        actual_height: usize,
    },

    #[error("descriptor length {0} bytes is not a positive multiple of 16")]
    InvalidDescriptorLength(usize),

    #[error("descriptor lengths differ ({0} vs {1} bytes)")]
    DescriptorLengthMismatch(usize, usize),

    #[error("query descriptors are {actual} bytes wide, matcher expects {expected}")]
    QueryWidthMismatch { expected: usize, actual: usize },

    #[error("train set {set} is {actual} bytes wide, query rows are {expected}")]
    TrainWidthMismatch { set: usize, expected: usize, actual: usize },

    #[error("invalid match mask: {0}")]
    InvalidMask(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type BriskResult<T> = Result<T, BriskError>;
