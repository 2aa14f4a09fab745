pub mod builder;
pub mod config;
pub mod extractor;
pub mod orientation;
pub mod pattern;
pub mod sampler;
pub mod warp;

pub use builder::ExtractorBuilder;
pub use config::{BriskVersion, ExtractorConfig};
pub use extractor::{pack_bits, BriskExtractor, DescriptorExtractor};
pub use pattern::{Discretization, LongPair, PatternPoint, PatternTable, RingPattern, ShortPair};
pub use sampler::{smoothed_intensity, Sampler, INTENSITY_SCALE, OUT_OF_BOUNDS};
pub use warp::{ConstantWarp, Warp, WarpField};
