pub mod hamming;
pub mod matcher;
pub mod simd;

pub use hamming::{check_width, distance, distance_blocks, Backend, BLOCK_BYTES};
pub use matcher::{BruteForceMatcher, DescriptorMatcher, MatchMask};
