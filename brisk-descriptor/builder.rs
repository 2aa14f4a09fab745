use crate::config::{BriskVersion, ExtractorConfig};
use crate::extractor::BriskExtractor;
use crate::pattern::Discretization;
use brisk_core::BriskResult;
use std::path::PathBuf;

/// Builder for creating a `BriskExtractor`
#[derive(Debug, Clone)]
pub struct ExtractorBuilder {
    config: ExtractorConfig,
}

impl Default for ExtractorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractorBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self {
            config: ExtractorConfig::new(),
        }
    }

    /// Create builder from existing configuration
    pub fn from_config(config: ExtractorConfig) -> Self {
        Self { config }
    }

    /// Enable or disable orientation estimation
    pub fn rotation_invariant(mut self, enable: bool) -> Self {
        self.config.rotation_invariant = enable;
        self
    }

    /// Enable or disable size-dependent scale selection
    pub fn scale_invariant(mut self, enable: bool) -> Self {
        self.config.scale_invariant = enable;
        self
    }

    /// Set the multiplier on pattern radii and sigmas
    pub fn pattern_scale(mut self, scale: f32) -> Self {
        self.config.pattern_scale = scale;
        self
    }

    /// Select the pattern version
    pub fn version(mut self, version: BriskVersion) -> Self {
        self.config.version = version;
        self
    }

    /// Read the pattern from a serialized file (implies version 2)
    pub fn pattern_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config.version = BriskVersion::V2;
        self.config.pattern_file = Some(path.into());
        self
    }

    /// Set the number of discrete scales
    pub fn scales(mut self, scales: usize) -> Self {
        self.config.discretization.scales = scales;
        self
    }

    /// Set the number of discrete rotations
    pub fn rotations(mut self, rotations: usize) -> Self {
        self.config.discretization.rotations = rotations;
        self
    }

    /// Set the ratio between the largest and smallest scale
    pub fn scale_range(mut self, range: f32) -> Self {
        self.config.discretization.scale_range = range;
        self
    }

    pub fn discretization(mut self, discretization: Discretization) -> Self {
        self.config.discretization = discretization;
        self
    }

    /// Set the number of threads for parallel processing
    pub fn threads(mut self, n_threads: usize) -> Self {
        self.config.n_threads = n_threads;
        self
    }

    /// Apply the upright preset
    pub fn preset_upright(mut self) -> Self {
        self.config.rotation_invariant = false;
        self
    }

    /// Apply the single-scale preset
    pub fn preset_single_scale(mut self) -> Self {
        self.config.scale_invariant = false;
        self
    }

    /// Apply the compact preset
    pub fn preset_compact(mut self) -> Self {
        self.config.discretization = ExtractorConfig::compact_preset().discretization;
        self
    }

    /// Validated configuration without building the pattern table
    pub fn to_config(self) -> BriskResult<ExtractorConfig> {
        self.config.validate()?;
        Ok(self.config)
    }

    /// Build the `BriskExtractor`
    pub fn build(self) -> BriskResult<BriskExtractor> {
        BriskExtractor::new(&self.config)
    }

    /// Generate summary of current configuration
    pub fn summary(&self) -> String {
        format!(
            "ExtractorBuilder: v{}, pattern_scale={:.2}, scales={}, rotations={}, range={:.1}, threads={}, features=[Rotation:{}, Scale:{}]{}",
            u32::from(self.config.version),
            self.config.pattern_scale,
            self.config.discretization.scales,
            self.config.discretization.rotations,
            self.config.discretization.scale_range,
            self.config.n_threads,
            self.config.rotation_invariant,
            self.config.scale_invariant,
            self.config
                .pattern_file
                .as_ref()
                .map(|p| format!(", pattern={}", p.display()))
                .unwrap_or_default()
        )
    }
}
