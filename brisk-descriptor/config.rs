use crate::builder::ExtractorBuilder;
use crate::pattern::Discretization;
use brisk_core::{BriskError, BriskResult};
use std::path::PathBuf;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Which pattern definition the extractor samples with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u32", into = "u32"))]
pub enum BriskVersion {
    /// Analytic five-ring pattern.
    #[default]
    V1,
    /// Serialized pattern read from a file.
    V2,
}

impl TryFrom<u32> for BriskVersion {
    type Error = BriskError;

    fn try_from(version: u32) -> Result<Self, Self::Error> {
        match version {
            1 => Ok(Self::V1),
            2 => Ok(Self::V2),
            other => Err(BriskError::UnsupportedVersion(other)),
        }
    }
}

impl From<BriskVersion> for u32 {
    fn from(version: BriskVersion) -> Self {
        match version {
            BriskVersion::V1 => 1,
            BriskVersion::V2 => 2,
        }
    }
}

/// Complete extractor configuration
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ExtractorConfig {
    pub rotation_invariant: bool,
    pub scale_invariant: bool,
    /// Multiplier on every pattern radius and sigma.
    pub pattern_scale: f32,
    pub version: BriskVersion,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub pattern_file: Option<PathBuf>,
    pub n_threads: usize,
    /// Metadata
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub name: Option<String>,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub description: Option<String>,
    /// Kept last so TOML writes it as a trailing table.
    pub discretization: Discretization,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractorConfig {
    /// Rotation and scale invariant extraction with the analytic pattern
    pub fn new() -> Self {
        Self {
            rotation_invariant: true,
            scale_invariant: true,
            pattern_scale: 1.0,
            version: BriskVersion::V1,
            pattern_file: None,
            n_threads: num_cpus::get(),
            name: None,
            description: None,
            discretization: Discretization::default(),
        }
    }

    /// Upright preset: orientation fixed at zero, no orientation estimation
    pub fn upright_preset() -> Self {
        Self {
            rotation_invariant: false,
            name: Some("Upright".to_string()),
            description: Some("No rotation invariance, for gravity-aligned cameras".to_string()),
            ..Self::new()
        }
    }

    /// Single-scale preset: every keypoint sampled at the reference scale
    pub fn single_scale_preset() -> Self {
        Self {
            scale_invariant: false,
            name: Some("Single scale".to_string()),
            description: Some("Keypoint sizes ignored, one fixed pattern scale".to_string()),
            ..Self::new()
        }
    }

    /// Compact preset: coarse discretization for a small pattern table
    pub fn compact_preset() -> Self {
        Self {
            discretization: Discretization {
                scales: 16,
                rotations: 256,
                scale_range: 30.0,
            },
            name: Some("Compact".to_string()),
            description: Some("Coarse scale and rotation steps, small memory footprint".to_string()),
            ..Self::new()
        }
    }

    /// Add metadata to configuration
    pub fn with_metadata(mut self, name: &str, description: &str) -> Self {
        self.name = Some(name.to_string());
        self.description = Some(description.to_string());
        self
    }

    /// Convert to ExtractorBuilder for further customization
    pub fn to_builder(self) -> ExtractorBuilder {
        ExtractorBuilder::from_config(self)
    }

    /// Generate human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "ExtractorConfig: v{}, pattern_scale={:.2}, scales={}, rotations={}, range={:.1}, threads={}, features=[Rotation:{}, Scale:{}]",
            u32::from(self.version),
            self.pattern_scale,
            self.discretization.scales,
            self.discretization.rotations,
            self.discretization.scale_range,
            self.n_threads,
            self.rotation_invariant,
            self.scale_invariant
        )
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> BriskResult<()> {
        self.validate_sampling()?;
        if self.version == BriskVersion::V2 && self.pattern_file.is_none() {
            return Err(BriskError::MissingPatternFile);
        }
        Ok(())
    }

    /// Pattern scale and discretization checks, without the pattern source.
    pub fn validate_sampling(&self) -> BriskResult<()> {
        if !(self.pattern_scale > 0.0 && self.pattern_scale.is_finite()) {
            return Err(BriskError::InvalidConfig(format!(
                "pattern scale must be positive, got {}",
                self.pattern_scale
            )));
        }
        self.discretization.validate()
    }

    /// Save configuration to JSON file
    #[cfg(feature = "serde")]
    pub fn save_json<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load configuration from JSON file
    #[cfg(feature = "serde")]
    pub fn load_json<P: AsRef<std::path::Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Save configuration to TOML file
    #[cfg(feature = "serde")]
    pub fn save_toml<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let toml = toml::to_string_pretty(self)?;
        std::fs::write(path, toml)?;
        Ok(())
    }

    /// Load configuration from TOML file
    #[cfg(feature = "serde")]
    pub fn load_toml<P: AsRef<std::path::Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Serialize to JSON string
    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from JSON string
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to TOML string
    #[cfg(feature = "serde")]
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Deserialize from TOML string
    #[cfg(feature = "serde")]
    pub fn from_toml(toml_str: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_validate() {
        for config in [
            ExtractorConfig::new(),
            ExtractorConfig::upright_preset(),
            ExtractorConfig::single_scale_preset(),
            ExtractorConfig::compact_preset(),
        ] {
            assert!(config.validate().is_ok(), "{}", config.summary());
        }
        assert!(!ExtractorConfig::upright_preset().rotation_invariant);
        assert!(!ExtractorConfig::single_scale_preset().scale_invariant);
    }

    #[test]
    fn test_validation_failures() {
        let mut config = ExtractorConfig::new();
        config.pattern_scale = 0.0;
        assert!(matches!(config.validate(), Err(BriskError::InvalidConfig(_))));

        let mut config = ExtractorConfig::new();
        config.version = BriskVersion::V2;
        assert!(matches!(config.validate(), Err(BriskError::MissingPatternFile)));

        let mut config = ExtractorConfig::new();
        config.discretization.rotations = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_version_numbers() {
        assert_eq!(BriskVersion::try_from(1).unwrap(), BriskVersion::V1);
        assert_eq!(BriskVersion::try_from(2).unwrap(), BriskVersion::V2);
        assert!(matches!(BriskVersion::try_from(3), Err(BriskError::UnsupportedVersion(3))));
        assert_eq!(u32::from(BriskVersion::V2), 2);
    }

    #[test]
    fn test_summary_and_metadata() {
        let config = ExtractorConfig::compact_preset().with_metadata("Mine", "Custom");
        assert_eq!(config.name.as_deref(), Some("Mine"));
        let summary = config.summary();
        assert!(summary.contains("scales=16"));
        assert!(summary.contains("rotations=256"));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_json_roundtrip() {
        let config = ExtractorConfig::upright_preset();
        let json = config.to_json().unwrap();
        assert!(json.contains("\"version\": 1"));
        assert_eq!(ExtractorConfig::from_json(&json).unwrap(), config);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_toml_rejects_unknown_version() {
        let toml_str = ExtractorConfig::new().to_toml().unwrap().replace("version = 1", "version = 7");
        assert!(ExtractorConfig::from_toml(&toml_str).is_err());
    }
}
