use brisk_core::{BriskResult, Descriptors, ImageRef, IntegralImage, Keypoint, Match};
use brisk_descriptor::{BriskExtractor, ExtractorConfig, PatternTable};
use brisk_match::{BruteForceMatcher, DescriptorMatcher};
use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Rgba, RgbaImage};
use imageproc::drawing::{draw_hollow_circle_mut, draw_line_segment_mut};
use imageproc::integral_image::integral_image;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub use brisk_core::{self, BriskError};
pub use brisk_descriptor::{self, ExtractorBuilder, ExtractorConfig as Config};
pub use brisk_match;

/// Nearest-neighbour query used by [`BriskPipeline::match_descriptors`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchMode {
    Knn(usize),
    Radius(f32),
}

/// Keypoints that survived description, with one descriptor row each.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptorFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub keypoints: Vec<Keypoint>,
    pub descriptors: Descriptors,
}

impl DescriptorFile {
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let json = serde_json::to_string(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let json = std::fs::read_to_string(path)?;
        let file: Self = serde_json::from_str(&json)?;
        file.descriptors.validate()?;
        if file.keypoints.len() != file.descriptors.rows() {
            return Err(format!(
                "{} keypoints but {} descriptor rows",
                file.keypoints.len(),
                file.descriptors.rows()
            )
            .into());
        }
        Ok(file)
    }
}

/// Reads a JSON array of keypoints.
pub fn load_keypoints<P: AsRef<Path>>(path: P) -> Result<Vec<Keypoint>, Box<dyn std::error::Error>> {
    let json = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}

/// Regular grid of keypoints `step` pixels apart, starting one step in from the border.
pub fn grid_keypoints(width: usize, height: usize, step: usize, size: f32) -> Vec<Keypoint> {
    let step = step.max(1);
    let mut keypoints = Vec::new();
    for y in (step..height.saturating_sub(step)).step_by(step) {
        for x in (step..width.saturating_sub(step)).step_by(step) {
            keypoints.push(Keypoint::new(x as f32, y as f32, size));
        }
    }
    keypoints
}

/// High-level BRISK pipeline: decoded images in, descriptors and matches out
pub struct BriskPipeline {
    config: ExtractorConfig,
    extractor: BriskExtractor,
}

impl BriskPipeline {
    /// Create a pipeline for the given extractor configuration
    pub fn new(config: ExtractorConfig) -> BriskResult<Self> {
        let extractor = BriskExtractor::new(&config)?;
        Ok(Self { config, extractor })
    }

    /// Like [`BriskPipeline::new`], also sizing the global Rayon pool from `config.n_threads`.
    pub fn with_thread_pool(config: ExtractorConfig) -> BriskResult<Self> {
        brisk_core::init_thread_pool(config.n_threads)?;
        Self::new(config)
    }

    /// Get extractor configuration
    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    pub fn extractor(&self) -> &BriskExtractor {
        &self.extractor
    }

    pub fn pattern(&self) -> &PatternTable {
        self.extractor.table()
    }

    /// Describe keypoints of an 8-bit image; keypoints too close to the border are removed.
    pub fn describe(&self, image: &GrayImage, keypoints: &mut Vec<Keypoint>) -> BriskResult<Descriptors> {
        let integral = integral_of(image)?;
        self.extractor.compute_with_integral(ImageRef::try_from(image)?, &integral, keypoints)
    }

    /// Describe keypoints of a `Luma8` or `Luma16` image.
    pub fn describe_dynamic(&self, image: &DynamicImage, keypoints: &mut Vec<Keypoint>) -> BriskResult<Descriptors> {
        match image {
            DynamicImage::ImageLuma8(buf) => self.describe(buf, keypoints),
            // imageproc only integrates 8-bit channels
            _ => {
                let view = ImageRef::try_from(image)?;
                let integral = IntegralImage::from_image(&view);
                self.extractor.compute_with_integral(view, &integral, keypoints)
            }
        }
    }

    /// Describe and package the result for serialization. Colour images are
    /// rejected rather than converted.
    pub fn describe_to_file(
        &self,
        image: &DynamicImage,
        mut keypoints: Vec<Keypoint>,
        source: Option<String>,
    ) -> BriskResult<DescriptorFile> {
        let descriptors = self.describe_dynamic(image, &mut keypoints)?;
        Ok(DescriptorFile { image: source, keypoints, descriptors })
    }

    /// Brute-force match `query` rows against a single train set.
    pub fn match_descriptors(
        query: &Descriptors,
        train: &Descriptors,
        mode: MatchMode,
        compact: bool,
    ) -> BriskResult<Vec<Vec<Match>>> {
        let mut matcher = BruteForceMatcher::new(query.cols())?;
        matcher.add(train.clone());
        match mode {
            MatchMode::Knn(k) => matcher.knn_match(query, k, None, compact),
            MatchMode::Radius(r) => matcher.radius_match(query, r, None, compact),
        }
    }
}

/// Prefix sums via `imageproc`, which already emits the leading zero row and column.
fn integral_of(image: &GrayImage) -> BriskResult<IntegralImage> {
    let (w, h) = image.dimensions();
    let table: ImageBuffer<Luma<u64>, Vec<u64>> = integral_image(image);
    IntegralImage::from_raw(w as usize, h as usize, table.into_raw())
}

/// Draws each keypoint as a circle of its size, with a radius line when it has an angle.
pub fn draw_keypoints(image: &GrayImage, keypoints: &[Keypoint]) -> RgbaImage {
    let mut output: RgbaImage = DynamicImage::ImageLuma8(image.clone()).into_rgba8();
    let red = Rgba([255, 0, 0, 255]);
    for kp in keypoints {
        let radius = (kp.size * 0.5).round().max(1.0);
        draw_hollow_circle_mut(&mut output, (kp.x.round() as i32, kp.y.round() as i32), radius as i32, red);
        if let Some(angle) = kp.angle {
            let (sin, cos) = angle.to_radians().sin_cos();
            draw_line_segment_mut(
                &mut output,
                (kp.x, kp.y),
                (kp.x + radius * cos, kp.y + radius * sin),
                red,
            );
        }
    }
    output
}

/// Human-readable statistics of a pattern table for the `pattern` subcommand.
pub fn pattern_summary(table: &PatternTable) -> String {
    let disc = table.discretization();
    let border_min = table.border(0);
    let border_max = table.border(disc.scales - 1);
    format!(
        "{} points, {} short pairs, {} long pairs\n\
         descriptor: {} bits in {} bytes\n\
         discretization: {} scales over {}x, {} rotations\n\
         border: {}px (finest) to {}px (coarsest)",
        table.n_points(),
        table.short_pairs().len(),
        table.long_pairs().len(),
        table.descriptor_bits(),
        table.descriptor_bytes(),
        disc.scales,
        disc.scale_range,
        disc.rotations,
        border_min,
        border_max,
    )
}
