use crate::config::{BriskVersion, ExtractorConfig};
use crate::orientation::{estimate_angle, rotation_index};
use crate::pattern::{PatternTable, RingPattern, ShortPair, BASIC_SIZE};
use crate::sampler::Sampler;
use crate::warp::{Warp, WarpField};
use brisk_core::{BriskError, BriskResult, Descriptors, ImageRef, ImageView, IntegralImage, Keypoint, Pixel};
use log::debug;
use rayon::prelude::*;
use std::fs::File;
use std::io::{BufReader, Read};

/// Sizes are mapped to scales relative to this fraction of the basic size.
const SCALE_ANCHOR: f32 = 0.6;
/// Keypoint size assumed when scale invariance is off.
const FIXED_SIZE_FACTOR: f32 = 1.45;

/// Produces one binary descriptor per surviving keypoint.
pub trait DescriptorExtractor {
    /// Bytes per descriptor row.
    fn descriptor_size(&self) -> usize;

    /// Describes `keypoints` in `image`. Keypoints too close to the border
    /// are removed from `keypoints`; row `n` of the result describes the
    /// `n`-th keypoint left afterwards. Unset angles are filled in.
    fn compute(&self, image: ImageRef<'_>, keypoints: &mut Vec<Keypoint>) -> BriskResult<Descriptors>;
}

/// BRISK descriptor extractor
pub struct BriskExtractor {
    table: PatternTable,
    rotation_invariant: bool,
    scale_invariant: bool,
    warp_field: Option<Box<dyn WarpField>>,
}

impl BriskExtractor {
    /// Builds the pattern table described by `config`.
    pub fn new(config: &ExtractorConfig) -> BriskResult<Self> {
        config.validate()?;
        let table = match config.version {
            BriskVersion::V1 => {
                PatternTable::from_rings(&RingPattern::standard(config.pattern_scale), config.discretization)?
            }
            BriskVersion::V2 => {
                let path = config.pattern_file.as_ref().ok_or(BriskError::MissingPatternFile)?;
                let reader = BufReader::new(File::open(path)?);
                PatternTable::from_reader(reader, config.pattern_scale, config.discretization)?
            }
        };
        Ok(Self::from_table(table, config.rotation_invariant, config.scale_invariant))
    }

    /// Version 2 extractor with the serialized pattern read from `reader`
    /// instead of `config.pattern_file`.
    pub fn from_pattern_reader<R: Read>(config: &ExtractorConfig, reader: R) -> BriskResult<Self> {
        config.validate_sampling()?;
        let table = PatternTable::from_reader(reader, config.pattern_scale, config.discretization)?;
        Ok(Self::from_table(table, config.rotation_invariant, config.scale_invariant))
    }

    pub fn from_table(table: PatternTable, rotation_invariant: bool, scale_invariant: bool) -> Self {
        Self {
            table,
            rotation_invariant,
            scale_invariant,
            warp_field: None,
        }
    }

    /// Warps every keypoint's pattern with the field's local transform.
    pub fn with_warp_field<W: WarpField + 'static>(mut self, field: W) -> Self {
        self.warp_field = Some(Box::new(field));
        self
    }

    pub fn table(&self) -> &PatternTable {
        &self.table
    }

    pub fn is_rotation_invariant(&self) -> bool {
        self.rotation_invariant
    }

    pub fn is_scale_invariant(&self) -> bool {
        self.scale_invariant
    }

    /// Discrete scale a keypoint of `size` is sampled at.
    pub fn scale_index(&self, size: f32) -> usize {
        let disc = self.table.discretization();
        let size = if self.scale_invariant {
            size
        } else {
            FIXED_SIZE_FACTOR * BASIC_SIZE
        };
        let per_octave = disc.scales as f32 / disc.scale_range.log2();
        let scale = (per_octave * (size / (SCALE_ANCHOR * BASIC_SIZE)).log2() + 0.5) as i32;
        scale.clamp(0, disc.scales as i32 - 1) as usize
    }

    /// Like [`DescriptorExtractor::compute`], reusing a caller-supplied integral image.
    pub fn compute_with_integral(
        &self,
        image: ImageRef<'_>,
        integral: &IntegralImage,
        keypoints: &mut Vec<Keypoint>,
    ) -> BriskResult<Descriptors> {
        let (width, height) = (image.width(), image.height());
        integral.ensure_matches(width, height)?;

        let scales = self.retain_inside(width, height, keypoints);
        let mut descriptors = Descriptors::zeros(keypoints.len(), self.table.descriptor_bytes());
        if keypoints.is_empty() {
            return Ok(descriptors);
        }

        match image {
            ImageRef::Gray8(view) => self.describe_all(view, integral, keypoints, &scales, &mut descriptors)?,
            ImageRef::Gray16(view) => self.describe_all(view, integral, keypoints, &scales, &mut descriptors)?,
        }
        Ok(descriptors)
    }

    /// Drops keypoints whose pattern would leave the image and returns the
    /// scale index of each survivor.
    fn retain_inside(&self, width: usize, height: usize, keypoints: &mut Vec<Keypoint>) -> Vec<usize> {
        let (w, h) = (width as f32, height as f32);
        let before = keypoints.len();
        let mut scales = Vec::with_capacity(before);
        keypoints.retain(|kp| {
            let scale = self.scale_index(kp.size);
            let border = self.table.border(scale) as f32;
            let inside = kp.x >= border && kp.x < w - border && kp.y >= border && kp.y < h - border;
            if inside {
                scales.push(scale);
            }
            inside
        });
        if keypoints.len() < before {
            debug!(
                "dropped {} of {} keypoints at the image border ({}x{})",
                before - keypoints.len(),
                before,
                width,
                height
            );
        }
        scales
    }

    fn describe_all<P: Pixel>(
        &self,
        view: ImageView<'_, P>,
        integral: &IntegralImage,
        keypoints: &mut [Keypoint],
        scales: &[usize],
        descriptors: &mut Descriptors,
    ) -> BriskResult<()> {
        let sampler = Sampler::new(view, integral, &self.table)?;
        let n_points = self.table.n_points();
        let bytes = self.table.descriptor_bytes();

        descriptors
            .as_bytes_mut()
            .par_chunks_mut(bytes)
            .zip(keypoints.par_iter_mut())
            .zip(scales.par_iter())
            .for_each_init(
                || vec![0i32; n_points],
                |values, ((row, keypoint), &scale)| self.describe_one(&sampler, keypoint, scale, values, row),
            );
        Ok(())
    }

    fn describe_one<P: Pixel>(
        &self,
        sampler: &Sampler<'_, P>,
        keypoint: &mut Keypoint,
        scale: usize,
        values: &mut [i32],
        row: &mut [u8],
    ) {
        let warp = self.warp_for(keypoint);
        let rot = match warp {
            Some(w) if w.directional => {
                keypoint.angle = Some(w.angle_degrees());
                0
            }
            _ => self.resolve_rotation(sampler, keypoint, scale, values),
        };

        sampler.sample_all(keypoint.x, keypoint.y, scale, rot, warp.as_ref(), values);
        pack_bits(values, self.table.short_pairs(), row);
    }

    fn resolve_rotation<P: Pixel>(
        &self,
        sampler: &Sampler<'_, P>,
        keypoint: &mut Keypoint,
        scale: usize,
        values: &mut [i32],
    ) -> usize {
        if !self.rotation_invariant {
            return 0;
        }
        let rotations = self.table.rotations();
        let angle = match keypoint.angle {
            Some(angle) => angle,
            None => {
                sampler.sample_all(keypoint.x, keypoint.y, scale, 0, None, values);
                let angle = estimate_angle(values, self.table.long_pairs());
                keypoint.angle = Some(angle);
                angle
            }
        };
        rotation_index(angle, rotations)
    }

    /// Warp the extractor's field assigns to `keypoint`, if any.
    pub fn warp_for(&self, keypoint: &Keypoint) -> Option<Warp> {
        self.warp_field.as_ref().and_then(|field| field.warp_at(keypoint))
    }
}

impl DescriptorExtractor for BriskExtractor {
    fn descriptor_size(&self) -> usize {
        self.table.descriptor_bytes()
    }

    fn compute(&self, image: ImageRef<'_>, keypoints: &mut Vec<Keypoint>) -> BriskResult<Descriptors> {
        let integral = IntegralImage::from_image(&image);
        self.compute_with_integral(image, &integral, keypoints)
    }
}

/// Sets bit `n` of `out` when the `n`-th pair compares brighter-first.
/// Bits fill 32-bit little-endian words; trailing bytes stay zero.
pub fn pack_bits(values: &[i32], pairs: &[ShortPair], out: &mut [u8]) {
    for (word_idx, chunk) in pairs.chunks(32).enumerate() {
        let word = chunk.iter().enumerate().fold(0u32, |word, (bit, pair)| {
            if values[pair.i as usize] > values[pair.j as usize] {
                word | (1 << bit)
            } else {
                word
            }
        });
        out[word_idx * 4..word_idx * 4 + 4].copy_from_slice(&word.to_le_bytes());
    }
}
