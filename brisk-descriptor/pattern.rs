use brisk_core::{BriskError, BriskResult};
use log::debug;
use std::f64::consts::PI;
use std::io::Read;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Reference keypoint size the scale series is anchored to.
pub const BASIC_SIZE: f32 = 12.0;

/// Short-pair count every serialized pattern must declare.
pub const SERIALIZED_DESCRIPTOR_BITS: usize = 384;

/// Fixed-point factor of the long-pair gradient weights.
pub const WEIGHT_SCALE: f32 = 2048.0;

const SIGMA_SCALE: f64 = 1.3;

/// How finely scale and rotation are discretized into lookup tables.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Discretization {
    pub scales: usize,
    pub rotations: usize,
    /// Ratio between the largest and the smallest scale.
    pub scale_range: f32,
}

impl Default for Discretization {
    fn default() -> Self {
        Self {
            scales: 64,
            rotations: 1024,
            scale_range: 30.0,
        }
    }
}

impl Discretization {
    pub fn validate(&self) -> BriskResult<()> {
        if self.scales == 0 || self.rotations == 0 {
            return Err(BriskError::InvalidConfig(format!(
                "scales ({}) and rotations ({}) must be non-zero",
                self.scales, self.rotations
            )));
        }
        if !self.scale_range.is_finite() || self.scale_range <= 1.0 {
            return Err(BriskError::InvalidConfig(format!(
                "scale range {} must exceed 1",
                self.scale_range
            )));
        }
        Ok(())
    }

    /// Multiplier of scale `scale`: a logarithmic series from 1 towards `scale_range`.
    pub fn scale_factor(&self, scale: usize) -> f32 {
        let lb_step = (self.scale_range as f64).log2() / self.scales as f64;
        2f64.powf(scale as f64 * lb_step) as f32
    }
}

/// Sampling location relative to the keypoint, with its smoothing radius.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PatternPoint {
    pub x: f32,
    pub y: f32,
    pub sigma: f32,
}

/// Point pair whose brightness comparison yields one descriptor bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShortPair {
    pub i: u32,
    pub j: u32,
}

/// Long-baseline pair voting for the keypoint orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LongPair {
    pub i: u32,
    pub j: u32,
    pub weighted_dx: i32,
    pub weighted_dy: i32,
}

impl LongPair {
    fn new(i: usize, j: usize, a: PatternPoint, b: PatternPoint) -> Self {
        let dx = b.x - a.x;
        let dy = b.y - a.y;
        let norm_sq = dx * dx + dy * dy;
        Self {
            i: i as u32,
            j: j as u32,
            weighted_dx: ((dx / norm_sq) * WEIGHT_SCALE + 0.5) as i32,
            weighted_dy: ((dy / norm_sq) * WEIGHT_SCALE + 0.5) as i32,
        }
    }
}

/// Analytic pattern: concentric rings of evenly spaced points.
#[derive(Debug, Clone, PartialEq)]
pub struct RingPattern {
    pub radii: Vec<f32>,
    pub counts: Vec<usize>,
    /// Pairs closer than this feed the descriptor bits.
    pub short_max_distance: f32,
    /// Pairs farther than this vote for the orientation.
    pub long_min_distance: f32,
    /// Destination slot of the n-th short pair found; empty keeps
    /// enumeration order.
    pub index_remap: Vec<usize>,
}

impl RingPattern {
    /// The 60-point, five-ring layout of the published BRISK descriptor.
    pub fn standard(pattern_scale: f32) -> Self {
        let f = 0.85 * pattern_scale;
        Self {
            radii: [0.0, 2.9, 4.9, 7.4, 10.8].iter().map(|r| f * r).collect(),
            counts: vec![1, 10, 14, 15, 20],
            short_max_distance: 5.85,
            long_min_distance: 8.2,
            index_remap: Vec::new(),
        }
    }

    fn base_points(&self) -> BriskResult<Vec<PatternPoint>> {
        if self.radii.len() != self.counts.len() {
            return Err(BriskError::RingMismatch {
                radii: self.radii.len(),
                counts: self.counts.len(),
            });
        }
        let mut points = Vec::with_capacity(self.counts.iter().sum());
        for (ring, (&radius, &count)) in self.radii.iter().zip(&self.counts).enumerate() {
            let radius = radius as f64;
            // The innermost ring keeps a fixed half-pixel kernel.
            let sigma = if ring == 0 {
                0.5
            } else {
                radius * (PI / count as f64).sin()
            };
            for num in 0..count {
                let alpha = num as f64 * 2.0 * PI / count as f64;
                points.push(PatternPoint {
                    x: (radius * alpha.cos()) as f32,
                    y: (radius * alpha.sin()) as f32,
                    sigma: sigma as f32,
                });
            }
        }
        if points.is_empty() {
            return Err(BriskError::EmptyPattern);
        }
        Ok(points)
    }
}

/// Sampling offsets for every (scale, rotation) instance of a base pattern,
/// plus the comparison pairs defining descriptor bits and orientation votes.
///
/// Descriptors are only comparable when produced from the same table.
#[derive(Debug, Clone)]
pub struct PatternTable {
    discretization: Discretization,
    n_points: usize,
    points: Vec<PatternPoint>,
    scale_factors: Vec<f32>,
    borders: Vec<u32>,
    short_pairs: Vec<ShortPair>,
    long_pairs: Vec<LongPair>,
    descriptor_bytes: usize,
}

impl PatternTable {
    /// Builds the table from concentric rings, deriving pairs from the
    /// distance thresholds.
    pub fn from_rings(rings: &RingPattern, discretization: Discretization) -> BriskResult<Self> {
        discretization.validate()?;
        let base = rings.base_points()?;

        let short_max_sq = rings.short_max_distance * rings.short_max_distance;
        let long_min_sq = rings.long_min_distance * rings.long_min_distance;
        let mut short_pairs = Vec::new();
        let mut long_pairs = Vec::new();
        for i in 1..base.len() {
            for j in 0..i {
                let dx = base[j].x - base[i].x;
                let dy = base[j].y - base[i].y;
                let norm_sq = dx * dx + dy * dy;
                if norm_sq > long_min_sq {
                    long_pairs.push(LongPair::new(i, j, base[i], base[j]));
                }
                if norm_sq < short_max_sq {
                    short_pairs.push(ShortPair { i: i as u32, j: j as u32 });
                }
            }
        }
        let short_pairs = remap_short_pairs(short_pairs, &rings.index_remap)?;

        Self::assemble(base, short_pairs, long_pairs, discretization)
    }

    /// Reads the whitespace-delimited serialized form: point count, `(x, y, sigma)`
    /// triples, short-pair count and `(i, j)` pairs, long-pair count and pairs.
    /// Coordinates and sigmas are multiplied by `pattern_scale`.
    pub fn from_reader<R: Read>(
        mut reader: R,
        pattern_scale: f32,
        discretization: Discretization,
    ) -> BriskResult<Self> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        Self::from_serialized(&text, pattern_scale, discretization)
    }

    pub fn from_serialized(text: &str, pattern_scale: f32, discretization: Discretization) -> BriskResult<Self> {
        discretization.validate()?;
        let mut tokens = text.split_whitespace();

        let n_points: usize = next_token(&mut tokens, "point count")?;
        if n_points == 0 {
            return Err(BriskError::EmptyPattern);
        }
        // Counts come from the stream; storage grows only as tokens arrive.
        let mut base = Vec::new();
        for _ in 0..n_points {
            let x: f32 = next_token(&mut tokens, "point x")?;
            let y: f32 = next_token(&mut tokens, "point y")?;
            let sigma: f32 = next_token(&mut tokens, "point sigma")?;
            base.push(PatternPoint {
                x: x * pattern_scale,
                y: y * pattern_scale,
                sigma: sigma * pattern_scale,
            });
        }

        let n_short: usize = next_token(&mut tokens, "short-pair count")?;
        if n_short != SERIALIZED_DESCRIPTOR_BITS {
            return Err(BriskError::ShortPairCount {
                expected: SERIALIZED_DESCRIPTOR_BITS,
                actual: n_short,
            });
        }
        let mut short_pairs = Vec::with_capacity(SERIALIZED_DESCRIPTOR_BITS);
        for _ in 0..n_short {
            let (i, j) = next_pair(&mut tokens, n_points)?;
            short_pairs.push(ShortPair { i: i as u32, j: j as u32 });
        }

        let n_long: usize = next_token(&mut tokens, "long-pair count")?;
        let mut long_pairs = Vec::new();
        for _ in 0..n_long {
            let (i, j) = next_pair(&mut tokens, n_points)?;
            long_pairs.push(LongPair::new(i, j, base[i], base[j]));
        }

        Self::assemble(base, short_pairs, long_pairs, discretization)
    }

    fn assemble(
        base: Vec<PatternPoint>,
        short_pairs: Vec<ShortPair>,
        long_pairs: Vec<LongPair>,
        discretization: Discretization,
    ) -> BriskResult<Self> {
        if short_pairs.is_empty() {
            return Err(BriskError::InvalidConfig(
                "pattern yields no short pairs, descriptors would be empty".to_string(),
            ));
        }
        let Discretization { scales, rotations, .. } = discretization;
        let n_points = base.len();
        let mut points = Vec::with_capacity(scales * rotations * n_points);
        let mut scale_factors = Vec::with_capacity(scales);
        let mut borders = Vec::with_capacity(scales);

        for scale in 0..scales {
            let factor = discretization.scale_factor(scale);
            let s = factor as f64;
            let mut border = 0u32;
            for rot in 0..rotations {
                let theta = rot as f64 * 2.0 * PI / rotations as f64;
                let (sin_t, cos_t) = theta.sin_cos();
                for p in &base {
                    let (ux, uy) = (p.x as f64, p.y as f64);
                    let point = PatternPoint {
                        x: (s * (ux * cos_t - uy * sin_t)) as f32,
                        y: (s * (ux * sin_t + uy * cos_t)) as f32,
                        sigma: (SIGMA_SCALE * s * p.sigma as f64) as f32,
                    };
                    let extent = ((point.x * point.x + point.y * point.y).sqrt() + point.sigma).ceil() as u32 + 1;
                    border = border.max(extent);
                    points.push(point);
                }
            }
            scale_factors.push(factor);
            borders.push(border);
        }

        let descriptor_bytes = short_pairs.len().div_ceil(128) * 16;
        debug!(
            "built BRISK pattern table: {} points x {} scales x {} rotations ({:.1} MiB), {} short / {} long pairs, {} descriptor bytes",
            n_points,
            scales,
            rotations,
            (points.len() * std::mem::size_of::<PatternPoint>()) as f64 / (1024.0 * 1024.0),
            short_pairs.len(),
            long_pairs.len(),
            descriptor_bytes
        );

        Ok(Self {
            discretization,
            n_points,
            points,
            scale_factors,
            borders,
            short_pairs,
            long_pairs,
            descriptor_bytes,
        })
    }

    /// Pattern point `point` instantiated at (`scale`, `rot`).
    #[inline(always)]
    pub fn point(&self, scale: usize, rot: usize, point: usize) -> PatternPoint {
        let rotations = self.discretization.rotations;
        self.points[(scale * rotations + rot) * self.n_points + point]
    }

    /// All points of one (scale, rotation) instance.
    pub fn instance(&self, scale: usize, rot: usize) -> &[PatternPoint] {
        let start = (scale * self.discretization.rotations + rot) * self.n_points;
        &self.points[start..start + self.n_points]
    }

    pub fn n_points(&self) -> usize {
        self.n_points
    }

    pub fn discretization(&self) -> Discretization {
        self.discretization
    }

    pub fn scales(&self) -> usize {
        self.discretization.scales
    }

    pub fn rotations(&self) -> usize {
        self.discretization.rotations
    }

    pub fn scale_factor(&self, scale: usize) -> f32 {
        self.scale_factors[scale]
    }

    /// Image margin a keypoint at `scale` needs for every sample to stay inside.
    pub fn border(&self, scale: usize) -> u32 {
        self.borders[scale]
    }

    pub fn short_pairs(&self) -> &[ShortPair] {
        &self.short_pairs
    }

    pub fn long_pairs(&self) -> &[LongPair] {
        &self.long_pairs
    }

    /// Meaningful bits per descriptor.
    pub fn descriptor_bits(&self) -> usize {
        self.short_pairs.len()
    }

    /// Bytes per descriptor row, rounded up to whole 128-bit words.
    pub fn descriptor_bytes(&self) -> usize {
        self.descriptor_bytes
    }
}

fn remap_short_pairs(pairs: Vec<ShortPair>, remap: &[usize]) -> BriskResult<Vec<ShortPair>> {
    if remap.is_empty() {
        return Ok(pairs);
    }
    let invalid = || BriskError::InvalidIndexRemap { expected: pairs.len() };
    if remap.len() != pairs.len() {
        return Err(invalid());
    }
    let mut slots: Vec<Option<ShortPair>> = vec![None; pairs.len()];
    for (pair, &dst) in pairs.iter().zip(remap) {
        if dst >= slots.len() || slots[dst].is_some() {
            return Err(invalid());
        }
        slots[dst] = Some(*pair);
    }
    Ok(slots.into_iter().flatten().collect())
}

fn next_token<'a, T: FromStr>(tokens: &mut impl Iterator<Item = &'a str>, what: &str) -> BriskResult<T> {
    let token = tokens
        .next()
        .ok_or_else(|| BriskError::PatternParse(format!("stream ended before {}", what)))?;
    token
        .parse()
        .map_err(|_| BriskError::PatternParse(format!("invalid {} '{}'", what, token)))
}

fn next_pair<'a>(tokens: &mut impl Iterator<Item = &'a str>, points: usize) -> BriskResult<(usize, usize)> {
    let i: usize = next_token(tokens, "pair index")?;
    let j: usize = next_token(tokens, "pair index")?;
    if i >= points || j >= points {
        return Err(BriskError::PairIndexOutOfRange { i, j, points });
    }
    Ok((i, j))
}
