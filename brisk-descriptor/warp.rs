use crate::pattern::PatternPoint;
use brisk_core::Keypoint;

/// Per-keypoint 2x2 linear distortion of the sampling pattern.
///
/// `matrix` is row-major `[w0, w1, w2, w3]`: a pattern offset `(x, y)` is
/// sampled at `(w0*x + w1*y, w2*x + w3*y)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Warp {
    pub matrix: [f32; 4],
    /// Multiplier applied to every smoothing sigma.
    pub sigma_scale: f32,
    /// Directional warps carry their own orientation; the pattern is then
    /// sampled unrotated.
    pub directional: bool,
}

impl Warp {
    pub fn new(matrix: [f32; 4]) -> Self {
        Self {
            matrix,
            sigma_scale: mean_abs_eigenvalue(&matrix),
            directional: false,
        }
    }

    pub fn directional(matrix: [f32; 4]) -> Self {
        Self {
            directional: true,
            ..Self::new(matrix)
        }
    }

    pub fn identity() -> Self {
        Self::new([1.0, 0.0, 0.0, 1.0])
    }

    #[inline]
    pub fn apply(&self, p: PatternPoint) -> PatternPoint {
        let [w0, w1, w2, w3] = self.matrix;
        PatternPoint {
            x: w0 * p.x + w1 * p.y,
            y: w2 * p.x + w3 * p.y,
            sigma: p.sigma * self.sigma_scale,
        }
    }

    /// Orientation implied by the warped pattern y-axis, in degrees.
    pub fn angle_degrees(&self) -> f32 {
        self.matrix[3].atan2(self.matrix[1]).to_degrees()
    }
}

/// Mean magnitude of the real eigenvalues, 1 when they are complex.
fn mean_abs_eigenvalue(m: &[f32; 4]) -> f32 {
    let [a, b, c, d] = m.map(|v| v as f64);
    let half_trace = 0.5 * (a + d);
    let det = a * d - b * c;
    let disc = half_trace * half_trace - det;
    if disc < 0.0 {
        return 1.0;
    }
    let root = disc.sqrt();
    (0.5 * ((half_trace + root).abs() + (half_trace - root).abs())) as f32
}

/// Source of per-keypoint warps, typically a dense field sampled at the
/// keypoint location. `None` leaves the keypoint unwarped.
pub trait WarpField: Send + Sync {
    fn warp_at(&self, keypoint: &Keypoint) -> Option<Warp>;
}

/// Applies the same warp at every keypoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantWarp(pub Warp);

impl WarpField for ConstantWarp {
    fn warp_at(&self, _keypoint: &Keypoint) -> Option<Warp> {
        Some(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_warp() {
        let w = Warp::identity();
        assert_eq!(w.sigma_scale, 1.0);
        let p = PatternPoint { x: 3.0, y: -2.0, sigma: 1.5 };
        assert_eq!(w.apply(p), p);
        assert!(!w.directional);
    }

    #[test]
    fn test_sigma_scale_from_eigenvalues() {
        assert!((Warp::new([2.0, 0.0, 0.0, 4.0]).sigma_scale - 3.0).abs() < 1e-6);
        // Reflections count by magnitude.
        assert!((Warp::new([-2.0, 0.0, 0.0, 2.0]).sigma_scale - 2.0).abs() < 1e-6);
        // Pure rotation has complex eigenvalues.
        assert_eq!(Warp::new([0.0, -1.0, 1.0, 0.0]).sigma_scale, 1.0);
    }

    #[test]
    fn test_apply_scales_offsets_and_sigma() {
        let w = Warp::new([2.0, 0.0, 0.0, 2.0]);
        let p = w.apply(PatternPoint { x: 1.0, y: 3.0, sigma: 0.5 });
        assert_eq!((p.x, p.y, p.sigma), (2.0, 6.0, 1.0));
    }

    #[test]
    fn test_directional_angle() {
        let w = Warp::directional([1.0, 0.0, 0.0, 1.0]);
        assert!(w.directional);
        assert!((w.angle_degrees() - 90.0).abs() < 1e-4);
        let tilted = Warp::directional([1.0, 1.0, 0.0, 0.0]);
        assert!(tilted.angle_degrees().abs() < 1e-4);
    }

    struct RightHalf;

    impl WarpField for RightHalf {
        fn warp_at(&self, keypoint: &Keypoint) -> Option<Warp> {
            (keypoint.x > 10.0).then(Warp::identity)
        }
    }

    #[test]
    fn test_custom_field() {
        assert!(RightHalf.warp_at(&Keypoint::new(5.0, 5.0, 7.0)).is_none());
        assert!(RightHalf.warp_at(&Keypoint::new(15.0, 5.0, 7.0)).is_some());
        assert!(ConstantWarp(Warp::identity()).warp_at(&Keypoint::new(0.0, 0.0, 1.0)).is_some());
    }
}
