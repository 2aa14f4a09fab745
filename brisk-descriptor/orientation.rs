use crate::pattern::LongPair;

/// Intensity-gradient vector accumulated over the long pairs.
///
/// Each pair contributes `(t_i - t_j) * weight / 1024` per axis, truncated
/// toward zero before summing.
pub fn gradient_direction(values: &[i32], long_pairs: &[LongPair]) -> (i64, i64) {
    long_pairs.iter().fold((0i64, 0i64), |(gx, gy), pair| {
        let delta = values[pair.i as usize] as i64 - values[pair.j as usize] as i64;
        (
            gx + delta * pair.weighted_dx as i64 / 1024,
            gy + delta * pair.weighted_dy as i64 / 1024,
        )
    })
}

/// Dominant orientation of the sampled pattern, in degrees within `(-180, 180]`.
pub fn estimate_angle(values: &[i32], long_pairs: &[LongPair]) -> f32 {
    let (gx, gy) = gradient_direction(values, long_pairs);
    (gy as f32).atan2(gx as f32).to_degrees()
}

/// Nearest discrete rotation for `degrees`, wrapped into `0..rotations`.
pub fn rotation_index(degrees: f32, rotations: usize) -> usize {
    let theta = (rotations as f32 * degrees / 360.0).round() as i64;
    theta.rem_euclid(rotations as i64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(i: u32, j: u32, wx: i32, wy: i32) -> LongPair {
        LongPair {
            i,
            j,
            weighted_dx: wx,
            weighted_dy: wy,
        }
    }

    #[test]
    fn test_rotation_index_wraps() {
        assert_eq!(rotation_index(0.0, 1024), 0);
        assert_eq!(rotation_index(90.0, 1024), 256);
        assert_eq!(rotation_index(-90.0, 1024), 768);
        assert_eq!(rotation_index(359.9, 1024), 0);
        assert_eq!(rotation_index(180.0, 4), 2);
        assert_eq!(rotation_index(-180.0, 4), 2);
        assert_eq!(rotation_index(720.0 + 45.0, 8), 1);
    }

    #[test]
    fn test_gradient_truncates_each_term() {
        // 3 * 100 / 1024 truncates to zero on its own.
        let pairs = [pair(0, 1, 100, -100), pair(0, 1, 100, -100)];
        assert_eq!(gradient_direction(&[5, 2], &pairs), (0, 0));

        let pairs = [pair(0, 1, 512, -512)];
        assert_eq!(gradient_direction(&[2048, 0], &pairs), (1024, -1024));
        assert_eq!(gradient_direction(&[-1, 2046], &pairs), (-1023, 1023));
    }

    #[test]
    fn test_angle_points_away_from_brighter_end() {
        // Point 1 sits right of point 0, so the weights point along +x.
        let pairs = [pair(0, 1, 200, 0)];
        let brighter_right = estimate_angle(&[1000 * 1024, 2000 * 1024], &pairs);
        assert!((brighter_right.abs() - 180.0).abs() < 1e-3);
        let brighter_left = estimate_angle(&[2000 * 1024, 1000 * 1024], &pairs);
        assert!(brighter_left.abs() < 1e-3);

        let vertical = [pair(0, 1, 0, 300)];
        let down = estimate_angle(&[5000, 0], &vertical);
        assert!((down - 90.0).abs() < 1e-3);
    }

    #[test]
    fn test_flat_values_give_zero_angle() {
        let pairs = [pair(0, 1, 40, 70), pair(2, 0, -30, 10)];
        assert_eq!(estimate_angle(&[7, 7, 7], &pairs), 0.0);
    }
}
