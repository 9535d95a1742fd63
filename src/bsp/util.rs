//! Shared geometry helpers and tuning constants.

use glam::DVec2;

/// Perpendicular-distance tolerance of every side test (map units).
///
/// The partition selector and the seg divider *must* agree on this value,
/// otherwise a chosen partition can separate into an empty half.
pub const DIST_EPSILON: f64 = 1.0 / 128.0;

/// Angle comparator tolerance, in degrees.
pub const ANG_EPSILON: f64 = 1.0 / 1024.0;

/// Segs (or split remainders) shorter than this are "iffy" — they tend to
/// become degenerate after integer rounding, so the cost function penalises
/// partitions that would produce them.
pub const IFFY_LEN: f64 = 4.0;

/// Translate a direction vector into an angle in degrees, `[0, 360)`.
/// 0 is east, 90 is north.
pub fn compute_angle(d: DVec2) -> f64 {
    if d.x == 0.0 {
        return if d.y > 0.0 { 90.0 } else { 270.0 };
    }

    let angle = d.y.atan2(d.x).to_degrees();
    if angle < 0.0 { angle + 360.0 } else { angle }
}

/// Euclidean length of a delta vector.
pub fn compute_dist(d: DVec2) -> f64 {
    d.length()
}

/// Round a map coordinate to output (integer) precision.
/// Halfway values round away from zero.
pub fn i_round(v: f64) -> i32 {
    v.round() as i32
}

/// Round `x` _up_ to the nearest power of two.
pub fn round_pow2(x: i32) -> i32 {
    if x <= 2 {
        return x;
    }

    let mut x = x - 1;
    let mut tmp = x / 2;
    while tmp != 0 {
        x |= tmp;
        tmp /= 2;
    }
    x + 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::dvec2;

    #[test]
    fn cardinal_angles() {
        assert_eq!(compute_angle(dvec2(1.0, 0.0)), 0.0);
        assert_eq!(compute_angle(dvec2(0.0, 1.0)), 90.0);
        assert_eq!(compute_angle(dvec2(-1.0, 0.0)), 180.0);
        assert_eq!(compute_angle(dvec2(0.0, -1.0)), 270.0);
    }

    #[test]
    fn diagonal_angle_wraps_positive() {
        let a = compute_angle(dvec2(1.0, -1.0));
        assert!((a - 315.0).abs() < 1e-9);
    }

    #[test]
    fn round_half_away_from_zero() {
        assert_eq!(i_round(0.5), 1);
        assert_eq!(i_round(-0.5), -1);
        assert_eq!(i_round(2.4), 2);
        assert_eq!(i_round(-2.6), -3);
    }

    #[test]
    fn pow2_rounding() {
        assert_eq!(round_pow2(1), 1);
        assert_eq!(round_pow2(2), 2);
        assert_eq!(round_pow2(3), 4);
        assert_eq!(round_pow2(17), 32);
        assert_eq!(round_pow2(64), 64);
    }
}
