//! Prize wheel geometry.
//!
//! The wheel spins clockwise under a fixed pointer at the top (0°).
//! Segment `k` covers pointer angles `[k·w, (k+1)·w)` with `w = 360/N`,
//! so a boundary angle belongs to exactly one segment.

/// Degrees in one revolution.
pub const FULL_TURN_DEG: f64 = 360.0;

/// Terminal rotation for a spin: whole turns plus a uniform offset.
///
/// `u` is a uniform sample in `[0, 1)`.
pub fn terminal_rotation(minimum_full_turns: u32, u: f64) -> f64 {
    minimum_full_turns as f64 * FULL_TURN_DEG + u.clamp(0.0, 1.0) * FULL_TURN_DEG
}

/// Segment under the pointer after rotating clockwise by `rotation_deg`.
///
/// Returns `None` for a wheel without segments or a non-finite rotation.
pub fn segment_index(rotation_deg: f64, segments: usize) -> Option<usize> {
    if segments == 0 || !rotation_deg.is_finite() {
        return None;
    }
    let width = FULL_TURN_DEG / segments as f64;
    let under_pointer = (FULL_TURN_DEG - rotation_deg.rem_euclid(FULL_TURN_DEG)).rem_euclid(FULL_TURN_DEG);
    let index = (under_pointer / width).floor() as usize;
    Some(index.min(segments - 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_rotations() {
        assert_eq!(segment_index(1800.0, 6), Some(0));
        assert_eq!(segment_index(1830.0, 6), Some(5));
    }

    #[test]
    fn test_boundaries_are_half_open() {
        // 60° clockwise puts pointer angle 300°, the start of segment 5
        assert_eq!(segment_index(60.0, 6), Some(5));
        // Just past the boundary falls into segment 4
        assert_eq!(segment_index(60.5, 6), Some(4));
        // 300° clockwise puts pointer angle 60°, the start of segment 1
        assert_eq!(segment_index(300.0, 6), Some(1));
    }

    #[test]
    fn test_every_angle_maps_to_one_segment() {
        let mut seen = [0u32; 8];
        for tenth in 0..3600 {
            let idx = segment_index(tenth as f64 / 10.0, 8).unwrap();
            seen[idx] += 1;
        }
        assert!(seen.iter().all(|&n| n == 450), "{seen:?}");
    }

    #[test]
    fn test_negative_and_degenerate() {
        assert_eq!(segment_index(-30.0, 6), Some(0));
        assert_eq!(segment_index(10.0, 0), None);
        assert_eq!(segment_index(f64::NAN, 6), None);
    }

    #[test]
    fn test_terminal_rotation_range() {
        assert_eq!(terminal_rotation(5, 0.0), 1800.0);
        assert_eq!(terminal_rotation(5, 0.5), 1980.0);
        assert!(terminal_rotation(5, 0.999_999) < 2160.0);
    }
}
