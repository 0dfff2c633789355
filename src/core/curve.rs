//! Multiplier Curve
//!
//! Maps elapsed round time to the displayed multiplier.
//!
//! The curve is a cubic fitted offline against recorded `(t, mul)` samples of
//! a reference crash game, so it tracks that game's exponential-looking climb
//! over the range of a normal round.

/// Cubic coefficient.
pub const CURVE_C3: f64 = 0.0001085;

/// Quadratic coefficient.
pub const CURVE_C2: f64 = -0.0003492;

/// Linear coefficient.
pub const CURVE_C1: f64 = 0.07938;

/// Multiplier at `t` seconds into the running phase.
///
/// Pure: the same `t` always yields the same value, `multiplier_at(0.0) == 1.0`
/// and the curve is strictly increasing for `t >= 0` (its derivative has no
/// real roots). There is no upper domain guard; callers stop sampling once
/// the round's goal multiplier is reached.
#[inline]
pub fn multiplier_at(t: f64) -> f64 {
    CURVE_C3 * t * t * t + CURVE_C2 * t * t + CURVE_C1 * t + 1.0
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_at_one() {
        assert_eq!(multiplier_at(0.0), 1.0);
    }

    #[test]
    fn test_deterministic() {
        for i in 0..1000 {
            let t = i as f64 * 0.015625;
            assert_eq!(multiplier_at(t), multiplier_at(t));
        }
    }

    #[test]
    fn test_monotonic_over_round_domain() {
        // Ten minutes at 64 Hz is far past any realistic crash point.
        let dt = 1.0 / 64.0;
        let mut prev = multiplier_at(0.0);
        for i in 1..(64 * 600) {
            let next = multiplier_at(i as f64 * dt);
            assert!(next > prev, "curve decreased at tick {}", i);
            prev = next;
        }
    }

    #[test]
    fn test_known_points() {
        let at_ten = multiplier_at(10.0);
        assert!((at_ten - 1.86738).abs() < 1e-9, "got {}", at_ten);

        let at_twenty = multiplier_at(20.0);
        assert!(at_twenty > 3.0 && at_twenty < 3.5, "got {}", at_twenty);
    }
}
