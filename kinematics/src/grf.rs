use analytics_types::Point2;

/// Standard gravity, m/s^2.
const GRAVITY: f64 = 9.81;

/// Estimated ground reaction force at one contact instant.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GroundReactionForce {
    pub horizontal_n: f64,
    pub vertical_n: f64,
}

/// Center-of-mass acceleration via second central difference,
/// `(p[i+1] - 2*p[i] + p[i-1]) / dt^2`. `dt` is the stream's configured
/// frame interval, used consistently rather than a hard-coded `1/30`.
pub fn com_acceleration(before: Point2, mid: Point2, after: Point2, dt: f64) -> (f64, f64) {
    let ax = (after.x - 2.0 * mid.x + before.x) / (dt * dt);
    let ay = (after.y - 2.0 * mid.y + before.y) / (dt * dt);
    (ax, ay)
}

/// `horizontal = m * a_x`, `vertical = m * (g + a_y)`. Callers only invoke
/// this at detected contact frames; elsewhere GRF is reported as zero.
pub fn ground_reaction_force(mass_kg: f64, ax: f64, ay: f64) -> GroundReactionForce {
    GroundReactionForce {
        horizontal_n: mass_kg * ax,
        vertical_n: mass_kg * (GRAVITY + ay),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stationary_com_yields_only_gravity_on_vertical_axis() {
        let p = Point2 { x: 10.0, y: 10.0 };
        let (ax, ay) = com_acceleration(p, p, p, 1.0 / 30.0);
        approx::assert_relative_eq!(ax, 0.0);
        approx::assert_relative_eq!(ay, 0.0);
        let grf = ground_reaction_force(70.0, ax, ay);
        approx::assert_relative_eq!(grf.horizontal_n, 0.0);
        approx::assert_relative_eq!(grf.vertical_n, 70.0 * GRAVITY, max_relative = 1e-9);
    }

    #[test]
    fn uses_the_supplied_dt_not_a_hardcoded_one() {
        let before = Point2 { x: 0.0, y: 0.0 };
        let mid = Point2 { x: 1.0, y: 0.0 };
        let after = Point2 { x: 4.0, y: 0.0 };
        let (ax_fast, _) = com_acceleration(before, mid, after, 1.0 / 60.0);
        let (ax_slow, _) = com_acceleration(before, mid, after, 1.0 / 30.0);
        assert!(ax_fast > ax_slow);
    }
}
