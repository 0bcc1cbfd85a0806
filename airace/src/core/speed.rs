use crate::core::performance::PerformanceProfile;
use rand::Rng;

/// Lower bound of a racer's speed (arbitrary units).
pub const MIN_SPEED: f64 = 0.03;
/// Upper bound of a racer's speed (arbitrary units).
pub const MAX_SPEED: f64 = 0.4;
/// Speed every racer holds before the first calculation and after a reset.
pub const INITIAL_SPEED: f64 = 0.2;

const BASE_SPEED: f64 = 0.05;
const SPEED_RANGE: f64 = 0.25;
const FLUCTUATION_SCALE: f64 = 0.05;
const OPPONENT_VARIATION: f64 = 0.025;
const COMPETITIVE_SCALE: f64 = 0.1;

/// calc_base_speed returns the deterministic part of the speed, linear in the speed parameter.
pub fn calc_base_speed(profile: &PerformanceProfile) -> f64 {
    BASE_SPEED + profile.speed_frac() * SPEED_RANGE
}

/// calc_fluctuation_amplitude returns the maximum absolute random fluctuation of the speed.
/// Higher adaptability lowers the variance, higher accuracy smooths the speed.
pub fn calc_fluctuation_amplitude(profile: &PerformanceProfile) -> f64 {
    (1.0 - profile.adaptability_frac()) * FLUCTUATION_SCALE * (1.0 - profile.accuracy_frac())
}

/// calc_dynamic_speed draws a fresh speed for a racer with the given profile.
pub fn calc_dynamic_speed<R: Rng>(profile: &PerformanceProfile, rng: &mut R) -> f64 {
    let fluctuation = rng.gen_range(-1.0..=1.0) * calc_fluctuation_amplitude(profile);
    clamp_speed(calc_base_speed(profile) + fluctuation)
}

/// calc_opponent_speed draws a fresh speed for the opponent. On top of the normal rule it adds a
/// small independent offset and a competitive correction that speeds the opponent up against a
/// weak player and slows it down against a strong one, keeping races close.
pub fn calc_opponent_speed<R: Rng>(
    opponent: &PerformanceProfile,
    player: &PerformanceProfile,
    rng: &mut R,
) -> f64 {
    let fluctuation = rng.gen_range(-1.0..=1.0) * calc_fluctuation_amplitude(opponent);
    let variation = rng.gen_range(-OPPONENT_VARIATION..=OPPONENT_VARIATION);
    let competitive = COMPETITIVE_SCALE * (0.5 - player.average_frac());

    clamp_speed(calc_base_speed(opponent) + fluctuation + variation + competitive)
}

fn clamp_speed(speed: f64) -> f64 {
    if speed.is_nan() {
        return MIN_SPEED;
    }
    speed.clamp(MIN_SPEED, MAX_SPEED)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn speed_stays_within_bounds_for_all_profiles() {
        let mut rng = StdRng::seed_from_u64(7);
        for speed in (0..=100).step_by(10) {
            for accuracy in (0..=100).step_by(10) {
                for adaptability in (0..=100).step_by(10) {
                    let profile = PerformanceProfile::new(speed, accuracy, adaptability);
                    for _ in 0..5 {
                        let v = calc_dynamic_speed(&profile, &mut rng);
                        assert!((MIN_SPEED..=MAX_SPEED).contains(&v), "speed {} out of bounds", v);
                        let v = calc_opponent_speed(&profile, &profile, &mut rng);
                        assert!((MIN_SPEED..=MAX_SPEED).contains(&v), "speed {} out of bounds", v);
                    }
                }
            }
        }
    }

    #[test]
    fn higher_speed_parameter_is_faster() {
        let slow = PerformanceProfile::new(10, 50, 50);
        let fast = PerformanceProfile::new(90, 50, 50);
        assert!(calc_base_speed(&fast) > calc_base_speed(&slow));

        let mut rng = StdRng::seed_from_u64(1);
        let n = 200;
        let avg = |p: &PerformanceProfile, rng: &mut StdRng| {
            (0..n).map(|_| calc_dynamic_speed(p, rng)).sum::<f64>() / n as f64
        };
        assert!(avg(&fast, &mut rng) > avg(&slow, &mut rng));
    }

    #[test]
    fn perfect_accuracy_or_adaptability_removes_jitter() {
        let mut rng = StdRng::seed_from_u64(3);
        let precise = PerformanceProfile::new(60, 100, 0);
        let adaptive = PerformanceProfile::new(60, 0, 100);
        for _ in 0..20 {
            assert_relative_eq!(calc_dynamic_speed(&precise, &mut rng), 0.2, epsilon = 1e-12);
            assert_relative_eq!(calc_dynamic_speed(&adaptive, &mut rng), 0.2, epsilon = 1e-12);
        }
    }

    #[test]
    fn fluctuation_shrinks_with_adaptability_and_accuracy() {
        let base = calc_fluctuation_amplitude(&PerformanceProfile::new(50, 20, 20));
        assert!(calc_fluctuation_amplitude(&PerformanceProfile::new(50, 20, 80)) < base);
        assert!(calc_fluctuation_amplitude(&PerformanceProfile::new(50, 80, 20)) < base);
    }

    #[test]
    fn strong_player_slows_the_opponent_down() {
        let opponent = PerformanceProfile::new(50, 100, 100);
        let weak = PerformanceProfile::new(0, 0, 0);
        let strong = PerformanceProfile::new(100, 100, 100);

        let mut rng = StdRng::seed_from_u64(11);
        let n = 200;
        let vs_weak: f64 = (0..n)
            .map(|_| calc_opponent_speed(&opponent, &weak, &mut rng))
            .sum::<f64>()
            / n as f64;
        let vs_strong: f64 = (0..n)
            .map(|_| calc_opponent_speed(&opponent, &strong, &mut rng))
            .sum::<f64>()
            / n as f64;
        assert!(vs_weak > vs_strong);
    }
}
