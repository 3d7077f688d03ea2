//! Dynamic volume step sizing.

/// Direction of a volume change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepDirection {
    Increase,
    Decrease,
}

/// Volume at or below which increases use a doubled step.
const LOW_VOLUME_THRESHOLD: f32 = 0.3;

/// Volume-down results at or below this snap to silence.
const SILENCE_SNAP: f32 = 0.01;

/// Per-press volume delta for the current level.
///
/// Proportional to the current volume so steps shrink near silence, doubled
/// for increases at low volume, and clamped to `[min_step, max_step]`.
pub fn dynamic_step(current: f32, direction: StepDirection, min_step: f32, max_step: f32) -> f32 {
    let mut step = max_step * current;
    if direction == StepDirection::Increase && current <= LOW_VOLUME_THRESHOLD {
        step *= 2.0;
    }
    step.min(max_step).max(min_step)
}

/// Level after one volume-up press, saturating at 1.0.
pub fn volume_up_level(current: f32, min_step: f32, max_step: f32) -> f32 {
    let step = dynamic_step(current, StepDirection::Increase, min_step, max_step);
    (current + step).min(1.0)
}

/// Level after one volume-down press, saturating at 0.0.
pub fn volume_down_level(current: f32, min_step: f32, max_step: f32) -> f32 {
    let step = dynamic_step(current, StepDirection::Decrease, min_step, max_step);
    let level = (current - step).max(0.0);
    if level <= SILENCE_SNAP {
        0.0
    } else {
        level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIN: f32 = 0.05;
    const MAX: f32 = 0.10;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_step_within_bounds() {
        for i in 0..=100 {
            let v = i as f32 / 100.0;
            for direction in [StepDirection::Increase, StepDirection::Decrease] {
                let step = dynamic_step(v, direction, MIN, MAX);
                assert!((MIN..=MAX).contains(&step), "v={v} step={step}");
            }
        }
    }

    #[test]
    fn test_step_doubles_when_increasing_at_low_volume() {
        // 2 * 0.10 * 0.25 = 0.05
        assert!(approx(dynamic_step(0.25, StepDirection::Increase, 0.01, MAX), 0.05));
        assert!(approx(dynamic_step(0.25, StepDirection::Decrease, 0.01, MAX), 0.025));
        // above the threshold there is no doubling
        assert!(approx(dynamic_step(0.5, StepDirection::Increase, 0.01, MAX), 0.05));
    }

    #[test]
    fn test_step_clamped_up_to_min() {
        // 2 * 0.10 * 0.20 = 0.04, raised to 0.05
        assert!(approx(dynamic_step(0.2, StepDirection::Increase, MIN, MAX), MIN));
        assert!(approx(volume_up_level(0.2, MIN, MAX), 0.25));
    }

    #[test]
    fn test_volume_up_saturates() {
        assert!(approx(volume_up_level(0.97, MIN, MAX), 1.0));
        assert!(approx(volume_up_level(1.0, MIN, MAX), 1.0));
    }

    #[test]
    fn test_volume_down_snaps_to_silence() {
        assert_eq!(volume_down_level(0.06, MIN, MAX), 0.0);
        assert_eq!(volume_down_level(0.03, MIN, MAX), 0.0);
        assert_eq!(volume_down_level(0.0, MIN, MAX), 0.0);
        assert!(approx(volume_down_level(0.5, MIN, MAX), 0.45));
    }

    #[test]
    fn test_levels_are_monotonic() {
        for i in 0..=100 {
            let v = i as f32 / 100.0;
            let up = volume_up_level(v, MIN, MAX);
            let down = volume_down_level(v, MIN, MAX);
            assert!(up >= v && up <= 1.0);
            assert!(down <= v && down >= 0.0);
        }
    }
}
