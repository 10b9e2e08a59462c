//! Search Controller (C6): a deterministic bouncing sweep on one axis.

/// Search sweep state. `current` is always kept within `[min, max]` between
/// calls to [`SearchState::update`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchState {
    pub current: f32,
    pub direction: i8,
    pub min: f32,
    pub max: f32,
    pub step: f32,
}

/// One tick's result: the delta applied and the new absolute position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchStep {
    pub delta: f32,
    pub absolute: f32,
}

impl SearchState {
    pub fn new(start: f32, min: f32, max: f32, step: f32, direction: i8) -> Self {
        SearchState {
            current: start.clamp(min, max),
            direction: if direction >= 0 { 1 } else { -1 },
            min,
            max,
            step,
        }
    }

    /// Advance the sweep by one tick per §4.6:
    /// 1. proposed = current + direction*step
    /// 2. if proposed >= max: clamp to max, flip direction to -1
    /// 3. else if proposed <= min: clamp to min, flip direction to +1
    /// 4. delta = clamped - current; current = clamped
    pub fn update(&mut self) -> SearchStep {
        let proposed = self.current + (self.direction as f32) * self.step;

        let clamped = if proposed >= self.max {
            self.direction = -1;
            self.max
        } else if proposed <= self.min {
            self.direction = 1;
            self.min
        } else {
            proposed
        };

        let delta = clamped - self.current;
        self.current = clamped;

        SearchStep {
            delta,
            absolute: clamped,
        }
    }

    /// Reset to a starting position and direction, used on SEARCH entry
    /// (§4.9 "reset search direction as configured").
    pub fn reset(&mut self, start: f32, direction: i8) {
        self.current = start.clamp(self.min, self.max);
        self.direction = if direction >= 0 { 1 } else { -1 };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_1_search_bounce() {
        let mut s = SearchState::new(10.0, 0.0, 20.0, 1.0, 1);

        let expected = [
            11.0, 12.0, 13.0, 14.0, 15.0, 16.0, 17.0, 18.0, 19.0, 20.0, 19.0, 18.0, 17.0, 16.0,
            15.0, 14.0,
        ];

        let mut flips = 0;
        let mut last_direction = s.direction;
        for &want in &expected {
            let step = s.update();
            assert_eq!(step.absolute, want);
            assert!(s.current >= s.min && s.current <= s.max);
            if s.direction != last_direction {
                flips += 1;
            }
            last_direction = s.direction;
        }
        assert_eq!(flips, 1, "direction should flip exactly once in this run");
    }

    #[test]
    fn delta_always_equals_new_minus_old() {
        let mut s = SearchState::new(0.0, 0.0, 5.0, 2.0, 1);
        for _ in 0..20 {
            let before = s.current;
            let step = s.update();
            assert_eq!(step.delta, step.absolute - before);
            assert!(s.current >= s.min && s.current <= s.max);
        }
    }

    #[test]
    fn reset_reapplies_start_and_direction() {
        let mut s = SearchState::new(10.0, 0.0, 20.0, 1.0, 1);
        s.update();
        s.update();
        s.reset(5.0, -1);
        assert_eq!(s.current, 5.0);
        assert_eq!(s.direction, -1);
    }
}
