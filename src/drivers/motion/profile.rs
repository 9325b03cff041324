// SPDX-License-Identifier: GPL-3.0-or-later

// Trapezoidal / triangular velocity profile, indexed by steps travelled
// rather than by wall time. Unlike the real-time recurrence this firmware's
// stepper code used to run (see DESIGN.md), this profiler is a pure
// function of live position: call setup() once per move, then update() as
// often as the tick fires and it reproduces the same commanded speed for
// the same position every time.

#[derive(PartialEq, Clone, Copy, Debug)]
pub enum ProfileState {
    Idle,
    Accelerating,
    Constant,
    Decelerating,
    Completed,
}

pub struct MotionProfile {
    pub start_position: i32,
    pub target_position: i32,
    pub total_steps: u32,

    pub accel_steps: u32,
    pub constant_steps: u32,
    pub decel_steps: u32,

    pub peak_speed: u32,
    pub v_min: u32,
    pub acceleration: u32,

    pub state: ProfileState,
    pub current_speed: u32,
}

impl MotionProfile {
    pub fn new(v_min: u32) -> Self {
        Self {
            start_position: 0,
            target_position: 0,
            total_steps: 0,
            accel_steps: 0,
            constant_steps: 0,
            decel_steps: 0,
            peak_speed: 0,
            v_min,
            acceleration: 1,
            state: ProfileState::Idle,
            current_speed: 0,
        }
    }

    /// Precomputes the three segment lengths for a move from `start` to
    /// `target`, capped at `v_max` and ramped at `a` steps/s^2.
    pub fn setup(&mut self, start: i32, target: i32, v_max: u32, a: u32) {
        let d = (target - start).unsigned_abs();
        let a = a.max(1);

        self.start_position = start;
        self.target_position = target;
        self.total_steps = d;
        self.acceleration = a;

        // d_acc = v_max^2 / (2*a), computed in steps.
        let d_acc = ((v_max as u64) * (v_max as u64) / (2 * a as u64)) as u32;

        if d >= 2 * d_acc {
            self.accel_steps = d_acc;
            self.decel_steps = d_acc;
            self.constant_steps = d - 2 * d_acc;
            self.peak_speed = v_max;
        } else {
            self.accel_steps = d / 2;
            self.decel_steps = d - self.accel_steps;
            self.constant_steps = 0;
            self.peak_speed = isqrt((2 * a as u64) * (self.accel_steps as u64)).min(v_max as u64) as u32;
        }

        debug_assert_eq!(self.accel_steps + self.constant_steps + self.decel_steps, self.total_steps);

        self.current_speed = self.v_min.min(self.peak_speed);
        self.state = if d == 0 { ProfileState::Completed } else { ProfileState::Accelerating };
    }

    pub fn reset(&mut self) {
        self.total_steps = 0;
        self.accel_steps = 0;
        self.constant_steps = 0;
        self.decel_steps = 0;
        self.current_speed = 0;
        self.state = ProfileState::Idle;
    }

    /// Pure function of the live position: returns the commanded speed.
    pub fn update(&mut self, current_position: i32) -> u32 {
        if self.state == ProfileState::Idle || self.state == ProfileState::Completed {
            return self.current_speed;
        }

        let steps_done = (current_position - self.start_position).unsigned_abs().min(self.total_steps);
        let steps_remaining = self.total_steps - steps_done;

        if steps_remaining == 0 {
            self.state = ProfileState::Completed;
            self.current_speed = 0;
            return 0;
        }

        let raw_speed = if steps_remaining <= self.decel_steps {
            self.state = ProfileState::Decelerating;
            speed_for(self.v_min, self.acceleration, steps_remaining).max(self.v_min)
        } else if steps_done < self.accel_steps {
            self.state = ProfileState::Accelerating;
            speed_for(self.v_min, self.acceleration, steps_done).min(self.peak_speed)
        } else {
            self.state = ProfileState::Constant;
            self.peak_speed
        };

        self.current_speed = slew_limit(self.current_speed, raw_speed, self.acceleration, self.state);
        self.current_speed
    }

    pub fn is_active(&self) -> bool {
        !matches!(self.state, ProfileState::Idle | ProfileState::Completed)
    }
}

// v(s) = sqrt(v_min^2 + 2*a*s)
fn speed_for(v_min: u32, a: u32, s: u32) -> u32 {
    let v_min_sq = (v_min as u64) * (v_min as u64);
    let term = 2u64 * a as u64 * s as u64;
    isqrt(v_min_sq + term) as u32
}

// Bounds the step-to-step change in commanded speed so the timer period
// never jumps by more than a/100 per tick while accelerating, or a/50
// while decelerating (spec's slew-limiting rule, to keep coarse tick rates
// from producing an audible "jerk").
fn slew_limit(previous: u32, target: u32, acceleration: u32, state: ProfileState) -> u32 {
    let max_step = match state {
        ProfileState::Decelerating => (acceleration / 50).max(1),
        _ => (acceleration / 100).max(1),
    };

    if target > previous {
        previous.saturating_add(max_step).min(target)
    } else {
        previous.saturating_sub(max_step).max(target)
    }
}

// Bit-by-bit integer square root; avoids pulling in libm for a single call
// per tick.
fn isqrt(v: u64) -> u64 {
    if v == 0 {
        return 0;
    }
    let mut x = v;
    let mut y = (x + 1) / 2;
    while y < x {
        x = y;
        y = (x + v / x) / 2;
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trapezoid_segments_sum_to_total() {
        let mut p = MotionProfile::new(200);
        p.setup(0, 100_000, 8_000, 20_000);
        assert_eq!(p.accel_steps + p.constant_steps + p.decel_steps, p.total_steps);
        assert_eq!(p.peak_speed, 8_000);
        assert!(p.constant_steps > 0);
    }

    #[test]
    fn triangle_never_reaches_max_speed() {
        // d_acc = v_max^2/(2a) = 8000^2/(2*20000) = 1600, so d=50 << 2*d_acc.
        let mut p = MotionProfile::new(200);
        p.setup(0, 50, 8_000, 20_000);
        assert_eq!(p.constant_steps, 0);
        assert_eq!(p.accel_steps + p.decel_steps, 50);
        // peak = sqrt(2*a*accel_steps) = sqrt(2*20000*25) = sqrt(1_000_000) = 1000
        assert_eq!(p.peak_speed, 1000);
        assert!(p.peak_speed < 8_000);
    }

    #[test]
    fn zero_distance_completes_immediately() {
        let mut p = MotionProfile::new(200);
        p.setup(10, 10, 8_000, 20_000);
        assert_eq!(p.state, ProfileState::Completed);
        assert_eq!(p.total_steps, 0);
    }

    #[test]
    fn speed_is_monotonic_during_acceleration() {
        let mut p = MotionProfile::new(200);
        p.setup(0, 100_000, 8_000, 20_000);
        let mut last = 0;
        for pos in (0..2000).step_by(10) {
            let speed = p.update(pos);
            assert!(speed >= last, "speed decreased during acceleration: {} -> {}", last, speed);
            last = speed;
        }
    }

    #[test]
    fn speed_is_monotonic_during_deceleration() {
        let mut p = MotionProfile::new(200);
        p.setup(0, 10_000, 8_000, 20_000);
        // Run through acceleration and constant phase first.
        for pos in (0..8000).step_by(50) {
            p.update(pos);
        }
        let mut last = u32::MAX;
        let mut saw_decel = false;
        for pos in (8000..10_000).step_by(10) {
            let speed = p.update(pos);
            if p.state == ProfileState::Decelerating {
                saw_decel = true;
                assert!(speed <= last, "speed increased during deceleration: {} -> {}", last, speed);
                last = speed;
            }
        }
        assert!(saw_decel);
    }
}
