// SPDX-License-Identifier: GPL-3.0-or-later

// Launches coordinated XY moves: couples the two axes' peak velocities so
// they arrive simultaneously, applies the limit supervisor's veto, and
// consolidates the per-axis "completed" flags the pulse ISRs raise.
//
// This has no direct analogue in the reference firmware this project is
// built in the style of (which drives a single Z axis); it generalizes
// that firmware's single-axis `MotionControl`/`Stepper` pattern to two
// axes driven from one call, the way its `origin_calibration.rs` sequences
// several single-axis moves by hand.

use super::axis::{Axis, StepDriver};
use super::limit::{Direction, LimitSupervisor};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MoveVeto {
    None,
    H,
    V,
    Both,
}

pub struct MoveOutcome {
    pub h_distance: i32,
    pub v_distance: i32,
    pub h_vetoed: bool,
    pub v_vetoed: bool,
}

pub struct Coordinator<H: StepDriver, V: StepDriver> {
    pub h: Axis<H>,
    pub v: Axis<V>,
}

impl<H: StepDriver, V: StepDriver> Coordinator<H, V> {
    pub fn new(h: Axis<H>, v: Axis<V>) -> Self {
        Self { h, v }
    }

    /// Commands an absolute-step target for both axes. Any move already in
    /// flight is stopped in place first -- there is no queue and no drain
    /// phase (spec 4.3 "Re-entry").
    pub fn move_to(&mut self, target_h: i32, target_v: i32, limits: &LimitSupervisor) -> MoveOutcome {
        if !self.h.is_idle() || !self.v.is_idle() {
            self.h.hard_stop();
            self.v.hard_stop();
        }

        let start_h = self.h.current_position();
        let start_v = self.v.current_position();
        let dh = (target_h - start_h).unsigned_abs();
        let dv = (target_v - start_v).unsigned_abs();

        let dir_h = if target_h >= start_h { Direction::Positive } else { Direction::Negative };
        let dir_v = if target_v >= start_v { Direction::Positive } else { Direction::Negative };

        let h_vetoed = dh > 0 && !limits.check_h(dir_h);
        let v_vetoed = dv > 0 && !limits.check_v(dir_v);

        let (speed_h, speed_v) = couple_speeds(
            if h_vetoed { 0 } else { dh },
            if v_vetoed { 0 } else { dv },
            self.h.max_speed(),
            self.v.max_speed(),
        );

        let target_h = if h_vetoed { start_h } else { target_h };
        let target_v = if v_vetoed { start_v } else { target_v };

        self.h.arm(target_h, speed_h);
        self.v.arm(target_v, speed_v);

        MoveOutcome {
            h_distance: self.h.target_position() - start_h,
            v_distance: self.v.target_position() - start_v,
            h_vetoed,
            v_vetoed,
        }
    }

    pub fn move_relative(&mut self, dx: i32, dy: i32, limits: &LimitSupervisor) -> MoveOutcome {
        let target_h = self.h.current_position() + dx;
        let target_v = self.v.current_position() + dy;
        self.move_to(target_h, target_v, limits)
    }

    /// Immediate stop of both axes, in place. Returns the relative distance
    /// actually traversed since the last arm (useful to reconcile the host).
    pub fn stop(&mut self) -> (i32, i32) {
        let h_before = self.h.current_position();
        let v_before = self.v.current_position();
        self.h.hard_stop();
        self.v.hard_stop();
        (self.h.current_position() - h_before, self.v.current_position() - v_before)
    }

    pub fn is_idle(&self) -> bool {
        self.h.is_idle() && self.v.is_idle()
    }

    /// Advances both axes' velocity profiles against their live positions.
    /// Called once per tick from the main loop, matching the rate the
    /// requirements budget for the profiler's sqrt.
    pub fn update_profiles(&mut self) {
        self.h.update_profile();
        self.v.update_profile();
    }

    /// Polled from the main loop after the per-axis ISR completion flags
    /// are set; consolidates them into a single `MOVE_COMPLETED` moment.
    pub fn poll_completion(&mut self) -> Option<(i32, i32)> {
        let h_done = self.h.take_completed();
        let v_done = self.v.take_completed();
        if h_done && v_done {
            Some((self.h.current_position(), self.v.current_position()))
        } else {
            None
        }
    }
}

/// Scales the shorter axis's peak velocity down so both axes arrive
/// simultaneously: ratio = min(dh,dv)/max(dh,dv), applied to the longer
/// axis's ceiling. If the result exceeds the shorter axis's own ceiling,
/// the longer axis is slowed symmetrically instead (spec 4.3).
fn couple_speeds(dh: u32, dv: u32, max_h: u32, max_v: u32) -> (u32, u32) {
    if dh == 0 || dv == 0 {
        return (max_h, max_v);
    }

    let (short, long, max_short, max_long, short_is_h) = if dh <= dv {
        (dh, dv, max_h, max_v, true)
    } else {
        (dv, dh, max_v, max_h, false)
    };

    // scaled = max_long * (short/long), done in u64 to avoid overflow.
    let scaled_short = ((max_long as u64) * (short as u64) / (long as u64)) as u32;

    let (short_speed, long_speed) = if scaled_short <= max_short {
        (scaled_short, max_long)
    } else {
        // The short axis's own ceiling is the binding constraint; slow the
        // long axis symmetrically so the ratio is preserved.
        let scaled_long = ((max_short as u64) * (long as u64) / (short as u64)) as u32;
        (max_short, scaled_long.min(max_long))
    };

    if short_is_h {
        (short_speed, long_speed)
    } else {
        (long_speed, short_speed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_distances_keep_both_ceilings() {
        let (h, v) = couple_speeds(1000, 1000, 8000, 12000);
        assert_eq!(h, 8000);
        assert_eq!(v, 12000);
    }

    #[test]
    fn shorter_axis_is_scaled_down_by_ratio() {
        // dh=4000 dv=10000 -> ratio 0.4, H is short -> H scaled to 0.4*max_v? no:
        // spec: shorter axis's peak velocity scaled to v_max_long * ratio.
        let (h, v) = couple_speeds(4000, 10000, 8000, 12000);
        // long axis is V (10000 steps), scaled_short = max_v * dh/dv = 12000*0.4 = 4800
        assert_eq!(h, 4800);
        assert_eq!(v, 12000);
    }

    #[test]
    fn zero_distance_axis_is_unaffected() {
        let (h, v) = couple_speeds(0, 5000, 8000, 12000);
        assert_eq!(h, 8000);
        assert_eq!(v, 12000);
    }

    #[test]
    fn short_axis_ceiling_binds_and_slows_long_axis() {
        // dh=1, dv=2, max_h=100, max_v=100000.
        // long=V, scaled_short = max_v*dh/dv = 50000, way over max_h=100.
        // So short(H) pinned at max_h=100, long(V) scaled symmetrically:
        // scaled_long = max_h * dv/dh = 100*2 = 200.
        let (h, v) = couple_speeds(1, 2, 100, 100_000);
        assert_eq!(h, 100);
        assert_eq!(v, 200);
    }
}
