// SPDX-License-Identifier: GPL-3.0-or-later

use embedded_hal::digital::v2::OutputPin;

use crate::consts::motion::STEP_TIMER_FREQ_HZ;
use super::profile::{MotionProfile, ProfileState};

#[derive(PartialEq, Clone, Copy, Debug)]
pub enum AxisState {
    Idle,
    Moving,
    Homing,
    Error,
}

/// The capability object a timer-owning ISR drives. One STEP/DIR/ENABLE
/// triple per physical driver; the H axis wires two (the mechanically
/// slaved pair), V wires one, and both are driven through the same trait
/// so the motion core never mentions pin numbers.
pub trait StepDriver {
    fn set_direction(&mut self, forward: bool);
    fn step_high(&mut self);
    fn step_low(&mut self);
    fn enable(&mut self);
    fn disable(&mut self);
}

/// `N` physical drivers toggled in lockstep (N=2 for the mechanically
/// slaved H axis, N=1 for V).
pub struct GangedOutputs<P: OutputPin, const N: usize> {
    pub step: [P; N],
    pub dir: [P; N],
    pub enable: [P; N],
    pub dir_forward_is_high: bool,
}

impl<P: OutputPin, const N: usize> StepDriver for GangedOutputs<P, N> {
    fn set_direction(&mut self, forward: bool) {
        let high = forward == self.dir_forward_is_high;
        for pin in &mut self.dir {
            let _ = if high { pin.set_high() } else { pin.set_low() };
        }
    }

    fn step_high(&mut self) {
        for pin in &mut self.step {
            let _ = pin.set_high();
        }
    }

    fn step_low(&mut self) {
        for pin in &mut self.step {
            let _ = pin.set_low();
        }
    }

    fn enable(&mut self) {
        for pin in &mut self.enable {
            let _ = pin.set_high();
        }
    }

    fn disable(&mut self) {
        for pin in &mut self.step {
            let _ = pin.set_low();
        }
        for pin in &mut self.enable {
            let _ = pin.set_low();
        }
    }
}

/// One planned linear degree of freedom: owned position counter, profile,
/// and the timer-driven pulse engine (C2) that advances it.
///
/// `current_position` is written only from `on_interrupt` (the ISR); every
/// other reader of this struct must go through a short interrupts-off
/// critical section (RTIC's `lock()` on the `#[shared]` resource this is
/// stored in provides exactly that).
pub struct Axis<D: StepDriver> {
    driver: D,
    profile: MotionProfile,

    current_position: i32,
    target_position: i32,
    direction: bool,

    max_speed: u32,
    acceleration: u32,
    v_min: u32,

    state: AxisState,
    completed: bool,

    // Toggle STEP at twice the nominal step rate: true between the rising
    // and falling half of a step pulse.
    pulse_high: bool,
}

impl<D: StepDriver> Axis<D> {
    pub fn new(driver: D, v_min: u32, max_speed: u32, acceleration: u32) -> Self {
        Self {
            driver,
            profile: MotionProfile::new(v_min),
            current_position: 0,
            target_position: 0,
            direction: true,
            max_speed,
            acceleration,
            v_min,
            state: AxisState::Idle,
            completed: false,
            pulse_high: false,
        }
    }

    pub fn current_position(&self) -> i32 {
        self.current_position
    }

    pub fn target_position(&self) -> i32 {
        self.target_position
    }

    pub fn state(&self) -> AxisState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == AxisState::Idle
    }

    pub fn set_max_speed(&mut self, max_speed: u32) {
        self.max_speed = max_speed;
    }

    pub fn max_speed(&self) -> u32 {
        self.max_speed
    }

    /// Reseats the origin without moving (used by homing), per spec: "between
    /// moves the coordinator may reseat [current_position]".
    pub fn set_origin(&mut self, origin_position: i32) {
        self.target_position += self.current_position - origin_position;
        self.current_position = -origin_position;
    }

    /// Arms a new absolute move at `peak_speed` (already coupled by the
    /// coordinator for two-axis moves). Direction is latched before the
    /// timer is armed, never changed while it runs (spec 4.1).
    ///
    /// Returns `true` if the timer was armed (non-zero distance), `false`
    /// if the move is a zero-distance no-op that completes immediately.
    pub fn arm(&mut self, target: i32, peak_speed: u32) -> bool {
        self.target_position = target;
        let distance = target - self.current_position;

        if distance == 0 {
            self.completed = true;
            self.state = AxisState::Idle;
            return false;
        }

        self.direction = distance > 0;
        self.driver.set_direction(self.direction);
        self.driver.enable();

        self.profile.setup(self.current_position, target, peak_speed.max(self.v_min), self.acceleration);
        self.state = AxisState::Moving;
        self.completed = false;
        self.pulse_high = false;
        true
    }

    /// Immediate, in-place stop: no deceleration phase, matching the
    /// cancellation semantics in spec 5 ("the engine is stopped in place").
    pub fn hard_stop(&mut self) {
        self.driver.disable();
        self.profile.reset();
        self.target_position = self.current_position;
        self.state = AxisState::Idle;
        self.pulse_high = false;
    }

    /// Takes and clears the per-axis "completed" flag the ISR raised; the
    /// coordinator consolidates these outside ISR context.
    pub fn take_completed(&mut self) -> bool {
        let c = self.completed;
        self.completed = false;
        c
    }

    /// Called from the step-timer ISR. Every rising edge advances position
    /// and tests for arrival; returns the half-period (in step-timer ticks)
    /// to program into the compare register for the next event, or `None`
    /// if the axis just reached its target and its timer should be
    /// disabled.
    ///
    /// Reads the profile's last computed speed rather than recomputing it
    /// (that involves a sqrt and belongs to the tick-rate `update_profile`
    /// call, not the pulse-rate ISR).
    pub fn on_interrupt(&mut self) -> Option<u16> {
        if self.pulse_high {
            self.driver.step_low();
            self.pulse_high = false;
        } else {
            self.driver.step_high();
            self.pulse_high = true;

            if self.direction {
                self.current_position += 1;
            } else {
                self.current_position -= 1;
            }

            if self.current_position == self.target_position {
                self.driver.disable();
                self.profile.reset();
                self.state = AxisState::Idle;
                self.completed = true;
                return None;
            }
        }

        Some(half_period_ticks(self.profile.current_speed.max(self.v_min)))
    }

    /// Re-evaluates the velocity profile against the live position. Called
    /// once per tick from the main loop -- never from the step ISR, since
    /// the sqrt inside `MotionProfile::update` is too expensive to run at
    /// pulse rate.
    pub fn update_profile(&mut self) {
        if self.state == AxisState::Moving {
            self.profile.update(self.current_position);
        }
    }

    /// The half-period to program into the step timer's compare register
    /// for this axis right now, or `None` if it isn't moving and its timer
    /// should be stopped. Read right after `arm()` to start the hardware
    /// timer, and again after each `update_profile()` to keep it in sync.
    pub fn pending_half_period(&self) -> Option<u16> {
        if self.state == AxisState::Moving {
            Some(half_period_ticks(self.profile.current_speed.max(self.v_min)))
        } else {
            None
        }
    }
}

/// half_period = f_cpu / (2 * prescaler * step_rate) - 1; here the timer is
/// already prescaled to STEP_TIMER_FREQ_HZ ticks/s, so this reduces to
/// STEP_TIMER_FREQ_HZ / (2*step_rate) - 1.
fn half_period_ticks(step_rate: u32) -> u16 {
    let step_rate = step_rate.max(1);
    let half_period = STEP_TIMER_FREQ_HZ / (2 * step_rate);
    half_period.saturating_sub(1).clamp(1, u16::MAX as u32) as u16
}
