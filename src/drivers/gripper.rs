// SPDX-License-Identifier: GPL-3.0-or-later

// Unipolar gripper: half-step 8-phase sequence on four coil outputs,
// step-budgeted against the periodic tick, persisted open/closed state.
// Grounded on the reference firmware's bitfield-driven phase tables for
// stepper microstepping (Drv8424::set_step_multiplier's Mode0/Mode1 match
// tables), generalized to a 4-bit coil phase sequence instead of a 2-bit
// microstep select.

use embedded_hal::digital::v2::OutputPin;

use crate::consts::gripper::{STEPS_TO_CLOSE, STEPS_TO_OPEN, TICKS_PER_PHASE};

// Standard unipolar half-step sequence, one nibble per phase.
const HALF_STEP_SEQUENCE: [u8; 8] = [
    0b1000, 0b1100, 0b0100, 0b0110, 0b0010, 0b0011, 0b0001, 0b1001,
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GripperState {
    Open,
    Closed,
    Moving,
}

pub struct Gripper<P1: OutputPin, P2: OutputPin, P3: OutputPin, P4: OutputPin> {
    coils: [EitherPin<P1, P2, P3, P4>; 4],
    phase: u8,
    steps_remaining: u32,
    tick_counter: u32,
    direction_opening: bool,
    state: GripperState,
}

// Four heterogeneous pin types can't live in a plain array, so each slot is
// tagged by position instead of boxed -- no allocator is available.
enum EitherPin<P1, P2, P3, P4> {
    A(P1),
    B(P2),
    C(P3),
    D(P4),
}

impl<P1: OutputPin, P2: OutputPin, P3: OutputPin, P4: OutputPin> EitherPin<P1, P2, P3, P4> {
    fn set(&mut self, high: bool) {
        let _ = match self {
            EitherPin::A(p) => if high { p.set_high() } else { p.set_low() },
            EitherPin::B(p) => if high { p.set_high() } else { p.set_low() },
            EitherPin::C(p) => if high { p.set_high() } else { p.set_low() },
            EitherPin::D(p) => if high { p.set_high() } else { p.set_low() },
        };
    }
}

impl<P1: OutputPin, P2: OutputPin, P3: OutputPin, P4: OutputPin> Gripper<P1, P2, P3, P4> {
    pub fn new(coil_a: P1, coil_b: P2, coil_c: P3, coil_d: P4, starts_open: bool) -> Self {
        let mut g = Self {
            coils: [EitherPin::A(coil_a), EitherPin::B(coil_b), EitherPin::C(coil_c), EitherPin::D(coil_d)],
            phase: 0,
            steps_remaining: 0,
            tick_counter: 0,
            direction_opening: true,
            state: if starts_open { GripperState::Open } else { GripperState::Closed },
        };
        g.drop_coils();
        g
    }

    pub fn state(&self) -> GripperState {
        self.state
    }

    pub fn step_position(&self) -> u32 {
        self.phase as u32
    }

    pub fn open(&mut self) {
        if self.state == GripperState::Open {
            return;
        }
        self.direction_opening = true;
        self.steps_remaining = STEPS_TO_OPEN;
        self.tick_counter = 0;
        self.state = GripperState::Moving;
    }

    pub fn close(&mut self) {
        if self.state == GripperState::Closed {
            return;
        }
        self.direction_opening = false;
        self.steps_remaining = STEPS_TO_CLOSE;
        self.tick_counter = 0;
        self.state = GripperState::Moving;
    }

    pub fn toggle(&mut self) {
        match self.state {
            GripperState::Open => self.close(),
            GripperState::Closed => self.open(),
            GripperState::Moving => {
                // Reverse direction in place rather than ignore the request.
                if self.direction_opening {
                    self.close();
                } else {
                    self.open();
                }
            }
        }
    }

    /// Called once per tick from the main loop; advances the phase index
    /// by one every `TICKS_PER_PHASE` ticks until the step budget is spent,
    /// then drops all coils.
    pub fn on_tick(&mut self) {
        if self.state != GripperState::Moving {
            return;
        }

        self.tick_counter += 1;
        if self.tick_counter < TICKS_PER_PHASE {
            return;
        }
        self.tick_counter = 0;

        if self.steps_remaining == 0 {
            self.drop_coils();
            self.state = if self.direction_opening { GripperState::Open } else { GripperState::Closed };
            return;
        }

        if self.direction_opening {
            self.phase = (self.phase + 1) % 8;
        } else {
            self.phase = (self.phase + 7) % 8;
        }
        self.steps_remaining -= 1;
        self.write_phase();
    }

    fn write_phase(&mut self) {
        let bits = HALF_STEP_SEQUENCE[self.phase as usize];
        for (i, coil) in self.coils.iter_mut().enumerate() {
            coil.set(bits & (1 << (3 - i)) != 0);
        }
    }

    fn drop_coils(&mut self) {
        for coil in self.coils.iter_mut() {
            coil.set(false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;

    struct FakePin(bool);
    impl OutputPin for FakePin {
        type Error = Infallible;
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.0 = false;
            Ok(())
        }
        fn set_high(&mut self) -> Result<(), Infallible> {
            self.0 = true;
            Ok(())
        }
    }

    fn gripper() -> Gripper<FakePin, FakePin, FakePin, FakePin> {
        Gripper::new(FakePin(false), FakePin(false), FakePin(false), FakePin(false), false)
    }

    fn run_until_idle(g: &mut Gripper<FakePin, FakePin, FakePin, FakePin>) {
        for _ in 0..100_000 {
            if g.state() != GripperState::Moving {
                return;
            }
            g.on_tick();
        }
        panic!("gripper never settled");
    }

    #[test]
    fn open_then_close_round_trips() {
        let mut g = gripper();
        assert_eq!(g.state(), GripperState::Closed);
        g.open();
        run_until_idle(&mut g);
        assert_eq!(g.state(), GripperState::Open);
        g.close();
        run_until_idle(&mut g);
        assert_eq!(g.state(), GripperState::Closed);
    }

    #[test]
    fn opening_when_already_open_is_a_no_op() {
        let mut g = gripper();
        g.open();
        run_until_idle(&mut g);
        g.open();
        assert_eq!(g.state(), GripperState::Open);
    }

    #[test]
    fn toggle_alternates_state() {
        let mut g = gripper();
        g.toggle();
        run_until_idle(&mut g);
        assert_eq!(g.state(), GripperState::Open);
        g.toggle();
        run_until_idle(&mut g);
        assert_eq!(g.state(), GripperState::Closed);
    }

    #[test]
    fn coils_drop_at_end_of_motion() {
        let mut g = gripper();
        g.open();
        run_until_idle(&mut g);
        for coil in g.coils.iter() {
            let high = match coil {
                EitherPin::A(p) | EitherPin::B(p) | EitherPin::C(p) | EitherPin::D(p) => p.0,
            };
            assert!(!high);
        }
    }

    #[test]
    fn reverses_direction_when_toggled_mid_motion() {
        let mut g = gripper();
        g.open();
        g.on_tick();
        assert_eq!(g.state(), GripperState::Moving);
        g.toggle();
        assert!(!g.direction_opening);
    }
}
