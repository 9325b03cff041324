// SPDX-License-Identifier: GPL-3.0-or-later

// Routes a parsed command to the subsystem that owns it and renders the
// immediate reply. Unsolicited events that happen later (move completion,
// limit trips) are emitted from the main loop's own polling, not from
// here -- this module only ever answers the command that triggered it.
//
// Grounded on the reference firmware's `MoveZ` UI screen, which is the
// closest thing the teacher has to "take one user intent, touch one or
// two driver objects, and produce one outcome"; generalized from a UI
// event handler to a wire command handler.

use crate::consts::motion::limits::{MAX_SPEED_H, MAX_SPEED_V, X_MAX_MM, Y_MAX_MM};
use crate::drivers::gripper::Gripper;
use crate::drivers::motion::{AxisId, Coordinator, LimitSupervisor, StepDriver, Steps};
use crate::drivers::servo::ServoPair;
use embedded_hal::digital::v2::{InputPin, OutputPin};
use embedded_hal::PwmPin;

use super::command::Command;
use super::reply::{self, ErrorTag, ReplyString};

pub struct Dispatcher {
    calibration_start: Option<(i32, i32)>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self { calibration_start: None }
    }

    pub fn is_calibrating(&self) -> bool {
        self.calibration_start.is_some()
    }

    #[allow(clippy::too_many_arguments)]
    pub fn dispatch<H, V, PH1, PH2, PV1, PV2, P1, P2, G1, G2, G3, G4>(
        &mut self,
        cmd: Command,
        coordinator: &mut Coordinator<H, V>,
        limits: &LimitSupervisor<PH1, PH2, PV1, PV2>,
        servos: &mut ServoPair<P1, P2>,
        gripper: &mut Gripper<G1, G2, G3, G4>,
    ) -> ReplyString
    where
        H: StepDriver,
        V: StepDriver,
        PH1: InputPin,
        PH2: InputPin,
        PV1: InputPin,
        PV2: InputPin,
        P1: PwmPin<Duty = u16>,
        P2: PwmPin<Duty = u16>,
        G1: OutputPin,
        G2: OutputPin,
        G3: OutputPin,
        G4: OutputPin,
    {
        match cmd {
            Command::Move { dx_mm, dy_mm } => self.dispatch_move(dx_mm, dy_mm, coordinator, limits),
            Command::Stop => {
                let (dh, dv) = coordinator.stop();
                reply::ok_args("S", format_args!("{},{}", dh, dv))
            }
            Command::ServoMove { angle1, angle2, time_ms } => {
                if angle1 > 180 || angle2 > 180 {
                    return reply::err(ErrorTag::InvalidParams);
                }
                servos.move_to(angle1, angle2, time_ms);
                reply::ok("A")
            }
            Command::ServoSet { servo_id, angle } => {
                if angle > 180 {
                    return reply::err(ErrorTag::InvalidParams);
                }
                match servos.set_immediate(servo_id, angle) {
                    Ok(()) => reply::ok("P"),
                    Err(()) => reply::err(ErrorTag::InvalidServoNum),
                }
            }
            Command::ServoReset => {
                servos.reset_to_neutral();
                reply::ok("RA")
            }
            Command::GripperOpen => {
                gripper.open();
                reply::ok("G:O")
            }
            Command::GripperClose => {
                gripper.close();
                reply::ok("G:C")
            }
            Command::GripperToggle => {
                gripper.toggle();
                reply::ok("GT")
            }
            Command::GripperQuery => reply::gripper_state(gripper.state(), gripper.step_position()),
            Command::SetSpeeds { h_speed, v_speed } => {
                coordinator.h.set_max_speed(h_speed.min(MAX_SPEED_H).max(1));
                coordinator.v.set_max_speed(v_speed.min(MAX_SPEED_V).max(1));
                reply::ok_args("V", format_args!("{},{}", coordinator.h.max_speed(), coordinator.v.max_speed()))
            }
            Command::LimitQuery => reply::limit_mask(limits.mask()),
            Command::ServoQuery => {
                let (a1, a2) = servos.angles();
                reply::servo_angles(a1, a2)
            }
            Command::CalibrationStart => {
                self.calibration_start = Some((coordinator.h.current_position(), coordinator.v.current_position()));
                reply::ok("CS")
            }
            Command::CalibrationStop => match self.calibration_start.take() {
                Some((h0, v0)) => {
                    let dh = coordinator.h.current_position() - h0;
                    let dv = coordinator.v.current_position() - v0;
                    reply::ok_args("CE", format_args!("{},{}", dh, dv))
                }
                None => reply::err(ErrorTag::InvalidParams),
            },
        }
    }

    fn dispatch_move<H, V, PH1, PH2, PV1, PV2>(
        &mut self,
        dx_mm: i32,
        dy_mm: i32,
        coordinator: &mut Coordinator<H, V>,
        limits: &LimitSupervisor<PH1, PH2, PV1, PV2>,
    ) -> ReplyString
    where
        H: StepDriver,
        V: StepDriver,
        PH1: InputPin,
        PH2: InputPin,
        PV1: InputPin,
        PV2: InputPin,
    {
        // Target is derived from the current step position plus the mm
        // delta converted directly to steps -- never round-tripped through
        // mm, which would truncate a position that isn't an exact mm
        // boundary and turn a no-op "M:0,0" into a spurious move.
        let target_h = coordinator.h.current_position() + AxisId::H.mm_to_steps(dx_mm).0;
        let target_v = coordinator.v.current_position() + AxisId::V.mm_to_steps(dy_mm).0;

        let h_mm = AxisId::H.steps_to_mm(Steps(target_h));
        let v_mm = AxisId::V.steps_to_mm(Steps(target_v));

        if h_mm < 0 || h_mm > X_MAX_MM || v_mm < 0 || v_mm > Y_MAX_MM {
            return reply::err(ErrorTag::Bounds);
        }

        let outcome = coordinator.move_to(target_h, target_v, limits);
        reply::move_started(outcome.h_distance, outcome.v_distance)
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::motion::limits::{ACCEL_H, ACCEL_V};
    use crate::drivers::motion::Axis;
    use core::convert::Infallible;

    #[derive(Default)]
    struct NullDriver;
    impl StepDriver for NullDriver {
        fn set_direction(&mut self, _forward: bool) {}
        fn step_high(&mut self) {}
        fn step_low(&mut self) {}
        fn enable(&mut self) {}
        fn disable(&mut self) {}
    }

    struct FixedPin(bool);
    impl InputPin for FixedPin {
        type Error = Infallible;
        fn is_high(&self) -> Result<bool, Infallible> {
            Ok(!self.0)
        }
        fn is_low(&self) -> Result<bool, Infallible> {
            Ok(self.0)
        }
    }

    struct FakePwm(u16);
    impl PwmPin for FakePwm {
        type Duty = u16;
        fn disable(&mut self) {}
        fn enable(&mut self) {}
        fn get_duty(&self) -> u16 {
            self.0
        }
        fn get_max_duty(&self) -> u16 {
            u16::MAX
        }
        fn set_duty(&mut self, duty: u16) {
            self.0 = duty;
        }
    }

    struct FakeOut(bool);
    impl OutputPin for FakeOut {
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

    fn rig() -> (
        Coordinator<NullDriver, NullDriver>,
        LimitSupervisor<FixedPin, FixedPin, FixedPin, FixedPin>,
        ServoPair<FakePwm, FakePwm>,
        Gripper<FakeOut, FakeOut, FakeOut, FakeOut>,
    ) {
        let coordinator = Coordinator::new(
            Axis::new(NullDriver, 200, MAX_SPEED_H, ACCEL_H),
            Axis::new(NullDriver, 200, MAX_SPEED_V, ACCEL_V),
        );
        let limits = LimitSupervisor::new(FixedPin(false), FixedPin(false), FixedPin(false), FixedPin(false));
        let servos = ServoPair::new(FakePwm(0), FakePwm(0));
        let gripper = Gripper::new(FakeOut(false), FakeOut(false), FakeOut(false), FakeOut(false), false);
        (coordinator, limits, servos, gripper)
    }

    #[test]
    fn move_within_bounds_starts_and_echoes_distance() {
        let (mut c, l, mut s, mut g) = rig();
        let mut d = Dispatcher::new();
        let reply = d.dispatch(Command::Move { dx_mm: 100, dy_mm: 0 }, &mut c, &l, &mut s, &mut g);
        assert!(reply.starts_with("STEPPER_MOVE_STARTED:"));
    }

    #[test]
    fn move_past_workspace_bound_is_rejected() {
        let (mut c, l, mut s, mut g) = rig();
        let mut d = Dispatcher::new();
        let reply = d.dispatch(Command::Move { dx_mm: X_MAX_MM + 1, dy_mm: 0 }, &mut c, &l, &mut s, &mut g);
        assert_eq!(reply.as_str(), "ERR:BOUNDS\r\n");
    }

    #[test]
    fn invalid_servo_id_is_reported() {
        let (mut c, l, mut s, mut g) = rig();
        let mut d = Dispatcher::new();
        let reply = d.dispatch(Command::ServoSet { servo_id: 9, angle: 90 }, &mut c, &l, &mut s, &mut g);
        assert_eq!(reply.as_str(), "ERR:INVALID_SERVO_NUM\r\n");
    }

    #[test]
    fn calibration_reports_pulses_between_start_and_stop() {
        let (mut c, l, mut s, mut g) = rig();
        let mut d = Dispatcher::new();
        d.dispatch(Command::CalibrationStart, &mut c, &l, &mut s, &mut g);
        assert!(d.is_calibrating());
        c.h.set_origin(-50);
        let reply = d.dispatch(Command::CalibrationStop, &mut c, &l, &mut s, &mut g);
        assert_eq!(reply.as_str(), "OK:CE:50,0\r\n");
        assert!(!d.is_calibrating());
    }

    #[test]
    fn calibration_stop_without_start_is_an_error() {
        let (mut c, l, mut s, mut g) = rig();
        let mut d = Dispatcher::new();
        let reply = d.dispatch(Command::CalibrationStop, &mut c, &l, &mut s, &mut g);
        assert_eq!(reply.as_str(), "ERR:INVALID_PARAMS\r\n");
    }
}
