// SPDX-License-Identifier: GPL-3.0-or-later

// Two-servo arm mover, linearly interpolated in joint space. Grounded on
// the PWM wiring pattern in the reference firmware's Drv8424 driver (one
// PWM channel, a duty-cycle compare write per update), generalized from a
// single current-limit channel to two angle channels with start/target
// interpolation.

use embedded_hal::PwmPin;

use crate::consts::servo::{NEUTRAL_ANGLE, PWM_MAX, PWM_MIN};

fn angle_to_duty(angle: u16) -> u16 {
    let angle = angle.min(180) as u32;
    let span = (PWM_MAX - PWM_MIN) as u32;
    (PWM_MIN as u32 + span * angle / 180) as u16
}

pub struct ServoPair<P1: PwmPin<Duty = u16>, P2: PwmPin<Duty = u16>> {
    pwm1: P1,
    pwm2: P2,

    start1: u16,
    start2: u16,
    target1: u16,
    target2: u16,
    current1: u16,
    current2: u16,

    duration_ms: u32,
    elapsed_ms: u32,
    moving: bool,
}

impl<P1: PwmPin<Duty = u16>, P2: PwmPin<Duty = u16>> ServoPair<P1, P2> {
    pub fn new(mut pwm1: P1, mut pwm2: P2) -> Self {
        pwm1.enable();
        pwm2.enable();
        pwm1.set_duty(angle_to_duty(NEUTRAL_ANGLE));
        pwm2.set_duty(angle_to_duty(NEUTRAL_ANGLE));
        Self {
            pwm1,
            pwm2,
            start1: NEUTRAL_ANGLE,
            start2: NEUTRAL_ANGLE,
            target1: NEUTRAL_ANGLE,
            target2: NEUTRAL_ANGLE,
            current1: NEUTRAL_ANGLE,
            current2: NEUTRAL_ANGLE,
            duration_ms: 0,
            elapsed_ms: 0,
            moving: false,
        }
    }

    pub fn angles(&self) -> (u16, u16) {
        (self.current1, self.current2)
    }

    /// `duration_ms == 0` means instantaneous, per spec 4.6.
    pub fn move_to(&mut self, angle1: u16, angle2: u16, duration_ms: u32) {
        self.start1 = self.current1;
        self.start2 = self.current2;
        self.target1 = angle1.min(180);
        self.target2 = angle2.min(180);
        self.duration_ms = duration_ms;
        self.elapsed_ms = 0;
        self.moving = true;

        if duration_ms == 0 {
            self.current1 = self.target1;
            self.current2 = self.target2;
            self.moving = false;
            self.write();
        }
    }

    pub fn set_immediate(&mut self, servo_id: u8, angle: u16) -> Result<(), ()> {
        let angle = angle.min(180);
        match servo_id {
            0 => {
                self.current1 = angle;
                self.start1 = angle;
                self.target1 = angle;
            }
            1 => {
                self.current2 = angle;
                self.start2 = angle;
                self.target2 = angle;
            }
            _ => return Err(()),
        }
        self.moving = false;
        self.write();
        Ok(())
    }

    pub fn reset_to_neutral(&mut self) {
        self.move_to(NEUTRAL_ANGLE, NEUTRAL_ANGLE, 0);
    }

    /// Called once per PWM refresh tick while a timed move is in progress.
    pub fn update(&mut self, dt_ms: u32) {
        if !self.moving {
            return;
        }

        self.elapsed_ms = (self.elapsed_ms + dt_ms).min(self.duration_ms);
        let t = self.elapsed_ms as i32;
        let d = self.duration_ms.max(1) as i32;

        self.current1 = interpolate(self.start1, self.target1, t, d);
        self.current2 = interpolate(self.start2, self.target2, t, d);
        self.write();

        if self.elapsed_ms >= self.duration_ms {
            self.moving = false;
        }
    }

    fn write(&mut self) {
        self.pwm1.set_duty(angle_to_duty(self.current1));
        self.pwm2.set_duty(angle_to_duty(self.current2));
    }
}

fn interpolate(start: u16, target: u16, t_elapsed: i32, duration: i32) -> u16 {
    let delta = target as i32 - start as i32;
    (start as i32 + delta * t_elapsed / duration) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakePwm {
        duty: u16,
        enabled: bool,
    }

    impl PwmPin for FakePwm {
        type Duty = u16;
        fn disable(&mut self) {
            self.enabled = false;
        }
        fn enable(&mut self) {
            self.enabled = true;
        }
        fn get_duty(&self) -> u16 {
            self.duty
        }
        fn get_max_duty(&self) -> u16 {
            u16::MAX
        }
        fn set_duty(&mut self, duty: u16) {
            self.duty = duty;
        }
    }

    fn pair() -> ServoPair<FakePwm, FakePwm> {
        ServoPair::new(FakePwm { duty: 0, enabled: false }, FakePwm { duty: 0, enabled: false })
    }

    #[test]
    fn instant_move_lands_immediately() {
        let mut s = pair();
        s.move_to(10, 170, 0);
        assert_eq!(s.angles(), (10, 170));
    }

    #[test]
    fn timed_move_interpolates_linearly() {
        let mut s = pair();
        s.move_to(0, 180, 100);
        s.update(50);
        assert_eq!(s.angles(), (90, 90));
        s.update(50);
        assert_eq!(s.angles(), (180, 180));
    }

    #[test]
    fn reset_returns_to_neutral() {
        let mut s = pair();
        s.move_to(170, 10, 0);
        s.reset_to_neutral();
        assert_eq!(s.angles(), (NEUTRAL_ANGLE, NEUTRAL_ANGLE));
    }

    #[test]
    fn invalid_servo_id_is_rejected() {
        let mut s = pair();
        assert!(s.set_immediate(2, 90).is_err());
    }
}
