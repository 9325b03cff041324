// SPDX-License-Identifier: GPL-3.0-or-later

// Debounced reader of the four end-of-travel switches. Grounded on the same
// shape as the reference firmware's bottom-sensor debounce
// (`touch_screen.rs`'s "stable sample" counter), generalized to four
// independent active-low inputs with veto + abort semantics instead of one.

use embedded_hal::digital::v2::InputPin;

use crate::consts::motion::debounce::{HEARTBEAT_PERIOD_TICKS, THRESHOLD};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    HMin,
    HMax,
    VMin,
    VMax,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Positive,
    Negative,
}

#[derive(Default, Clone, Copy)]
struct Debouncer {
    count: u8,
    triggered: bool,
}

impl Debouncer {
    /// Feeds one raw sample (true == switch pressed). Returns `true` the
    /// instant the logical state transitions to triggered (a rising edge),
    /// so the caller can emit the trip event exactly once.
    fn sample(&mut self, pressed: bool) -> bool {
        if pressed {
            if !self.triggered {
                self.count = self.count.saturating_add(1);
                if self.count >= THRESHOLD {
                    self.triggered = true;
                    self.count = THRESHOLD;
                    return true;
                }
            }
        } else {
            self.count = 0;
            self.triggered = false;
        }
        false
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct LimitMask {
    pub h_min: bool,
    pub h_max: bool,
    pub v_min: bool,
    pub v_max: bool,
}

impl LimitMask {
    pub fn any(&self) -> bool {
        self.h_min || self.h_max || self.v_min || self.v_max
    }
}

/// One edge newly triggered this tick, for the main loop to turn into an
/// abort + event emission.
pub struct LimitEvent {
    pub side: Side,
}

pub struct LimitSupervisor<PH1, PH2, PV1, PV2> {
    h_min: PH1,
    h_max: PH2,
    v_min: PV1,
    v_max: PV2,

    deb_h_min: Debouncer,
    deb_h_max: Debouncer,
    deb_v_min: Debouncer,
    deb_v_max: Debouncer,

    heartbeat_enabled: bool,
    heartbeat_counter: u32,
}

impl<PH1: InputPin, PH2: InputPin, PV1: InputPin, PV2: InputPin> LimitSupervisor<PH1, PH2, PV1, PV2> {
    pub fn new(h_min: PH1, h_max: PH2, v_min: PV1, v_max: PV2) -> Self {
        Self {
            h_min,
            h_max,
            v_min,
            v_max,
            deb_h_min: Debouncer::default(),
            deb_h_max: Debouncer::default(),
            deb_v_min: Debouncer::default(),
            deb_v_max: Debouncer::default(),
            heartbeat_enabled: false,
            heartbeat_counter: 0,
        }
    }

    pub fn set_heartbeat(&mut self, enabled: bool) {
        self.heartbeat_enabled = enabled;
        self.heartbeat_counter = 0;
    }

    /// Called once per tick from the main loop. Active-low switches with
    /// internal pull-ups: a low reading means pressed. Returns at most one
    /// newly-triggered edge per call (four switches are vanishingly
    /// unlikely to cross threshold on the exact same tick, and if they did,
    /// the caller's next poll catches the rest).
    pub fn poll(&mut self) -> Option<LimitEvent> {
        // is_low() never fails on a plain GPIO input; treat an electrical
        // fault as "not pressed" rather than propagating an error type
        // through the whole motion core.
        let pressed_h_min = self.h_min.is_low().unwrap_or(false);
        let pressed_h_max = self.h_max.is_low().unwrap_or(false);
        let pressed_v_min = self.v_min.is_low().unwrap_or(false);
        let pressed_v_max = self.v_max.is_low().unwrap_or(false);

        let mut event = None;
        if self.deb_h_min.sample(pressed_h_min) {
            event = Some(LimitEvent { side: Side::HMin });
        }
        if event.is_none() && self.deb_h_max.sample(pressed_h_max) {
            event = Some(LimitEvent { side: Side::HMax });
        }
        if event.is_none() && self.deb_v_min.sample(pressed_v_min) {
            event = Some(LimitEvent { side: Side::VMin });
        }
        if event.is_none() && self.deb_v_max.sample(pressed_v_max) {
            event = Some(LimitEvent { side: Side::VMax });
        }

        if self.heartbeat_enabled && self.mask().any() {
            self.heartbeat_counter += 1;
            if self.heartbeat_counter >= HEARTBEAT_PERIOD_TICKS {
                self.heartbeat_counter = 0;
            }
        } else {
            self.heartbeat_counter = 0;
        }

        event
    }

    /// `true` once per heartbeat period while any switch is held and the
    /// host has opted in.
    pub fn heartbeat_due(&self) -> bool {
        self.heartbeat_enabled && self.mask().any() && self.heartbeat_counter == 0
    }

    pub fn mask(&self) -> LimitMask {
        LimitMask {
            h_min: self.deb_h_min.triggered,
            h_max: self.deb_h_max.triggered,
            v_min: self.deb_v_min.triggered,
            v_max: self.deb_v_max.triggered,
        }
    }

    /// `false` when motion in `dir` on the H axis is vetoed by a triggered
    /// switch on that side; the opposite direction always remains allowed
    /// so the operator can back off (spec 4.4 "Veto").
    pub fn check_h(&self, dir: Direction) -> bool {
        match dir {
            Direction::Positive => !self.deb_h_max.triggered,
            Direction::Negative => !self.deb_h_min.triggered,
        }
    }

    pub fn check_v(&self, dir: Direction) -> bool {
        match dir {
            Direction::Positive => !self.deb_v_max.triggered,
            Direction::Negative => !self.deb_v_min.triggered,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;

    struct FixedPin(bool); // true == electrically low == pressed

    impl InputPin for FixedPin {
        type Error = Infallible;
        fn is_high(&self) -> Result<bool, Infallible> {
            Ok(!self.0)
        }
        fn is_low(&self) -> Result<bool, Infallible> {
            Ok(self.0)
        }
    }

    fn sup(h_min: bool, h_max: bool, v_min: bool, v_max: bool) -> LimitSupervisor<FixedPin, FixedPin, FixedPin, FixedPin> {
        LimitSupervisor::new(FixedPin(h_min), FixedPin(h_max), FixedPin(v_min), FixedPin(v_max))
    }

    #[test]
    fn single_bounce_does_not_trigger() {
        let mut s = sup(false, false, false, false);
        s.h_min = FixedPin(true);
        assert!(s.poll().is_none());
        s.h_min = FixedPin(false);
        assert!(s.poll().is_none());
        assert!(!s.mask().h_min);
    }

    #[test]
    fn sustained_press_triggers_at_threshold() {
        let mut s = sup(false, false, false, false);
        s.h_max = FixedPin(true);
        let mut fired = false;
        for _ in 0..THRESHOLD {
            if s.poll().is_some() {
                fired = true;
            }
        }
        assert!(fired);
        assert!(s.mask().h_max);
    }

    #[test]
    fn release_clears_triggered_state() {
        let mut s = sup(false, false, false, false);
        s.v_min = FixedPin(true);
        for _ in 0..THRESHOLD {
            s.poll();
        }
        assert!(s.mask().v_min);
        s.v_min = FixedPin(false);
        s.poll();
        assert!(!s.mask().v_min);
    }

    #[test]
    fn veto_blocks_only_the_triggered_direction() {
        let mut s = sup(false, true, false, false);
        for _ in 0..THRESHOLD {
            s.poll();
        }
        assert!(!s.check_h(Direction::Positive));
        assert!(s.check_h(Direction::Negative));
        assert!(s.check_v(Direction::Positive));
    }
}
