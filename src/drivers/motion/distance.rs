// SPDX-License-Identifier: GPL-3.0-or-later

// The firmware plans entirely in steps; millimetres only exist at the
// protocol boundary. Each axis gets its own steps-per-mm ratio, so a
// diagonal that is straight in step-space is not generally straight in
// mm-space (see the Open Questions in DESIGN.md).

use crate::consts::motion::hardware::*;

#[derive(PartialEq, PartialOrd, Clone, Copy, Debug)]
pub struct Steps(pub i32);

impl Steps {
    pub const ZERO: Self = Self(0);

    pub fn abs(self) -> u32 {
        self.0.unsigned_abs()
    }
}

impl core::ops::Add for Steps {
    type Output = Steps;
    fn add(self, rhs: Self) -> Self::Output {
        Steps(self.0 + rhs.0)
    }
}

impl core::ops::Sub for Steps {
    type Output = Steps;
    fn sub(self, rhs: Self) -> Self::Output {
        Steps(self.0 - rhs.0)
    }
}

impl core::ops::Neg for Steps {
    type Output = Steps;
    fn neg(self) -> Self::Output {
        Steps(-self.0)
    }
}

/// Which physical axis a distance/speed/acceleration value belongs to.
/// `steps_per_mm` differs per axis, so conversions must be tagged.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AxisId {
    H,
    V,
}

impl AxisId {
    pub const fn steps_per_mm(self) -> u32 {
        match self {
            AxisId::H => STEPS_PER_MM_H,
            AxisId::V => STEPS_PER_MM_V,
        }
    }

    pub fn mm_to_steps(self, mm: i32) -> Steps {
        Steps(mm * self.steps_per_mm() as i32)
    }

    pub fn steps_to_mm(self, steps: Steps) -> i32 {
        steps.0 / self.steps_per_mm() as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mm_round_trips_through_steps() {
        let mm = 10;
        let steps = AxisId::H.mm_to_steps(mm);
        assert_eq!(steps, Steps(10 * STEPS_PER_MM_H as i32));
        assert_eq!(AxisId::H.steps_to_mm(steps), mm);
    }

    #[test]
    fn axes_use_independent_ratios() {
        assert_ne!(AxisId::H.steps_per_mm(), AxisId::V.steps_per_mm());
        assert_eq!(AxisId::H.mm_to_steps(1).0, STEPS_PER_MM_H as i32);
        assert_eq!(AxisId::V.mm_to_steps(1).0, STEPS_PER_MM_V as i32);
    }

    #[test]
    fn steps_arithmetic() {
        assert_eq!(Steps(5) + Steps(3), Steps(8));
        assert_eq!(Steps(5) - Steps(3), Steps(2));
        assert_eq!(-Steps(5), Steps(-5));
        assert_eq!(Steps(-7).abs(), 7);
    }
}
