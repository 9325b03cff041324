// SPDX-License-Identifier: GPL-3.0-or-later

pub mod system {
    pub const SYSCLK_HZ: u32 = 72_000_000;

    // RTIC's systick-based monotonic; used for calibration-mode timeouts
    // only, never in the step ISRs.
    pub const SYSTICK_HZ: u32 = 1_000;
}

pub mod serial {
    pub const BAUD_RATE: u32 = 115_200;
    // Largest payload accepted between '<' and '>'. Longer frames are
    // silently dropped and the parser resynchronizes on the next '<'.
    pub const FRAME_BUFFER_LEN: usize = 128;
}

pub mod motion {
    // Tick rate for profile updates and limit-switch polling. The spec
    // bounds this to 100-500 Hz; 250 Hz sits comfortably in the middle.
    pub const TICK_FREQ_HZ: u32 = 250;

    // Step timer runs at 1us resolution. Small enough to keep speed error
    // low, large enough that the ISR has room to run.
    pub const STEP_TIMER_FREQ_HZ: u32 = 1_000_000;

    // Steps/s below which the profiler never asks the pulse engine to go;
    // keeps the timer's compare register away from the top of its range.
    pub const V_MIN_H: u32 = 200;
    pub const V_MIN_V: u32 = 200;

    pub mod hardware {
        // Full steps/rev * microsteps / mm-per-revolution, per axis.
        pub const STEPS_PER_MM_H: u32 = 40;
        pub const STEPS_PER_MM_V: u32 = 200;
    }

    pub mod limits {
        pub const MAX_SPEED_H: u32 = 8_000; // steps/s
        pub const MAX_SPEED_V: u32 = 12_000;
        pub const ACCEL_H: u32 = 20_000; // steps/s^2
        pub const ACCEL_V: u32 = 30_000;

        pub const X_MAX_MM: i32 = 400;
        pub const Y_MAX_MM: i32 = 350;
    }

    pub mod debounce {
        // Consecutive "pressed" samples (at the tick rate) needed before a
        // limit switch is considered triggered.
        pub const THRESHOLD: u8 = 4;
        // How often (in ticks) a held switch re-announces itself once the
        // host has opted into the heartbeat.
        pub const HEARTBEAT_PERIOD_TICKS: u32 = super::TICK_FREQ_HZ;
    }
}

pub mod servo {
    pub const PWM_REFRESH_HZ: u32 = 50;
    // Pulse-width calibration, in timer compare counts, mapping 0deg-180deg.
    pub const PWM_MIN: u16 = 1000;
    pub const PWM_MAX: u16 = 2000;
    pub const NEUTRAL_ANGLE: u16 = 90;
}

pub mod gripper {
    // Half-step 8-phase sequence; one phase transition per tick-interval expiry.
    pub const TICKS_PER_PHASE: u32 = 2;
    pub const STEPS_TO_OPEN: u32 = 48;
    pub const STEPS_TO_CLOSE: u32 = 48;
}

pub mod nvram {
    pub const MAGIC_COOKIE: u8 = 0xA5;
}
