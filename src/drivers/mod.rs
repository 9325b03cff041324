// SPDX-License-Identifier: GPL-3.0-or-later

pub mod clock;
pub mod machine;
pub mod motion;
pub mod servo;
pub mod gripper;
pub mod nvram;
pub mod nvram_flash;
