// SPDX-License-Identifier: GPL-3.0-or-later

// System clock configuration and cycle-accurate delays. Grounded on the
// reference firmware's clock module, simplified from its custom GD32 PLL
// register sequence down to the plain `stm32f1xx-hal` RCC builder, since
// this target has no embassy async runtime or external PLL quirks to work
// around.

use cortex_m::peripheral::DWT;
use stm32f1xx_hal::{prelude::*, rcc::Clocks};

use crate::consts::system::SYSCLK_HZ;

/// Configures the system clock from the board's 8 MHz HSE crystal up to
/// the target frequency via the internal PLL.
pub fn setup_clocks(rcc: stm32f1xx_hal::rcc::Rcc, flash: &mut stm32f1xx_hal::flash::Parts) -> Clocks {
    rcc.cfgr
        .use_hse(8.mhz())
        .sysclk(SYSCLK_HZ.hz())
        .pclk1((SYSCLK_HZ / 2).hz())
        .pclk2(SYSCLK_HZ.hz())
        .freeze(&mut flash.acr)
}

#[inline(always)]
pub fn delay_ns(clocks: &Clocks, duration_ns: u32) {
    let cycles = ((clocks.sysclk().0 as u64) * (duration_ns as u64) / 1_000_000_000) as u32;
    cortex_m::asm::delay(cycles.max(1));
}

#[inline(always)]
pub fn delay_us(clocks: &Clocks, duration_us: u32) {
    delay_ns(clocks, duration_us * 1000)
}

#[inline(always)]
pub fn delay_ms(clocks: &Clocks, duration_ms: u32) {
    delay_us(clocks, duration_ms * 1000)
}

/// Free-running cycle counter used to time the serial link's framing
/// timeout and to profile hot paths during bring-up.
pub struct CycleCounter {
    dwt: DWT,
}

impl CycleCounter {
    pub fn new(mut dwt: DWT) -> Self {
        dwt.enable_cycle_counter();
        Self { dwt }
    }

    pub fn cycles(&self) -> u32 {
        self.dwt.cyccnt.read()
    }
}

