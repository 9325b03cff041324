// SPDX-License-Identifier: GPL-3.0-or-later

// Backs `nvram::NvPage` with the MCU's own internal flash, using the last
// page of the 64K part as the persisted-state cell. Grounded on the
// reference firmware's `ExtFlash` (a thin owning wrapper around a single
// peripheral exposing read/erase/write), generalized from an external QSPI
// chip to `stm32f1xx_hal::flash::FlashWriter`.

use stm32f1xx_hal::flash::{FlashSize, FlashWriter, SectorSize};

use super::nvram::NvPage;

const PAGE_OFFSET: u32 = 63 * 1024;
const RECORD_LEN: usize = 6;

pub struct FlashPage {
    flash: stm32f1xx_hal::flash::Parts,
}

impl FlashPage {
    pub fn new(flash: stm32f1xx_hal::flash::Parts) -> Self {
        Self { flash }
    }

    fn writer(&mut self) -> FlashWriter {
        self.flash.writer(SectorSize::Sz1K, FlashSize::Sz64K)
    }
}

impl NvPage for FlashPage {
    type Error = stm32f1xx_hal::flash::Error;

    fn read(&mut self, buf: &mut [u8]) {
        match self.writer().read(PAGE_OFFSET, RECORD_LEN) {
            Ok(data) => buf.copy_from_slice(&data[..RECORD_LEN]),
            Err(_) => buf.fill(0xFF),
        }
    }

    fn erase(&mut self) -> Result<(), Self::Error> {
        self.writer().page_erase(PAGE_OFFSET)
    }

    fn write(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        self.writer().write(PAGE_OFFSET, data)
    }
}
