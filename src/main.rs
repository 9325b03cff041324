// SPDX-License-Identifier: GPL-3.0-or-later

#![no_std]
#![no_main]
#![feature(core_intrinsics)]
#![allow(internal_features)]

mod consts;
mod drivers;
mod logging;
mod protocol;

use consts::motion::TICK_FREQ_HZ;
use drivers::gripper::GripperState;
use drivers::machine::Machine;
use drivers::nvram::{Nvram, PersistedState};
use drivers::nvram_flash::FlashPage;
use protocol::{command, reply, Dispatcher, FrameCodec};

#[inline(never)]
#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    log::error!("{}", info);
    loop {
        cortex_m::asm::nop();
    }
}

/// Compare-register value for the 250 Hz motion tick, derived from the bus
/// clock the step timers are also prescaled from.
fn tick_compare_value(clocks: &stm32f1xx_hal::rcc::Clocks) -> u16 {
    let ticks = clocks.pclk1().0 / TICK_FREQ_HZ;
    ticks.clamp(1, u16::MAX as u32) as u16
}

#[rtic::app(device = stm32f1xx_hal::pac, peripherals = true)]
mod app {
    use super::*;
    use stm32f1xx_hal::pac::{TIM2, TIM4, TIM7, USART1};
    use stm32f1xx_hal::prelude::*;
    use stm32f1xx_hal::serial::{Rx, Tx};

    #[shared]
    struct Shared {
        machine: Machine,
        dispatcher: Dispatcher,
        frame_codec: FrameCodec,
        tick_pending: bool,
        nvram_dirty: bool,
    }

    #[local]
    struct Local {
        serial_rx: Rx<USART1>,
        serial_tx: Tx<USART1>,
        nvram: Nvram<FlashPage>,
    }

    #[init]
    fn init(ctx: init::Context) -> (Shared, Local, init::Monotonics) {
        logging::init_logging();
        log::info!("init");

        let mut machine = Machine::new(ctx.core, ctx.device);
        let (serial_tx, mut serial_rx) = machine.serial.split();
        serial_rx.listen();

        arm_step_timer_tim2();
        arm_step_timer_tim4();
        arm_tick_timer_tim7(tick_compare_value(&machine.clocks));

        let mut nvram = Nvram::new(FlashPage::new(machine.flash));
        let restored = nvram.load().unwrap_or_default();
        let _ = machine.servos.set_immediate(0, restored.servo1_angle);
        let _ = machine.servos.set_immediate(1, restored.servo2_angle);
        if restored.gripper_open {
            machine.gripper.open();
        }

        (
            Shared {
                machine,
                dispatcher: Dispatcher::new(),
                frame_codec: FrameCodec::new(),
                tick_pending: false,
                nvram_dirty: false,
            },
            Local { serial_rx, serial_tx, nvram },
            init::Monotonics(),
        )
    }

    /// H-axis step timer. Both mechanically-slaved drivers toggle from this
    /// single compare event (spec 4.1/4.2's pulse engine).
    #[task(priority = 5, binds = TIM2, shared = [machine])]
    fn h_step_interrupt(mut ctx: h_step_interrupt::Context) {
        let tim = unsafe { &*TIM2::ptr() };
        tim.sr.modify(|_, w| w.uif().clear_bit());
        match ctx.shared.machine.lock(|m| m.coordinator.h.on_interrupt()) {
            Some(half_period) => tim.arr.write(|w| w.arr().bits(half_period)),
            None => tim.cr1.modify(|_, w| w.cen().clear_bit()),
        }
    }

    #[task(priority = 5, binds = TIM4, shared = [machine])]
    fn v_step_interrupt(mut ctx: v_step_interrupt::Context) {
        let tim = unsafe { &*TIM4::ptr() };
        tim.sr.modify(|_, w| w.uif().clear_bit());
        match ctx.shared.machine.lock(|m| m.coordinator.v.on_interrupt()) {
            Some(half_period) => tim.arr.write(|w| w.arr().bits(half_period)),
            None => tim.cr1.modify(|_, w| w.cen().clear_bit()),
        }
    }

    /// 250 Hz motion tick: only raises `tick_pending` for the idle loop to
    /// consume, per spec 5's ISR timing budget.
    #[task(priority = 4, binds = TIM7, shared = [tick_pending])]
    fn tick_interrupt(mut ctx: tick_interrupt::Context) {
        let tim = unsafe { &*TIM7::ptr() };
        tim.sr.modify(|_, w| w.uif().clear_bit());
        ctx.shared.tick_pending.lock(|p| *p = true);
    }

    #[task(priority = 3, binds = USART1, local = [serial_rx], shared = [frame_codec])]
    fn serial_rx_interrupt(mut ctx: serial_rx_interrupt::Context) {
        if let Ok(byte) = ctx.local.serial_rx.read() {
            ctx.shared.frame_codec.lock(|f| f.on_byte(byte));
        }
    }

    #[idle(local = [serial_tx, nvram], shared = [machine, dispatcher, frame_codec, tick_pending, nvram_dirty])]
    fn idle(mut ctx: idle::Context) -> ! {
        loop {
            handle_incoming_command(&mut ctx);
            if ctx.shared.tick_pending.lock(|p| core::mem::replace(p, false)) {
                run_tick(&mut ctx);
            }
            if ctx.shared.nvram_dirty.lock(|d| core::mem::replace(d, false)) {
                persist_state(&mut ctx);
            }
        }
    }

    fn handle_incoming_command(ctx: &mut idle::Context) {
        let frame = ctx.shared.frame_codec.lock(|f| f.take_ready());
        let Some(bytes) = frame else { return };
        let Ok(text) = core::str::from_utf8(&bytes) else { return };

        let reply = match command::parse(text) {
            Ok(cmd) => ctx.shared.machine.lock(|m| {
                ctx.shared.dispatcher.lock(|d| {
                    d.dispatch(cmd, &mut m.coordinator, &m.limits, &mut m.servos, &mut m.gripper)
                })
            }),
            Err(command::ParseError::UnknownCmd) => reply::err_detail(reply::ErrorTag::UnknownCmd, text),
            Err(command::ParseError::InvalidParams) => reply::err(reply::ErrorTag::InvalidParams),
        };

        // A move/stop just armed or froze the axes in place -- (re)load the
        // step timers' compare registers from the freshly armed profile and
        // start or stop them. Harmless no-op for commands that never touch
        // the coordinator.
        sync_step_timers(&mut ctx.shared.machine);

        write_reply(ctx.local.serial_tx, &reply);
    }

    fn run_tick(ctx: &mut idle::Context) {
        let (limit_event, completed, gripper_settled) = ctx.shared.machine.lock(|m| {
            let event = m.limits.poll();
            m.coordinator.update_profiles();
            m.servos.update(1000 / TICK_FREQ_HZ);
            let was_moving = m.gripper.state() == GripperState::Moving;
            m.gripper.on_tick();
            let settled = was_moving && m.gripper.state() != GripperState::Moving;
            (event, m.coordinator.poll_completion(), settled)
        });

        if let Some(event) = limit_event {
            write_reply(ctx.local.serial_tx, &reply::limit_triggered(event.side));
            let (h_pos, v_pos) = ctx.shared.machine.lock(|m| {
                m.coordinator.stop();
                (m.coordinator.h.current_position(), m.coordinator.v.current_position())
            });
            write_reply(ctx.local.serial_tx, &reply::position_at_limit(h_pos, v_pos));
        }

        // Pushes the profile's freshly recomputed speed into the running
        // step timers (or stops them, if a limit trip just called `stop()`
        // above).
        sync_step_timers(&mut ctx.shared.machine);

        if let Some((h, v)) = completed {
            write_reply(ctx.local.serial_tx, &reply::move_completed(h, v));
            ctx.shared.nvram_dirty.lock(|d| *d = true);
        }

        if gripper_settled {
            ctx.shared.nvram_dirty.lock(|d| *d = true);
        }
    }

    fn sync_step_timers(machine: &mut impl rtic::Mutex<T = Machine>) {
        let (h_pending, v_pending) =
            machine.lock(|m| (m.coordinator.h.pending_half_period(), m.coordinator.v.pending_half_period()));
        sync_step_timer_tim2(h_pending);
        sync_step_timer_tim4(v_pending);
    }

    fn persist_state(ctx: &mut idle::Context) {
        let state = ctx.shared.machine.lock(|m| {
            let (a1, a2) = m.servos.angles();
            PersistedState {
                servo1_angle: a1,
                servo2_angle: a2,
                gripper_open: m.gripper.state() == GripperState::Open,
            }
        });
        let _ = ctx.local.nvram.save(&state);
    }

    fn write_reply(tx: &mut Tx<USART1>, reply: &reply::ReplyString) {
        for byte in reply.as_bytes() {
            let _ = nb::block!(tx.write(*byte));
        }
    }

    /// One-time setup at boot: prescaler and interrupt-on-update enabled,
    /// counter stopped. `Axis::arm()` only updates the pure-logic motion
    /// state -- it never touches a register -- so starting/stopping the
    /// counter and loading `arr` is `sync_step_timer_tim2`/`tim4`'s job,
    /// called after every dispatch and every tick.
    fn arm_step_timer_tim2() {
        let tim = unsafe { &*TIM2::ptr() };
        tim.psc.write(|w| w.psc().bits(0));
        tim.arr.write(|w| w.arr().bits(u16::MAX));
        tim.dier.modify(|_, w| w.uie().set_bit());
        tim.cr1.modify(|_, w| w.cen().clear_bit());
    }

    fn arm_step_timer_tim4() {
        let tim = unsafe { &*TIM4::ptr() };
        tim.psc.write(|w| w.psc().bits(0));
        tim.arr.write(|w| w.arr().bits(u16::MAX));
        tim.dier.modify(|_, w| w.uie().set_bit());
        tim.cr1.modify(|_, w| w.cen().clear_bit());
    }

    /// Loads the compare register from the axis's currently pending
    /// half-period and starts the counter, or stops it if the axis isn't
    /// moving. Idempotent, so it's safe to call after any command and
    /// every tick rather than only on the transitions that matter.
    fn sync_step_timer_tim2(pending: Option<u16>) {
        let tim = unsafe { &*TIM2::ptr() };
        match pending {
            Some(half_period) => {
                tim.arr.write(|w| w.arr().bits(half_period));
                tim.cr1.modify(|_, w| w.cen().set_bit());
            }
            None => tim.cr1.modify(|_, w| w.cen().clear_bit()),
        }
    }

    fn sync_step_timer_tim4(pending: Option<u16>) {
        let tim = unsafe { &*TIM4::ptr() };
        match pending {
            Some(half_period) => {
                tim.arr.write(|w| w.arr().bits(half_period));
                tim.cr1.modify(|_, w| w.cen().set_bit());
            }
            None => tim.cr1.modify(|_, w| w.cen().clear_bit()),
        }
    }

    fn arm_tick_timer_tim7(compare: u16) {
        let tim = unsafe { &*TIM7::ptr() };
        tim.psc.write(|w| w.psc().bits(0));
        tim.arr.write(|w| w.arr().bits(compare));
        tim.dier.modify(|_, w| w.uie().set_bit());
        tim.cr1.modify(|_, w| w.cen().set_bit());
    }
}
