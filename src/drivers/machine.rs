// SPDX-License-Identifier: GPL-3.0-or-later

// Hardware bring-up: claims every GPIO/timer/UART peripheral the firmware
// uses and hands back owned driver objects. Grounded on the reference
// firmware's `Machine::new` (one big peripheral-splitting constructor that
// can't be decomposed into smaller functions because it consumes the PAC's
// `Peripherals` struct by value), generalized from a display/touch/flash
// rig to a two-axis gantry rig.

use stm32f1xx_hal::{
    pac,
    prelude::*,
    timer::Timer,
    serial::{Config, Serial},
    gpio::{gpioa, Input, Output, PullUp, PushPull},
};

use crate::consts::{motion, serial, servo};
use super::clock;
use super::motion::{Axis, Coordinator, GangedOutputs, LimitSupervisor};
use super::servo::ServoPair;
use super::gripper::Gripper;

pub type HAxis = Axis<GangedOutputs<DynOutput, 2>>;
pub type VAxis = Axis<GangedOutputs<DynOutput, 1>>;

pub type DynOutput = stm32f1xx_hal::gpio::Pxx<Output<PushPull>>;
pub type DynInput = stm32f1xx_hal::gpio::Pxx<Input<PullUp>>;

pub type Limits = LimitSupervisor<DynInput, DynInput, DynInput, DynInput>;

pub struct Machine {
    pub coordinator: Coordinator<GangedOutputs<DynOutput, 2>, GangedOutputs<DynOutput, 1>>,
    pub limits: Limits,
    pub servos: ServoPair<stm32f1xx_hal::pwm::PwmChannel<pac::TIM3, stm32f1xx_hal::timer::C1>,
                           stm32f1xx_hal::pwm::PwmChannel<pac::TIM3, stm32f1xx_hal::timer::C2>>,
    pub gripper: Gripper<DynOutput, DynOutput, DynOutput, DynOutput>,
    pub serial: Serial<pac::USART1, (gpioa::PA9<stm32f1xx_hal::gpio::Alternate<PushPull>>, gpioa::PA10<Input<stm32f1xx_hal::gpio::Floating>>)>,
    pub clocks: stm32f1xx_hal::rcc::Clocks,
    pub cycle_counter: clock::CycleCounter,
    pub flash: stm32f1xx_hal::flash::Parts,
}

impl Machine {
    pub fn new(cp: cortex_m::Peripherals, dp: pac::Peripherals) -> Self {
        let mut flash = dp.FLASH.constrain();
        let rcc = dp.RCC.constrain();
        let clocks = clock::setup_clocks(rcc, &mut flash);

        let mut gpioa = dp.GPIOA.split();
        let mut gpiob = dp.GPIOB.split();
        let mut gpioc = dp.GPIOC.split();
        let mut afio = dp.AFIO.constrain();

        let cycle_counter = clock::CycleCounter::new(cp.DWT);

        //--------------------------
        //  H axis: two mechanically slaved stepper drivers
        //--------------------------
        let h_step1 = gpioa.pa0.into_push_pull_output(&mut gpioa.crl).downgrade();
        let h_dir1 = gpioa.pa1.into_push_pull_output(&mut gpioa.crl).downgrade();
        let h_en1 = gpioa.pa2.into_push_pull_output(&mut gpioa.crl).downgrade();
        let h_step2 = gpioa.pa3.into_push_pull_output(&mut gpioa.crl).downgrade();
        let h_dir2 = gpioa.pa4.into_push_pull_output(&mut gpioa.crl).downgrade();
        let h_en2 = gpioa.pa5.into_push_pull_output(&mut gpioa.crl).downgrade();

        let h_driver = GangedOutputs {
            step: [h_step1, h_step2],
            dir: [h_dir1, h_dir2],
            enable: [h_en1, h_en2],
            dir_forward_is_high: true,
        };
        let h_axis = Axis::new(
            h_driver,
            motion::V_MIN_H,
            motion::limits::MAX_SPEED_H,
            motion::limits::ACCEL_H,
        );

        //--------------------------
        //  V axis: one stepper driver
        //--------------------------
        let v_step = gpioa.pa6.into_push_pull_output(&mut gpioa.crl).downgrade();
        let v_dir = gpioa.pa7.into_push_pull_output(&mut gpioa.crl).downgrade();
        let v_en = gpiob.pb0.into_push_pull_output(&mut gpiob.crl).downgrade();

        let v_driver = GangedOutputs {
            step: [v_step],
            dir: [v_dir],
            enable: [v_en],
            dir_forward_is_high: true,
        };
        let v_axis = Axis::new(
            v_driver,
            motion::V_MIN_V,
            motion::limits::MAX_SPEED_V,
            motion::limits::ACCEL_V,
        );

        let coordinator = Coordinator::new(h_axis, v_axis);

        //--------------------------
        //  End-of-travel switches (active low, internal pull-up)
        //--------------------------
        let h_min = gpiob.pb1.into_pull_up_input(&mut gpiob.crl).downgrade();
        let h_max = gpiob.pb2.into_pull_up_input(&mut gpiob.crl).downgrade();
        let v_min = gpiob.pb10.into_pull_up_input(&mut gpiob.crh).downgrade();
        let v_max = gpiob.pb11.into_pull_up_input(&mut gpiob.crh).downgrade();

        let limits = LimitSupervisor::new(h_min, h_max, v_min, v_max);

        //--------------------------
        //  Servo pair (end-effector wrist/elbow joints). PB4 doubles as
        //  NJTRST out of reset; freeing it for TIM3 requires giving up JTAG
        //  (SWD on PA13/PA14 remains available for debugging).
        //--------------------------
        let (_pa15, _pb3, pb4) = afio.mapr.disable_jtag(gpioa.pa15, gpiob.pb3, gpiob.pb4);
        let pb4 = pb4.into_alternate_push_pull(&mut gpiob.crl);
        let pb5 = gpiob.pb5.into_alternate_push_pull(&mut gpiob.crl);
        let (servo_c1, servo_c2) = Timer::new(dp.TIM3, &clocks)
            .pwm((pb4, pb5), &mut afio.mapr, servo::PWM_REFRESH_HZ.hz())
            .split();
        let servos = ServoPair::new(servo_c1, servo_c2);

        //--------------------------
        //  Gripper: 4 GPIO phase outputs
        //--------------------------
        let g1 = gpiob.pb6.into_push_pull_output(&mut gpiob.crl).downgrade();
        let g2 = gpiob.pb7.into_push_pull_output(&mut gpiob.crl).downgrade();
        let g3 = gpiob.pb8.into_push_pull_output(&mut gpiob.crh).downgrade();
        let g4 = gpiob.pb9.into_push_pull_output(&mut gpiob.crh).downgrade();
        let gripper = Gripper::new(g1, g2, g3, g4, false);

        //--------------------------
        //  Serial command link
        //--------------------------
        let tx = gpioa.pa9.into_alternate_push_pull(&mut gpioa.crh);
        let rx = gpioa.pa10;
        let serial = Serial::usart1(
            dp.USART1,
            (tx, rx),
            &mut afio.mapr,
            Config::default().baudrate(serial::BAUD_RATE.bps()),
            clocks,
        );

        //--------------------------
        //  Diagnostic-only quadrature encoders (no consumer)
        //--------------------------
        let _h_encoder_a = gpioc.pc0.into_floating_input(&mut gpioc.crl);
        let _h_encoder_b = gpioc.pc1.into_floating_input(&mut gpioc.crl);

        Self { coordinator, limits, servos, gripper, serial, clocks, cycle_counter, flash }
    }
}
