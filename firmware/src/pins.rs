// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Pin definitions for the STM32F405RG on the ThermoNode board.

use stm32f4xx_hal::{
    gpio::{gpioa, gpiob, gpioc, Alternate, Input, OpenDrain, Output, PinState, PushPull},
    pac,
    prelude::*,
    rcc::Rcc,
};

/// All board pins. Construct this once at startup using:
///
/// ```rust
/// let pins = BoardPins::new(dp.GPIOA, dp.GPIOB, dp.GPIOC, &mut rcc);
/// ```
pub struct BoardPins {
    pub indicators: IndicatorPins,
    pub usart1: Usart1Pins,
    pub i2c1: I2c1Pins,
    pub spi1: Spi1Pins,
    pub w5500: W5500Pins,
    /// TCA9548A RESET, active low.
    pub mux_reset: gpiob::PB5<Output<PushPull>>,
}

pub struct IndicatorPins {
    pub status: gpioc::PC0<Output<PushPull>>,
    pub alarm: gpioc::PC1<Output<PushPull>>,
}

pub struct Usart1Pins {
    pub tx: gpioa::PA9<Alternate<7>>,
    pub rx: gpioa::PA10<Alternate<7>>,
}

/// Camera bus: TCA9548A and the four MLX90640s behind it.
pub struct I2c1Pins {
    pub scl: gpiob::PB6<Alternate<4, OpenDrain>>,
    pub sda: gpiob::PB7<Alternate<4, OpenDrain>>,
}

/// W5500 SCK/MISO/MOSI and CS
pub struct Spi1Pins {
    pub sck: gpioa::PA5<Alternate<5>>,
    pub miso: gpioa::PA6<Alternate<5>>,
    pub mosi: gpioa::PA7<Alternate<5>>,
    pub cs: gpioa::PA4<Output<PushPull>>,
}

pub struct W5500Pins {
    pub reset: gpioc::PC4<Output<PushPull>>,
    /// Interrupt line; the reporter polls, so this is only held as an input.
    pub int: gpioc::PC5<Input>,
}

impl BoardPins {
    /// Create all named pins from raw GPIO peripherals.
    pub fn new(gpioa: pac::GPIOA, gpiob: pac::GPIOB, gpioc: pac::GPIOC, rcc: &mut Rcc) -> Self {
        let gpioa = gpioa.split(rcc);
        let gpiob = gpiob.split(rcc);
        let gpioc = gpioc.split(rcc);

        Self {
            indicators: IndicatorPins {
                status: gpioc.pc0.into_push_pull_output(),
                alarm: gpioc.pc1.into_push_pull_output(),
            },

            usart1: Usart1Pins {
                tx: gpioa.pa9.into_alternate::<7>(),
                rx: gpioa.pa10.into_alternate::<7>(),
            },

            i2c1: I2c1Pins {
                scl: gpiob.pb6.into_alternate_open_drain::<4>(),
                sda: gpiob.pb7.into_alternate_open_drain::<4>(),
            },

            spi1: Spi1Pins {
                sck: gpioa.pa5.into_alternate::<5>(),
                miso: gpioa.pa6.into_alternate::<5>(),
                mosi: gpioa.pa7.into_alternate::<5>(),
                cs: gpioa.pa4.into_push_pull_output_in_state(PinState::High),
            },

            w5500: W5500Pins {
                reset: gpioc.pc4.into_push_pull_output_in_state(PinState::High),
                int: gpioc.pc5.into_pull_up_input(),
            },

            mux_reset: gpiob.pb5.into_push_pull_output_in_state(PinState::High),
        }
    }
}
