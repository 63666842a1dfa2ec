// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! ThermoNode board firmware.
//!
//! `idle` runs the acquisition loop back to back. The network reporter is polled from TIM2 at
//! 200 Hz at a higher priority, so a stalled connection never holds up the cameras. The two
//! contexts only share the lock-free frame and command queues and the telemetry atomics.
//!
//! The camera calibration tables, the sweep buffer and the encoder buffer live in `init`
//! locals, i.e. statics, and are only ever borrowed. The stack in CCM RAM never holds them.

#![no_main]
#![no_std]

use panic_halt as _;

mod clock;
mod pins;
mod spi;
mod usart;
mod watchdog;

#[rtic::app(device = stm32f4xx_hal::pac, peripherals = true)]
mod app {
    use embedded_hal::delay::DelayNs;
    use heapless::spsc::Queue;
    use stm32f4xx_hal::{
        gpio::{gpiob, gpioc, Output, PushPull},
        i2c::I2c,
        pac,
        prelude::*,
        rcc::Config,
        serial::{Config as SerialConfig, Serial},
        spi::{Mode, Phase, Polarity, Spi},
        timer::{CounterHz, DelayUs, Event, Flag},
    };

    use thermonode::acquisition::{AcquisitionLoop, FrameAggregator, MultiplexManager};
    use thermonode::config::NodeConfig;
    use thermonode::drivers::{mlx90640, tca9548a, Mlx90640, Tca9548a};
    use thermonode::hw::Led;
    use thermonode::network::{CommandQueue, FrameQueue, FrameSender, Reporter, Telemetry};
    use thermonode::protocol::MAX_FRAME_MESSAGE;
    use thermonode::status::StatusOutputs;
    use thermonode::time::Duration;
    use thermonode::NUM_CHANNELS;

    use crate::clock::{self, SysTickClock};
    use crate::pins::BoardPins;
    use crate::spi::{ChipSelect, SpiDevice};
    use crate::usart::{self, Usart};
    use crate::watchdog::Iwdg;

    const SYSCLK_HZ: u32 = 168_000_000;
    const WATCHDOG_TIMEOUT_MS: u32 = 4_000;
    const REPORTER_POLL_HZ: u32 = 200;

    static TELEMETRY: Telemetry = Telemetry::new();

    const CAMERA: Mlx90640 = Mlx90640::new(mlx90640::DEFAULT_ADDRESS);

    type CameraBus = I2c<pac::I2C1>;
    type MuxReset = gpiob::PB5<Output<PushPull>>;
    type StatusPin = gpioc::PC0<Output<PushPull>>;
    type AlarmPin = gpioc::PC1<Output<PushPull>>;
    type Acquisition = AcquisitionLoop<
        'static,
        CameraBus,
        MuxReset,
        Mlx90640,
        DelayUs<pac::TIM5>,
        SysTickClock,
        Iwdg,
        StatusPin,
        AlarmPin,
    >;
    type EthernetSpi = SpiDevice<pac::SPI1, 'A', 4>;
    type NetworkReporter = Reporter<'static, EthernetSpi>;

    #[shared]
    struct Shared {}

    #[local]
    struct Local {
        acquisition: &'static mut Acquisition,
        reporter: &'static mut NetworkReporter,
        timer: CounterHz<pac::TIM2>,
        usart: Option<Usart>,
    }

    #[init(local = [
        frames: FrameQueue = Queue::new(),
        commands: CommandQueue = Queue::new(),
        cameras: [Mlx90640; NUM_CHANNELS] = [CAMERA; NUM_CHANNELS],
        aggregator: FrameAggregator = FrameAggregator::new(Duration::millis(2_000)),
        tx_buffer: [u8; MAX_FRAME_MESSAGE] = [0; MAX_FRAME_MESSAGE],
        acquisition_slot: Option<Acquisition> = None,
        reporter_slot: Option<NetworkReporter> = None,
    ])]
    fn init(cx: init::Context) -> (Shared, Local) {
        let dp = cx.device;

        // Clocks: 8 MHz crystal, 168 MHz core
        let mut rcc = dp.RCC.freeze(Config::hse(8.MHz()).sysclk(SYSCLK_HZ.Hz()));
        clock::start(cx.core.SYST, SYSCLK_HZ);

        let pins = BoardPins::new(dp.GPIOA, dp.GPIOB, dp.GPIOC, &mut rcc);

        // USART1 (DBG)
        let serial = Serial::new(
            dp.USART1,
            (pins.usart1.tx, pins.usart1.rx),
            SerialConfig::default().baudrate(115_200.bps()),
            &mut rcc,
        );
        let usart = serial.ok().map(Usart::new);
        // Lines logged during init are written out once interrupts are enabled.
        usart::init_logger(log::LevelFilter::Info);
        log::info!("thermonode starting");

        let config = NodeConfig::default();
        if let Err(e) = config.validate() {
            log::error!("invalid configuration: {}", e);
        }

        let mut delay = dp.TIM5.delay_us(&mut rcc);

        // SPI1 -> W5500
        let spi_mode = Mode {
            polarity: Polarity::IdleLow,
            phase: Phase::CaptureOnFirstTransition,
        };
        let spi1 = Spi::new(
            dp.SPI1,
            (Some(pins.spi1.sck), Some(pins.spi1.miso), Some(pins.spi1.mosi)),
            spi_mode,
            21.MHz(),
            &mut rcc,
        );
        let ethernet = SpiDevice::new(spi1, ChipSelect::active_low(pins.spi1.cs));

        let mut w5500_reset = pins.w5500.reset;
        w5500_reset.set_low();
        delay.delay_ms(1);
        w5500_reset.set_high();
        delay.delay_ms(2);

        let (frame_tx, frame_rx) = cx.local.frames.split();
        let (command_tx, command_rx) = cx.local.commands.split();

        let reporter = cx.local.reporter_slot.insert(Reporter::new(
            ethernet,
            config.network,
            config.mounts,
            frame_rx,
            command_tx,
            &TELEMETRY,
            cx.local.tx_buffer,
        ));
        if let Err(e) = reporter.start(&mut delay) {
            log::error!("w5500 init failed: {}", e);
        }

        // I2C1 -> TCA9548A -> 4x MLX90640
        let i2c = I2c::new(dp.I2C1, (pins.i2c1.scl, pins.i2c1.sda), 400.kHz(), &mut rcc);
        let mux = Tca9548a::with_reset(tca9548a::DEFAULT_ADDRESS, pins.mux_reset);
        let manager = MultiplexManager::new(i2c, mux, cx.local.cameras, &config.acquisition);

        let outputs = StatusOutputs::new(
            Led::active_high(pins.indicators.status),
            Led::active_high(pins.indicators.alarm),
        );

        let watchdog = Iwdg::start(dp.IWDG, WATCHDOG_TIMEOUT_MS);

        let acquisition = cx.local.acquisition_slot.insert(AcquisitionLoop::new(
            config,
            manager,
            cx.local.aggregator,
            outputs,
            FrameSender::new(frame_tx, &TELEMETRY),
            command_rx,
            delay,
            SysTickClock,
            watchdog,
        ));

        let mut timer = dp.TIM2.counter_hz(&mut rcc);
        if let Err(e) = timer.start(REPORTER_POLL_HZ.Hz()) {
            log::error!("tim2 start failed: {:?}", e);
        }
        timer.listen(Event::Update);

        (
            Shared {},
            Local {
                acquisition,
                reporter,
                timer,
                usart,
            },
        )
    }

    #[idle(local = [acquisition])]
    fn idle(cx: idle::Context) -> ! {
        let acquisition = cx.local.acquisition;
        acquisition.start();

        loop {
            match acquisition.run_sweep() {
                Ok(report) => log::debug!(
                    "sweep {}: {} frames, complete {}, queued {}",
                    report.sequence,
                    report.present,
                    report.complete,
                    report.queued
                ),
                Err(e) => log::error!("sweep failed: {}", e),
            }
        }
    }

    #[task(binds = TIM2, priority = 2, local = [reporter, timer])]
    fn network(cx: network::Context) {
        cx.local.timer.clear_flags(Flag::Update);
        cx.local.reporter.poll(clock::now());
    }

    /// Pended by the logger. Lowest interrupt priority, so writing a line only holds up `idle`.
    #[task(binds = USART1, priority = 1, local = [usart])]
    fn log_drain(cx: log_drain::Context) {
        if let Some(usart) = cx.local.usart.as_mut() {
            usart::drain(usart);
        }
    }

    #[task(binds = SysTick, priority = 3)]
    fn systick(_cx: systick::Context) {
        clock::tick();
    }
}
