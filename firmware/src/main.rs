#![cfg_attr(target_arch = "arm", no_main)]
#![cfg_attr(target_arch = "arm", no_std)]

// The firmware only runs on the target, host builds get an empty binary.
#[cfg(not(target_arch = "arm"))]
fn main() {}

#[cfg(target_arch = "arm")]
use panic_persist as _;

#[cfg(target_arch = "arm")]
#[rtic::app(
    device = stm32l0xx_hal::pac,
    peripherals = true,
    dispatchers = [SPI1, SPI2],
)]
mod app {
    // Libcore
    use core::fmt::Write;

    // Third party
    use stm32l0xx_hal::gpio::{gpioa::PA6, OpenDrain, Output};
    use stm32l0xx_hal::prelude::*;
    use stm32l0xx_hal::{self as hal, pac, serial, time};

    // First party crates
    use hygrometer_common::dht11::{Dht11, Outcome};
    use hygrometer_common::line::OpenDrainLine;
    use hygrometer_common::timer::PeriodicTimer;
    use hygrometer_config::{self as config, Config};
    use hygrometer_firmware::delay::{Tim6Counter, Tim6Delay};
    use hygrometer_firmware::leds::StatusLeds;
    use hygrometer_firmware::{report, systick};

    const FIRMWARE_VERSION: &str = env!("CARGO_PKG_VERSION");

    type DataLine = OpenDrainLine<PA6<Output<OpenDrain>>>;
    type Sensor = Dht11<DataLine>;
    type LineError = <DataLine as hygrometer_common::line::SensorLine>::Error;

    #[shared]
    struct Shared {
        // Serial debug output
        debug: hal::serial::Serial<pac::USART1>,

        // Status LEDs
        status_leds: StatusLeds,
    }

    #[local]
    struct Local {
        // DHT11 humidity/temperature sensor
        sensor: Sensor,

        // Blocking delay provider
        delay: Tim6Delay,

        // Recurring actions, polled from idle
        read_timer: PeriodicTimer,
        heartbeat_timer: PeriodicTimer,
    }

    #[init]
    fn init(ctx: init::Context) -> (Shared, Local, init::Monotonics) {
        let mut cp = ctx.core;
        let mut dp: pac::Peripherals = ctx.device;

        // Init microsecond counter
        let mut delay = Tim6Delay::new(Tim6Counter::new(dp.TIM6, &mut dp.RCC));

        // Clock configuration. Use HSI at 16 MHz.
        let mut rcc = dp.RCC.freeze(hal::rcc::Config::hsi16());

        // Start the millisecond tick. The interrupt fires once init returns.
        systick::init(&mut cp.SYST);

        // Get access to GPIOs
        let gpioa = dp.GPIOA.split(&mut rcc);
        let gpiob = dp.GPIOB.split(&mut rcc);

        // Initialize serial port
        let mut debug = serial::Serial::usart1(
            dp.USART1,
            gpiob.pb6.into_floating_input(),
            gpiob.pb7.into_floating_input(),
            serial::Config {
                baudrate: time::Bps(57_600),
                wordlength: serial::WordLength::DataBits8,
                parity: serial::Parity::ParityNone,
                stopbits: serial::StopBits::STOP1,
            },
            &mut rcc,
        )
        .expect("Could not initialize debug serial");

        writeln!(debug, "Booting: Hygrometer firmware={}", FIRMWARE_VERSION).ok();

        // Check whether we just woke up after a panic
        if let Some(msg) = panic_persist::get_panic_message_utf8() {
            // If yes, send backtrace via serial
            writeln!(debug, "=== 🔥 FOUND PANIC 🔥 ===").ok();
            writeln!(debug, "{}", msg.trim_end()).ok();
            writeln!(debug, "==== 🚒 END PANIC 🚒 ====").ok();
        }

        // Dump EEPROM config data
        if cfg!(feature = "dev") {
            writeln!(debug, "\nEEPROM contents at 0x0808_0000:").ok();
            let config_data: &[u8] = unsafe {
                core::slice::from_raw_parts(
                    config::BASE_ADDR as *const u8,
                    config::CONFIG_DATA_SIZE,
                )
            };
            for byte in config_data {
                write!(debug, " {:02x}", byte).ok();
            }
            write!(debug, "\n\n").ok();
        }

        // Read config from EEPROM
        //
        // Note(unsafe): We need to guarantee that no part of the code can
        // write to EEPROM while it's being read. To ensure that, we hold a
        // mutable reference to the FLASH peripheral.
        let config = match unsafe {
            let _flash = &mut dp.FLASH;
            Config::read_from_eeprom()
        } {
            Ok(c) => c,
            Err(e) => {
                writeln!(debug, "Could not read config from EEPROM: {}", e).ok();
                writeln!(debug, "Falling back to default config").ok();
                Config::default()
            }
        };
        writeln!(debug, "Config: {}", config).ok();

        // Initialize LEDs
        writeln!(debug, "Initialize LEDs").ok();
        let mut status_leds = StatusLeds::new(
            gpiob.pb1.into_push_pull_output().downgrade(),
            gpiob.pb0.into_push_pull_output().downgrade(),
            gpioa.pa7.into_push_pull_output().downgrade(),
        );
        status_leds.disable_all();

        // Initialize DHT11. A missing sensor is not fatal, every scheduled
        // reading tries again.
        writeln!(debug, "Init DHT11…").ok();
        let line = OpenDrainLine::new(gpioa.pa6.into_open_drain_output());
        let mut sensor = Dht11::with_policy(line, config.bit_timeout_policy());
        writeln!(debug, "DHT11: Bit timeouts: {:?}", sensor.policy()).ok();
        match sensor.init(&mut delay) {
            Ok(()) => writeln!(debug, "DHT11: Sensor found").ok(),
            Err(e) => {
                status_leds.enable_red();
                writeln!(debug, "DHT11: Could not find sensor: {}", e).ok()
            }
        };

        writeln!(debug, "Initialization done").ok();

        (
            Shared { debug, status_leds },
            Local {
                sensor,
                delay,
                read_timer: PeriodicTimer::new(config.effective_read_interval_ms()),
                heartbeat_timer: PeriodicTimer::new(config.heartbeat_interval_ms.into()),
            },
            init::Monotonics(),
        )
    }

    /// Poll the recurring actions once per tick.
    #[idle(local = [read_timer, heartbeat_timer])]
    fn idle(ctx: idle::Context) -> ! {
        loop {
            let now = systick::now();
            if ctx.local.read_timer.poll(now) {
                // Still busy with the previous reading if this fails
                read_sensor::spawn().ok();
            }
            if ctx.local.heartbeat_timer.poll(now) {
                heartbeat::spawn().ok();
            }

            // Sleep until the next tick
            cortex_m::asm::wfi();
        }
    }

    #[task(binds = SysTick, priority = 3)]
    fn tick(_: tick::Context) {
        systick::on_tick();
    }

    /// Read the sensor and hand the outcome over for reporting.
    ///
    /// The transfer blocks for ~25 ms. Only the tick interrupt may preempt
    /// it.
    #[task(local = [sensor, delay, reads: u32 = 0], priority = 2)]
    fn read_sensor(ctx: read_sensor::Context) {
        let at = systick::now();
        *ctx.local.reads = ctx.local.reads.wrapping_add(1);
        let outcome = ctx.local.sensor.read(ctx.local.delay);
        report_outcome::spawn(*ctx.local.reads, at, outcome).ok();
    }

    #[task(shared = [debug, status_leds], capacity = 2, priority = 1)]
    fn report_outcome(
        ctx: report_outcome::Context,
        seq: u32,
        at: u32,
        outcome: Outcome<LineError>,
    ) {
        let mut debug = ctx.shared.debug;
        let mut status_leds = ctx.shared.status_leds;

        debug.lock(|debug| {
            report::write_outcome(debug, seq, at, &outcome, cfg!(feature = "dev")).ok()
        });
        status_leds.lock(|status_leds| status_leds.show_outcome(outcome.is_ok()));
    }

    #[task(shared = [status_leds], priority = 1)]
    fn heartbeat(mut ctx: heartbeat::Context) {
        ctx.shared
            .status_leds
            .lock(|status_leds| status_leds.toggle_heartbeat());
    }
}
