#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]

use core::cell::RefCell;

use embassy_executor::Spawner;
use embassy_net::{Runner, StackResources};
use embedded_hal_bus::spi::ExclusiveDevice;
use embedded_sdmmc::SdCard;
use esp_hal::clock::CpuClock;
use esp_hal::delay::Delay;
use esp_hal::gpio::{
    DriveMode, Flex, Input, InputConfig, Level, Output, OutputConfig, Pull, WakeEvent,
};
use esp_hal::i2c::master::{Config as I2cConfig, I2c};
use esp_hal::rng::Rng;
use esp_hal::rtc_cntl::Rtc;
use esp_hal::spi::master::{Config as SpiConfig, Spi};
use esp_hal::time::Rate;
use esp_hal::timer::timg::TimerGroup;
use esp_radio::wifi::WifiDevice;
use log::{debug, error};
use rtt_target::rprintln;
use ssd1306::I2CDisplayInterface;
use static_cell::StaticCell;

use tanklog_core::config::DATA_FILE_MAX_SIZE;
use tanklog_core::cycle::{boot, BootAction, LoggerConfig};
use tanklog_core::led;
use tanklog_core::sensors::SensorReader;
use tanklog_core::storage::StorageManager;

use tanklog_firmware::display::Oled;
use tanklog_firmware::net_time::{RtcClock, WifiSntp};
use tanklog_firmware::power::{flush_button_task, EspPower, FLUSH_SIGNAL};
use tanklog_firmware::sd_card::{RtcTimeSource, SdFileStore};
use tanklog_firmware::sensors::{Dht11Air, Ds18b20Bus};
use tanklog_firmware::wifi_secrets;

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    rtt_target::rprintln!("PANIC: {}", info);
    loop {}
}

extern crate alloc;

// This creates a default app-descriptor required by the esp-idf bootloader.
esp_bootloader_esp_idf::esp_app_desc!();

static RTC: StaticCell<RefCell<Rtc<'static>>> = StaticCell::new();
static NET_RESOURCES: StaticCell<StackResources<4>> = StaticCell::new();

#[embassy_executor::task]
async fn net_task(mut runner: Runner<'static, WifiDevice<'static>>) -> ! {
    runner.run().await
}

/// Configure a pin as an open-drain line with the weak pull-up the one-wire
/// and DHT protocols expect.
fn open_drain_line(mut pin: Flex<'static>) -> Flex<'static> {
    pin.apply_output_config(
        &OutputConfig::default()
            .with_drive_mode(DriveMode::OpenDrain)
            .with_pull(Pull::Up),
    );
    pin.set_output_enable(true);
    pin.set_input_enable(true);
    pin.set_high();
    pin
}

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    rtt_target::rtt_init_print!();

    // Half the base clock: the cycle spends most of its life asleep and the
    // sensors don't care how fast we wait for them.
    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::_80MHz);
    let peripherals = esp_hal::init(config);

    esp_alloc::heap_allocator!(size: 72 * 1024);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    rprintln!("Embassy initialized!");

    // Wi-Fi is only needed long enough to set the clock at boot.
    let radio_init = esp_radio::init().expect("Failed to initialize Wi-Fi controller");
    let (controller, interfaces) =
        esp_radio::wifi::new(&radio_init, peripherals.WIFI, Default::default())
            .expect("Failed to initialize Wi-Fi interface");

    let mut rng = Rng::new();
    let seed = (rng.random() as u64) << 32 | rng.random() as u64;
    let (stack, runner) = embassy_net::new(
        interfaces.sta,
        embassy_net::Config::dhcpv4(Default::default()),
        NET_RESOURCES.init(StackResources::new()),
        seed,
    );
    spawner.spawn(net_task(runner)).expect("spawning net task failed");

    // Real time clock, shared by timestamps, FAT metadata and light sleep
    let rtc = RTC.init(RefCell::new(Rtc::new(peripherals.LPWR)));

    // OLED display on the I2C bus
    let i2c = I2c::new(peripherals.I2C0, I2cConfig::default())
        .expect("I2C initialization failed")
        .with_sda(peripherals.GPIO21)
        .with_scl(peripherals.GPIO22);
    let display = Oled::new(I2CDisplayInterface::new(i2c));

    // SD card module on the VSPI bus
    let spi_bus = Spi::new(
        peripherals.SPI2,
        SpiConfig::default().with_frequency(Rate::from_khz(500)),
    )
    .expect("SPI initialization failed")
    .with_sck(peripherals.GPIO18)
    .with_mosi(peripherals.GPIO23)
    .with_miso(peripherals.GPIO19);
    let sd_cs = Output::new(peripherals.GPIO5, Level::High, OutputConfig::default());
    let sd_spi = ExclusiveDevice::new_no_delay(spi_bus, sd_cs).expect("SPI device setup failed");
    let sd_card = SdCard::new(sd_spi, Delay::new());
    let store = SdFileStore::new(sd_card, RtcTimeSource::new(rtc));

    // Temperature sensors: DHT11 in the air, two DS18B20 probes sharing one
    // wire in the water
    let air = Dht11Air::new(open_drain_line(Flex::new(peripherals.GPIO32)));
    let water = Ds18b20Bus::new(open_drain_line(Flex::new(peripherals.GPIO4)))
        .expect("one-wire bus setup failed");
    let sensors = SensorReader::new(air, water);

    // Manual flush button: wakes the device from light sleep and latches
    // the flush signal while awake. Debounced externally.
    let mut button = Input::new(peripherals.GPIO35, InputConfig::default().with_pull(Pull::Down));
    button.wakeup_enable(true, WakeEvent::HighLevel);
    spawner
        .spawn(flush_button_task(button))
        .expect("spawning button task failed");

    // Onboard LED, the only feedback channel in the field
    let mut status_led = Output::new(peripherals.GPIO2, Level::Low, OutputConfig::default());
    let mut delay = embassy_time::Delay;

    // Mount the card and make sure the measurements directory exists before
    // the boot sequence selects a data file.
    if let Err(e) = store.ensure_layout() {
        error!("could not navigate storage: {e}");
        led::error_loop(&mut status_led, &mut delay, 3).await;
    }

    let time_sync = WifiSntp::new(controller, stack, rtc, wifi_secrets::device_config().internet);
    let logger = boot(
        time_sync,
        sensors,
        display,
        StorageManager::new(store, DATA_FILE_MAX_SIZE),
        &mut status_led,
        &mut delay,
        EspPower::new(rtc),
        RtcClock::new(rtc),
        &FLUSH_SIGNAL,
        LoggerConfig::default(),
    )
    .await;

    match logger {
        Ok(mut logger) => {
            debug!("heap stats: {}", esp_alloc::HEAP.stats());
            let storage_err = logger.run().await;
            error!("flush failed, batch retained in memory: {storage_err}");
            drop(logger);
            led::error_loop(&mut status_led, &mut delay, 3).await
        }
        Err(boot_err) => {
            error!("boot failed: {boot_err}");
            match boot_err.action() {
                BootAction::BlinkLoop(code) => {
                    led::error_loop(&mut status_led, &mut delay, code).await
                }
                BootAction::Restart => esp_hal::system::software_reset(),
            }
        }
    }
}
