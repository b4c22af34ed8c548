//! Light sleep with timer + button wake, and the flush button task.

use core::cell::RefCell;

use esp_hal::gpio::Input;
use esp_hal::rtc_cntl::sleep::{GpioWakeupSource, TimerWakeupSource};
use esp_hal::rtc_cntl::Rtc;
use esp_hal::system::SleepSource;
use log::debug;

use tanklog_core::cycle::Power;
use tanklog_core::wake::{FlushSignal, WakeReason};

/// The one piece of state the interrupt-equivalent context shares with the
/// main cycle.
pub static FLUSH_SIGNAL: FlushSignal = FlushSignal::new();

/// Latches the flush signal on every button press while the device is
/// awake. During light sleep the button acts as a wake source instead, and
/// the wake cause carries the information.
#[embassy_executor::task]
pub async fn flush_button_task(mut button: Input<'static>) {
    loop {
        button.wait_for_rising_edge().await;
        FLUSH_SIGNAL.request();
        debug!("manual flush requested");
    }
}

/// RTC-driven light sleep. The wake-capable button pin has opted in via
/// `wakeup_enable`, so the GPIO source resumes us on a press.
pub struct EspPower<'d> {
    rtc: &'d RefCell<Rtc<'d>>,
}

impl<'d> EspPower<'d> {
    pub fn new(rtc: &'d RefCell<Rtc<'d>>) -> Self {
        Self { rtc }
    }
}

impl Power for EspPower<'_> {
    async fn light_sleep(&mut self, duration: embassy_time::Duration) -> WakeReason {
        let timer = TimerWakeupSource::new(core::time::Duration::from_millis(duration.as_millis()));
        let gpio = GpioWakeupSource::new();
        self.rtc.borrow_mut().sleep_light(&[&timer, &gpio]);

        match esp_hal::system::wakeup_cause() {
            SleepSource::Gpio | SleepSource::Ext0 | SleepSource::Ext1 => WakeReason::ExternalPin,
            _ => WakeReason::Timer,
        }
    }
}
