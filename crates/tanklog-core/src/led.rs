//! Onboard LED signal patterns.
//!
//! In the field the LED is the only feedback channel: one short pulse per
//! completed sample, two pulses per completed flush, and a repeating coded
//! blink loop for each fatal boot condition.

use embassy_time::Duration;
use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;

/// On-time of the per-sample heartbeat pulse. The main cycle subtracts this
/// from the sleep duration so the total period stays on target.
pub const HEARTBEAT_ON: Duration = Duration::from_millis(250);

const FLUSH_ACK_ON_MS: u32 = 250;
const FLUSH_ACK_OFF_MS: u32 = 500;

const ERROR_ON_MS: u32 = 1_000;
const ERROR_OFF_MS: u32 = 1_000;
const ERROR_PAUSE_MS: u32 = 5_000;

/// One short pulse signalling a completed sample.
pub async fn heartbeat<P: OutputPin, D: DelayNs>(led: &mut P, delay: &mut D) {
    let _ = led.set_high();
    delay.delay_ms(HEARTBEAT_ON.as_millis() as u32).await;
    let _ = led.set_low();
}

/// Two on/off cycles acknowledging a completed flush.
pub async fn flush_ack<P: OutputPin, D: DelayNs>(led: &mut P, delay: &mut D) {
    for _ in 0..2 {
        let _ = led.set_high();
        delay.delay_ms(FLUSH_ACK_ON_MS).await;
        let _ = led.set_low();
        delay.delay_ms(FLUSH_ACK_OFF_MS).await;
    }
}

/// One cycle of the diagnostic pattern: `code` blinks, then a pause that
/// marks the end of the cycle.
pub async fn blink_cycle<P: OutputPin, D: DelayNs>(led: &mut P, delay: &mut D, code: u8) {
    for _ in 0..code {
        let _ = led.set_high();
        delay.delay_ms(ERROR_ON_MS).await;
        let _ = led.set_low();
        delay.delay_ms(ERROR_OFF_MS).await;
    }
    delay.delay_ms(ERROR_PAUSE_MS).await;
}

/// Diagnostic blink loop for a fatal condition. Never returns; recovery
/// requires a physical reset.
pub async fn error_loop<P: OutputPin, D: DelayNs>(led: &mut P, delay: &mut D, code: u8) -> ! {
    loop {
        blink_cycle(led, delay, code).await;
    }
}

#[cfg(test)]
mod tests {
    use embassy_futures::block_on;

    use super::*;
    use crate::testing::{LedEvent, MockDelay, MockLed};

    #[test]
    fn test_heartbeat_single_pulse() {
        let mut led = MockLed::new();
        let mut delay = MockDelay::new();
        block_on(heartbeat(&mut led, &mut delay));

        assert_eq!(led.events, [LedEvent::On, LedEvent::Off]);
        assert_eq!(delay.slept_ms, [250]);
    }

    #[test]
    fn test_flush_ack_double_pulse() {
        let mut led = MockLed::new();
        let mut delay = MockDelay::new();
        block_on(flush_ack(&mut led, &mut delay));

        assert_eq!(
            led.events,
            [LedEvent::On, LedEvent::Off, LedEvent::On, LedEvent::Off]
        );
        assert_eq!(delay.slept_ms, [250, 500, 250, 500]);
    }

    #[test]
    fn test_blink_cycle_counts_code_then_pauses() {
        let mut led = MockLed::new();
        let mut delay = MockDelay::new();
        block_on(blink_cycle(&mut led, &mut delay, 3));

        assert_eq!(led.events.len(), 6); // 3 on/off pairs
        assert_eq!(
            delay.slept_ms,
            [1_000, 1_000, 1_000, 1_000, 1_000, 1_000, 5_000]
        );
    }
}
