//! The main measurement cycle and the boot sequence that gates it.
//!
//! One producer (the sample loop) and one consumer (the flush path) meet
//! here: sample → display → buffer → flush-if-full → sleep → wake-reason
//! check → flush-if-requested, forever. Buffering decouples the cheap
//! sampling cadence from the power-hungry storage-write cadence, bounding
//! data loss on power failure to at most one buffer's worth of samples.

use embassy_time::Duration;
use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;
use log::{debug, info};
use thiserror_no_std::Error;

use crate::buffer::{BufferStatus, SampleBuffer};
use crate::config;
use crate::display::{render_sample, DisplaySink};
use crate::led;
use crate::sensors::{AirSensor, SensorReader, WaterProbeBus, WATER_PROBE_COUNT};
use crate::storage::{FileStore, StorageError, StorageManager};
use crate::time::{Clock, TimeSync, TimeSyncError};
use crate::units::TemperatureUnit;
use crate::wake::{FlushSignal, WakeReason};

/// Low-power suspension. The external pin is armed as a wake source for the
/// whole duration of every sleep.
pub trait Power {
    /// Suspend for `duration`, or until the external pin fires, whichever
    /// comes first.
    fn light_sleep(&mut self, duration: Duration) -> impl Future<Output = WakeReason>;
}

/// Fatal boot conditions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BootError {
    #[error("unexpected water probe count: {0}")]
    SensorTopology(usize),
    #[error("diagnostic sample has unreadable channels")]
    InvalidDiagnostic,
    #[error("storage setup failed: {0}")]
    Storage(StorageError),
    #[error("time sync attempts exhausted")]
    TimeSyncExhausted,
    #[error("time protocol failure")]
    TimeSyncProtocol,
}

/// What the firmware does with a boot failure: park in the coded blink
/// loop, or restart the device outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootAction {
    BlinkLoop(u8),
    Restart,
}

impl BootError {
    pub const fn action(&self) -> BootAction {
        match self {
            Self::SensorTopology(_) => BootAction::BlinkLoop(1),
            Self::InvalidDiagnostic => BootAction::BlinkLoop(2),
            Self::Storage(_) => BootAction::BlinkLoop(3),
            Self::TimeSyncExhausted => BootAction::BlinkLoop(4),
            // A protocol failure after the network came up is transient more
            // often than not; restarting retries the whole sync instead of
            // parking the device.
            Self::TimeSyncProtocol => BootAction::Restart,
        }
    }
}

/// Tunables the logger is constructed with. `Default` pulls the values
/// from [`config`].
#[derive(Debug, Clone, Copy)]
pub struct LoggerConfig {
    pub period: Duration,
    pub queue_capacity: usize,
    pub display_unit: TemperatureUnit,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            period: config::MEASURE_PERIOD,
            queue_capacity: config::SAMPLE_QUEUE_CAPACITY,
            display_unit: config::DISPLAY_UNIT,
        }
    }
}

/// Everything the steady-state loop owns. Constructed by [`boot`]; there
/// are no ambient globals besides the flush signal the interrupt handler
/// needs to reach.
pub struct Logger<'a, A, W, DS, F: FileStore, L, D, P, C> {
    sensors: SensorReader<A, W>,
    display: DS,
    storage: StorageManager<F>,
    led: L,
    delay: D,
    power: P,
    clock: C,
    flush_signal: &'a FlushSignal,
    buffer: SampleBuffer,
    period: Duration,
    display_unit: TemperatureUnit,
    measurement_count: u32,
}

/// Boot sequence: clock sync, probe detection, diagnostic sample, storage
/// adoption, in that order, each gating the next.
#[allow(clippy::too_many_arguments)]
pub async fn boot<'a, T, A, W, DS, F, L, D, P, C>(
    mut time_sync: T,
    mut sensors: SensorReader<A, W>,
    display: DS,
    mut storage: StorageManager<F>,
    led: L,
    delay: D,
    power: P,
    clock: C,
    flush_signal: &'a FlushSignal,
    cfg: LoggerConfig,
) -> Result<Logger<'a, A, W, DS, F, L, D, P, C>, BootError>
where
    T: TimeSync,
    A: AirSensor,
    W: WaterProbeBus,
    DS: DisplaySink,
    F: FileStore,
    L: OutputPin,
    D: DelayNs,
    P: Power,
    C: Clock,
{
    time_sync.synchronize().await.map_err(|e| match e {
        TimeSyncError::AttemptsExhausted => BootError::TimeSyncExhausted,
        TimeSyncError::Protocol => BootError::TimeSyncProtocol,
    })?;
    info!("system time synchronized");

    let found = sensors
        .detect_probes()
        .await
        .map_err(|_| BootError::SensorTopology(0))?;
    if found != WATER_PROBE_COUNT {
        return Err(BootError::SensorTopology(found));
    }

    // One validity-checked sample before entering steady state; it does not
    // count towards the measurement counter.
    let diagnostic = sensors.take_sample(clock.now()).await;
    if !diagnostic.is_valid() {
        return Err(BootError::InvalidDiagnostic);
    }

    storage.open_current().map_err(BootError::Storage)?;
    info!("boot complete, entering measurement loop");

    Ok(Logger {
        sensors,
        display,
        storage,
        led,
        delay,
        power,
        clock,
        flush_signal,
        buffer: SampleBuffer::new(cfg.queue_capacity),
        period: cfg.period.max(config::MEASURE_PERIOD_FLOOR),
        display_unit: cfg.display_unit,
        measurement_count: 0,
    })
}

impl<'a, A, W, DS, F, L, D, P, C> Logger<'a, A, W, DS, F, L, D, P, C>
where
    A: AirSensor,
    W: WaterProbeBus,
    DS: DisplaySink,
    F: FileStore,
    L: OutputPin,
    D: DelayNs,
    P: Power,
    C: Clock,
{
    /// One full measurement period, from sample to wake handling.
    pub async fn run_cycle(&mut self) -> Result<(), StorageError> {
        let sample = self.sensors.take_sample(self.clock.now()).await;
        self.measurement_count += 1;

        render_sample(
            &mut self.display,
            &sample,
            self.display_unit,
            self.measurement_count,
        );

        let status = self.buffer.append(sample);
        led::heartbeat(&mut self.led, &mut self.delay).await;

        if status == BufferStatus::Full {
            self.flush_buffered().await?;
            info!("automatic data dump performed");
        }

        // The heartbeat pulse already consumed part of the period.
        let reason = self
            .power
            .light_sleep(self.period - led::HEARTBEAT_ON)
            .await;

        // Always consume the signal: a pin wake latches it too, and leaving
        // it set would trigger a second flush on the next timer wake.
        let manual = self.flush_signal.take();
        if reason == WakeReason::ExternalPin || manual {
            self.flush_buffered().await?;
            info!("manual data dump performed");
        }

        debug!(
            "cycle {} complete, {} samples buffered",
            self.measurement_count,
            self.buffer.len()
        );
        Ok(())
    }

    /// Run forever. Returns only the fatal storage condition; there is no
    /// local recovery for a failed flush (see the error taxonomy notes in
    /// DESIGN.md).
    pub async fn run(&mut self) -> StorageError {
        loop {
            if let Err(e) = self.run_cycle().await {
                return e;
            }
        }
    }

    /// Flush the buffered batch and drain it only once the write
    /// succeeded; a failed flush leaves the batch in memory. The LED
    /// acknowledgement fires only when samples actually reached storage.
    async fn flush_buffered(&mut self) -> Result<(), StorageError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        self.storage.flush(self.buffer.samples())?;
        self.buffer.drain();
        led::flush_ack(&mut self.led, &mut self.delay).await;
        Ok(())
    }

    pub fn measurement_count(&self) -> u32 {
        self.measurement_count
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn storage(&self) -> &StorageManager<F> {
        &self.storage
    }
}

#[cfg(test)]
mod tests {
    use embassy_futures::block_on;

    use super::*;
    use crate::config::DATA_FILE_HEADER;
    use crate::testing::{
        sample_at_minute, FixedClock, MemoryStore, MockDelay, MockDisplay, MockLed, MockTimeSync,
        ScriptedAirSensor, ScriptedProbeBus, ScriptedPower,
    };

    type TestLogger<'a> = Logger<
        'a,
        ScriptedAirSensor,
        ScriptedProbeBus,
        MockDisplay,
        MemoryStore,
        MockLed,
        MockDelay,
        ScriptedPower,
        FixedClock,
    >;

    fn test_config(queue_capacity: usize) -> LoggerConfig {
        LoggerConfig {
            queue_capacity,
            ..LoggerConfig::default()
        }
    }

    fn boot_logger<'a>(
        flush_signal: &'a FlushSignal,
        probes: usize,
        wakes: &[WakeReason],
        capacity: usize,
    ) -> Result<TestLogger<'a>, BootError> {
        block_on(boot(
            MockTimeSync::ok(),
            SensorReader::new(
                ScriptedAirSensor::always(25.0),
                ScriptedProbeBus::always(probes, [30.0, 35.0]),
            ),
            MockDisplay::new(),
            StorageManager::new(MemoryStore::new(), crate::config::DATA_FILE_MAX_SIZE),
            MockLed::new(),
            MockDelay::new(),
            ScriptedPower::new(wakes),
            FixedClock,
            flush_signal,
            test_config(capacity),
        ))
    }

    #[test]
    fn test_boot_success_with_two_probes() {
        let signal = FlushSignal::new();
        let logger = boot_logger(&signal, 2, &[WakeReason::Timer], 30).unwrap();
        assert_eq!(logger.measurement_count(), 0); // diagnostic not counted
        assert_eq!(logger.buffered(), 0);
        assert_eq!(
            logger.storage().current_path(),
            "/tank_data/measurements/tank_measurements_0.csv"
        );
    }

    #[test]
    fn test_boot_rejects_wrong_probe_count() {
        let signal = FlushSignal::new();
        let err = boot_logger(&signal, 1, &[], 30).err().unwrap();
        assert_eq!(err, BootError::SensorTopology(1));
        assert_eq!(err.action(), BootAction::BlinkLoop(1));
    }

    #[test]
    fn test_boot_rejects_invalid_diagnostic() {
        let signal = FlushSignal::new();
        let result = block_on(boot(
            MockTimeSync::ok(),
            SensorReader::new(
                ScriptedAirSensor::new(Err(crate::sensors::SensorFault::Bus)),
                ScriptedProbeBus::always(2, [30.0, 35.0]),
            ),
            MockDisplay::new(),
            StorageManager::new(MemoryStore::new(), u64::MAX),
            MockLed::new(),
            MockDelay::new(),
            ScriptedPower::new(&[]),
            FixedClock,
            &signal,
            test_config(30),
        ));
        let err = result.err().unwrap();
        assert_eq!(err, BootError::InvalidDiagnostic);
        assert_eq!(err.action(), BootAction::BlinkLoop(2));
    }

    #[test]
    fn test_boot_time_sync_failure_mapping() {
        let signal = FlushSignal::new();
        for (sync, expected_err, expected_action) in [
            (
                MockTimeSync::failing(TimeSyncError::AttemptsExhausted),
                BootError::TimeSyncExhausted,
                BootAction::BlinkLoop(4),
            ),
            (
                MockTimeSync::failing(TimeSyncError::Protocol),
                BootError::TimeSyncProtocol,
                BootAction::Restart,
            ),
        ] {
            let result = block_on(boot(
                sync,
                SensorReader::new(
                    ScriptedAirSensor::always(25.0),
                    ScriptedProbeBus::always(2, [30.0, 35.0]),
                ),
                MockDisplay::new(),
                StorageManager::new(MemoryStore::new(), u64::MAX),
                MockLed::new(),
                MockDelay::new(),
                ScriptedPower::new(&[]),
                FixedClock,
                &signal,
                test_config(30),
            ));
            let err = result.err().unwrap();
            assert_eq!(err, expected_err);
            assert_eq!(err.action(), expected_action);
        }
    }

    #[test]
    fn test_cycle_buffers_without_flush_below_capacity() {
        let signal = FlushSignal::new();
        let mut logger = boot_logger(&signal, 2, &[WakeReason::Timer; 3], 30).unwrap();

        for _ in 0..3 {
            block_on(logger.run_cycle()).unwrap();
        }
        assert_eq!(logger.buffered(), 3);
        assert_eq!(logger.measurement_count(), 3);
        // nothing flushed: the data file still only holds the header
        assert_eq!(
            logger.storage().store().contents(logger.storage().current_path()),
            DATA_FILE_HEADER
        );
    }

    #[test]
    fn test_cycle_flushes_when_buffer_fills() {
        let signal = FlushSignal::new();
        let mut logger = boot_logger(&signal, 2, &[WakeReason::Timer; 2], 2).unwrap();

        block_on(logger.run_cycle()).unwrap();
        assert_eq!(logger.buffered(), 1);

        block_on(logger.run_cycle()).unwrap();
        assert_eq!(logger.buffered(), 0);

        let contents = logger
            .storage()
            .store()
            .contents(logger.storage().current_path());
        // header + both samples, flushed in arrival order
        assert_eq!(contents.lines().count(), 3);
        assert_eq!(logger.storage().write_count(), 1);
    }

    #[test]
    fn test_pin_wake_flushes_partial_buffer_and_clears_signal() {
        let signal = FlushSignal::new();
        let mut logger = boot_logger(
            &signal,
            2,
            &[
                WakeReason::Timer,
                WakeReason::Timer,
                WakeReason::ExternalPin,
                WakeReason::Timer,
            ],
            30,
        )
        .unwrap();

        // five samples buffered before the press: two from full cycles...
        for _ in 0..2 {
            block_on(logger.run_cycle()).unwrap();
        }
        // ...and three appended directly, as if earlier cycles had run
        for minute in 10..13 {
            logger.buffer.append(sample_at_minute(minute));
        }
        assert_eq!(logger.buffered(), 5);

        // the press wakes the device and latches the signal
        signal.request();
        block_on(logger.run_cycle()).unwrap();

        // 5 buffered + this cycle's sample all flushed, well below capacity
        assert_eq!(logger.buffered(), 0);
        let contents = logger
            .storage()
            .store()
            .contents(logger.storage().current_path());
        assert_eq!(contents.lines().count(), 7); // header + 6 samples

        // signal consumed: the following timer wake does not re-flush
        block_on(logger.run_cycle()).unwrap();
        assert_eq!(logger.buffered(), 1);
        assert_eq!(logger.storage().write_count(), 1);
    }

    #[test]
    fn test_latched_signal_flushes_even_on_timer_wake() {
        // a press while the device is awake latches the signal but the
        // sleep still ends by timer
        let signal = FlushSignal::new();
        let mut logger = boot_logger(&signal, 2, &[WakeReason::Timer], 30).unwrap();

        signal.request();
        block_on(logger.run_cycle()).unwrap();
        assert_eq!(logger.buffered(), 0);
        assert_eq!(logger.storage().write_count(), 1);
    }

    #[test]
    fn test_sleep_shortened_by_heartbeat_pulse() {
        let signal = FlushSignal::new();
        let mut logger = boot_logger(&signal, 2, &[WakeReason::Timer], 30).unwrap();
        block_on(logger.run_cycle()).unwrap();

        let expected = LoggerConfig::default().period - led::HEARTBEAT_ON;
        assert_eq!(logger.power.slept, [expected]);
    }

    #[test]
    fn test_flush_failure_keeps_batch_and_propagates() {
        let signal = FlushSignal::new();
        let mut logger = boot_logger(&signal, 2, &[WakeReason::Timer; 2], 2).unwrap();

        block_on(logger.run_cycle()).unwrap();
        logger.storage.store_mut().fail_next_append();

        let err = block_on(logger.run_cycle()).unwrap_err();
        assert!(matches!(err, StorageError::Device(_)));
        // the batch survives for whatever policy the caller applies
        assert_eq!(logger.buffered(), 2);
    }

    #[test]
    fn test_manual_flush_with_empty_buffer_is_silent() {
        let signal = FlushSignal::new();
        let mut logger = boot_logger(&signal, 2, &[WakeReason::ExternalPin], 1).unwrap();

        // capacity 1: the cycle's own sample flushes automatically, so the
        // buffer is already empty when the pin wake is handled
        block_on(logger.run_cycle()).unwrap();
        assert_eq!(logger.buffered(), 0);
        // one automatic flush only; the empty manual flush wrote nothing
        assert_eq!(logger.storage().write_count(), 1);
    }
}
