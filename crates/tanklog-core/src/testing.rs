//! In-memory doubles for the hardware seams, shared by the unit tests.

use core::cell::Cell;
use core::convert::Infallible;

use alloc::collections::{BTreeMap, VecDeque};
use alloc::string::String;
use alloc::vec::Vec;

use embassy_time::Duration;
use embedded_hal::digital::{ErrorType, OutputPin};
use embedded_hal_async::delay::DelayNs;

use crate::cycle::Power;
use crate::display::DisplaySink;
use crate::sample::{Reading, Sample};
use crate::sensors::{AirSensor, SensorFault, WaterProbeBus};
use crate::storage::{FileStore, StorageError};
use crate::time::{Clock, TimeSync, TimeSyncError, Timestamp};
use crate::wake::WakeReason;

pub(crate) fn timestamp() -> Timestamp {
    Timestamp {
        year: 2025,
        month: 2,
        day: 8,
        hour: 9,
        minute: 5,
        second: 3,
    }
}

/// A distinct valid sample, distinguishable by its minute field.
pub(crate) fn sample_at_minute(minute: u8) -> Sample {
    Sample {
        timestamp: Timestamp {
            minute,
            ..timestamp()
        },
        air: Reading::Valid(71.6),
        water_a: Reading::Valid(78.0),
        water_b: Reading::Valid(77.9),
    }
}

// --- sensors ---------------------------------------------------------------

pub(crate) struct ScriptedAirSensor {
    result: Result<f32, SensorFault>,
}

impl ScriptedAirSensor {
    pub(crate) fn new(result: Result<f32, SensorFault>) -> Self {
        Self { result }
    }

    pub(crate) fn always(celsius: f32) -> Self {
        Self::new(Ok(celsius))
    }
}

impl AirSensor for ScriptedAirSensor {
    async fn measure(&mut self) -> Result<f32, SensorFault> {
        self.result
    }
}

pub(crate) struct ScriptedProbeBus {
    detected: usize,
    readings: [Result<f32, SensorFault>; 2],
    conversion_fault: bool,
}

impl ScriptedProbeBus {
    pub(crate) fn new(detected: usize, readings: [Result<f32, SensorFault>; 2]) -> Self {
        Self {
            detected,
            readings,
            conversion_fault: false,
        }
    }

    pub(crate) fn always(detected: usize, celsius: [f32; 2]) -> Self {
        Self::new(detected, [Ok(celsius[0]), Ok(celsius[1])])
    }

    pub(crate) fn with_conversion_fault(mut self) -> Self {
        self.conversion_fault = true;
        self
    }
}

impl WaterProbeBus for ScriptedProbeBus {
    async fn detect(&mut self) -> Result<usize, SensorFault> {
        Ok(self.detected)
    }

    async fn start_conversion(&mut self) -> Result<(), SensorFault> {
        if self.conversion_fault {
            Err(SensorFault::Bus)
        } else {
            Ok(())
        }
    }

    async fn read_probe(&mut self, index: usize) -> Result<f32, SensorFault> {
        self.readings[index]
    }
}

// --- display ---------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DisplayOp {
    Clear,
    Text(String, i32, i32),
    Show,
}

impl DisplayOp {
    pub(crate) fn text(s: &str, x: i32, y: i32) -> Self {
        Self::Text(String::from(s), x, y)
    }
}

pub(crate) struct MockDisplay {
    pub(crate) ops: Vec<DisplayOp>,
}

impl MockDisplay {
    pub(crate) fn new() -> Self {
        Self { ops: Vec::new() }
    }
}

impl DisplaySink for MockDisplay {
    fn clear(&mut self) {
        self.ops.push(DisplayOp::Clear);
    }

    fn text(&mut self, s: &str, x: i32, y: i32) {
        self.ops.push(DisplayOp::text(s, x, y));
    }

    fn show(&mut self) {
        self.ops.push(DisplayOp::Show);
    }
}

// --- storage ---------------------------------------------------------------

/// In-memory [`FileStore`] that counts every filesystem touch, so tests can
/// assert an operation performed zero I/O.
pub(crate) struct MemoryStore {
    files: BTreeMap<String, Vec<u8>>,
    creation_order: Vec<String>,
    ops: Cell<usize>,
    fail_next_append: bool,
}

impl MemoryStore {
    pub(crate) fn new() -> Self {
        Self {
            files: BTreeMap::new(),
            creation_order: Vec::new(),
            ops: Cell::new(0),
            fail_next_append: false,
        }
    }

    pub(crate) fn contents(&self, path: &str) -> &str {
        core::str::from_utf8(self.files.get(path).expect("file not created")).unwrap()
    }

    pub(crate) fn op_count(&self) -> usize {
        self.ops.get()
    }

    pub(crate) fn fail_next_append(&mut self) {
        self.fail_next_append = true;
    }

    fn touch(&self) {
        self.ops.set(self.ops.get() + 1);
    }

    fn hstr(s: &str) -> heapless::String<64> {
        let mut out = heapless::String::new();
        let _ = out.push_str(&s[..s.len().min(64)]);
        out
    }
}

impl FileStore for MemoryStore {
    fn create(&mut self, path: &str, header: &str) -> Result<(), StorageError> {
        self.touch();
        self.files
            .insert(String::from(path), Vec::from(header.as_bytes()));
        self.creation_order.push(String::from(path));
        Ok(())
    }

    fn append(&mut self, path: &str, bytes: &[u8]) -> Result<(), StorageError> {
        self.touch();
        if self.fail_next_append {
            self.fail_next_append = false;
            return Err(StorageError::Device(Self::hstr("simulated write failure")));
        }
        self.files
            .get_mut(path)
            .ok_or(StorageError::NotFound(Self::hstr(path)))?
            .extend_from_slice(bytes);
        Ok(())
    }

    fn size(&self, path: &str) -> Result<u64, StorageError> {
        self.touch();
        self.files
            .get(path)
            .map(|f| f.len() as u64)
            .ok_or(StorageError::NotFound(Self::hstr(path)))
    }

    fn file_count(&self, dir: &str) -> Result<usize, StorageError> {
        self.touch();
        Ok(self.files.keys().filter(|p| p.starts_with(dir)).count())
    }

    fn last_file(&self, dir: &str) -> Result<Option<heapless::String<64>>, StorageError> {
        self.touch();
        Ok(self
            .creation_order
            .iter()
            .rev()
            .find(|p| p.starts_with(dir))
            .and_then(|p| p.rsplit('/').next())
            .map(Self::hstr))
    }
}

// --- led / delay -----------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LedEvent {
    On,
    Off,
}

pub(crate) struct MockLed {
    pub(crate) events: Vec<LedEvent>,
}

impl MockLed {
    pub(crate) fn new() -> Self {
        Self { events: Vec::new() }
    }
}

impl ErrorType for MockLed {
    type Error = Infallible;
}

impl OutputPin for MockLed {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.events.push(LedEvent::Off);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.events.push(LedEvent::On);
        Ok(())
    }
}

/// Records requested delays instead of waiting. The `delay_ms`/`delay_us`
/// overrides keep one logical delay as one recorded entry, bypassing the
/// trait's chunked defaults.
pub(crate) struct MockDelay {
    pub(crate) slept_ms: Vec<u32>,
}

impl MockDelay {
    pub(crate) fn new() -> Self {
        Self {
            slept_ms: Vec::new(),
        }
    }
}

impl DelayNs for MockDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.slept_ms.push(ns / 1_000_000);
    }

    async fn delay_us(&mut self, us: u32) {
        self.slept_ms.push(us / 1_000);
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.slept_ms.push(ms);
    }
}

// --- power / time ----------------------------------------------------------

pub(crate) struct ScriptedPower {
    reasons: VecDeque<WakeReason>,
    pub(crate) slept: Vec<Duration>,
}

impl ScriptedPower {
    pub(crate) fn new(reasons: &[WakeReason]) -> Self {
        Self {
            reasons: reasons.iter().copied().collect(),
            slept: Vec::new(),
        }
    }
}

impl Power for ScriptedPower {
    async fn light_sleep(&mut self, duration: Duration) -> WakeReason {
        self.slept.push(duration);
        self.reasons.pop_front().unwrap_or(WakeReason::Timer)
    }
}

pub(crate) struct MockTimeSync {
    result: Result<(), TimeSyncError>,
}

impl MockTimeSync {
    pub(crate) fn ok() -> Self {
        Self { result: Ok(()) }
    }

    pub(crate) fn failing(error: TimeSyncError) -> Self {
        Self { result: Err(error) }
    }
}

impl TimeSync for MockTimeSync {
    async fn synchronize(&mut self) -> Result<(), TimeSyncError> {
        self.result
    }
}

pub(crate) struct FixedClock;

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        timestamp()
    }
}
