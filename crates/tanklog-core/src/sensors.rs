//! Sensor trait seams and the combined sample reader.

use log::{error, warn};
use thiserror_no_std::Error;

use crate::sample::{Reading, Sample};
use crate::time::Timestamp;
use crate::units::c2f;

/// Number of water probes expected on the shared bus.
pub const WATER_PROBE_COUNT: usize = 2;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorFault {
    /// Recognized bus-level failure (missing pulse, CRC mismatch, probe not
    /// answering). Scoped to the channel it occurred on.
    #[error("sensor bus error")]
    Bus,
    /// Anything else. Treated as a reader-wide failure.
    #[error("sensor failure")]
    Other,
}

/// Air temperature sensor (DHT11 class): one combined trigger-and-read,
/// reporting degrees Celsius.
pub trait AirSensor {
    fn measure(&mut self) -> impl Future<Output = Result<f32, SensorFault>>;
}

/// Addressed water temperature probes sharing one bus (DS18B20 class).
pub trait WaterProbeBus {
    /// Scan the bus and return how many probes answered.
    fn detect(&mut self) -> impl Future<Output = Result<usize, SensorFault>>;

    /// Start a temperature conversion on every detected probe.
    fn start_conversion(&mut self) -> impl Future<Output = Result<(), SensorFault>>;

    /// Read the converted temperature of probe `index` in degrees Celsius.
    fn read_probe(&mut self, index: usize) -> impl Future<Output = Result<f32, SensorFault>>;
}

/// Wraps the two sensor collaborators and produces one [`Sample`] per call.
pub struct SensorReader<A, W> {
    air: A,
    water: W,
}

impl<A: AirSensor, W: WaterProbeBus> SensorReader<A, W> {
    pub fn new(air: A, water: W) -> Self {
        Self { air, water }
    }

    /// Boot-time probe detection; the caller checks the count against
    /// [`WATER_PROBE_COUNT`].
    pub async fn detect_probes(&mut self) -> Result<usize, SensorFault> {
        self.water.detect().await
    }

    /// Take one sample. Never fails: a bus fault on one channel marks only
    /// that channel invalid and the rest are still read; any other fault
    /// marks every remaining unread channel invalid as well.
    pub async fn take_sample(&mut self, timestamp: Timestamp) -> Sample {
        let mut sample = Sample {
            timestamp,
            air: Reading::Invalid,
            water_a: Reading::Invalid,
            water_b: Reading::Invalid,
        };

        // Without a conversion the probes have nothing to report; the air
        // sensor sits on its own line and is still worth reading.
        let water_ready = match self.water.start_conversion().await {
            Ok(()) => true,
            Err(fault) => {
                warn!("water conversion trigger failed: {fault}");
                false
            }
        };

        match self.air.measure().await {
            Ok(celsius) => sample.air = Reading::Valid(c2f(celsius)),
            Err(SensorFault::Bus) => warn!("air sensor bus error, channel marked invalid"),
            Err(fault) => {
                error!("air sensor failure: {fault}");
                return sample;
            }
        }

        if water_ready {
            match self.water.read_probe(0).await {
                Ok(celsius) => sample.water_a = Reading::Valid(c2f(celsius)),
                Err(SensorFault::Bus) => warn!("water probe 0 bus error, channel marked invalid"),
                Err(fault) => {
                    error!("water probe 0 failure: {fault}");
                    return sample;
                }
            }
            match self.water.read_probe(1).await {
                Ok(celsius) => sample.water_b = Reading::Valid(c2f(celsius)),
                Err(fault) => warn!("water probe 1 unreadable: {fault}"),
            }
        }

        sample
    }
}

#[cfg(test)]
mod tests {
    use embassy_futures::block_on;

    use super::*;
    use crate::testing::{timestamp, ScriptedAirSensor, ScriptedProbeBus};

    fn reader(
        air: Result<f32, SensorFault>,
        water_a: Result<f32, SensorFault>,
        water_b: Result<f32, SensorFault>,
    ) -> SensorReader<ScriptedAirSensor, ScriptedProbeBus> {
        SensorReader::new(
            ScriptedAirSensor::new(air),
            ScriptedProbeBus::new(2, [water_a, water_b]),
        )
    }

    #[test]
    fn test_all_channels_valid_and_converted() {
        let mut reader = reader(Ok(25.0), Ok(30.0), Ok(35.0));
        let sample = block_on(reader.take_sample(timestamp()));
        assert!(sample.is_valid());
        // stored Fahrenheit regardless of display preference
        assert_eq!(sample.air, Reading::Valid(77.0));
        assert_eq!(sample.water_a, Reading::Valid(86.0));
        assert_eq!(sample.water_b, Reading::Valid(95.0));
    }

    #[test]
    fn test_bus_fault_scoped_to_one_channel() {
        let mut reader = reader(Ok(25.0), Err(SensorFault::Bus), Ok(26.5));
        let sample = block_on(reader.take_sample(timestamp()));
        assert!(!sample.is_valid());
        assert!(sample.air.is_valid());
        assert_eq!(sample.water_a, Reading::Invalid);
        assert!(sample.water_b.is_valid());
    }

    #[test]
    fn test_unexpected_fault_invalidates_remaining_channels() {
        let mut reader = reader(Err(SensorFault::Other), Ok(26.0), Ok(26.5));
        let sample = block_on(reader.take_sample(timestamp()));
        assert_eq!(sample.air, Reading::Invalid);
        // the water probes were never read
        assert_eq!(sample.water_a, Reading::Invalid);
        assert_eq!(sample.water_b, Reading::Invalid);
    }

    #[test]
    fn test_conversion_trigger_failure_keeps_air() {
        let mut reader = SensorReader::new(
            ScriptedAirSensor::new(Ok(25.0)),
            ScriptedProbeBus::new(2, [Ok(26.0), Ok(26.5)]).with_conversion_fault(),
        );
        let sample = block_on(reader.take_sample(timestamp()));
        assert!(sample.air.is_valid());
        assert_eq!(sample.water_a, Reading::Invalid);
        assert_eq!(sample.water_b, Reading::Invalid);
    }

    #[test]
    fn test_detect_reports_probe_count() {
        let mut reader = reader(Ok(25.0), Ok(26.0), Ok(26.5));
        assert_eq!(block_on(reader.detect_probes()), Ok(2));
    }
}
