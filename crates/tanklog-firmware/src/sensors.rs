//! Concrete sensor drivers: DHT11 air sensor and DS18B20 water probes.

use core::convert::Infallible;

use ds18b20::{Ds18b20, Resolution};
use embedded_dht_rs::dht11::Dht11;
use esp_hal::delay::Delay;
use esp_hal::gpio::Flex;
use log::warn;
use one_wire_bus::{Address, OneWire, OneWireError};

use tanklog_core::sensors::{AirSensor, SensorFault, WaterProbeBus, WATER_PROBE_COUNT};

/// Bridge from an esp-hal pin to the embedded-hal 0.2 digital traits that
/// `one-wire-bus` still speaks.
pub struct LegacyOpenDrain<'d> {
    pin: Flex<'d>,
}

impl<'d> LegacyOpenDrain<'d> {
    pub fn new(pin: Flex<'d>) -> Self {
        Self { pin }
    }
}

impl embedded_hal_02::digital::v2::OutputPin for LegacyOpenDrain<'_> {
    type Error = Infallible;

    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.pin.set_low();
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.pin.set_high();
        Ok(())
    }
}

impl embedded_hal_02::digital::v2::InputPin for LegacyOpenDrain<'_> {
    type Error = Infallible;

    fn is_high(&self) -> Result<bool, Self::Error> {
        Ok(self.pin.is_high())
    }

    fn is_low(&self) -> Result<bool, Self::Error> {
        Ok(self.pin.is_low())
    }
}

/// Blocking microsecond/millisecond delays in embedded-hal 0.2 terms, for
/// the same two crates.
pub struct LegacyDelay;

impl embedded_hal_02::blocking::delay::DelayUs<u16> for LegacyDelay {
    fn delay_us(&mut self, us: u16) {
        embassy_time::block_for(embassy_time::Duration::from_micros(us as u64));
    }
}

impl embedded_hal_02::blocking::delay::DelayMs<u16> for LegacyDelay {
    fn delay_ms(&mut self, ms: u16) {
        embassy_time::block_for(embassy_time::Duration::from_millis(ms as u64));
    }
}

/// DHT11 on a single open-drain line. The protocol is bit-banged and
/// timing-critical, so the read itself is blocking.
pub struct Dht11Air<'d> {
    dht: Dht11<Flex<'d>, Delay>,
}

impl<'d> Dht11Air<'d> {
    pub fn new(pin: Flex<'d>) -> Self {
        Self {
            dht: Dht11::new(pin, Delay::new()),
        }
    }
}

impl AirSensor for Dht11Air<'_> {
    async fn measure(&mut self) -> Result<f32, SensorFault> {
        // every DHT failure mode is a line-level one: missing response
        // pulse, bad checksum, stuck line
        let reading = self.dht.read().map_err(|_| SensorFault::Bus)?;
        Ok(f32::from(reading.temperature))
    }
}

/// The two DS18B20 probes on one shared one-wire line, addressed by the ROM
/// codes found during the boot-time scan.
pub struct Ds18b20Bus<'d> {
    bus: OneWire<LegacyOpenDrain<'d>>,
    delay: LegacyDelay,
    probes: [Option<Ds18b20>; WATER_PROBE_COUNT],
}

impl<'d> Ds18b20Bus<'d> {
    pub fn new(pin: Flex<'d>) -> Result<Self, SensorFault> {
        let bus = OneWire::new(LegacyOpenDrain::new(pin)).map_err(bus_fault)?;
        Ok(Self {
            bus,
            delay: LegacyDelay,
            probes: [None, None],
        })
    }
}

fn bus_fault(_: OneWireError<Infallible>) -> SensorFault {
    SensorFault::Bus
}

impl WaterProbeBus for Ds18b20Bus<'_> {
    async fn detect(&mut self) -> Result<usize, SensorFault> {
        let mut found = 0;
        for device in self.bus.devices(false, &mut self.delay) {
            let address: Address = device.map_err(bus_fault)?;
            if address.family_code() != ds18b20::FAMILY_CODE {
                warn!("unexpected one-wire device {:?}", address);
                continue;
            }
            if found < WATER_PROBE_COUNT {
                self.probes[found] = Some(Ds18b20::new::<Infallible>(address).map_err(bus_fault)?);
            }
            found += 1;
        }
        Ok(found)
    }

    async fn start_conversion(&mut self) -> Result<(), SensorFault> {
        ds18b20::start_simultaneous_temp_measurement(&mut self.bus, &mut self.delay)
            .map_err(bus_fault)?;
        Resolution::Bits12.delay_for_measurement_time(&mut self.delay);
        Ok(())
    }

    async fn read_probe(&mut self, index: usize) -> Result<f32, SensorFault> {
        let probe = self.probes[index].as_ref().ok_or(SensorFault::Bus)?;
        let data = probe
            .read_data(&mut self.bus, &mut self.delay)
            .map_err(bus_fault)?;
        Ok(data.temperature)
    }
}
