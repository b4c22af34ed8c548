//! User and general settings for the logger.
//!
//! The constants in the first half are the ones worth editing; the paths and
//! format strings below them are part of the on-disk contract and should be
//! left alone.

use embassy_time::Duration;
use serde::{Deserialize, Serialize};

use crate::units::TemperatureUnit;

/// Time between measurements.
///
/// Must not go below [`MEASURE_PERIOD_FLOOR`]: the DHT11 can take up to two
/// seconds to update and the DS18B20 probes need at least 750 ms per
/// conversion.
pub const MEASURE_PERIOD: Duration = Duration::from_secs(60);

/// Hard floor for [`MEASURE_PERIOD`] imposed by sensor settling time.
pub const MEASURE_PERIOD_FLOOR: Duration = Duration::from_secs(2);

/// Number of samples held in memory before an automatic flush.
pub const SAMPLE_QUEUE_CAPACITY: usize = 30;

/// Unit used on the display. Persisted data is always Fahrenheit so the log
/// files stay unit-stable regardless of this preference.
pub const DISPLAY_UNIT: TemperatureUnit = TemperatureUnit::Fahrenheit;

/// Maximum size of one data file in bytes (2 MiB). Once the current file
/// reaches this size the next flush rotates to a fresh file.
pub const DATA_FILE_MAX_SIZE: u64 = 2 * 1024 * 1024;

/// Duration of one Wi-Fi connect attempt before it times out.
pub const WIFI_TIMEOUT: Duration = Duration::from_secs(30);

/// Number of Wi-Fi connect attempts before the boot is declared failed.
pub const WIFI_CONNECT_ATTEMPTS: u32 = 3;

/// Offset applied to NTP time (UTC) before it reaches the clock.
pub const TIMEZONE_OFFSET_SECONDS: i32 = -5 * 3600;

/// Root directory on the storage medium.
pub const ROOT_DIR_PATH: &str = "/tank_data";

/// Directory where data files are stored.
pub const MEASUREMENTS_DIR_PATH: &str = "/tank_data/measurements";

/// Data file name prefix and extension. Files are named
/// `<prefix><index><extension>` where `index` counts the files already in
/// the measurements directory.
pub const DATA_FILE_NAME_PREFIX: &str = "tank_measurements_";
pub const DATA_FILE_EXTENSION: &str = ".csv";

/// Column headers, written exactly once per data file.
pub const DATA_FILE_HEADER: &str = "timestamp,air_temp_1,water_temp_1,water_temp_2\n";

#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(bound(deserialize = "'de: 'a"))]
pub struct Config<'a> {
    pub internet: InternetConfig<'a>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct InternetConfig<'a> {
    /// Wireless features can be disabled entirely; without them the clock
    /// is never synchronized and timestamps start from the epoch.
    pub enabled: bool,
    pub ssid: &'a str,
    pub password: &'a str,
}
