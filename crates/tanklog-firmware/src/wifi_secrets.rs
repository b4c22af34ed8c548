//! Wireless credentials.
//!
//! A wireless connection is recommended as it drives the boot-time clock
//! sync, which in turn drives the timestamps on every measurement.

use tanklog_core::config::{Config, InternetConfig};

const WIFI_SSID: &str = "[INSERT SSID HERE]";
const WIFI_PASSWORD: &str = "[INSERT PASSWORD HERE]";

pub fn device_config() -> Config<'static> {
    Config {
        internet: InternetConfig {
            enabled: true,
            ssid: WIFI_SSID,
            password: WIFI_PASSWORD,
        },
    }
}
