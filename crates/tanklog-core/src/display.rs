//! Display content contract for the 128x64 status panel.
//!
//! Pixel placement belongs to the panel driver; what this module owns is
//! the content and its order: air section before water, T1 before T2, the
//! running measurement counter last.

use core::fmt::Write;

use crate::sample::{Reading, Sample};
use crate::units::{f2c, TemperatureUnit};

/// Row coordinates of each text line on the panel.
const ROW_AIR_HEADER: i32 = 0;
const ROW_AIR_T1: i32 = 8;
const ROW_WATER_HEADER: i32 = 24;
const ROW_WATER_T1: i32 = 32;
const ROW_WATER_T2: i32 = 40;
const ROW_COUNTER: i32 = 56;

/// Text sink implemented by the OLED on hardware and a recording double in
/// tests.
pub trait DisplaySink {
    /// Blank the panel.
    fn clear(&mut self);
    /// Place a line of text at pixel coordinates.
    fn text(&mut self, s: &str, x: i32, y: i32);
    /// Push the composed frame to the panel.
    fn show(&mut self);
}

/// Render one sample and the running measurement counter.
///
/// Values are stored Fahrenheit; when the display preference is Celsius
/// they are converted here, then rounded to integer degrees to fit the
/// panel. Unreadable channels surface the sentinel value unchanged.
pub fn render_sample<D: DisplaySink>(
    display: &mut D,
    sample: &Sample,
    unit: TemperatureUnit,
    measurement_count: u32,
) {
    let air = display_degrees(sample.air, unit);
    let water_a = display_degrees(sample.water_a, unit);
    let water_b = display_degrees(sample.water_b, unit);

    display.clear();

    let mut line: heapless::String<20> = heapless::String::new();

    display.text("Air Data", 0, ROW_AIR_HEADER);
    let _ = write!(line, "T1 {} {}", air, unit.label());
    display.text(&line, 0, ROW_AIR_T1);

    display.text("Water Data", 0, ROW_WATER_HEADER);
    line.clear();
    let _ = write!(line, "T1 {} {}", water_a, unit.label());
    display.text(&line, 0, ROW_WATER_T1);
    line.clear();
    let _ = write!(line, "T2 {} {}", water_b, unit.label());
    display.text(&line, 0, ROW_WATER_T2);

    line.clear();
    let _ = write!(line, "{measurement_count}");
    display.text(&line, 0, ROW_COUNTER);

    display.show();
}

/// Integer display value of one channel in the requested unit.
fn display_degrees(reading: Reading, unit: TemperatureUnit) -> i32 {
    let fahrenheit = reading.value_or_sentinel();
    let value = match unit {
        TemperatureUnit::Fahrenheit => fahrenheit,
        TemperatureUnit::Celsius => f2c(fahrenheit),
    };
    // round half away from zero; f32::round is not available in core
    if value >= 0.0 {
        (value + 0.5) as i32
    } else {
        (value - 0.5) as i32
    }
}
