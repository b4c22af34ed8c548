//! Temperature unit conversion.

/// Convert a temperature in degrees Celsius to degrees Fahrenheit.
pub fn c2f(temp_c: f32) -> f32 {
    (temp_c * 9.0 / 5.0) + 32.0
}

/// Convert a temperature in degrees Fahrenheit to degrees Celsius.
pub fn f2c(temp_f: f32) -> f32 {
    (temp_f - 32.0) * (5.0 / 9.0)
}

/// Unit a temperature is displayed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemperatureUnit {
    Fahrenheit,
    Celsius,
}

impl TemperatureUnit {
    /// Single-character suffix shown after each display value.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Fahrenheit => "F",
            Self::Celsius => "C",
        }
    }
}
