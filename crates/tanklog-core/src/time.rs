//! Wall-clock timestamps and the boot-time network sync seam.

use core::fmt;

use thiserror_no_std::Error;

/// Calendar timestamp attached to each measurement.
///
/// Displays as `M/D/YYYY H:MM:SS`; month, day and hour are not
/// zero-padded, minute and second are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl Timestamp {
    /// Parse a timestamp previously produced by the `Display` impl.
    pub fn parse(s: &str) -> Option<Self> {
        let (date, time) = s.split_once(' ')?;
        let mut date = date.split('/');
        let month = date.next()?.parse().ok()?;
        let day = date.next()?.parse().ok()?;
        let year = date.next()?.parse().ok()?;
        if date.next().is_some() {
            return None;
        }
        let mut time = time.split(':');
        let hour = time.next()?.parse().ok()?;
        let minute = time.next()?.parse().ok()?;
        let second = time.next()?.parse().ok()?;
        if time.next().is_some() {
            return None;
        }
        Some(Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
        })
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{} {}:{:02}:{:02}",
            self.month, self.day, self.year, self.hour, self.minute, self.second
        )
    }
}

/// Source of the current wall-clock time. Backed by the RTC on hardware.
pub trait Clock {
    fn now(&self) -> Timestamp;
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSyncError {
    /// Every connect attempt timed out.
    #[error("network connect attempts exhausted")]
    AttemptsExhausted,
    /// The network came up but the time protocol exchange failed.
    #[error("time protocol failure")]
    Protocol,
}

/// Boot-time network time synchronization.
///
/// Implementations own their connection lifecycle: by the time
/// `synchronize` returns the network interface may be shut down again.
pub trait TimeSync {
    fn synchronize(&mut self) -> impl Future<Output = Result<(), TimeSyncError>>;
}
