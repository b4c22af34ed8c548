//! Wake-reason disambiguation and the manual-flush signal.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;

/// Why the device resumed from light sleep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeReason {
    /// The sleep timer expired; business as usual.
    Timer,
    /// The external pin (flush button) fired.
    ExternalPin,
}

/// Single-slot manual-flush request.
///
/// [`request`](Self::request) is the entire interrupt-context body: it
/// latches the signal and returns, with no I/O and no storage access. The
/// main cycle consumes the latch once per cycle boundary with
/// [`take`](Self::take).
///
/// The consume is atomic, so a press landing between the read and the flush
/// it triggers is re-latched and serviced one cycle later rather than lost.
/// Human presses cannot realistically arrive faster than one per cycle, but
/// nothing here depends on that.
pub struct FlushSignal {
    inner: Signal<CriticalSectionRawMutex, ()>,
}

impl FlushSignal {
    pub const fn new() -> Self {
        Self {
            inner: Signal::new(),
        }
    }

    /// Latch a flush request. Safe to call from interrupt context.
    pub fn request(&self) {
        self.inner.signal(());
    }

    /// Consume a pending request, clearing the latch.
    pub fn take(&self) -> bool {
        self.inner.try_take().is_some()
    }
}

impl Default for FlushSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_consumes_request() {
        let signal = FlushSignal::new();
        assert!(!signal.take());

        signal.request();
        assert!(signal.take());
        assert!(!signal.take());
    }

    #[test]
    fn test_repeated_requests_coalesce() {
        let signal = FlushSignal::new();
        signal.request();
        signal.request();
        assert!(signal.take());
        // two presses before a cycle boundary service a single flush
        assert!(!signal.take());
    }
}
