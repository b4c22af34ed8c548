//! Wi-Fi + SNTP clock synchronization and the RTC-backed clock.
//!
//! The network exists only to set the clock once at boot: connect, ask an
//! NTP pool for the time, apply the timezone offset, program the RTC, and
//! shut the radio back down.

use core::cell::RefCell;
use core::net::SocketAddr;

use chrono::{DateTime, Datelike, Timelike};
use embassy_net::dns::DnsQueryType;
use embassy_net::udp::{PacketMetadata, UdpSocket};
use embassy_net::{IpEndpoint, Stack};
use embassy_time::{with_timeout, Duration, Instant};
use esp_hal::rtc_cntl::Rtc;
use esp_radio::wifi::{ClientConfiguration, Configuration, WifiController};
use log::{info, warn};
use sntpc::{NtpContext, NtpTimestampGenerator, NtpUdpSocket};

use tanklog_core::config::{
    InternetConfig, TIMEZONE_OFFSET_SECONDS, WIFI_CONNECT_ATTEMPTS, WIFI_TIMEOUT,
};
use tanklog_core::time::{Clock, TimeSync, TimeSyncError, Timestamp};

const NTP_POOL: &str = "pool.ntp.org";
const NTP_PORT: u16 = 123;

/// Timestamp source for the NTP exchange, based on uptime. Only round-trip
/// deltas are derived from it, so the missing wall-clock base is fine.
#[derive(Copy, Clone, Default)]
struct UptimeTimestampGen {
    now: Duration,
}

impl NtpTimestampGenerator for UptimeTimestampGen {
    fn init(&mut self) {
        self.now = Duration::from_micros(Instant::now().as_micros());
    }

    fn timestamp_sec(&self) -> u64 {
        self.now.as_secs()
    }

    fn timestamp_subsec_micros(&self) -> u32 {
        (self.now.as_micros() % 1_000_000) as u32
    }
}

/// Adapter between sntpc's socket trait and an embassy-net UDP socket.
struct SntpSocket<'a, 'b> {
    socket: &'a UdpSocket<'b>,
}

fn to_endpoint(addr: SocketAddr) -> IpEndpoint {
    IpEndpoint::new(addr.ip().into(), addr.port())
}

impl NtpUdpSocket for SntpSocket<'_, '_> {
    async fn send_to(&self, buf: &[u8], addr: SocketAddr) -> sntpc::Result<usize> {
        self.socket
            .send_to(buf, to_endpoint(addr))
            .await
            .map(|()| buf.len())
            .map_err(|_| sntpc::Error::Network)
    }

    async fn recv_from(&self, buf: &mut [u8]) -> sntpc::Result<(usize, SocketAddr)> {
        let (n, meta) = self
            .socket
            .recv_from(buf)
            .await
            .map_err(|_| sntpc::Error::Network)?;
        let addr = SocketAddr::new(meta.endpoint.addr.into(), meta.endpoint.port);
        Ok((n, addr))
    }
}

/// Boot-time time sync over Wi-Fi, implementing the core's seam.
pub struct WifiSntp<'d> {
    controller: WifiController<'d>,
    stack: Stack<'d>,
    rtc: &'d RefCell<Rtc<'d>>,
    config: InternetConfig<'d>,
}

impl<'d> WifiSntp<'d> {
    pub fn new(
        controller: WifiController<'d>,
        stack: Stack<'d>,
        rtc: &'d RefCell<Rtc<'d>>,
        config: InternetConfig<'d>,
    ) -> Self {
        Self {
            controller,
            stack,
            rtc,
            config,
        }
    }

    async fn connect_once(&mut self) -> Result<(), ()> {
        let client = ClientConfiguration {
            ssid: self.config.ssid.into(),
            password: self.config.password.into(),
            ..Default::default()
        };
        self.controller
            .set_configuration(&Configuration::Client(client))
            .map_err(|_| ())?;
        if !matches!(self.controller.is_started(), Ok(true)) {
            self.controller.start_async().await.map_err(|_| ())?;
        }
        self.controller.connect_async().await.map_err(|_| ())
    }

    async fn query_ntp(&self) -> Result<u32, TimeSyncError> {
        let server = self
            .stack
            .dns_query(NTP_POOL, DnsQueryType::A)
            .await
            .ok()
            .and_then(|addrs| addrs.first().copied())
            .ok_or(TimeSyncError::Protocol)?;

        let mut rx_meta = [PacketMetadata::EMPTY; 4];
        let mut rx_buffer = [0u8; 256];
        let mut tx_meta = [PacketMetadata::EMPTY; 4];
        let mut tx_buffer = [0u8; 256];
        let mut socket = UdpSocket::new(
            self.stack,
            &mut rx_meta,
            &mut rx_buffer,
            &mut tx_meta,
            &mut tx_buffer,
        );
        socket.bind(NTP_PORT).map_err(|_| TimeSyncError::Protocol)?;

        let server = SocketAddr::new(server.into(), NTP_PORT);
        let context = NtpContext::new(UptimeTimestampGen::default());
        let result = sntpc::get_time(server, &SntpSocket { socket: &socket }, context)
            .await
            .map_err(|_| TimeSyncError::Protocol)?;
        Ok(result.sec())
    }
}

impl TimeSync for WifiSntp<'_> {
    async fn synchronize(&mut self) -> Result<(), TimeSyncError> {
        if !self.config.enabled {
            return Ok(());
        }

        let mut connected = false;
        for attempt in 1..=WIFI_CONNECT_ATTEMPTS {
            info!("connecting to {} (attempt {attempt})", self.config.ssid);
            match with_timeout(WIFI_TIMEOUT, self.connect_once()).await {
                Ok(Ok(())) => {
                    connected = true;
                    break;
                }
                _ => warn!("Wi-Fi connect attempt {attempt} failed"),
            }
        }
        if !connected {
            return Err(TimeSyncError::AttemptsExhausted);
        }

        with_timeout(WIFI_TIMEOUT, self.stack.wait_config_up())
            .await
            .map_err(|_| TimeSyncError::Protocol)?;

        let unix_seconds = self.query_ntp().await?;
        let local_seconds = i64::from(unix_seconds) + i64::from(TIMEZONE_OFFSET_SECONDS);
        let datetime = DateTime::from_timestamp(local_seconds, 0)
            .ok_or(TimeSyncError::Protocol)?
            .naive_utc();
        self.rtc.borrow_mut().set_current_time(datetime);
        info!("system time set to {datetime}");

        // the radio has done its job for this power cycle
        if self.controller.stop_async().await.is_err() {
            warn!("failed to stop Wi-Fi controller");
        }
        Ok(())
    }
}

/// RTC-backed wall clock for measurement timestamps.
pub struct RtcClock<'d> {
    rtc: &'d RefCell<Rtc<'d>>,
}

impl<'d> RtcClock<'d> {
    pub fn new(rtc: &'d RefCell<Rtc<'d>>) -> Self {
        Self { rtc }
    }
}

impl Clock for RtcClock<'_> {
    fn now(&self) -> Timestamp {
        let t = self.rtc.borrow().current_time();
        Timestamp {
            year: t.year() as u16,
            month: t.month() as u8,
            day: t.day() as u8,
            hour: t.hour() as u8,
            minute: t.minute() as u8,
            second: t.second() as u8,
        }
    }
}
