//! SD card module as the persistent file store.

use core::cell::RefCell;
use core::fmt::Write;

use chrono::{Datelike, Timelike};
use embedded_sdmmc::{Mode, SdCard, TimeSource, Timestamp, VolumeIdx, VolumeManager};
use esp_hal::rtc_cntl::Rtc;
use log::info;

use tanklog_core::config::{MEASUREMENTS_DIR_PATH, ROOT_DIR_PATH};
use tanklog_core::storage::{FileStore, StorageError};

/// FAT timestamps for created files, read from the synchronized RTC.
pub struct RtcTimeSource<'d> {
    rtc: &'d RefCell<Rtc<'d>>,
}

impl<'d> RtcTimeSource<'d> {
    pub fn new(rtc: &'d RefCell<Rtc<'d>>) -> Self {
        Self { rtc }
    }
}

impl TimeSource for RtcTimeSource<'_> {
    fn get_timestamp(&self) -> Timestamp {
        let t = self.rtc.borrow().current_time();
        Timestamp::from_calendar(
            t.year() as u16,
            t.month() as u8,
            t.day() as u8,
            t.hour() as u8,
            t.minute() as u8,
            t.second() as u8,
        )
        .unwrap_or(Timestamp::from_calendar(2025, 1, 1, 0, 0, 0).unwrap())
    }
}

/// SD card operations are blocking, as is the embedded-sdmmc stack
/// underneath. Flush durations stay bounded by card speed, which is all the
/// single-threaded cycle needs.
pub struct SdFileStore<S, D, T>
where
    S: embedded_hal::spi::SpiDevice<u8>,
    D: embedded_hal::delay::DelayNs,
    T: TimeSource,
{
    volume_mgr: VolumeManager<SdCard<S, D>, T, 4, 4, 1>,
}

fn device_error<E: core::fmt::Debug>(e: embedded_sdmmc::Error<E>) -> StorageError {
    let mut msg = heapless::String::new();
    // best effort; a truncated message still identifies the failure
    let _ = write!(msg, "{e:?}");
    StorageError::Device(msg)
}

/// Last path component, the 8.3 name embedded-sdmmc works with.
fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

impl<S, D, T> SdFileStore<S, D, T>
where
    S: embedded_hal::spi::SpiDevice<u8>,
    D: embedded_hal::delay::DelayNs,
    T: TimeSource,
{
    pub fn new(sd_card: SdCard<S, D>, ts: T) -> Self {
        let volume_mgr = VolumeManager::new(sd_card, ts);

        Self { volume_mgr }
    }

    /// Mount the card and make sure the measurements directory exists.
    /// Called once before the boot sequence touches any file.
    pub fn ensure_layout(&self) -> Result<(), StorageError> {
        let volume0 = self.volume_mgr.open_volume(VolumeIdx(0)).map_err(device_error)?;
        let root_dir = volume0.open_root_dir().map_err(device_error)?;

        let tank_dir = match root_dir.open_dir(file_name(ROOT_DIR_PATH)) {
            Ok(dir) => dir,
            Err(_) => {
                root_dir
                    .make_dir_in_dir(file_name(ROOT_DIR_PATH))
                    .map_err(device_error)?;
                root_dir
                    .open_dir(file_name(ROOT_DIR_PATH))
                    .map_err(device_error)?
            }
        };
        if tank_dir.open_dir(file_name(MEASUREMENTS_DIR_PATH)).is_err() {
            tank_dir
                .make_dir_in_dir(file_name(MEASUREMENTS_DIR_PATH))
                .map_err(device_error)?;
            info!("created measurements directory");
        }

        // Resources close in reverse order when dropped (RAII)
        Ok(())
    }

    /// Open the measurements directory and run `operation` on it.
    fn in_measurements_dir<R>(
        &self,
        operation: impl FnOnce(
            &embedded_sdmmc::Directory<'_, SdCard<S, D>, T, 4, 4, 1>,
        ) -> Result<R, StorageError>,
    ) -> Result<R, StorageError> {
        let volume0 = self.volume_mgr.open_volume(VolumeIdx(0)).map_err(device_error)?;
        let root_dir = volume0.open_root_dir().map_err(device_error)?;
        let tank_dir = root_dir
            .open_dir(file_name(ROOT_DIR_PATH))
            .map_err(device_error)?;
        let dir = tank_dir
            .open_dir(file_name(MEASUREMENTS_DIR_PATH))
            .map_err(device_error)?;

        let result = operation(&dir);

        // Explicitly close the handles to surface close errors
        dir.close().map_err(device_error)?;
        tank_dir.close().map_err(device_error)?;
        root_dir.close().map_err(device_error)?;
        volume0.close().map_err(device_error)?;

        result
    }
}

impl<S, D, T> FileStore for SdFileStore<S, D, T>
where
    S: embedded_hal::spi::SpiDevice<u8>,
    D: embedded_hal::delay::DelayNs,
    T: TimeSource,
{
    fn create(&mut self, path: &str, header: &str) -> Result<(), StorageError> {
        self.in_measurements_dir(|dir| {
            let file = dir
                .open_file_in_dir(file_name(path), Mode::ReadWriteCreateOrTruncate)
                .map_err(device_error)?;
            file.write(header.as_bytes()).map_err(device_error)?;
            file.close().map_err(device_error)
        })
    }

    fn append(&mut self, path: &str, bytes: &[u8]) -> Result<(), StorageError> {
        self.in_measurements_dir(|dir| {
            let file = dir
                .open_file_in_dir(file_name(path), Mode::ReadWriteAppend)
                .map_err(device_error)?;
            file.write(bytes).map_err(device_error)?;
            // closing flushes the FAT metadata, making the append durable
            file.close().map_err(device_error)
        })
    }

    fn size(&self, path: &str) -> Result<u64, StorageError> {
        self.in_measurements_dir(|dir| {
            let file = dir
                .open_file_in_dir(file_name(path), Mode::ReadOnly)
                .map_err(device_error)?;
            let length = file.length();
            file.close().map_err(device_error)?;
            Ok(u64::from(length))
        })
    }

    fn file_count(&self, _dir: &str) -> Result<usize, StorageError> {
        self.in_measurements_dir(|dir| {
            let mut count = 0;
            dir.iterate_dir(|entry| {
                if !entry.attributes.is_directory() {
                    count += 1;
                }
            })
            .map_err(device_error)?;
            Ok(count)
        })
    }

    fn last_file(&self, _dir: &str) -> Result<Option<heapless::String<64>>, StorageError> {
        self.in_measurements_dir(|dir| {
            // FAT directory entries keep creation order for files that are
            // only ever created, so the last entry is the most recent one
            let mut last = None;
            dir.iterate_dir(|entry| {
                if !entry.attributes.is_directory() {
                    let mut name = heapless::String::new();
                    let _ = write!(name, "{}", entry.name);
                    last = Some(name);
                }
            })
            .map_err(device_error)?;
            Ok(last)
        })
    }
}
