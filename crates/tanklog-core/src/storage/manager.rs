//! Ownership of the current data file and the batch flush path.

use alloc::format;
use alloc::string::String;

use log::{debug, info};

use super::{FileStore, StorageError};
use crate::config::{
    DATA_FILE_EXTENSION, DATA_FILE_HEADER, DATA_FILE_NAME_PREFIX, MEASUREMENTS_DIR_PATH,
};
use crate::sample::Sample;

/// Owns the current data file, tracks its running size and append count,
/// and rotates to a fresh file once the size cap is crossed.
///
/// The handle is replaced on rotation, never mutated in place: a batch is
/// written entirely to whichever file is current after the size check, so
/// no flush ever straddles two files.
pub struct StorageManager<F: FileStore> {
    store: F,
    current_path: String,
    write_count: u32,
    max_file_size: u64,
}

impl<F: FileStore> StorageManager<F> {
    pub fn new(store: F, max_file_size: u64) -> Self {
        Self {
            store,
            current_path: String::new(),
            write_count: 0,
            max_file_size,
        }
    }

    /// Boot-time file selection: adopt the most recently created data file
    /// if one exists (so restarts don't litter the card with near-empty
    /// files), otherwise create file #0 with the header row.
    pub fn open_current(&mut self) -> Result<(), StorageError> {
        match self.store.last_file(MEASUREMENTS_DIR_PATH)? {
            Some(name) => {
                self.current_path = format!("{MEASUREMENTS_DIR_PATH}/{name}");
                info!("resuming data file {}", self.current_path);
                Ok(())
            }
            None => self.create_data_file(),
        }
    }

    /// Create the next data file and repoint the handle at it. The index is
    /// the count of files already in the measurements directory,
    /// monotonically increasing, never reused.
    fn create_data_file(&mut self) -> Result<(), StorageError> {
        let index = self.store.file_count(MEASUREMENTS_DIR_PATH)?;
        let path = format!(
            "{MEASUREMENTS_DIR_PATH}/{DATA_FILE_NAME_PREFIX}{index}{DATA_FILE_EXTENSION}"
        );
        self.store.create(&path, DATA_FILE_HEADER)?;
        self.write_count = 0;
        self.current_path = path;
        info!("created data file {}", self.current_path);
        Ok(())
    }

    /// Write a batch of samples to the current data file.
    ///
    /// An empty batch returns success without touching storage. Rotation,
    /// when due, completes fully before the first line of the batch is
    /// written. Any I/O error propagates to the caller, which still owns
    /// the batch.
    pub fn flush(&mut self, batch: &[Sample]) -> Result<(), StorageError> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut lines = String::new();
        for sample in batch {
            lines.push_str(&sample.to_csv_line());
        }

        if self.store.size(&self.current_path)? >= self.max_file_size {
            self.create_data_file()?;
        }

        self.store.append(&self.current_path, lines.as_bytes())?;
        self.write_count += 1;
        debug!(
            "wrote {} samples to {} (write #{})",
            batch.len(),
            self.current_path,
            self.write_count
        );
        Ok(())
    }

    pub fn current_path(&self) -> &str {
        &self.current_path
    }

    /// Number of completed appends to the current file since it was
    /// created or adopted.
    pub fn write_count(&self) -> u32 {
        self.write_count
    }

    pub fn store(&self) -> &F {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut F {
        &mut self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::Reading;
    use crate::testing::{sample_at_minute, MemoryStore};

    const MAX_SIZE: u64 = 256;

    fn manager() -> StorageManager<MemoryStore> {
        let mut manager = StorageManager::new(MemoryStore::new(), MAX_SIZE);
        manager.open_current().unwrap();
        manager
    }

    #[test]
    fn test_open_current_creates_file_zero_with_header() {
        let manager = manager();
        assert_eq!(
            manager.current_path(),
            "/tank_data/measurements/tank_measurements_0.csv"
        );
        assert_eq!(
            manager.store().contents(manager.current_path()),
            DATA_FILE_HEADER
        );
    }

    #[test]
    fn test_open_current_reuses_most_recent_file() {
        let mut store = MemoryStore::new();
        store.create("/tank_data/measurements/tank_measurements_0.csv", DATA_FILE_HEADER).unwrap();
        store.create("/tank_data/measurements/tank_measurements_1.csv", DATA_FILE_HEADER).unwrap();

        let mut manager = StorageManager::new(store, MAX_SIZE);
        manager.open_current().unwrap();
        assert_eq!(
            manager.current_path(),
            "/tank_data/measurements/tank_measurements_1.csv"
        );
    }

    #[test]
    fn test_empty_flush_touches_nothing() {
        let mut manager = manager();
        let ops_before = manager.store().op_count();
        manager.flush(&[]).unwrap();
        assert_eq!(manager.store().op_count(), ops_before);
        assert_eq!(manager.write_count(), 0);
    }

    #[test]
    fn test_flush_appends_lines_in_order() {
        let mut manager = manager();
        let batch = [sample_at_minute(1), sample_at_minute(2)];
        manager.flush(&batch).unwrap();

        let contents = manager.store().contents(manager.current_path());
        let mut lines = contents.lines();
        assert_eq!(lines.next(), Some(DATA_FILE_HEADER.trim_end()));
        assert_eq!(lines.next(), Some(batch[0].to_csv_line().trim_end()));
        assert_eq!(lines.next(), Some(batch[1].to_csv_line().trim_end()));
        assert_eq!(lines.next(), None);
        assert_eq!(manager.write_count(), 1);
    }

    #[test]
    fn test_invalid_samples_are_persisted_unfiltered() {
        let mut manager = manager();
        let mut sample = sample_at_minute(4);
        sample.air = Reading::Invalid;
        manager.flush(&[sample]).unwrap();

        let contents = manager.store().contents(manager.current_path());
        assert!(contents.contains("-999999.0"));
    }

    #[test]
    fn test_rotation_when_size_cap_reached() {
        let mut manager = manager();
        let old_path = String::from(manager.current_path());

        // grow the current file past the cap, then flush
        let filler = [0x61_u8; MAX_SIZE as usize];
        manager.store.append(&old_path, &filler).unwrap();
        let old_size = manager.store().contents(&old_path).len();

        let batch = [sample_at_minute(7)];
        manager.flush(&batch).unwrap();

        // new file index = count of files before rotation, header first
        assert_eq!(
            manager.current_path(),
            "/tank_data/measurements/tank_measurements_1.csv"
        );
        let new_contents = manager.store().contents(manager.current_path());
        assert!(new_contents.starts_with(DATA_FILE_HEADER));
        assert!(new_contents.contains(batch[0].to_csv_line().as_str()));

        // none of the batch reached the old file
        assert_eq!(manager.store().contents(&old_path).len(), old_size);

        // rotation reset the append counter before counting this write
        assert_eq!(manager.write_count(), 1);
    }

    #[test]
    fn test_no_rotation_below_cap() {
        let mut manager = manager();
        manager.flush(&[sample_at_minute(1)]).unwrap();
        manager.flush(&[sample_at_minute(2)]).unwrap();
        assert_eq!(
            manager.current_path(),
            "/tank_data/measurements/tank_measurements_0.csv"
        );
        assert_eq!(manager.write_count(), 2);
    }

    #[test]
    fn test_io_error_propagates() {
        let mut manager = manager();
        manager.store.fail_next_append();
        let err = manager.flush(&[sample_at_minute(1)]).unwrap_err();
        assert!(matches!(err, StorageError::Device(_)));
    }
}
