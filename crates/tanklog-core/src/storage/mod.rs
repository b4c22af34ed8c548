//! Persistent measurement storage: file naming, size-based rotation, CSV
//! appends.

mod manager;

pub use manager::*;

use thiserror_no_std::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("storage device error: {0}")]
    Device(heapless::String<64>),
    #[error("path not found: {0}")]
    NotFound(heapless::String<64>),
}

/// Narrow filesystem seam. Implemented by the SD card on hardware and by an
/// in-memory store in tests.
///
/// Operations are blocking, matching the synchronous SD stack underneath;
/// storage I/O is assumed bounded by hardware speed.
pub trait FileStore {
    /// Create `path` (truncating any previous content) and write the header
    /// row to it.
    fn create(&mut self, path: &str, header: &str) -> Result<(), StorageError>;

    /// Append `bytes` to an existing file, durably: once this returns the
    /// data has reached the medium.
    fn append(&mut self, path: &str, bytes: &[u8]) -> Result<(), StorageError>;

    /// Current size of the file in bytes, as the filesystem reports it.
    fn size(&self, path: &str) -> Result<u64, StorageError>;

    /// Number of files currently in `dir`.
    fn file_count(&self, dir: &str) -> Result<usize, StorageError>;

    /// Name (not path) of the most recently created file in `dir`, if any.
    fn last_file(&self, dir: &str) -> Result<Option<heapless::String<64>>, StorageError>;
}
