//! # Storage Backends
//!
//! Uniform block I/O over the two places a module's inventory database can
//! live: a plain file (EEPROM contents exported through sysfs, or a database
//! file on the master module's filesystem) and a raw EEPROM reached through a
//! userspace I²C driver.
//!
//! All operations are byte-offset addressed and safe to call repeatedly.
//! Nothing here retries; retry policy belongs to callers. `read_block` fails
//! if fewer than the requested bytes are available; `write_block` fails if
//! fewer than the supplied bytes were committed; `erase_block` fills the
//! range with [`ERASE_FILL`] rather than shrinking anything.
//!
//! A backend is selected once, at module-registration time, and held by the
//! registry entry as a `&'static dyn StorageBackend`. Both implementations
//! are stateless; the per-module state is the [`StoreAddress`] passed to
//! every call.

mod eeprom;
mod file;

pub use eeprom::EepromBackend;
pub use file::FileBackend;

use std::path::PathBuf;

use crate::error::Result;

/// Byte an erased cell reads back as.
pub const ERASE_FILL: u8 = 0xFF;

/// Backend-specific addressing for one module's database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreAddress {
    /// Sysfs-style path to the database contents.
    File { path: PathBuf },
    /// Raw EEPROM behind an I²C bus/address pair.
    Eeprom { bus: u8, address: u16 },
}

impl StoreAddress {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        StoreAddress::File { path: path.into() }
    }

    pub fn eeprom(bus: u8, address: u16) -> Self {
        StoreAddress::Eeprom { bus, address }
    }
}

/// Block I/O contract shared by the file and EEPROM backends.
pub trait StorageBackend {
    /// Open or attach the storage; creates the backing file when absent.
    fn init(&self, address: &StoreAddress) -> Result<()>;

    /// Read exactly `buf.len()` bytes starting at `offset`.
    fn read_block(&self, address: &StoreAddress, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// Write all of `data` starting at `offset`.
    fn write_block(&self, address: &StoreAddress, offset: u64, data: &[u8]) -> Result<()>;

    /// Fill `size` bytes starting at `offset` with the erase value.
    fn erase_block(&self, address: &StoreAddress, offset: u64, size: usize) -> Result<()>;

    /// Read `count` numbers of `element_size` bytes each into `out`
    /// (`out.len() == count * element_size`), element by element.
    fn read_number(
        &self,
        address: &StoreAddress,
        offset: u64,
        count: usize,
        element_size: usize,
        out: &mut [u8],
    ) -> Result<()>;

    /// Write `count` numbers of `element_size` bytes each from `data`,
    /// element by element.
    fn write_number(
        &self,
        address: &StoreAddress,
        offset: u64,
        count: usize,
        element_size: usize,
        data: &[u8],
    ) -> Result<()>;

    /// Engage write protection where the hardware supports it.
    fn write_protect(&self, address: &StoreAddress) -> Result<()>;

    /// Re-home the storage under a new address.
    fn rename(&self, old: &StoreAddress, new: &StoreAddress) -> Result<()>;

    /// Delete the backing storage.
    fn remove(&self, address: &StoreAddress) -> Result<()>;

    /// Release any resources attached at `init` time.
    fn cleanup(&self, address: &StoreAddress) -> Result<()>;
}

/// Backend singletons: selected by address shape at registration time.
pub static FILE_BACKEND: FileBackend = FileBackend;
pub static EEPROM_BACKEND: EepromBackend = EepromBackend;

/// Pick the backend for an address: non-empty path selects the file backend,
/// a bus/address pair selects the EEPROM backend.
pub fn backend_for(address: &StoreAddress) -> &'static dyn StorageBackend {
    match address {
        StoreAddress::File { .. } => &FILE_BACKEND,
        StoreAddress::Eeprom { .. } => &EEPROM_BACKEND,
    }
}
