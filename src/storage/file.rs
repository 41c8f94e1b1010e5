//! # File Backend
//!
//! Block I/O against a plain file. This is the backend used both for EEPROM
//! contents the kernel already exports as a sysfs file and for database files
//! living on the master module's filesystem.
//!
//! Files are opened per call; the store is consulted a handful of times per
//! boot, so descriptor churn is irrelevant and keeping no open handles means
//! there is nothing to invalidate when a module's path moves.

use std::fs::OpenOptions;
use std::os::unix::fs::FileExt;
use std::path::Path;

use tracing::{debug, trace};

use super::{StorageBackend, StoreAddress, ERASE_FILL};
use crate::error::{Result, StoreError};

#[derive(Debug)]
pub struct FileBackend;

fn path_of(address: &StoreAddress) -> Result<&Path> {
    match address {
        StoreAddress::File { path } => Ok(path),
        StoreAddress::Eeprom { bus, address } => Err(StoreError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("file backend given eeprom address {bus}-{address:04x}"),
        ))),
    }
}

impl FileBackend {
    fn read_at(path: &Path, offset: u64, buf: &mut [u8]) -> Result<()> {
        let file = OpenOptions::new().read(true).open(path)?;
        let got = file.read_at(buf, offset)?;
        if got < buf.len() {
            return Err(StoreError::ShortRead {
                offset,
                wanted: buf.len(),
                got,
            });
        }
        trace!(path = %path.display(), offset, len = buf.len(), "read block");
        Ok(())
    }

    fn write_at(path: &Path, offset: u64, data: &[u8]) -> Result<()> {
        let file = OpenOptions::new().write(true).open(path)?;
        let committed = file.write_at(data, offset)?;
        if committed < data.len() {
            return Err(StoreError::ShortWrite {
                offset,
                wanted: data.len(),
                committed,
            });
        }
        trace!(path = %path.display(), offset, len = data.len(), "wrote block");
        Ok(())
    }
}

impl StorageBackend for FileBackend {
    fn init(&self, address: &StoreAddress) -> Result<()> {
        let path = path_of(address)?;
        if !path.exists() {
            debug!(path = %path.display(), "database file absent, creating");
            OpenOptions::new().write(true).create(true).open(path)?;
        }
        debug!(path = %path.display(), "file store ready");
        Ok(())
    }

    fn read_block(&self, address: &StoreAddress, offset: u64, buf: &mut [u8]) -> Result<()> {
        Self::read_at(path_of(address)?, offset, buf)
    }

    fn write_block(&self, address: &StoreAddress, offset: u64, data: &[u8]) -> Result<()> {
        Self::write_at(path_of(address)?, offset, data)
    }

    fn erase_block(&self, address: &StoreAddress, offset: u64, size: usize) -> Result<()> {
        let fill = vec![ERASE_FILL; size];
        Self::write_at(path_of(address)?, offset, &fill)
    }

    fn read_number(
        &self,
        address: &StoreAddress,
        offset: u64,
        count: usize,
        element_size: usize,
        out: &mut [u8],
    ) -> Result<()> {
        let path = path_of(address)?;
        for idx in 0..count {
            let at = idx * element_size;
            Self::read_at(
                path,
                offset + at as u64,
                &mut out[at..at + element_size],
            )?;
        }
        Ok(())
    }

    fn write_number(
        &self,
        address: &StoreAddress,
        offset: u64,
        count: usize,
        element_size: usize,
        data: &[u8],
    ) -> Result<()> {
        let path = path_of(address)?;
        for idx in 0..count {
            let at = idx * element_size;
            Self::write_at(path, offset + at as u64, &data[at..at + element_size])?;
        }
        Ok(())
    }

    fn write_protect(&self, address: &StoreAddress) -> Result<()> {
        // Plain files carry no protect line.
        let path = path_of(address)?;
        trace!(path = %path.display(), "write protect is a no-op for files");
        Ok(())
    }

    fn rename(&self, old: &StoreAddress, new: &StoreAddress) -> Result<()> {
        let from = path_of(old)?;
        let to = path_of(new)?;
        std::fs::rename(from, to)?;
        debug!(from = %from.display(), to = %to.display(), "database file renamed");
        Ok(())
    }

    fn remove(&self, address: &StoreAddress) -> Result<()> {
        let path = path_of(address)?;
        std::fs::remove_file(path)?;
        debug!(path = %path.display(), "database file removed");
        Ok(())
    }

    fn cleanup(&self, address: &StoreAddress) -> Result<()> {
        let path = path_of(address)?;
        trace!(path = %path.display(), "file store released");
        Ok(())
    }
}
