//! # EEPROM Backend
//!
//! Block I/O against a raw EEPROM addressed by an I²C bus/address pair. The
//! chip's contents are reached through the kernel's at24-style sysfs node,
//! `/sys/bus/i2c/devices/<bus>-<addr>/eeprom`, so reads and writes reduce to
//! offset I/O on that node; what differs from the plain-file backend is the
//! address shape, the attach check (the node must already exist, since the
//! kernel creates it, not us), and write protection.

use std::fs::OpenOptions;
use std::os::unix::fs::FileExt;
use std::path::PathBuf;

use tracing::{debug, trace, warn};

use super::{StorageBackend, StoreAddress, ERASE_FILL};
use crate::error::{Result, StoreError};

#[derive(Debug)]
pub struct EepromBackend;

/// Sysfs node for the EEPROM contents of the chip at `bus`/`address`.
pub fn eeprom_node(bus: u8, address: u16) -> PathBuf {
    PathBuf::from(format!("/sys/bus/i2c/devices/{bus}-{address:04x}/eeprom"))
}

fn node_of(address: &StoreAddress) -> Result<PathBuf> {
    match address {
        StoreAddress::Eeprom { bus, address } => Ok(eeprom_node(*bus, *address)),
        StoreAddress::File { path } => Err(StoreError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("eeprom backend given file path '{}'", path.display()),
        ))),
    }
}

impl StorageBackend for EepromBackend {
    fn init(&self, address: &StoreAddress) -> Result<()> {
        let node = node_of(address)?;
        if !node.exists() {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("eeprom node '{}' not present", node.display()),
            )));
        }
        debug!(node = %node.display(), "eeprom store attached");
        Ok(())
    }

    fn read_block(&self, address: &StoreAddress, offset: u64, buf: &mut [u8]) -> Result<()> {
        let node = node_of(address)?;
        let file = OpenOptions::new().read(true).open(&node)?;
        let got = file.read_at(buf, offset)?;
        if got < buf.len() {
            return Err(StoreError::ShortRead {
                offset,
                wanted: buf.len(),
                got,
            });
        }
        trace!(node = %node.display(), offset, len = buf.len(), "read block");
        Ok(())
    }

    fn write_block(&self, address: &StoreAddress, offset: u64, data: &[u8]) -> Result<()> {
        let node = node_of(address)?;
        let file = OpenOptions::new().write(true).open(&node)?;
        let committed = file.write_at(data, offset)?;
        if committed < data.len() {
            return Err(StoreError::ShortWrite {
                offset,
                wanted: data.len(),
                committed,
            });
        }
        trace!(node = %node.display(), offset, len = data.len(), "wrote block");
        Ok(())
    }

    fn erase_block(&self, address: &StoreAddress, offset: u64, size: usize) -> Result<()> {
        let fill = vec![ERASE_FILL; size];
        self.write_block(address, offset, &fill)
    }

    fn read_number(
        &self,
        address: &StoreAddress,
        offset: u64,
        count: usize,
        element_size: usize,
        out: &mut [u8],
    ) -> Result<()> {
        for idx in 0..count {
            let at = idx * element_size;
            self.read_block(address, offset + at as u64, &mut out[at..at + element_size])?;
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
        for idx in 0..count {
            let at = idx * element_size;
            self.write_block(address, offset + at as u64, &data[at..at + element_size])?;
        }
        Ok(())
    }

    fn write_protect(&self, address: &StoreAddress) -> Result<()> {
        // The WP line is strapped in hardware on current boards; flag the
        // request so a miswired bringup is visible in the logs.
        let node = node_of(address)?;
        warn!(node = %node.display(), "write protect requested but WP line is hardware-strapped");
        Ok(())
    }

    fn rename(&self, old: &StoreAddress, _new: &StoreAddress) -> Result<()> {
        // A soldered chip cannot move buses.
        let node = node_of(old)?;
        trace!(node = %node.display(), "rename is a no-op for eeprom stores");
        Ok(())
    }

    fn remove(&self, address: &StoreAddress) -> Result<()> {
        // Deleting an EEPROM database means erasing it, not unlinking a node.
        self.erase_block(address, 0, crate::schema::SCHEMA_END_OFFSET as usize)
    }

    fn cleanup(&self, address: &StoreAddress) -> Result<()> {
        let node = node_of(address)?;
        trace!(node = %node.display(), "eeprom store released");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_path_is_bus_dash_hex_address() {
        assert_eq!(
            eeprom_node(0, 0x50),
            PathBuf::from("/sys/bus/i2c/devices/0-0050/eeprom")
        );
        assert_eq!(
            eeprom_node(2, 0x51),
            PathBuf::from("/sys/bus/i2c/devices/2-0051/eeprom")
        );
    }

    #[test]
    fn file_address_is_rejected() {
        let err = EepromBackend
            .init(&StoreAddress::file("/tmp/not-an-eeprom"))
            .unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
    }

    #[test]
    fn missing_node_fails_init() {
        let err = EepromBackend
            .init(&StoreAddress::eeprom(200, 0x7F))
            .unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
    }
}
