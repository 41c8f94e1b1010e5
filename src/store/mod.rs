//! # Inventory Store
//!
//! [`InventoryStore`] is the top-level handle: it owns the module registry
//! and routes every database operation through the registered backend for
//! the addressed module. The split across this directory mirrors the
//! subsystem boundaries:
//!
//! - `index`: magic word, header, and index-table management
//! - `fields`: payload commit/read/erase plus the typed record accessors
//! - `provision`: first-time database creation and the boot registration
//!   cascade
//!
//! Everything is single-threaded, synchronous, blocking I/O. Operations are
//! invoked serially from the node's boot sequence, one module at a time and
//! one field at a time, so the store holds no locks.

mod fields;
mod index;
mod provision;

pub use provision::{DeviceRegisterCallback, MfgDataSource};

use tracing::debug;

use crate::error::{Result, StoreError};
use crate::registry::{ModuleEntry, Registry};
use crate::schema::records::UnitCfgEntry;
use crate::storage::StoreAddress;

/// Handle to every module inventory database reachable from this node.
#[derive(Default)]
pub struct InventoryStore {
    registry: Registry,
}

impl InventoryStore {
    pub fn new() -> Self {
        debug!("inventory store initialized");
        Self {
            registry: Registry::new(),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Register a module database directly by id and backend address.
    pub fn register_module(&mut self, id: &str, name: &str, address: StoreAddress) -> Result<()> {
        self.registry.register(id, name, address)
    }

    /// Register a submodule from its unit-configuration entry (backend
    /// selected from the entry's address shape).
    pub fn register_unit_entry(&mut self, cfg: &UnitCfgEntry) -> Result<()> {
        self.registry.register_unit_entry(cfg)
    }

    pub fn update_module(&mut self, id: &str, name: &str, address: StoreAddress) -> Result<()> {
        self.registry.update(id, name, address)
    }

    pub fn deregister_module(&mut self, id: &str) -> Result<()> {
        self.registry.deregister(id)
    }

    /// Release every module registration. Called at shutdown.
    pub fn deregister_all(&mut self) {
        self.registry.deregister_all();
    }

    pub(crate) fn entry(&self, module_id: &str) -> Result<&ModuleEntry> {
        self.registry
            .lookup(module_id)
            .ok_or_else(|| StoreError::ModuleNotRegistered(module_id.to_owned()))
    }

    pub(crate) fn read_block(&self, module_id: &str, offset: u16, buf: &mut [u8]) -> Result<()> {
        let entry = self.entry(module_id)?;
        entry.backend().read_block(entry.address(), offset as u64, buf)
    }

    pub(crate) fn write_block(&self, module_id: &str, offset: u16, data: &[u8]) -> Result<()> {
        let entry = self.entry(module_id)?;
        entry.backend().write_block(entry.address(), offset as u64, data)
    }

    pub(crate) fn erase_block(&self, module_id: &str, offset: u16, size: usize) -> Result<()> {
        let entry = self.entry(module_id)?;
        entry.backend().erase_block(entry.address(), offset as u64, size)
    }

    pub(crate) fn read_number(
        &self,
        module_id: &str,
        offset: u16,
        count: usize,
        element_size: usize,
        out: &mut [u8],
    ) -> Result<()> {
        let entry = self.entry(module_id)?;
        entry
            .backend()
            .read_number(entry.address(), offset as u64, count, element_size, out)
    }

    pub(crate) fn write_number(
        &self,
        module_id: &str,
        offset: u16,
        count: usize,
        element_size: usize,
        data: &[u8],
    ) -> Result<()> {
        let entry = self.entry(module_id)?;
        entry
            .backend()
            .write_number(entry.address(), offset as u64, count, element_size, data)
    }

    /// Engage write protection on the module's storage.
    pub fn write_protect(&self, module_id: &str) -> Result<()> {
        let entry = self.entry(module_id)?;
        entry.backend().write_protect(entry.address())
    }
}

impl Drop for InventoryStore {
    fn drop(&mut self) {
        self.registry.deregister_all();
    }
}
