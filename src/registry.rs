//! # Module Registry
//!
//! In-memory map from a module's unique identifier to the backend and
//! backend address used for all I/O against that module's database. The
//! registry is explicit state owned by the [`InventoryStore`](crate::InventoryStore);
//! it is constructed empty, filled by the boot-time registration cascade, and
//! torn down with `deregister_all`.
//!
//! Lookup is a linear scan; a unit carries at most eight modules. An empty
//! module id addresses the master module: on boot the master's real id is not
//! yet known, and the registration order guarantees the master is the first
//! entry.

use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use crate::error::{Result, StoreError};
use crate::schema::records::UnitCfgEntry;
use crate::schema::MAX_MODULES_PER_UNIT;
use crate::storage::{backend_for, StorageBackend, StoreAddress};

/// One registered module: identity plus the backend route to its database.
pub struct ModuleEntry {
    id: String,
    name: String,
    address: StoreAddress,
    backend: &'static dyn StorageBackend,
}

impl ModuleEntry {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &StoreAddress {
        &self.address
    }

    pub fn backend(&self) -> &'static dyn StorageBackend {
        self.backend
    }
}

impl std::fmt::Debug for ModuleEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleEntry")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("address", &self.address)
            .finish()
    }
}

/// Registry of every module reachable from this node.
#[derive(Debug, Default)]
pub struct Registry {
    modules: SmallVec<[ModuleEntry; MAX_MODULES_PER_UNIT as usize]>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module under `id`. Re-registering an id already present is
    /// a no-op success and does not duplicate the entry. The backend is
    /// selected from the address shape and its `init` hook runs before the
    /// entry is appended.
    pub fn register(&mut self, id: &str, name: &str, address: StoreAddress) -> Result<()> {
        if self.lookup(id).is_some() {
            warn!(module = id, "module already registered, keeping existing entry");
            return Ok(());
        }

        let backend = backend_for(&address);
        backend.init(&address)?;
        self.modules.push(ModuleEntry {
            id: id.to_owned(),
            name: name.to_owned(),
            address,
            backend,
        });
        debug!(module = id, name, "module registered");
        Ok(())
    }

    /// Register a submodule from its unit-configuration entry: a non-empty
    /// sysfs path selects the file backend, otherwise the EEPROM backend is
    /// used with the entry's bus/address descriptor.
    pub fn register_unit_entry(&mut self, cfg: &UnitCfgEntry) -> Result<()> {
        let address = if !cfg.sysfs().is_empty() {
            StoreAddress::file(cfg.sysfs())
        } else {
            let eeprom = cfg.eeprom();
            StoreAddress::eeprom(eeprom.bus, eeprom.address.get())
        };
        self.register(cfg.uuid(), cfg.name(), address)
    }

    /// Find a module by id. The empty string addresses the master module,
    /// i.e. the first-registered entry.
    pub fn lookup(&self, id: &str) -> Option<&ModuleEntry> {
        if id.is_empty() {
            let master = self.modules.first();
            if let Some(entry) = master {
                trace!(master = %entry.id, "empty id resolved to master module");
            }
            return master;
        }
        self.modules.iter().find(|entry| entry.id == id)
    }

    /// Re-target an already-registered module to new backend address info,
    /// re-selecting the backend and renaming the backing store when the
    /// module's display name changed.
    pub fn update(&mut self, id: &str, name: &str, address: StoreAddress) -> Result<()> {
        let position = self
            .modules
            .iter()
            .position(|entry| entry.id == id)
            .ok_or_else(|| StoreError::ModuleNotRegistered(id.to_owned()))?;

        let backend = backend_for(&address);
        backend.init(&address)?;

        let entry = &mut self.modules[position];
        if entry.address != address {
            entry.backend.rename(&entry.address, &address)?;
        }
        entry.name = name.to_owned();
        entry.address = address;
        entry.backend = backend;
        debug!(module = id, "module registry entry updated");
        Ok(())
    }

    /// Remove one module. Dropping the entry releases its address info.
    pub fn deregister(&mut self, id: &str) -> Result<()> {
        let position = self
            .modules
            .iter()
            .position(|entry| entry.id == id)
            .ok_or_else(|| StoreError::ModuleNotRegistered(id.to_owned()))?;
        let entry = self.modules.remove(position);
        debug!(module = %entry.id, "module deregistered");
        Ok(())
    }

    /// Tear the registry down, releasing every backend attachment.
    pub fn deregister_all(&mut self) {
        for entry in self.modules.drain(..) {
            if let Err(err) = entry.backend.cleanup(&entry.address) {
                warn!(module = %entry.id, %err, "backend cleanup failed during teardown");
            }
        }
        debug!("module registry cleared");
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModuleEntry> {
        self.modules.iter()
    }
}
