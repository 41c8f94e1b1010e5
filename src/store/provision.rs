//! # Provisioning and Boot Registration
//!
//! Two orchestration flows sit on top of the index manager and field codec:
//!
//! - [`InventoryStore::create_database`] builds a brand-new database from an
//!   external manufacturing-data source, in the fixed order unit identity →
//!   unit configuration → module identity + configuration → remaining
//!   generic fields.
//! - [`InventoryStore::boot_register`] walks from a module's unit records
//!   down through all attached submodules, registering each one and handing
//!   its device list to the caller's driver ledger. A submodule without a
//!   valid database is skipped with a warning, never fatal.
//!
//! Both return `eyre::Result` with step context; the typed [`StoreError`]
//! causes stay downcastable underneath.

use eyre::{Result, WrapErr};
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::schema::records::{
    encode_module_cfg, encode_unit_cfg, ModuleCfgEntry, ModuleIdentity, UnitCfgEntry, UnitIdentity,
};
use crate::schema::{FieldId, IndexTuple, SchemaHeader, MAX_DEVICES_PER_MODULE, MAX_MODULES_PER_UNIT};
use crate::store::InventoryStore;

/// External manufacturing-data source consumed during database creation.
/// How the data is held (JSON, a struct table, anything else) is the
/// source's business; the store only needs correctly-shaped records back.
pub trait MfgDataSource {
    /// Header for the module's fresh database.
    fn fetch_header(&self, module_id: &str) -> Result<SchemaHeader>;

    /// The set of fields to be provisioned, as prototype index tuples.
    fn fetch_index_list(&self, module_id: &str) -> Result<Vec<IndexTuple>>;

    fn fetch_unit_identity(&self, module_id: &str) -> Result<UnitIdentity>;

    fn fetch_unit_cfg(&self, module_id: &str, count: u8) -> Result<Vec<UnitCfgEntry>>;

    fn fetch_module_identity(&self, module_id: &str) -> Result<ModuleIdentity>;

    fn fetch_module_cfg(&self, module_id: &str, count: u8) -> Result<Vec<ModuleCfgEntry>>;

    /// Opaque bytes for a generic field (configs, calibration, certificates).
    fn fetch_generic(&self, module_id: &str, field: FieldId) -> Result<Vec<u8>>;
}

/// Invoked once per registered module during boot so an external driver
/// ledger can instantiate drivers for the module's devices.
pub type DeviceRegisterCallback<'a> =
    dyn FnMut(&str, &str, u8, &[ModuleCfgEntry]) -> Result<()> + 'a;

fn find_tuple(index_list: &[IndexTuple], field: FieldId) -> Option<IndexTuple> {
    index_list
        .iter()
        .find(|tuple| tuple.field_raw() == field as u16)
        .copied()
}

impl InventoryStore {
    /// Create (or overwrite) the inventory database for `module_id` from the
    /// manufacturing source. Returns the number of fields committed.
    pub fn create_database(&self, module_id: &str, source: &dyn MfgDataSource) -> Result<u8> {
        match self.validate_magic(module_id) {
            Ok(()) => {
                warn!(module = module_id, "database already present, re-writing it");
            }
            Err(err) => {
                debug!(module = module_id, %err, "no existing database, creating new");
                self.write_magic(module_id)
                    .wrap_err("failed to stamp magic word")?;
            }
        }

        let header = source
            .fetch_header(module_id)
            .wrap_err("manufacturing source has no header")?;
        self.write_header(module_id, &header)
            .wrap_err("failed to write schema header")?;
        self.write_tuple_count(module_id, 0)
            .wrap_err("failed to reset index count")?;

        let index_list = source
            .fetch_index_list(module_id)
            .wrap_err("manufacturing source has no index list")?;

        let mut committed = 0u8;

        // Unit identity first: it carries the module count every later step
        // needs. A module-only database has no unit records at all, in which
        // case the count defaults to one (the module itself).
        let mut module_count = 1u8;
        if let Some(tuple) = find_tuple(&index_list, FieldId::UnitIdentity) {
            let identity = source
                .fetch_unit_identity(module_id)
                .wrap_err("failed to fetch unit identity")?;
            module_count = identity.module_count();
            if module_count >= MAX_MODULES_PER_UNIT {
                return Err(StoreError::Validation {
                    what: "module count",
                    value: module_count as u32,
                    bound: MAX_MODULES_PER_UNIT as u32,
                }
                .into());
            }
            self.commit_field(module_id, tuple, &identity.encode())
                .wrap_err("failed to commit unit identity")?;
            committed += 1;
            debug!(module = module_id, module_count, "unit identity committed");
        } else {
            debug!(module = module_id, "no unit identity in mfg index list");
        }

        if let Some(tuple) = find_tuple(&index_list, FieldId::UnitConfig) {
            let entries = source
                .fetch_unit_cfg(module_id, module_count)
                .wrap_err("failed to fetch unit configuration")?;
            self.commit_field(module_id, tuple, &encode_unit_cfg(&entries))
                .wrap_err("failed to commit unit configuration")?;
            committed += 1;
            debug!(module = module_id, entries = entries.len(), "unit configuration committed");
        }

        if let Some(info_tuple) = find_tuple(&index_list, FieldId::ModuleIdentity) {
            let identity = source
                .fetch_module_identity(module_id)
                .wrap_err("failed to fetch module identity")?;
            let device_count = identity.device_count();
            if device_count >= MAX_DEVICES_PER_MODULE {
                return Err(StoreError::Validation {
                    what: "device count",
                    value: device_count as u32,
                    bound: MAX_DEVICES_PER_MODULE as u32,
                }
                .into());
            }
            self.commit_field(module_id, info_tuple, &identity.encode())
                .wrap_err("failed to commit module identity")?;
            committed += 1;

            // Module configuration rides along: the identity carries the
            // device count its entries are sized by.
            if let Some(cfg_tuple) = find_tuple(&index_list, FieldId::ModuleConfig) {
                let entries = source
                    .fetch_module_cfg(module_id, device_count)
                    .wrap_err("failed to fetch module configuration")?;
                self.commit_field(module_id, cfg_tuple, &encode_module_cfg(&entries))
                    .wrap_err("failed to commit module configuration")?;
                committed += 1;
                debug!(
                    module = module_id,
                    devices = entries.len(),
                    "module identity and configuration committed"
                );
            }
        }

        for field in FieldId::GENERIC {
            let Some(tuple) = find_tuple(&index_list, field) else {
                continue;
            };
            let payload = source
                .fetch_generic(module_id, field)
                .wrap_err_with(|| format!("failed to fetch {field:?}"))?;
            self.commit_field(module_id, tuple, &payload)
                .wrap_err_with(|| format!("failed to commit {field:?}"))?;
            committed += 1;
        }

        info!(module = module_id, committed, "inventory database created");
        Ok(committed)
    }

    /// Boot-time registration cascade starting at `module_id` (normally the
    /// master module): read the unit records, register every submodule, and
    /// hand each valid submodule's device list to `register_device`.
    /// Submodules without a valid database are skipped with a warning.
    pub fn boot_register(
        &mut self,
        module_id: &str,
        register_device: &mut DeviceRegisterCallback,
    ) -> Result<()> {
        let identity = self
            .read_unit_identity(module_id)
            .wrap_err_with(|| format!("failed to read unit identity from '{module_id}'"))?;
        let module_count = identity.module_count();
        info!(
            unit = identity.uuid(),
            name = identity.name(),
            module_count,
            "unit identity read, starting module registration"
        );

        let entries = self
            .read_unit_cfg(module_id, module_count)
            .wrap_err_with(|| format!("failed to read unit configuration from '{module_id}'"))?;

        for entry in &entries {
            if let Err(err) = self.register_unit_entry(entry) {
                warn!(
                    module = entry.uuid(),
                    name = entry.name(),
                    %err,
                    "module registration failed, skipping module"
                );
                continue;
            }

            if let Err(err) = self.validate_magic(entry.uuid()) {
                warn!(
                    module = entry.uuid(),
                    name = entry.name(),
                    %err,
                    "no valid database found, skipping module"
                );
                continue;
            }

            if let Err(err) = self.register_module_devices(entry.uuid(), register_device) {
                warn!(
                    module = entry.uuid(),
                    %err,
                    "device registration failed, skipping module"
                );
            }
        }
        Ok(())
    }

    /// Read one module's identity and configuration and hand its device list
    /// to the driver ledger callback.
    pub fn register_module_devices(
        &self,
        module_id: &str,
        register_device: &mut DeviceRegisterCallback,
    ) -> Result<()> {
        let identity = self
            .read_module_identity(module_id)
            .wrap_err_with(|| format!("failed to read module identity from '{module_id}'"))?;
        let device_count = identity.device_count();

        let devices = self
            .read_module_cfg(module_id, device_count)
            .wrap_err_with(|| format!("failed to read module configuration from '{module_id}'"))?;
        debug!(
            module = module_id,
            name = identity.name(),
            device_count,
            "module configuration read, registering devices"
        );

        register_device(module_id, identity.name(), device_count, &devices)
            .wrap_err_with(|| format!("device-register callback failed for '{module_id}'"))
    }

    /// Full boot bootstrap: initialize the registry with the master module,
    /// then, if the master holds a valid database, cascade through its
    /// submodules. A master without a database is left registered so a later
    /// provisioning pass can create one.
    pub fn bootstrap(
        &mut self,
        master: &UnitCfgEntry,
        register_device: &mut DeviceRegisterCallback,
    ) -> Result<()> {
        self.register_unit_entry(master)
            .wrap_err("failed to register master module")?;

        match self.validate_magic(master.uuid()) {
            Ok(()) => self.boot_register(master.uuid(), register_device),
            Err(err) => {
                warn!(
                    module = master.uuid(),
                    name = master.name(),
                    %err,
                    "no database found for master module"
                );
                Ok(())
            }
        }
    }

    /// Delete the database for `module_id` and drop its registration.
    pub fn remove_database(&mut self, module_id: &str) -> Result<()> {
        {
            let entry = self.entry(module_id)?;
            entry
                .backend()
                .remove(entry.address())
                .wrap_err_with(|| format!("failed to remove database for '{module_id}'"))?;
        }
        self.deregister_module(module_id)
            .wrap_err_with(|| format!("failed to deregister module '{module_id}'"))?;
        info!(module = module_id, "database removed and module deregistered");
        Ok(())
    }
}
