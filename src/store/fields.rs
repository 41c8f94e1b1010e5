//! # Field Payloads
//!
//! Payload commit, read, and erase for one module's database, plus the typed
//! accessors that decode the hardware records.
//!
//! The commit discipline is fixed: rewriting an existing field touches its
//! tuple only after the payload bytes are down, and committing a new field
//! rolls its freshly appended tuple back if the payload write fails. An
//! index update always carries the checksum of exactly the bytes written,
//! and reads validate the checksum over exactly the bytes read; a mismatch
//! surfaces as an integrity violation, never as a generic I/O error.

use tracing::{debug, trace};

use crate::error::{Result, StoreError};
use crate::integrity;
use crate::schema::records::{
    decode_module_cfg, decode_unit_cfg, ModuleCfgEntry, ModuleIdentity, UnitCfgEntry, UnitIdentity,
};
use crate::schema::{FieldId, IndexTuple, TUPLE_DISABLED};
use crate::store::InventoryStore;

impl InventoryStore {
    /// Rewrite the payload of an existing field and refresh its tuple with
    /// the new size, checksum, and valid flag. On payload-write failure the
    /// tuple is left untouched.
    pub fn write_field(&self, module_id: &str, field: FieldId, payload: &[u8]) -> Result<()> {
        let (mut tuple, index) = self.search_field(module_id, field)?;
        self.write_block(module_id, tuple.payload_offset(), payload)?;

        tuple.set_payload_size(payload.len() as u16);
        tuple.set_payload_crc(integrity::checksum(payload));
        tuple.set_valid(true);
        self.update_tuple_at(module_id, index, &tuple)?;
        debug!(
            module = module_id,
            ?field,
            size = payload.len(),
            crc = tuple.payload_crc(),
            "field payload updated"
        );
        Ok(())
    }

    /// Read the payload recorded for `field` and validate its checksum.
    pub fn read_field(&self, module_id: &str, field: FieldId) -> Result<Vec<u8>> {
        let (tuple, _) = self.search_field(module_id, field)?;
        let mut payload = vec![0u8; tuple.payload_size() as usize];
        self.read_block(module_id, tuple.payload_offset(), &mut payload)?;
        integrity::validate(&payload, tuple.payload_crc())?;
        trace!(
            module = module_id,
            ?field,
            size = payload.len(),
            "field payload read"
        );
        Ok(payload)
    }

    /// Erase the payload for `field` and mark its tuple disabled and
    /// invalid. The tuple stays in the index table: only the newest entry
    /// can ever leave it, via LIFO erase.
    pub fn erase_field(&self, module_id: &str, field: FieldId) -> Result<()> {
        let (mut tuple, index) = self.search_field(module_id, field)?;
        self.erase_block(
            module_id,
            tuple.payload_offset(),
            tuple.payload_size() as usize,
        )?;

        tuple.set_state(TUPLE_DISABLED);
        tuple.set_valid(false);
        self.update_tuple_at(module_id, index, &tuple)?;
        debug!(module = module_id, ?field, "field erased and tuple invalidated");
        Ok(())
    }

    /// Commit a brand-new field: append its tuple, then write the payload.
    /// If the payload write fails the just-appended tuple is rolled back via
    /// LIFO erase; a rollback failure is reported as the compound
    /// commit-and-rollback error rather than swallowed.
    pub fn commit_field(
        &self,
        module_id: &str,
        mut tuple: IndexTuple,
        payload: &[u8],
    ) -> Result<u16> {
        tuple.set_payload_size(payload.len() as u16);
        tuple.set_payload_crc(integrity::checksum(payload));
        tuple.set_valid(true);

        let index = self.append_tuple(module_id, &tuple)?;
        if let Err(commit) = self.write_block(module_id, tuple.payload_offset(), payload) {
            return match self.erase_last_tuple(module_id) {
                Ok(()) => {
                    debug!(
                        module = module_id,
                        field = tuple.field_raw(),
                        "payload write failed, index entry rolled back"
                    );
                    Err(commit)
                }
                Err(rollback) => Err(StoreError::CommitRollback {
                    commit: Box::new(commit),
                    rollback: Box::new(rollback),
                }),
            };
        }
        debug!(
            module = module_id,
            field = tuple.field_raw(),
            index,
            size = payload.len(),
            "field committed"
        );
        Ok(index)
    }

    /// Read and decode the unit identity record.
    pub fn read_unit_identity(&self, module_id: &str) -> Result<UnitIdentity> {
        let payload = self.read_field(module_id, FieldId::UnitIdentity)?;
        UnitIdentity::decode(&payload)
    }

    /// Read and decode the unit configuration list. `count` comes from the
    /// unit identity's module count.
    pub fn read_unit_cfg(&self, module_id: &str, count: u8) -> Result<Vec<UnitCfgEntry>> {
        let payload = self.read_field(module_id, FieldId::UnitConfig)?;
        decode_unit_cfg(&payload, count)
    }

    /// Read and decode the module identity record.
    pub fn read_module_identity(&self, module_id: &str) -> Result<ModuleIdentity> {
        let payload = self.read_field(module_id, FieldId::ModuleIdentity)?;
        ModuleIdentity::decode(&payload)
    }

    /// Read and decode the module configuration list. `count` comes from the
    /// module identity's device count.
    pub fn read_module_cfg(&self, module_id: &str, count: u8) -> Result<Vec<ModuleCfgEntry>> {
        let payload = self.read_field(module_id, FieldId::ModuleConfig)?;
        decode_module_cfg(&payload, count)
    }

    pub fn read_factory_config(&self, module_id: &str) -> Result<Vec<u8>> {
        self.read_field(module_id, FieldId::FactoryConfig)
    }

    pub fn read_user_config(&self, module_id: &str) -> Result<Vec<u8>> {
        self.read_field(module_id, FieldId::UserConfig)
    }

    pub fn read_factory_calibration(&self, module_id: &str) -> Result<Vec<u8>> {
        self.read_field(module_id, FieldId::FactoryCalibration)
    }

    pub fn read_user_calibration(&self, module_id: &str) -> Result<Vec<u8>> {
        self.read_field(module_id, FieldId::UserCalibration)
    }

    pub fn read_bootstrap_certs(&self, module_id: &str) -> Result<Vec<u8>> {
        self.read_field(module_id, FieldId::BootstrapCerts)
    }

    pub fn read_cloud_certs(&self, module_id: &str) -> Result<Vec<u8>> {
        self.read_field(module_id, FieldId::CloudCerts)
    }
}
