//! # Provisioning and Boot Scenarios
//!
//! End-to-end flows against file-backed module databases:
//!
//! 1. Fresh provisioning from a manufacturing source produces exactly the
//!    index tuples the source lists, and the payloads read back and decode.
//! 2. The boot registration cascade walks master → submodules, hands device
//!    lists to the callback, and skips modules without a valid database
//!    instead of aborting.
//! 3. Re-provisioning an existing database overwrites it rather than
//!    rejecting it.

use eyre::{bail, Result};
use tempfile::TempDir;

use invstore::{
    DeviceCfg, FieldId, I2cCfg, IndexTuple, InventoryStore, MfgDataSource, ModuleCfgEntry,
    ModuleIdentity, ModuleType, SchemaHeader, StoreAddress, UnitCfgEntry, UnitIdentity, UnitType,
    Version,
};

const MASTER_ID: &str = "UK-1001-COM-1101";
const SUB_ID: &str = "UK-1001-RFC-1101";

/// In-memory manufacturing source; any piece left out is reported as absent.
#[derive(Default)]
struct MockMfg {
    index_list: Vec<IndexTuple>,
    unit_identity: Option<UnitIdentity>,
    unit_cfg: Vec<UnitCfgEntry>,
    module_identity: Option<ModuleIdentity>,
    module_cfg: Vec<ModuleCfgEntry>,
    generics: Vec<(FieldId, Vec<u8>)>,
}

impl MfgDataSource for MockMfg {
    fn fetch_header(&self, _module_id: &str) -> Result<SchemaHeader> {
        Ok(SchemaHeader::new(
            invstore::schema::CAP_AUTONOMOUS,
            invstore::schema::MODE_MASTER,
            invstore::schema::DEV_OWNER,
        ))
    }

    fn fetch_index_list(&self, _module_id: &str) -> Result<Vec<IndexTuple>> {
        Ok(self.index_list.clone())
    }

    fn fetch_unit_identity(&self, module_id: &str) -> Result<UnitIdentity> {
        match &self.unit_identity {
            Some(identity) => Ok(*identity),
            None => bail!("no unit identity for '{module_id}' in mfg data"),
        }
    }

    fn fetch_unit_cfg(&self, _module_id: &str, count: u8) -> Result<Vec<UnitCfgEntry>> {
        Ok(self.unit_cfg.iter().take(count as usize).cloned().collect())
    }

    fn fetch_module_identity(&self, module_id: &str) -> Result<ModuleIdentity> {
        match &self.module_identity {
            Some(identity) => Ok(*identity),
            None => bail!("no module identity for '{module_id}' in mfg data"),
        }
    }

    fn fetch_module_cfg(&self, _module_id: &str, count: u8) -> Result<Vec<ModuleCfgEntry>> {
        Ok(self.module_cfg.iter().take(count as usize).cloned().collect())
    }

    fn fetch_generic(&self, module_id: &str, field: FieldId) -> Result<Vec<u8>> {
        self.generics
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, bytes)| bytes.clone())
            .ok_or_else(|| eyre::eyre!("no {field:?} for '{module_id}' in mfg data"))
    }
}

fn master_identity(module_count: u8) -> UnitIdentity {
    UnitIdentity::new(
        MASTER_ID,
        "tNode SDR",
        UnitType::TNodeSdr,
        "UK-1001",
        "A1",
        "00:0a:b1:22:fe:80",
        Version::new(0, 1),
        Version::new(0, 1),
        "2021-05-12",
        "Ukama",
        module_count,
    )
}

fn com_module_identity(device_count: u8) -> ModuleIdentity {
    ModuleIdentity::new(
        MASTER_ID,
        "COM board",
        ModuleType::ComV1,
        "UK-1001-X1",
        "v2",
        "00:0a:b1:22:fe:81",
        Version::new(1, 0),
        Version::new(0, 9),
        "2021-06-01",
        "Ukama",
        device_count,
    )
}

fn tmp_sensor_entry() -> ModuleCfgEntry {
    ModuleCfgEntry::new(
        "tmp464",
        "temperature sensor",
        0x0010,
        "/sys/bus/i2c/devices/1-0048",
        DeviceCfg::I2c(I2cCfg::new(1, 0x48)),
    )
}

fn db_path(dir: &TempDir, name: &str) -> String {
    dir.path().join(name).to_str().unwrap().to_owned()
}

#[test]
fn fresh_provisioning_writes_exactly_the_listed_fields() {
    let dir = TempDir::new().unwrap();
    let mut store = InventoryStore::new();
    store
        .register_module(MASTER_ID, "COM board", StoreAddress::file(db_path(&dir, "master.db")))
        .unwrap();

    let source = MockMfg {
        index_list: vec![
            IndexTuple::new(FieldId::UnitIdentity),
            IndexTuple::new(FieldId::UnitConfig),
        ],
        unit_identity: Some(master_identity(1)),
        unit_cfg: vec![UnitCfgEntry::new(
            MASTER_ID,
            "COM board",
            &db_path(&dir, "master.db"),
            I2cCfg::new(0, 0x50),
        )],
        ..Default::default()
    };

    let committed = store.create_database(MASTER_ID, &source).unwrap();
    assert_eq!(committed, 2);

    assert_eq!(store.read_tuple_count(MASTER_ID).unwrap(), 2);
    let (identity_tuple, at) = store.search_field(MASTER_ID, FieldId::UnitIdentity).unwrap();
    assert_eq!(at, 0);
    assert!(identity_tuple.is_valid());
    let (cfg_tuple, at) = store.search_field(MASTER_ID, FieldId::UnitConfig).unwrap();
    assert_eq!(at, 1);
    assert!(cfg_tuple.is_valid());

    let identity = store.read_unit_identity(MASTER_ID).unwrap();
    assert_eq!(identity.uuid(), MASTER_ID);
    assert_eq!(identity.module_count(), 1);

    let submodules = store.read_unit_cfg(MASTER_ID, identity.module_count()).unwrap();
    assert_eq!(submodules.len(), 1);
    assert_eq!(submodules[0].uuid(), MASTER_ID);
}

#[test]
fn provisioning_rolls_through_all_field_kinds() {
    let dir = TempDir::new().unwrap();
    let mut store = InventoryStore::new();
    store
        .register_module(MASTER_ID, "COM board", StoreAddress::file(db_path(&dir, "master.db")))
        .unwrap();

    let source = MockMfg {
        index_list: vec![
            IndexTuple::new(FieldId::UnitIdentity),
            IndexTuple::new(FieldId::UnitConfig),
            IndexTuple::new(FieldId::ModuleIdentity),
            IndexTuple::new(FieldId::ModuleConfig),
            IndexTuple::new(FieldId::FactoryConfig),
            IndexTuple::new(FieldId::BootstrapCerts),
        ],
        unit_identity: Some(master_identity(1)),
        unit_cfg: vec![UnitCfgEntry::new(
            MASTER_ID,
            "COM board",
            &db_path(&dir, "master.db"),
            I2cCfg::new(0, 0x50),
        )],
        module_identity: Some(com_module_identity(1)),
        module_cfg: vec![tmp_sensor_entry()],
        generics: vec![
            (FieldId::FactoryConfig, b"factory defaults".to_vec()),
            (FieldId::BootstrapCerts, b"-----BEGIN CERT-----".to_vec()),
        ],
    };

    let committed = store.create_database(MASTER_ID, &source).unwrap();
    assert_eq!(committed, 6);

    let module = store.read_module_identity(MASTER_ID).unwrap();
    assert_eq!(module.module_type(), Some(ModuleType::ComV1));

    let devices = store.read_module_cfg(MASTER_ID, module.device_count()).unwrap();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].name(), "tmp464");

    assert_eq!(store.read_factory_config(MASTER_ID).unwrap(), b"factory defaults");
    assert_eq!(
        store.read_bootstrap_certs(MASTER_ID).unwrap(),
        b"-----BEGIN CERT-----"
    );
}

#[test]
fn reprovisioning_overwrites_an_existing_database() {
    let dir = TempDir::new().unwrap();
    let mut store = InventoryStore::new();
    store
        .register_module(MASTER_ID, "COM board", StoreAddress::file(db_path(&dir, "master.db")))
        .unwrap();

    let source = MockMfg {
        index_list: vec![IndexTuple::new(FieldId::UnitIdentity)],
        unit_identity: Some(master_identity(1)),
        ..Default::default()
    };
    store.create_database(MASTER_ID, &source).unwrap();

    let source = MockMfg {
        index_list: vec![IndexTuple::new(FieldId::UnitIdentity)],
        unit_identity: Some(master_identity(3)),
        unit_cfg: Vec::new(),
        ..Default::default()
    };
    let committed = store.create_database(MASTER_ID, &source).unwrap();
    assert_eq!(committed, 1);

    assert_eq!(store.read_tuple_count(MASTER_ID).unwrap(), 1);
    assert_eq!(store.read_unit_identity(MASTER_ID).unwrap().module_count(), 3);
}

/// Provision one module-only database (no unit records), the shape a slave
/// module's EEPROM has.
fn provision_submodule(dir: &TempDir, store: &mut InventoryStore, id: &str, file: &str) {
    store
        .register_module(id, "RF CNTRL board", StoreAddress::file(db_path(dir, file)))
        .unwrap();
    let source = MockMfg {
        index_list: vec![
            IndexTuple::new(FieldId::ModuleIdentity),
            IndexTuple::new(FieldId::ModuleConfig),
        ],
        module_identity: Some(ModuleIdentity::new(
            id,
            "RF CNTRL board",
            ModuleType::Cntrl,
            "UK-1001-R1",
            "v1",
            "00:0a:b1:22:fe:91",
            Version::new(1, 0),
            Version::new(1, 0),
            "2021-06-02",
            "Ukama",
            1,
        )),
        module_cfg: vec![tmp_sensor_entry()],
        ..Default::default()
    };
    store.create_database(id, &source).unwrap();
    store.deregister_module(id).unwrap();
}

#[test]
fn boot_cascade_registers_devices_and_skips_invalid_modules() {
    let dir = TempDir::new().unwrap();
    let mut store = InventoryStore::new();

    let master_path = db_path(&dir, "master.db");
    let sub_path = db_path(&dir, "sub.db");
    let ghost_path = db_path(&dir, "ghost.db");

    // The ghost module has a backing file but no database in it.
    std::fs::write(&ghost_path, [0xFFu8; 64]).unwrap();

    store
        .register_module(MASTER_ID, "COM board", StoreAddress::file(&master_path))
        .unwrap();

    let source = MockMfg {
        index_list: vec![
            IndexTuple::new(FieldId::UnitIdentity),
            IndexTuple::new(FieldId::UnitConfig),
            IndexTuple::new(FieldId::ModuleIdentity),
            IndexTuple::new(FieldId::ModuleConfig),
        ],
        unit_identity: Some(master_identity(3)),
        unit_cfg: vec![
            UnitCfgEntry::new(MASTER_ID, "COM board", &master_path, I2cCfg::new(0, 0x50)),
            UnitCfgEntry::new(SUB_ID, "RF CNTRL board", &sub_path, I2cCfg::new(1, 0x51)),
            UnitCfgEntry::new("UK-1001-GHO-0000", "ghost board", &ghost_path, I2cCfg::new(2, 0x52)),
        ],
        module_identity: Some(com_module_identity(1)),
        module_cfg: vec![tmp_sensor_entry()],
        ..Default::default()
    };
    store.create_database(MASTER_ID, &source).unwrap();

    provision_submodule(&dir, &mut store, SUB_ID, "sub.db");

    let mut registered: Vec<(String, String, u8)> = Vec::new();
    store
        .boot_register(MASTER_ID, &mut |id, name, count, devices| {
            assert_eq!(devices.len(), count as usize);
            registered.push((id.to_owned(), name.to_owned(), count));
            Ok(())
        })
        .unwrap();

    // Master and the provisioned submodule made it; the ghost was skipped.
    assert_eq!(registered.len(), 2);
    assert_eq!(registered[0].0, MASTER_ID);
    assert_eq!(registered[1], (SUB_ID.to_owned(), "RF CNTRL board".to_owned(), 1));

    // All three modules ended up registered in the store, skip or not.
    assert_eq!(store.registry().len(), 3);
}

#[test]
fn missing_module_records_skip_the_module_but_not_the_cascade() {
    let dir = TempDir::new().unwrap();
    let mut store = InventoryStore::new();

    let master_path = db_path(&dir, "master.db");
    let bare_path = db_path(&dir, "bare.db");

    store
        .register_module(MASTER_ID, "COM board", StoreAddress::file(&master_path))
        .unwrap();

    let source = MockMfg {
        index_list: vec![
            IndexTuple::new(FieldId::UnitIdentity),
            IndexTuple::new(FieldId::UnitConfig),
        ],
        unit_identity: Some(master_identity(2)),
        unit_cfg: vec![
            // First entry only has a magic word and header, no module records:
            // searching its module identity yields missing-field.
            UnitCfgEntry::new("UK-1001-BARE-0000", "bare board", &bare_path, I2cCfg::new(1, 0x51)),
            UnitCfgEntry::new(SUB_ID, "RF CNTRL board", &db_path(&dir, "sub.db"), I2cCfg::new(2, 0x52)),
        ],
        ..Default::default()
    };
    store.create_database(MASTER_ID, &source).unwrap();

    // Give the bare module a stamped but empty database.
    store
        .register_module("UK-1001-BARE-0000", "bare board", StoreAddress::file(&bare_path))
        .unwrap();
    store.write_magic("UK-1001-BARE-0000").unwrap();
    store.write_tuple_count("UK-1001-BARE-0000", 0).unwrap();
    store.deregister_module("UK-1001-BARE-0000").unwrap();

    provision_submodule(&dir, &mut store, SUB_ID, "sub.db");

    let mut seen: Vec<String> = Vec::new();
    store
        .boot_register(MASTER_ID, &mut |id, _, _, _| {
            seen.push(id.to_owned());
            Ok(())
        })
        .unwrap();

    // The bare module is skipped; the healthy one still registers.
    assert_eq!(seen, vec![SUB_ID.to_owned()]);
}

#[test]
fn bootstrap_tolerates_a_master_without_a_database() {
    let dir = TempDir::new().unwrap();
    let mut store = InventoryStore::new();

    let master = UnitCfgEntry::new(
        MASTER_ID,
        "COM board",
        &db_path(&dir, "blank.db"),
        I2cCfg::new(0, 0x50),
    );

    store
        .bootstrap(&master, &mut |_, _, _, _| Ok(()))
        .unwrap();

    // Registered and left in place for a later provisioning pass.
    assert_eq!(store.registry().len(), 1);
    assert!(store.validate_magic(MASTER_ID).is_err());
}
