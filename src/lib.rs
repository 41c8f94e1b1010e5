//! # invstore: Module Inventory Store
//!
//! A small, append-oriented, field-indexed binary database recording the
//! hardware identity, configuration, calibration, and certificate data of
//! every physical module attached to an embedded node. It runs once per
//! module at node boot to reconstruct what hardware is present and to hand
//! typed configuration records to driver instantiation, provisioning, and
//! telemetry.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────┐
//! │   Provisioning / Boot Registration     │
//! ├───────────────────────────────────────┤
//! │   Field Codec (typed records + CRC)    │
//! ├───────────────────────────────────────┤
//! │   Index Manager (magic/header/tuples)  │
//! ├───────────────────┬───────────────────┤
//! │  Module Registry  │  Integrity Codec  │
//! ├───────────────────┴───────────────────┤
//! │   Storage Backend (file │ raw EEPROM)  │
//! └───────────────────────────────────────┘
//! ```
//!
//! ## Database layout
//!
//! Each module's database is a fixed 64 KiB window: an 8-byte magic word at
//! offset 0, a 24-byte header at 0x0010, an append-only table of 24-byte
//! index tuples at 0x0040 (at most 50), and a payload region from 0x0A00
//! with one fixed sub-offset per field. See [`schema`] for the full map.
//!
//! ## Quick start
//!
//! ```ignore
//! use invstore::{InventoryStore, StoreAddress, FieldId};
//!
//! let mut store = InventoryStore::new();
//! store.register_module("UK-1001-COM-1101", "COM board",
//!     StoreAddress::file("/sys/bus/i2c/devices/0-0050/eeprom"))?;
//!
//! let identity = store.read_unit_identity("UK-1001-COM-1101")?;
//! let submodules = store.read_unit_cfg("UK-1001-COM-1101", identity.module_count())?;
//! ```
//!
//! Single-threaded, synchronous, blocking I/O throughout: the boot sequence
//! drives one module at a time, one field at a time.

pub mod error;
pub mod integrity;
pub mod registry;
pub mod schema;
pub mod storage;
pub mod store;

pub use error::{Result, StoreError};
pub use registry::{ModuleEntry, Registry};
pub use schema::records::{
    DeviceCfg, DeviceClass, GpioCfg, I2cCfg, ModuleCfgEntry, ModuleIdentity, ModuleType, SpiCfg,
    UartCfg, UnitCfgEntry, UnitIdentity, UnitType,
};
pub use schema::{FieldId, IndexTuple, MagicWord, SchemaHeader, Version};
pub use storage::{EepromBackend, FileBackend, StorageBackend, StoreAddress};
pub use store::{DeviceRegisterCallback, InventoryStore, MfgDataSource};
