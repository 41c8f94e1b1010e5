//! # Schema Layout
//!
//! On-disk/on-chip layout of one module's inventory database. The layout is
//! compatibility surface: nodes already in the field were provisioned with
//! these exact offsets, so nothing here is derived at runtime.
//!
//! ```text
//! Offset  Size   Region
//! 0x0000  8      Magic word (0xDEADBEEF LE + two reserved u16 cells)
//! 0x0010  24     Schema header
//! 0x0020  2      Live index-tuple count (maintained independently)
//! 0x0040  24*50  Index table (24-byte tuples, at most 50)
//! 0x09A0  80     Footer (reserved, unused)
//! 0x0A00  -      Payload region, fixed sub-offset per field id
//! ```
//!
//! Payload sub-offsets are a convention, not recomputed per database:
//!
//! ```text
//! Field                  Offset   Reserved
//! Unit identity          0x0A00   192
//! Unit configuration     0x0AC0   1024
//! Module identity        0x0EC0   192
//! Module configuration   0x0F80   2432
//! Factory configuration  0x1900   4096
//! User configuration     0x2900   4096
//! Factory calibration    0x3900   4096
//! User calibration       0x4900   4096
//! Bootstrap certificates 0x5900   4096
//! Cloud certificates     0x6900   4096
//! ```
//!
//! All multi-byte fields are little-endian; every wire struct derives the
//! zerocopy traits with `Unaligned` integer cells so it can be read straight
//! off an EEPROM dump.

pub mod records;

use zerocopy::little_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::error::{Result, StoreError};

pub const MAGIC_WORD_OFFSET: u16 = 0x0000;
pub const MAGIC_WORD_SIZE: usize = 8;
pub const MAGIC_WORD: u32 = 0xDEAD_BEEF;

/// Value an erased 16-bit cell reads back as (erase fill is 0xFF).
pub const ERASED_CELL: u16 = 0xFFFF;

pub const HEADER_OFFSET: u16 = 0x0010;
pub const HEADER_SIZE: usize = 0x18;

/// Absolute offset of the live tuple count. The count cell embedded in the
/// header block is only refreshed when the whole header is rewritten; all
/// count reads and read-modify-writes go through this offset.
pub const TUPLE_COUNT_OFFSET: u16 = 0x0020;
pub const TUPLE_COUNT_SIZE: usize = 2;

pub const INDEX_TABLE_OFFSET: u16 = 0x0040;
pub const INDEX_TUPLE_SIZE: usize = 0x18;
pub const MAX_INDEX_TUPLES: u16 = 50;

pub const FOOTER_OFFSET: u16 = 0x09A0;
pub const FOOTER_SIZE: usize = 0x50;

pub const PAYLOAD_REGION_OFFSET: u16 = 0x0A00;

/// Last byte offset of the schema window; whole-database erase covers
/// `0x0000..SCHEMA_END_OFFSET`.
pub const SCHEMA_END_OFFSET: u16 = 0xFFFF;

pub const MAX_MODULES_PER_UNIT: u8 = 8;
pub const MAX_DEVICES_PER_MODULE: u8 = 20;

pub const DB_VERSION_MAJOR: u8 = 0;
pub const DB_VERSION_MINOR: u8 = 0;

/// Index-tuple state byte.
pub const TUPLE_ENABLED: u8 = 0x01;
pub const TUPLE_DISABLED: u8 = 0x00;

/// Capability byte: module needs power plus instruction from another module,
/// or boots entirely on its own.
pub const CAP_DEPENDENT: u8 = 0x00;
pub const CAP_AUTONOMOUS: u8 = 0x01;

/// Mode byte: controlled by another module, or controls others.
pub const MODE_SLAVE: u8 = 0x00;
pub const MODE_MASTER: u8 = 0x01;

/// Device-ownership byte: sensors driven by another module, or by this one.
pub const DEV_LENDER: u8 = 0x00;
pub const DEV_OWNER: u8 = 0x01;

/// Stable 16-bit code naming one logical record in a module's database.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldId {
    UnitIdentity = 0x0001,
    UnitConfig = 0x0002,
    ModuleIdentity = 0x0003,
    ModuleConfig = 0x0004,
    FactoryConfig = 0x0005,
    UserConfig = 0x0006,
    FactoryCalibration = 0x0007,
    UserCalibration = 0x0008,
    BootstrapCerts = 0x0009,
    CloudCerts = 0x000A,
}

impl FieldId {
    pub const ALL: [FieldId; 10] = [
        FieldId::UnitIdentity,
        FieldId::UnitConfig,
        FieldId::ModuleIdentity,
        FieldId::ModuleConfig,
        FieldId::FactoryConfig,
        FieldId::UserConfig,
        FieldId::FactoryCalibration,
        FieldId::UserCalibration,
        FieldId::BootstrapCerts,
        FieldId::CloudCerts,
    ];

    /// Fields stored as opaque byte blobs handed over by the manufacturing
    /// source (configs, calibration, certificates).
    pub const GENERIC: [FieldId; 6] = [
        FieldId::FactoryConfig,
        FieldId::UserConfig,
        FieldId::FactoryCalibration,
        FieldId::UserCalibration,
        FieldId::BootstrapCerts,
        FieldId::CloudCerts,
    ];

    pub fn from_raw(raw: u16) -> Option<FieldId> {
        Self::ALL.iter().copied().find(|f| *f as u16 == raw)
    }

    /// Fixed payload sub-offset for this field.
    pub fn payload_offset(self) -> u16 {
        match self {
            FieldId::UnitIdentity => 0x0A00,
            FieldId::UnitConfig => 0x0AC0,
            FieldId::ModuleIdentity => 0x0EC0,
            FieldId::ModuleConfig => 0x0F80,
            FieldId::FactoryConfig => 0x1900,
            FieldId::UserConfig => 0x2900,
            FieldId::FactoryCalibration => 0x3900,
            FieldId::UserCalibration => 0x4900,
            FieldId::BootstrapCerts => 0x5900,
            FieldId::CloudCerts => 0x6900,
        }
    }

    /// Room reserved for the field's maximum expected payload.
    pub fn reserved_size(self) -> u16 {
        match self {
            FieldId::UnitIdentity | FieldId::ModuleIdentity => 192,
            FieldId::UnitConfig => 1024,
            FieldId::ModuleConfig => 2432,
            _ => 4096,
        }
    }
}

/// Two-byte major.minor version, shared by the header and every index tuple.
#[repr(C)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned,
)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
}

impl Version {
    pub fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }

    pub fn current() -> Self {
        Self::new(DB_VERSION_MAJOR, DB_VERSION_MINOR)
    }
}

/// 8-byte sentinel at offset 0. Presence of the constant is the sole signal
/// that a database has been initialized.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct MagicWord {
    magic: U32,
    resv1: U16,
    resv2: U16,
}

const _: () = assert!(std::mem::size_of::<MagicWord>() == MAGIC_WORD_SIZE);

impl MagicWord {
    pub fn new() -> Self {
        Self {
            magic: U32::new(MAGIC_WORD),
            resv1: U16::new(ERASED_CELL),
            resv2: U16::new(ERASED_CELL),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::read_from_bytes(&bytes[..MAGIC_WORD_SIZE.min(bytes.len())]).map_err(|_| {
            StoreError::ShortRead {
                offset: MAGIC_WORD_OFFSET as u64,
                wanted: MAGIC_WORD_SIZE,
                got: bytes.len(),
            }
        })
    }

    pub fn raw(&self) -> u32 {
        self.magic.get()
    }

    pub fn is_valid(&self) -> bool {
        self.magic.get() == MAGIC_WORD
    }
}

impl Default for MagicWord {
    fn default() -> Self {
        Self::new()
    }
}

/// 24-byte schema header at offset 0x0010.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct SchemaHeader {
    version: Version,
    index_table_offset: U16,
    index_tuple_size: U16,
    index_tuple_max: U16,
    index_tuple_count: U16,
    capability: u8,
    mode: u8,
    device_ownership: u8,
    resv1: u8,
    resv: [U16; 5],
}

const _: () = assert!(std::mem::size_of::<SchemaHeader>() == HEADER_SIZE);

impl SchemaHeader {
    pub fn new(capability: u8, mode: u8, device_ownership: u8) -> Self {
        Self {
            version: Version::current(),
            index_table_offset: U16::new(INDEX_TABLE_OFFSET),
            index_tuple_size: U16::new(INDEX_TUPLE_SIZE as u16),
            index_tuple_max: U16::new(MAX_INDEX_TUPLES),
            index_tuple_count: U16::new(0),
            capability,
            mode,
            device_ownership,
            resv1: 0,
            resv: [U16::new(0); 5],
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::read_from_bytes(&bytes[..HEADER_SIZE.min(bytes.len())]).map_err(|_| {
            StoreError::ShortRead {
                offset: HEADER_OFFSET as u64,
                wanted: HEADER_SIZE,
                got: bytes.len(),
            }
        })
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    pub fn index_table_offset(&self) -> u16 {
        self.index_table_offset.get()
    }

    pub fn index_tuple_size(&self) -> u16 {
        self.index_tuple_size.get()
    }

    pub fn index_tuple_max(&self) -> u16 {
        self.index_tuple_max.get()
    }

    /// Count as captured at header-write time. The live count lives at
    /// [`TUPLE_COUNT_OFFSET`] and is the one scans must bound themselves by.
    pub fn index_tuple_count(&self) -> u16 {
        self.index_tuple_count.get()
    }

    pub fn set_index_tuple_count(&mut self, count: u16) {
        self.index_tuple_count = U16::new(count);
    }

    pub fn capability(&self) -> u8 {
        self.capability
    }

    pub fn mode(&self) -> u8 {
        self.mode
    }

    pub fn device_ownership(&self) -> u8 {
        self.device_ownership
    }
}

/// 24-byte index-table entry: one per stored field.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct IndexTuple {
    field_id: U16,
    payload_offset: U16,
    payload_size: U16,
    payload_version: Version,
    payload_crc: U32,
    state: u8,
    valid: u8,
    resv: [U16; 5],
}

const _: () = assert!(std::mem::size_of::<IndexTuple>() == INDEX_TUPLE_SIZE);

impl IndexTuple {
    /// Fresh tuple for `field` at its conventional payload offset. Size and
    /// CRC are filled in at commit time.
    pub fn new(field: FieldId) -> Self {
        Self {
            field_id: U16::new(field as u16),
            payload_offset: U16::new(field.payload_offset()),
            payload_size: U16::new(0),
            payload_version: Version::current(),
            payload_crc: U32::new(0),
            state: TUPLE_ENABLED,
            valid: 1,
            resv: [U16::new(0); 5],
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::read_from_bytes(&bytes[..INDEX_TUPLE_SIZE.min(bytes.len())]).map_err(|_| {
            StoreError::ShortRead {
                offset: INDEX_TABLE_OFFSET as u64,
                wanted: INDEX_TUPLE_SIZE,
                got: bytes.len(),
            }
        })
    }

    pub fn field_raw(&self) -> u16 {
        self.field_id.get()
    }

    pub fn field(&self) -> Option<FieldId> {
        FieldId::from_raw(self.field_id.get())
    }

    pub fn payload_offset(&self) -> u16 {
        self.payload_offset.get()
    }

    pub fn set_payload_offset(&mut self, offset: u16) {
        self.payload_offset = U16::new(offset);
    }

    pub fn payload_size(&self) -> u16 {
        self.payload_size.get()
    }

    pub fn set_payload_size(&mut self, size: u16) {
        self.payload_size = U16::new(size);
    }

    pub fn payload_version(&self) -> Version {
        self.payload_version
    }

    pub fn payload_crc(&self) -> u32 {
        self.payload_crc.get()
    }

    pub fn set_payload_crc(&mut self, crc: u32) {
        self.payload_crc = U32::new(crc);
    }

    pub fn state(&self) -> u8 {
        self.state
    }

    pub fn set_state(&mut self, state: u8) {
        self.state = state;
    }

    pub fn is_valid(&self) -> bool {
        self.valid != 0
    }

    pub fn set_valid(&mut self, valid: bool) {
        self.valid = valid as u8;
    }
}

/// Byte offset of the tuple at `index` within the index table.
pub fn tuple_offset(index: u16) -> u16 {
    INDEX_TABLE_OFFSET + index * INDEX_TUPLE_SIZE as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use zerocopy::IntoBytes;

    #[test]
    fn magic_word_is_8_bytes() {
        assert_eq!(std::mem::size_of::<MagicWord>(), 8);
    }

    #[test]
    fn header_is_24_bytes() {
        assert_eq!(std::mem::size_of::<SchemaHeader>(), 24);
    }

    #[test]
    fn index_tuple_is_24_bytes() {
        assert_eq!(std::mem::size_of::<IndexTuple>(), 24);
    }

    #[test]
    fn magic_word_roundtrip() {
        let mw = MagicWord::new();
        let parsed = MagicWord::from_bytes(mw.as_bytes()).unwrap();
        assert!(parsed.is_valid());
        assert_eq!(parsed.raw(), 0xDEAD_BEEF);
    }

    #[test]
    fn erased_magic_is_invalid() {
        let erased = [0xFFu8; 8];
        let parsed = MagicWord::from_bytes(&erased).unwrap();
        assert!(!parsed.is_valid());
    }

    #[test]
    fn magic_constant_is_little_endian_on_disk() {
        let mw = MagicWord::new();
        assert_eq!(&mw.as_bytes()[..4], &[0xEF, 0xBE, 0xAD, 0xDE]);
    }

    #[test]
    fn header_roundtrip() {
        let mut header = SchemaHeader::new(CAP_AUTONOMOUS, MODE_MASTER, DEV_OWNER);
        header.set_index_tuple_count(7);

        let parsed = SchemaHeader::from_bytes(header.as_bytes()).unwrap();
        assert_eq!(parsed.version().major, DB_VERSION_MAJOR);
        assert_eq!(parsed.index_table_offset(), INDEX_TABLE_OFFSET);
        assert_eq!(parsed.index_tuple_size(), 24);
        assert_eq!(parsed.index_tuple_max(), 50);
        assert_eq!(parsed.index_tuple_count(), 7);
        assert_eq!(parsed.mode(), MODE_MASTER);
    }

    #[test]
    fn tuple_roundtrip() {
        let mut tuple = IndexTuple::new(FieldId::UnitConfig);
        tuple.set_payload_size(246);
        tuple.set_payload_crc(0xA5A5_5A5A);
        tuple.set_state(TUPLE_DISABLED);
        tuple.set_valid(false);

        let parsed = IndexTuple::from_bytes(tuple.as_bytes()).unwrap();
        assert_eq!(parsed.field(), Some(FieldId::UnitConfig));
        assert_eq!(parsed.payload_offset(), 0x0AC0);
        assert_eq!(parsed.payload_size(), 246);
        assert_eq!(parsed.payload_crc(), 0xA5A5_5A5A);
        assert_eq!(parsed.state(), TUPLE_DISABLED);
        assert!(!parsed.is_valid());
    }

    #[test]
    fn field_offsets_match_layout() {
        assert_eq!(FieldId::UnitIdentity.payload_offset(), 0x0A00);
        assert_eq!(FieldId::UnitConfig.payload_offset(), 0x0AC0);
        assert_eq!(FieldId::ModuleIdentity.payload_offset(), 0x0EC0);
        assert_eq!(FieldId::ModuleConfig.payload_offset(), 0x0F80);
        assert_eq!(FieldId::FactoryConfig.payload_offset(), 0x1900);
        assert_eq!(FieldId::CloudCerts.payload_offset(), 0x6900);
    }

    #[test]
    fn reserved_payload_regions_do_not_overlap() {
        let mut regions: Vec<(u32, u32)> = FieldId::ALL
            .iter()
            .map(|f| {
                let start = f.payload_offset() as u32;
                (start, start + f.reserved_size() as u32)
            })
            .collect();
        regions.sort();
        for pair in regions.windows(2) {
            assert!(
                pair[0].1 <= pair[1].0,
                "overlap between {:?} and {:?}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn tuple_offsets_step_by_tuple_size() {
        assert_eq!(tuple_offset(0), 0x0040);
        assert_eq!(tuple_offset(1), 0x0058);
        assert_eq!(tuple_offset(49), 0x0040 + 49 * 24);
    }

    #[test]
    fn field_id_from_raw_rejects_unknown() {
        assert_eq!(FieldId::from_raw(0x0001), Some(FieldId::UnitIdentity));
        assert_eq!(FieldId::from_raw(0x000B), None);
        assert_eq!(FieldId::from_raw(0xFFFF), None);
    }
}
