//! # Hardware Record Layouts
//!
//! Wire shapes for the typed records a module database stores, plus the
//! encode/decode pairs that turn them into the flat buffers the payload
//! region holds.
//!
//! Fixed-length string fields are NUL-padded byte arrays; the accessors trim
//! at the first NUL. Each list record is a repetition of a fixed header
//! followed by an owned, class-specific descriptor, so an encoded list is
//! always `count * (fixed_size + class_size)` bytes:
//!
//! ```text
//! || entry 0 fixed | descriptor 0 || entry 1 fixed | descriptor 1 || ...
//! ```
//!
//! The 8-byte `resv` runs at the tail of the fixed parts are reserved cells
//! in the on-wire shapes; they are written as zero and ignored on read.

use zerocopy::little_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use super::Version;
use crate::error::{Result, StoreError};

pub const UUID_LEN: usize = 24;
pub const NAME_LEN: usize = 24;
pub const DESC_LEN: usize = 24;
pub const PATH_LEN: usize = 64;
pub const MAC_LEN: usize = 18;
pub const DATE_LEN: usize = 12;

pub const UNIT_IDENTITY_SIZE: usize = 159;
pub const MODULE_IDENTITY_SIZE: usize = 167;
pub const UNIT_CFG_FIXED_SIZE: usize = 120;
pub const MODULE_CFG_FIXED_SIZE: usize = 124;

/// Kind of physical unit a node is.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitType {
    TNodeSdr = 1,
    TNodeLte = 2,
    HNode = 3,
    ANode = 4,
    PsNode = 5,
}

impl UnitType {
    pub fn from_raw(raw: u32) -> Option<UnitType> {
        match raw {
            1 => Some(UnitType::TNodeSdr),
            2 => Some(UnitType::TNodeLte),
            3 => Some(UnitType::HNode),
            4 => Some(UnitType::ANode),
            5 => Some(UnitType::PsNode),
            _ => None,
        }
    }
}

/// Kind of physical board a module is.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleType {
    ComV1 = 0,
    Sdr = 1,
    Cntrl = 2,
    Rffe = 3,
    Mask = 4,
}

impl ModuleType {
    pub fn from_raw(raw: u32) -> Option<ModuleType> {
        match raw {
            0 => Some(ModuleType::ComV1),
            1 => Some(ModuleType::Sdr),
            2 => Some(ModuleType::Cntrl),
            3 => Some(ModuleType::Rffe),
            4 => Some(ModuleType::Mask),
            _ => None,
        }
    }
}

/// Bus class of a device on a module; selects the descriptor shape.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    Gpio = 0,
    I2c = 1,
    Spi = 2,
    Uart = 3,
}

impl DeviceClass {
    pub fn from_raw(raw: u16) -> Option<DeviceClass> {
        match raw {
            0 => Some(DeviceClass::Gpio),
            1 => Some(DeviceClass::I2c),
            2 => Some(DeviceClass::Spi),
            3 => Some(DeviceClass::Uart),
            _ => None,
        }
    }

    /// Serialized size of this class's descriptor.
    pub fn cfg_size(self) -> usize {
        match self {
            DeviceClass::Gpio => std::mem::size_of::<GpioCfg>(),
            DeviceClass::I2c => std::mem::size_of::<I2cCfg>(),
            DeviceClass::Spi => std::mem::size_of::<SpiCfg>(),
            DeviceClass::Uart => std::mem::size_of::<UartCfg>(),
        }
    }
}

pub const GPIO_INPUT: u8 = 0;
pub const GPIO_OUTPUT: u8 = 1;

/// I²C attachment: bus number plus 7/8-bit device address.
#[repr(C)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned,
)]
pub struct I2cCfg {
    pub bus: u8,
    pub address: U16,
}

impl I2cCfg {
    pub fn new(bus: u8, address: u16) -> Self {
        Self {
            bus,
            address: U16::new(address),
        }
    }
}

/// GPIO attachment: line number plus direction.
#[repr(C)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned,
)]
pub struct GpioCfg {
    pub number: U16,
    pub direction: u8,
}

impl GpioCfg {
    pub fn new(number: u16, direction: u8) -> Self {
        Self {
            number: U16::new(number),
            direction,
        }
    }
}

/// SPI attachment: chip-select GPIO plus bus number.
#[repr(C)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned,
)]
pub struct SpiCfg {
    pub cs: GpioCfg,
    pub bus: u8,
}

impl SpiCfg {
    pub fn new(cs: GpioCfg, bus: u8) -> Self {
        Self { cs, bus }
    }
}

/// UART attachment: port number.
#[repr(C)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned,
)]
pub struct UartCfg {
    pub port: U16,
}

impl UartCfg {
    pub fn new(port: u16) -> Self {
        Self {
            port: U16::new(port),
        }
    }
}

/// Class-specific device descriptor, owned by its module-config entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCfg {
    Gpio(GpioCfg),
    I2c(I2cCfg),
    Spi(SpiCfg),
    Uart(UartCfg),
}

impl DeviceCfg {
    pub fn class(&self) -> DeviceClass {
        match self {
            DeviceCfg::Gpio(_) => DeviceClass::Gpio,
            DeviceCfg::I2c(_) => DeviceClass::I2c,
            DeviceCfg::Spi(_) => DeviceClass::Spi,
            DeviceCfg::Uart(_) => DeviceClass::Uart,
        }
    }

    fn append_to(&self, out: &mut Vec<u8>) {
        match self {
            DeviceCfg::Gpio(cfg) => out.extend_from_slice(cfg.as_bytes()),
            DeviceCfg::I2c(cfg) => out.extend_from_slice(cfg.as_bytes()),
            DeviceCfg::Spi(cfg) => out.extend_from_slice(cfg.as_bytes()),
            DeviceCfg::Uart(cfg) => out.extend_from_slice(cfg.as_bytes()),
        }
    }

    fn read(class: DeviceClass, bytes: &[u8]) -> Result<DeviceCfg> {
        let short = |wanted| StoreError::ShortRead {
            offset: 0,
            wanted,
            got: bytes.len(),
        };
        Ok(match class {
            DeviceClass::Gpio => DeviceCfg::Gpio(
                GpioCfg::read_from_bytes(bytes).map_err(|_| short(class.cfg_size()))?,
            ),
            DeviceClass::I2c => {
                DeviceCfg::I2c(I2cCfg::read_from_bytes(bytes).map_err(|_| short(class.cfg_size()))?)
            }
            DeviceClass::Spi => {
                DeviceCfg::Spi(SpiCfg::read_from_bytes(bytes).map_err(|_| short(class.cfg_size()))?)
            }
            DeviceClass::Uart => DeviceCfg::Uart(
                UartCfg::read_from_bytes(bytes).map_err(|_| short(class.cfg_size()))?,
            ),
        })
    }
}

/// Copy `s` into a NUL-padded fixed array, truncating at the field bound.
fn put_str<const N: usize>(s: &str) -> [u8; N] {
    let mut buf = [0u8; N];
    let bytes = s.as_bytes();
    let len = bytes.len().min(N);
    buf[..len].copy_from_slice(&bytes[..len]);
    buf
}

/// View of a NUL-padded fixed array as a string slice.
fn fixed_str(buf: &[u8]) -> &str {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    std::str::from_utf8(&buf[..end]).unwrap_or("")
}

/// Unit identity record, 159 bytes at the unit-identity payload offset.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct UnitIdentity {
    uuid: [u8; UUID_LEN],
    name: [u8; NAME_LEN],
    unit_type: U32,
    part_number: [u8; NAME_LEN],
    skew: [u8; NAME_LEN],
    mac: [u8; MAC_LEN],
    sw_version: Version,
    psw_version: Version,
    assembly_date: [u8; DATE_LEN],
    oem_name: [u8; NAME_LEN],
    module_count: u8,
}

const _: () = assert!(std::mem::size_of::<UnitIdentity>() == UNIT_IDENTITY_SIZE);

impl UnitIdentity {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        uuid: &str,
        name: &str,
        unit_type: UnitType,
        part_number: &str,
        skew: &str,
        mac: &str,
        sw_version: Version,
        psw_version: Version,
        assembly_date: &str,
        oem_name: &str,
        module_count: u8,
    ) -> Self {
        Self {
            uuid: put_str(uuid),
            name: put_str(name),
            unit_type: U32::new(unit_type as u32),
            part_number: put_str(part_number),
            skew: put_str(skew),
            mac: put_str(mac),
            sw_version,
            psw_version,
            assembly_date: put_str(assembly_date),
            oem_name: put_str(oem_name),
            module_count,
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Self::read_from_bytes(&bytes[..UNIT_IDENTITY_SIZE.min(bytes.len())]).map_err(|_| {
            StoreError::ShortRead {
                offset: 0,
                wanted: UNIT_IDENTITY_SIZE,
                got: bytes.len(),
            }
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }

    pub fn uuid(&self) -> &str {
        fixed_str(&self.uuid)
    }

    pub fn name(&self) -> &str {
        fixed_str(&self.name)
    }

    pub fn unit_type(&self) -> Option<UnitType> {
        UnitType::from_raw(self.unit_type.get())
    }

    pub fn part_number(&self) -> &str {
        fixed_str(&self.part_number)
    }

    pub fn skew(&self) -> &str {
        fixed_str(&self.skew)
    }

    pub fn mac(&self) -> &str {
        fixed_str(&self.mac)
    }

    pub fn sw_version(&self) -> Version {
        self.sw_version
    }

    pub fn psw_version(&self) -> Version {
        self.psw_version
    }

    pub fn assembly_date(&self) -> &str {
        fixed_str(&self.assembly_date)
    }

    pub fn oem_name(&self) -> &str {
        fixed_str(&self.oem_name)
    }

    pub fn module_count(&self) -> u8 {
        self.module_count
    }
}

/// Module identity record, 167 bytes at the module-identity payload offset.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct ModuleIdentity {
    uuid: [u8; UUID_LEN],
    name: [u8; NAME_LEN],
    module_type: U32,
    part_number: [u8; NAME_LEN],
    hw_version: [u8; NAME_LEN],
    mac: [u8; MAC_LEN],
    sw_version: Version,
    psw_version: Version,
    mfg_date: [u8; DATE_LEN],
    mfg_name: [u8; NAME_LEN],
    device_count: u8,
    resv: [u8; 8],
}

const _: () = assert!(std::mem::size_of::<ModuleIdentity>() == MODULE_IDENTITY_SIZE);

impl ModuleIdentity {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        uuid: &str,
        name: &str,
        module_type: ModuleType,
        part_number: &str,
        hw_version: &str,
        mac: &str,
        sw_version: Version,
        psw_version: Version,
        mfg_date: &str,
        mfg_name: &str,
        device_count: u8,
    ) -> Self {
        Self {
            uuid: put_str(uuid),
            name: put_str(name),
            module_type: U32::new(module_type as u32),
            part_number: put_str(part_number),
            hw_version: put_str(hw_version),
            mac: put_str(mac),
            sw_version,
            psw_version,
            mfg_date: put_str(mfg_date),
            mfg_name: put_str(mfg_name),
            device_count,
            resv: [0; 8],
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Self::read_from_bytes(&bytes[..MODULE_IDENTITY_SIZE.min(bytes.len())]).map_err(|_| {
            StoreError::ShortRead {
                offset: 0,
                wanted: MODULE_IDENTITY_SIZE,
                got: bytes.len(),
            }
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }

    pub fn uuid(&self) -> &str {
        fixed_str(&self.uuid)
    }

    pub fn name(&self) -> &str {
        fixed_str(&self.name)
    }

    pub fn module_type(&self) -> Option<ModuleType> {
        ModuleType::from_raw(self.module_type.get())
    }

    pub fn part_number(&self) -> &str {
        fixed_str(&self.part_number)
    }

    pub fn hw_version(&self) -> &str {
        fixed_str(&self.hw_version)
    }

    pub fn mac(&self) -> &str {
        fixed_str(&self.mac)
    }

    pub fn sw_version(&self) -> Version {
        self.sw_version
    }

    pub fn psw_version(&self) -> Version {
        self.psw_version
    }

    pub fn mfg_date(&self) -> &str {
        fixed_str(&self.mfg_date)
    }

    pub fn mfg_name(&self) -> &str {
        fixed_str(&self.mfg_name)
    }

    pub fn device_count(&self) -> u8 {
        self.device_count
    }
}

/// Fixed part of one unit-configuration entry (120 bytes on the wire).
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
struct UnitCfgFixed {
    uuid: [u8; UUID_LEN],
    name: [u8; NAME_LEN],
    sysfs: [u8; PATH_LEN],
    resv: [u8; 8],
}

const _: () = assert!(std::mem::size_of::<UnitCfgFixed>() == UNIT_CFG_FIXED_SIZE);

/// One submodule of a unit: identity, backend path, and the owned EEPROM
/// descriptor released together with the entry. All EEPROMs sit on I²C today.
#[derive(Debug, Clone)]
pub struct UnitCfgEntry {
    fixed: UnitCfgFixed,
    eeprom: I2cCfg,
}

impl UnitCfgEntry {
    pub fn new(uuid: &str, name: &str, sysfs: &str, eeprom: I2cCfg) -> Self {
        Self {
            fixed: UnitCfgFixed {
                uuid: put_str(uuid),
                name: put_str(name),
                sysfs: put_str(sysfs),
                resv: [0; 8],
            },
            eeprom,
        }
    }

    pub fn uuid(&self) -> &str {
        fixed_str(&self.fixed.uuid)
    }

    pub fn name(&self) -> &str {
        fixed_str(&self.fixed.name)
    }

    /// Sysfs-style path to the EEPROM contents; empty when the module has to
    /// be reached through a userspace I²C driver instead.
    pub fn sysfs(&self) -> &str {
        fixed_str(&self.fixed.sysfs)
    }

    pub fn eeprom(&self) -> &I2cCfg {
        &self.eeprom
    }

    /// Serialized size of one entry.
    pub fn wire_size() -> usize {
        UNIT_CFG_FIXED_SIZE + std::mem::size_of::<I2cCfg>()
    }
}

/// Encode a unit-configuration list into one flat payload buffer.
pub fn encode_unit_cfg(entries: &[UnitCfgEntry]) -> Vec<u8> {
    let mut out = Vec::with_capacity(entries.len() * UnitCfgEntry::wire_size());
    for entry in entries {
        out.extend_from_slice(entry.fixed.as_bytes());
        out.extend_from_slice(entry.eeprom.as_bytes());
    }
    out
}

/// Decode `count` unit-configuration entries from a payload buffer.
pub fn decode_unit_cfg(payload: &[u8], count: u8) -> Result<Vec<UnitCfgEntry>> {
    let entry_size = UnitCfgEntry::wire_size();
    let mut entries = Vec::with_capacity(count as usize);
    let mut offset = 0usize;
    for _ in 0..count {
        let fixed_end = offset + UNIT_CFG_FIXED_SIZE;
        let entry_end = fixed_end + std::mem::size_of::<I2cCfg>();
        if payload.len() < entry_end {
            return Err(StoreError::ShortRead {
                offset: offset as u64,
                wanted: entry_size,
                got: payload.len().saturating_sub(offset),
            });
        }
        let fixed = UnitCfgFixed::read_from_bytes(&payload[offset..fixed_end]).map_err(|_| {
            StoreError::ShortRead {
                offset: offset as u64,
                wanted: UNIT_CFG_FIXED_SIZE,
                got: fixed_end - offset,
            }
        })?;
        let eeprom = I2cCfg::read_from_bytes(&payload[fixed_end..entry_end]).map_err(|_| {
            StoreError::ShortRead {
                offset: fixed_end as u64,
                wanted: std::mem::size_of::<I2cCfg>(),
                got: entry_end - fixed_end,
            }
        })?;
        entries.push(UnitCfgEntry { fixed, eeprom });
        offset = entry_end;
    }
    Ok(entries)
}

/// Fixed part of one module-configuration entry (124 bytes on the wire).
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
struct ModuleCfgFixed {
    name: [u8; NAME_LEN],
    description: [u8; DESC_LEN],
    device_type: U16,
    device_class: U16,
    sysfs: [u8; PATH_LEN],
    resv: [u8; 8],
}

const _: () = assert!(std::mem::size_of::<ModuleCfgFixed>() == MODULE_CFG_FIXED_SIZE);

/// One physical device on a module, with the owned class-specific descriptor
/// released together with the entry.
#[derive(Debug, Clone)]
pub struct ModuleCfgEntry {
    fixed: ModuleCfgFixed,
    device: DeviceCfg,
}

impl ModuleCfgEntry {
    pub fn new(name: &str, description: &str, device_type: u16, sysfs: &str, device: DeviceCfg) -> Self {
        Self {
            fixed: ModuleCfgFixed {
                name: put_str(name),
                description: put_str(description),
                device_type: U16::new(device_type),
                device_class: U16::new(device.class() as u16),
                sysfs: put_str(sysfs),
                resv: [0; 8],
            },
            device,
        }
    }

    pub fn name(&self) -> &str {
        fixed_str(&self.fixed.name)
    }

    pub fn description(&self) -> &str {
        fixed_str(&self.fixed.description)
    }

    pub fn device_type(&self) -> u16 {
        self.fixed.device_type.get()
    }

    pub fn device_class(&self) -> DeviceClass {
        self.device.class()
    }

    pub fn sysfs(&self) -> &str {
        fixed_str(&self.fixed.sysfs)
    }

    pub fn device(&self) -> &DeviceCfg {
        &self.device
    }

    /// Serialized size of this entry; depends on the device class.
    pub fn wire_size(&self) -> usize {
        MODULE_CFG_FIXED_SIZE + self.device.class().cfg_size()
    }
}

/// Encode a module-configuration list into one flat payload buffer. Entry
/// sizes vary with device class.
pub fn encode_module_cfg(entries: &[ModuleCfgEntry]) -> Vec<u8> {
    let total: usize = entries.iter().map(|e| e.wire_size()).sum();
    let mut out = Vec::with_capacity(total);
    for entry in entries {
        out.extend_from_slice(entry.fixed.as_bytes());
        entry.device.append_to(&mut out);
    }
    out
}

/// Decode `count` module-configuration entries from a payload buffer. The
/// class field of each fixed part drives how many descriptor bytes follow it.
pub fn decode_module_cfg(payload: &[u8], count: u8) -> Result<Vec<ModuleCfgEntry>> {
    let mut entries = Vec::with_capacity(count as usize);
    let mut offset = 0usize;
    for _ in 0..count {
        let fixed_end = offset + MODULE_CFG_FIXED_SIZE;
        if payload.len() < fixed_end {
            return Err(StoreError::ShortRead {
                offset: offset as u64,
                wanted: MODULE_CFG_FIXED_SIZE,
                got: payload.len().saturating_sub(offset),
            });
        }
        let fixed = ModuleCfgFixed::read_from_bytes(&payload[offset..fixed_end]).map_err(|_| {
            StoreError::ShortRead {
                offset: offset as u64,
                wanted: MODULE_CFG_FIXED_SIZE,
                got: fixed_end - offset,
            }
        })?;

        let raw_class = fixed.device_class.get();
        let class =
            DeviceClass::from_raw(raw_class).ok_or(StoreError::UnknownDeviceClass(raw_class))?;
        let cfg_end = fixed_end + class.cfg_size();
        if payload.len() < cfg_end {
            return Err(StoreError::ShortRead {
                offset: fixed_end as u64,
                wanted: class.cfg_size(),
                got: payload.len().saturating_sub(fixed_end),
            });
        }
        let device = DeviceCfg::read(class, &payload[fixed_end..cfg_end])?;
        entries.push(ModuleCfgEntry { fixed, device });
        offset = cfg_end;
    }
    Ok(entries)
}
