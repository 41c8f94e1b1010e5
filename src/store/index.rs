//! # Index Manager
//!
//! Magic-word, header, and index-table operations for one module's database.
//!
//! A database moves through four states: uninitialized (no magic word),
//! magic written, header written, populated (tuple count > 0). Populated is
//! the steady operating state; append and erase transition within it.
//!
//! The index table is append-only from position 0 upward. Erase is LIFO:
//! only the tuple at `count - 1` can be removed, by erasing its 24-byte slot
//! and decrementing the live count. There is deliberately no way to erase an
//! earlier tuple without first erasing everything appended after it.

use tracing::{debug, trace};
use zerocopy::IntoBytes;

use crate::error::{Result, StoreError};
use crate::schema::{
    tuple_offset, IndexTuple, MagicWord, SchemaHeader, Version, HEADER_OFFSET, HEADER_SIZE,
    INDEX_TUPLE_SIZE, MAGIC_WORD_OFFSET, MAGIC_WORD_SIZE, MAX_INDEX_TUPLES, SCHEMA_END_OFFSET,
    TUPLE_COUNT_OFFSET, TUPLE_COUNT_SIZE,
};
use crate::store::InventoryStore;

impl InventoryStore {
    /// Stamp the magic word and read it back.
    pub fn write_magic(&self, module_id: &str) -> Result<()> {
        let magic = MagicWord::new();
        self.write_block(module_id, MAGIC_WORD_OFFSET, magic.as_bytes())?;
        self.validate_magic(module_id)?;
        debug!(module = module_id, "magic word written");
        Ok(())
    }

    /// Check the sentinel. Failure is not fatal by itself; callers use it
    /// to tell a fresh database from an existing one.
    pub fn validate_magic(&self, module_id: &str) -> Result<()> {
        let mut buf = [0u8; MAGIC_WORD_SIZE];
        self.read_block(module_id, MAGIC_WORD_OFFSET, &mut buf)?;
        let magic = MagicWord::from_bytes(&buf)?;
        if !magic.is_valid() {
            return Err(StoreError::BadMagic { found: magic.raw() });
        }
        trace!(module = module_id, "magic word validated");
        Ok(())
    }

    pub fn write_header(&self, module_id: &str, header: &SchemaHeader) -> Result<()> {
        self.write_block(module_id, HEADER_OFFSET, header.as_bytes())?;
        debug!(module = module_id, "schema header written");
        Ok(())
    }

    pub fn read_header(&self, module_id: &str) -> Result<SchemaHeader> {
        let mut buf = [0u8; HEADER_SIZE];
        self.read_block(module_id, HEADER_OFFSET, &mut buf)?;
        SchemaHeader::from_bytes(&buf)
    }

    /// Read the two version bytes at the head of the header.
    pub fn read_schema_version(&self, module_id: &str) -> Result<Version> {
        let mut buf = [0u8; 2];
        self.read_block(module_id, HEADER_OFFSET, &mut buf)?;
        Ok(Version::new(buf[0], buf[1]))
    }

    pub fn update_schema_version(&self, module_id: &str, version: Version) -> Result<()> {
        self.write_block(module_id, HEADER_OFFSET, &[version.major, version.minor])?;
        debug!(
            module = module_id,
            major = version.major,
            minor = version.minor,
            "schema version updated"
        );
        Ok(())
    }

    /// Read the live tuple count and validate it against the configured
    /// maximum; out of range is a validation failure, not an I/O failure.
    pub fn read_tuple_count(&self, module_id: &str) -> Result<u16> {
        let mut buf = [0u8; TUPLE_COUNT_SIZE];
        self.read_number(module_id, TUPLE_COUNT_OFFSET, 1, TUPLE_COUNT_SIZE, &mut buf)?;
        let count = u16::from_le_bytes(buf);
        if count >= MAX_INDEX_TUPLES {
            return Err(StoreError::Validation {
                what: "index tuple count",
                value: count as u32,
                bound: MAX_INDEX_TUPLES as u32,
            });
        }
        Ok(count)
    }

    pub fn write_tuple_count(&self, module_id: &str, count: u16) -> Result<()> {
        self.write_number(
            module_id,
            TUPLE_COUNT_OFFSET,
            1,
            TUPLE_COUNT_SIZE,
            &count.to_le_bytes(),
        )
    }

    /// Read the tuple at `index` in the table.
    pub fn read_tuple_at(&self, module_id: &str, index: u16) -> Result<IndexTuple> {
        let mut buf = [0u8; INDEX_TUPLE_SIZE];
        self.read_block(module_id, tuple_offset(index), &mut buf)?;
        IndexTuple::from_bytes(&buf)
    }

    /// Overwrite the tuple at `index` in place; used after a payload rewrite
    /// to refresh checksum, size, and validity.
    pub fn update_tuple_at(&self, module_id: &str, index: u16, tuple: &IndexTuple) -> Result<()> {
        self.write_block(module_id, tuple_offset(index), tuple.as_bytes())?;
        trace!(module = module_id, index, "index tuple updated");
        Ok(())
    }

    /// Append a tuple at the next free slot and persist the incremented
    /// count. Not idempotent: a failed append must not be blindly retried,
    /// because the tuple write and the count update are two separate commits.
    pub fn append_tuple(&self, module_id: &str, tuple: &IndexTuple) -> Result<u16> {
        let count = self.read_tuple_count(module_id)?;
        let offset = tuple_offset(count);
        self.write_block(module_id, offset, tuple.as_bytes())?;
        self.write_tuple_count(module_id, count + 1)?;
        trace!(
            module = module_id,
            index = count,
            offset,
            field = tuple.field_raw(),
            "index tuple appended"
        );
        Ok(count)
    }

    /// Erase the most recently appended tuple and persist the decremented
    /// count. Only the tuple at `count - 1` can be erased this way.
    pub fn erase_last_tuple(&self, module_id: &str) -> Result<()> {
        let count = self.read_tuple_count(module_id)?;
        if count == 0 {
            return Err(StoreError::Validation {
                what: "index tuple count",
                value: 0,
                bound: 0,
            });
        }
        let offset = tuple_offset(count - 1);
        self.erase_block(module_id, offset, INDEX_TUPLE_SIZE)?;
        self.write_tuple_count(module_id, count - 1)?;
        debug!(
            module = module_id,
            index = count - 1,
            offset,
            "last index tuple erased"
        );
        Ok(())
    }

    /// Linear scan for the first valid tuple with `field`. A tuple whose
    /// field id matches but whose valid flag is clear yields
    /// [`StoreError::InvalidField`] rather than missing-field; callers must
    /// not conflate the two.
    pub fn search_field(
        &self,
        module_id: &str,
        field: crate::schema::FieldId,
    ) -> Result<(IndexTuple, u16)> {
        let count = self.read_tuple_count(module_id)?;
        let mut found_invalid = false;
        for index in 0..count {
            let tuple = self.read_tuple_at(module_id, index)?;
            if tuple.field_raw() == field as u16 {
                if tuple.is_valid() {
                    return Ok((tuple, index));
                }
                found_invalid = true;
            }
        }
        if found_invalid {
            Err(StoreError::InvalidField(field))
        } else {
            Err(StoreError::MissingField(field))
        }
    }

    /// Fill the whole schema window with the erase value.
    pub fn erase_database(&self, module_id: &str) -> Result<()> {
        self.erase_block(module_id, MAGIC_WORD_OFFSET, SCHEMA_END_OFFSET as usize)?;
        debug!(module = module_id, "database erased");
        Ok(())
    }
}
