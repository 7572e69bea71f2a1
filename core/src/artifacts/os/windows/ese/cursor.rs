/**
 * Cursor contract consumed from an ESE (JET) storage engine.
 *
 * Tables are opened as cursors. A cursor selects a secondary index, builds a search key
 * one segment at a time, seeks, optionally limits the scan with an index range and then walks forward.
 * Column values are tagged: tag 1 is the first value of a (possibly multi-valued) column.
 * Key data is passed in column format (little endian integers, UTF16LE text) and the engine
 * normalises it per index column.
 */
use super::error::EseError;
use crate::utils::{
    nom_helper::{nom_signed_eight_bytes, nom_signed_four_bytes, Endian},
    strings::{encode_utf16_string, extract_utf16_string},
};
use log::warn;

/// Engine assigned column identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyLimit {
    /**Key only matches full keys */
    Exact,
    /**Partial key sorts before every key sharing its prefix */
    StartLimit,
    /**Partial key sorts after every key sharing its prefix */
    EndLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekType {
    Equal,
    GreaterOrEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeType {
    Inclusive,
    Exclusive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateType {
    Insert,
    Replace,
}

pub trait EseDatabase {
    /// Open a new cursor on a table. The cursor does not borrow the database
    fn open_table(&self, name: &str) -> Result<Box<dyn EseCursor>, EseError>;
    fn column_id(&self, table: &str, column: &str) -> Result<ColumnId, EseError>;
    fn table_names(&self) -> Vec<String>;
    fn is_read_only(&self) -> bool;
}

pub trait EseCursor {
    /// Select a secondary index. Resets position, key and range
    fn set_index(&mut self, name: &str) -> Result<(), EseError>;
    /// Append a key segment. `new_key` starts a fresh key
    fn make_key(&mut self, data: &[u8], new_key: bool, limit: KeyLimit) -> Result<(), EseError>;
    /// Position on the first entry matching the current key. Returns false if none
    fn seek(&mut self, seek: SeekType) -> Result<bool, EseError>;
    /// Use the current key as the upper limit of the scan. Returns false if the current entry is outside it
    fn set_index_range(&mut self, range: RangeType) -> Result<bool, EseError>;
    fn move_first(&mut self) -> Result<bool, EseError>;
    fn move_next(&mut self) -> Result<bool, EseError>;
    fn has_current_record(&self) -> bool;
    /// Read one tagged value. `None` is a null or missing value
    fn read_column(&self, column: ColumnId, tag: u32) -> Result<Option<Vec<u8>>, EseError>;
    /// Number of tags (including null tags) stored for a column
    fn value_count(&self, column: ColumnId) -> Result<u32, EseError>;
    fn prepare_update(&mut self, update: UpdateType) -> Result<(), EseError>;
    /// Set one tagged value. Tag 0 appends a new value
    fn set_column(
        &mut self,
        column: ColumnId,
        tag: u32,
        data: Option<&[u8]>,
    ) -> Result<(), EseError>;
    fn apply_update(&mut self) -> Result<(), EseError>;
    fn cancel_update(&mut self);

    fn make_key_i32(&mut self, value: i32, new_key: bool, limit: KeyLimit) -> Result<(), EseError> {
        self.make_key(&value.to_le_bytes(), new_key, limit)
    }

    fn make_key_i64(&mut self, value: i64, new_key: bool, limit: KeyLimit) -> Result<(), EseError> {
        self.make_key(&value.to_le_bytes(), new_key, limit)
    }

    fn make_key_text(&mut self, value: &str, new_key: bool, limit: KeyLimit) -> Result<(), EseError> {
        self.make_key(&encode_utf16_string(value), new_key, limit)
    }

    fn read_bytes(&self, column: ColumnId) -> Result<Option<Vec<u8>>, EseError> {
        self.read_column(column, 1)
    }

    fn read_i32(&self, column: ColumnId) -> Result<Option<i32>, EseError> {
        match self.read_column(column, 1)? {
            Some(data) => Ok(Some(bytes_to_i32(&data)?)),
            None => Ok(None),
        }
    }

    fn read_i64(&self, column: ColumnId) -> Result<Option<i64>, EseError> {
        match self.read_column(column, 1)? {
            Some(data) => Ok(Some(bytes_to_i64(&data)?)),
            None => Ok(None),
        }
    }

    fn read_utf16(&self, column: ColumnId) -> Result<Option<String>, EseError> {
        Ok(self
            .read_column(column, 1)?
            .map(|data| extract_utf16_string(&data)))
    }

    /// Read every tag of a multi-valued integer column. Null tags are kept as `None`
    fn read_multi_i32(&self, column: ColumnId) -> Result<Vec<Option<i32>>, EseError> {
        let count = self.value_count(column)?;
        let mut values = Vec::with_capacity(count as usize);
        for tag in 1..=count {
            let value = match self.read_column(column, tag)? {
                Some(data) => match bytes_to_i32(&data) {
                    Ok(result) => Some(result),
                    Err(_) => None,
                },
                None => None,
            };
            values.push(value);
        }
        Ok(values)
    }

    fn read_nonnull_multi_i32(&self, column: ColumnId) -> Result<Vec<i32>, EseError> {
        Ok(self.read_multi_i32(column)?.into_iter().flatten().collect())
    }
}

pub(crate) fn bytes_to_i32(data: &[u8]) -> Result<i32, EseError> {
    if data.len() != 4 {
        warn!("[ese] Expected 4 bytes for 32-bit column, got {}", data.len());
        return Err(EseError::ReadColumn);
    }
    match nom_signed_four_bytes(data, Endian::Le) {
        Ok((_, value)) => Ok(value),
        Err(_) => Err(EseError::ReadColumn),
    }
}

pub(crate) fn bytes_to_i64(data: &[u8]) -> Result<i64, EseError> {
    if data.len() != 8 {
        warn!("[ese] Expected 8 bytes for 64-bit column, got {}", data.len());
        return Err(EseError::ReadColumn);
    }
    match nom_signed_eight_bytes(data, Endian::Le) {
        Ok((_, value)) => Ok(value),
        Err(_) => Err(EseError::ReadColumn),
    }
}

#[cfg(test)]
mod tests {
    use super::{bytes_to_i32, bytes_to_i64};
    use crate::artifacts::os::windows::ese::error::EseError;

    #[test]
    fn test_bytes_to_i32() {
        assert_eq!(bytes_to_i32(&[2, 0, 0, 0]).unwrap(), 2);
        assert_eq!(bytes_to_i32(&[255, 255, 255, 255]).unwrap(), -1);
        assert_eq!(bytes_to_i32(&[1, 0]), Err(EseError::ReadColumn));
    }

    #[test]
    fn test_bytes_to_i64() {
        assert_eq!(bytes_to_i64(&[1, 0, 0, 0, 0, 0, 0, 0]).unwrap(), 1);
        assert_eq!(bytes_to_i64(&[1, 0, 0, 0]), Err(EseError::ReadColumn));
    }
}
