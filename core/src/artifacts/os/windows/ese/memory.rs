use super::{
    cursor::{ColumnId, EseCursor, EseDatabase, KeyLimit, RangeType, SeekType, UpdateType},
    error::EseError,
};
use crate::utils::strings::extract_utf16_string;
use common::windows::ColumnType;
use log::{error, warn};
use std::{cell::RefCell, cmp::Ordering, collections::HashMap, rc::Rc};

/// Tagged values of one column. Index 0 is tag 1
pub(crate) type ColumnValues = Vec<Option<Vec<u8>>>;
pub(crate) type MemoryRow = HashMap<ColumnId, ColumnValues>;
/// Normalised index key. Null segments sort first
type IndexKey = Vec<Option<Vec<u8>>>;

#[derive(Debug, Clone)]
pub(crate) struct MemoryColumn {
    pub(crate) name: String,
    pub(crate) id: ColumnId,
    pub(crate) column_type: ColumnType,
}

#[derive(Debug, Clone)]
struct MemoryIndex {
    name: String,
    columns: Vec<ColumnId>,
}

#[derive(Debug)]
struct IndexEntry {
    key: IndexKey,
    row: usize,
}

#[derive(Debug, Default)]
pub(crate) struct MemoryTable {
    name: String,
    columns: Vec<MemoryColumn>,
    indexes: Vec<MemoryIndex>,
    rows: Vec<MemoryRow>,
    /**Sorted index entries built on first use. Cleared on every applied update */
    sorted: RefCell<HashMap<String, Rc<Vec<IndexEntry>>>>,
}

impl MemoryTable {
    pub(crate) fn column_by_name(&self, name: &str) -> Option<&MemoryColumn> {
        self.columns
            .iter()
            .find(|column| column.name.eq_ignore_ascii_case(name))
    }

    fn column(&self, id: ColumnId) -> Option<&MemoryColumn> {
        self.columns.iter().find(|column| column.id == id)
    }

    fn index(&self, name: &str) -> Option<&MemoryIndex> {
        self.indexes
            .iter()
            .find(|index| index.name.eq_ignore_ascii_case(name))
    }

    /// Get the sorted entries of an index. `None` walks rows in insertion order
    fn entries(&self, index_name: Option<&str>) -> Result<Rc<Vec<IndexEntry>>, EseError> {
        let cache_name = index_name.unwrap_or_default().to_lowercase();
        if let Some(entries) = self.sorted.borrow().get(&cache_name) {
            return Ok(entries.clone());
        }

        let entries = match index_name {
            None => (0..self.rows.len())
                .map(|row| IndexEntry {
                    key: Vec::new(),
                    row,
                })
                .collect(),
            Some(name) => {
                let index = match self.index(name) {
                    Some(result) => result,
                    None => {
                        warn!("[ese] No index {name} on table {}", self.name);
                        return Err(EseError::IndexNotFound);
                    }
                };
                self.build_index(index)
            }
        };

        let entries = Rc::new(entries);
        self.sorted
            .borrow_mut()
            .insert(cache_name, entries.clone());
        Ok(entries)
    }

    fn build_index(&self, index: &MemoryIndex) -> Vec<IndexEntry> {
        let mut entries = Vec::new();
        for (row_number, row) in self.rows.iter().enumerate() {
            let mut key: IndexKey = Vec::with_capacity(index.columns.len());
            for column_id in &index.columns {
                let value = row
                    .get(column_id)
                    .and_then(|values| values.first())
                    .and_then(|value| value.as_ref());
                let segment = match (value, self.column(*column_id)) {
                    (Some(data), Some(column)) => Some(normalize_segment(&column.column_type, data)),
                    _ => None,
                };
                key.push(segment);
            }

            // Rows with a null first segment are not part of the index
            if !matches!(key.first(), Some(Some(_))) {
                continue;
            }
            entries.push(IndexEntry {
                key,
                row: row_number,
            });
        }
        entries.sort_by(|first, second| first.key.cmp(&second.key));
        entries
    }

    fn invalidate(&self) {
        self.sorted.borrow_mut().clear();
    }
}

/// Normalise column data so index order equals byte order
fn normalize_segment(column_type: &ColumnType, data: &[u8]) -> Vec<u8> {
    match column_type {
        ColumnType::Short if data.len() == 2 => {
            let value = i16::from_le_bytes([data[0], data[1]]);
            ((value as u16) ^ 0x8000).to_be_bytes().to_vec()
        }
        ColumnType::Long if data.len() == 4 => {
            let value = i32::from_le_bytes([data[0], data[1], data[2], data[3]]);
            ((value as u32) ^ 0x80000000).to_be_bytes().to_vec()
        }
        ColumnType::LongLong | ColumnType::Currency | ColumnType::DateTime if data.len() == 8 => {
            let mut bytes = [0; 8];
            bytes.copy_from_slice(data);
            let value = i64::from_le_bytes(bytes);
            ((value as u64) ^ 0x8000000000000000).to_be_bytes().to_vec()
        }
        ColumnType::UnsignedShort | ColumnType::UnsignedLong => {
            data.iter().rev().copied().collect()
        }
        ColumnType::Text | ColumnType::LongText => {
            extract_utf16_string(data).to_lowercase().into_bytes()
        }
        _ => data.to_vec(),
    }
}

/**
 * Compare an index entry against a search key built from `key.len()` segments.
 *
 * An `Exact` key with fewer segments than the index sorts before every entry sharing its prefix and
 * never compares equal to one, so `SeekType::Equal` on a partial key finds nothing. ESENT instead
 * lets a partial key match the first entry with that prefix when the key is built with
 * `JET_bitPartialColumnStartLimit` or `JET_bitPartialColumnEndLimit`. Callers wanting prefix matches
 * build the key with `KeyLimit::StartLimit` to seek and `KeyLimit::EndLimit` to bound the range
 */
fn compare_key(entry: &IndexKey, key: &[Vec<u8>], limit: KeyLimit) -> Ordering {
    for (segment, search) in entry.iter().zip(key.iter()) {
        let ordering = match segment {
            None => Ordering::Less,
            Some(value) => value.as_slice().cmp(search.as_slice()),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    match limit {
        KeyLimit::StartLimit => Ordering::Greater,
        KeyLimit::EndLimit => Ordering::Less,
        KeyLimit::Exact if entry.len() > key.len() => Ordering::Greater,
        KeyLimit::Exact => Ordering::Equal,
    }
}

/**
 * In-memory ESE engine. Holds tables of tagged multi-valued rows with lazily sorted secondary indexes.
 * Used to hold tables loaded from NTDS.dit or a JSON table snapshot and to build test databases
 */
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    tables: Vec<Rc<RefCell<MemoryTable>>>,
    read_only: bool,
}

impl MemoryDatabase {
    pub fn new(read_only: bool) -> MemoryDatabase {
        MemoryDatabase {
            tables: Vec::new(),
            read_only,
        }
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    /// Create a table. Column ids are assigned in order starting at 1
    pub fn create_table(
        &mut self,
        name: &str,
        columns: &[(&str, ColumnType)],
    ) -> Result<(), EseError> {
        if self.table(name).is_ok() {
            error!("[ese] Table {name} already exists");
            return Err(EseError::OpenDatabase);
        }

        let mut table = MemoryTable {
            name: name.to_string(),
            ..Default::default()
        };
        for (column_name, column_type) in columns {
            if table.column_by_name(column_name).is_some() {
                warn!("[ese] Duplicate column {column_name} in {name}. Skipping");
                continue;
            }
            let id = ColumnId(table.columns.len() as u32 + 1);
            table.columns.push(MemoryColumn {
                name: column_name.to_string(),
                id,
                column_type: *column_type,
            });
        }

        self.tables.push(Rc::new(RefCell::new(table)));
        Ok(())
    }

    pub fn create_index(&mut self, table: &str, name: &str, columns: &[&str]) -> Result<(), EseError> {
        let memory_table = self.table(table)?;
        let mut table_data = memory_table.borrow_mut();

        let mut ids = Vec::new();
        for column in columns {
            match table_data.column_by_name(column) {
                Some(result) => ids.push(result.id),
                None => {
                    error!("[ese] Index {name} references unknown column {column} on {table}");
                    return Err(EseError::ColumnNotFound);
                }
            }
        }
        if ids.is_empty() {
            return Err(EseError::NoKey);
        }

        table_data.indexes.push(MemoryIndex {
            name: name.to_string(),
            columns: ids,
        });
        table_data.invalidate();
        Ok(())
    }

    /// Insert a row directly. Bypasses the read-only check
    pub(crate) fn insert_row(
        &self,
        table: &str,
        values: Vec<(ColumnId, ColumnValues)>,
    ) -> Result<(), EseError> {
        let memory_table = self.table(table)?;
        let mut table_data = memory_table.borrow_mut();
        let mut row = MemoryRow::new();
        for (column, data) in values {
            if table_data.column(column).is_none() {
                return Err(EseError::ColumnNotFound);
            }
            row.insert(column, data);
        }
        table_data.rows.push(row);
        table_data.invalidate();
        Ok(())
    }

    pub(crate) fn column_info(&self, table: &str, column: &str) -> Result<MemoryColumn, EseError> {
        let memory_table = self.table(table)?;
        let table_data = memory_table.borrow();
        match table_data.column_by_name(column) {
            Some(result) => Ok(result.clone()),
            None => Err(EseError::ColumnNotFound),
        }
    }

    fn table(&self, name: &str) -> Result<&Rc<RefCell<MemoryTable>>, EseError> {
        for table in &self.tables {
            if table.borrow().name.eq_ignore_ascii_case(name) {
                return Ok(table);
            }
        }
        Err(EseError::TableNotFound)
    }
}

/// Table name, columns, indexes as column lists and rows
#[cfg(test)]
pub(crate) type TableParts = (
    String,
    Vec<MemoryColumn>,
    Vec<(String, Vec<ColumnId>)>,
    Vec<MemoryRow>,
);

#[cfg(test)]
impl MemoryDatabase {
    /// Copy out every table so tests can write it in another format
    pub(crate) fn table_parts(&self) -> Vec<TableParts> {
        self.tables
            .iter()
            .map(|table| {
                let table = table.borrow();
                (
                    table.name.clone(),
                    table.columns.clone(),
                    table
                        .indexes
                        .iter()
                        .map(|index| (index.name.clone(), index.columns.clone()))
                        .collect(),
                    table.rows.clone(),
                )
            })
            .collect()
    }
}

impl EseDatabase for MemoryDatabase {
    fn open_table(&self, name: &str) -> Result<Box<dyn EseCursor>, EseError> {
        let table = match self.table(name) {
            Ok(result) => result.clone(),
            Err(err) => {
                warn!("[ese] Could not open table {name}: {err:?}");
                return Err(err);
            }
        };
        let entries = table.borrow().entries(None)?;
        Ok(Box::new(MemoryCursor {
            table,
            read_only: self.read_only,
            index: None,
            entries,
            position: None,
            key: Vec::new(),
            key_limit: KeyLimit::Exact,
            range: None,
            pending: None,
        }))
    }

    fn column_id(&self, table: &str, column: &str) -> Result<ColumnId, EseError> {
        Ok(self.column_info(table, column)?.id)
    }

    fn table_names(&self) -> Vec<String> {
        self.tables
            .iter()
            .map(|table| table.borrow().name.clone())
            .collect()
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }
}

struct IndexRange {
    key: Vec<Vec<u8>>,
    limit: KeyLimit,
    range: RangeType,
}

struct PendingUpdate {
    update: UpdateType,
    row: Option<usize>,
    values: MemoryRow,
}

/// Cursor over a `MemoryTable`. Owns a handle to the table so it can outlive the borrow of the database
pub struct MemoryCursor {
    table: Rc<RefCell<MemoryTable>>,
    read_only: bool,
    index: Option<String>,
    entries: Rc<Vec<IndexEntry>>,
    position: Option<usize>,
    key: Vec<Vec<u8>>,
    key_limit: KeyLimit,
    range: Option<IndexRange>,
    pending: Option<PendingUpdate>,
}

impl MemoryCursor {
    fn current_row(&self) -> Result<usize, EseError> {
        match self.position.and_then(|position| self.entries.get(position)) {
            Some(entry) => Ok(entry.row),
            None => Err(EseError::NoCurrentRecord),
        }
    }

    fn in_range(&self, position: usize) -> bool {
        let Some(entry) = self.entries.get(position) else {
            return false;
        };
        let Some(range) = &self.range else {
            return true;
        };
        let ordering = compare_key(&entry.key, &range.key, range.limit);
        match range.range {
            RangeType::Inclusive => ordering != Ordering::Greater,
            RangeType::Exclusive => ordering == Ordering::Less,
        }
    }

    fn refresh_entries(&mut self) -> Result<(), EseError> {
        self.entries = self.table.borrow().entries(self.index.as_deref())?;
        self.position = None;
        Ok(())
    }
}

impl EseCursor for MemoryCursor {
    fn set_index(&mut self, name: &str) -> Result<(), EseError> {
        let entries = self.table.borrow().entries(Some(name))?;
        self.index = Some(name.to_string());
        self.entries = entries;
        self.position = None;
        self.key.clear();
        self.range = None;
        Ok(())
    }

    fn make_key(&mut self, data: &[u8], new_key: bool, limit: KeyLimit) -> Result<(), EseError> {
        let Some(index_name) = self.index.clone() else {
            return Err(EseError::NoIndex);
        };
        if new_key {
            self.key.clear();
        }

        let table = self.table.borrow();
        let Some(index) = table.index(&index_name) else {
            return Err(EseError::IndexNotFound);
        };
        let Some(column_id) = index.columns.get(self.key.len()) else {
            warn!("[ese] Too many key segments for index {index_name}");
            return Err(EseError::NoKey);
        };
        let Some(column) = table.column(*column_id) else {
            return Err(EseError::ColumnNotFound);
        };

        let segment = normalize_segment(&column.column_type, data);
        drop(table);
        self.key.push(segment);
        self.key_limit = limit;
        Ok(())
    }

    fn seek(&mut self, seek: SeekType) -> Result<bool, EseError> {
        if self.key.is_empty() {
            return Err(EseError::NoKey);
        }
        let key = std::mem::take(&mut self.key);
        self.range = None;

        let position = self
            .entries
            .partition_point(|entry| compare_key(&entry.key, &key, self.key_limit) == Ordering::Less);
        let Some(entry) = self.entries.get(position) else {
            self.position = None;
            return Ok(false);
        };

        if seek == SeekType::Equal
            && compare_key(&entry.key, &key, self.key_limit) != Ordering::Equal
        {
            self.position = None;
            return Ok(false);
        }
        self.position = Some(position);
        Ok(true)
    }

    fn set_index_range(&mut self, range: RangeType) -> Result<bool, EseError> {
        if self.key.is_empty() {
            return Err(EseError::NoKey);
        }
        self.range = Some(IndexRange {
            key: std::mem::take(&mut self.key),
            limit: self.key_limit,
            range,
        });

        let Some(position) = self.position else {
            return Ok(false);
        };
        if !self.in_range(position) {
            self.position = None;
            return Ok(false);
        }
        Ok(true)
    }

    fn move_first(&mut self) -> Result<bool, EseError> {
        self.range = None;
        if self.entries.is_empty() {
            self.position = None;
            return Ok(false);
        }
        self.position = Some(0);
        Ok(true)
    }

    fn move_next(&mut self) -> Result<bool, EseError> {
        let Some(position) = self.position else {
            return Ok(false);
        };
        let next = position + 1;
        if !self.in_range(next) {
            self.position = None;
            return Ok(false);
        }
        self.position = Some(next);
        Ok(true)
    }

    fn has_current_record(&self) -> bool {
        self.current_row().is_ok()
    }

    fn read_column(&self, column: ColumnId, tag: u32) -> Result<Option<Vec<u8>>, EseError> {
        let row = self.current_row()?;
        let table = self.table.borrow();
        if table.column(column).is_none() {
            return Err(EseError::ColumnNotFound);
        }
        if tag == 0 {
            return Ok(None);
        }

        let value = table
            .rows
            .get(row)
            .and_then(|values| values.get(&column))
            .and_then(|values| values.get(tag as usize - 1))
            .cloned()
            .flatten();
        Ok(value)
    }

    fn value_count(&self, column: ColumnId) -> Result<u32, EseError> {
        let row = self.current_row()?;
        let table = self.table.borrow();
        if table.column(column).is_none() {
            return Err(EseError::ColumnNotFound);
        }
        let count = table
            .rows
            .get(row)
            .and_then(|values| values.get(&column))
            .map_or(0, |values| values.len());
        Ok(count as u32)
    }

    fn prepare_update(&mut self, update: UpdateType) -> Result<(), EseError> {
        if self.read_only {
            warn!("[ese] Cannot update a read-only database");
            return Err(EseError::ReadOnly);
        }

        let pending = match update {
            UpdateType::Insert => PendingUpdate {
                update,
                row: None,
                values: MemoryRow::new(),
            },
            UpdateType::Replace => {
                let row = self.current_row()?;
                let values = self
                    .table
                    .borrow()
                    .rows
                    .get(row)
                    .cloned()
                    .unwrap_or_default();
                PendingUpdate {
                    update,
                    row: Some(row),
                    values,
                }
            }
        };
        self.pending = Some(pending);
        Ok(())
    }

    fn set_column(
        &mut self,
        column: ColumnId,
        tag: u32,
        data: Option<&[u8]>,
    ) -> Result<(), EseError> {
        if self.table.borrow().column(column).is_none() {
            return Err(EseError::ColumnNotFound);
        }
        let Some(pending) = &mut self.pending else {
            return Err(EseError::NoPendingUpdate);
        };

        let values = pending.values.entry(column).or_default();
        let value = data.map(|bytes| bytes.to_vec());
        if tag == 0 || tag as usize > values.len() {
            values.push(value);
        } else {
            values[tag as usize - 1] = value;
        }
        Ok(())
    }

    fn apply_update(&mut self) -> Result<(), EseError> {
        let Some(pending) = self.pending.take() else {
            return Err(EseError::NoPendingUpdate);
        };

        {
            let mut table = self.table.borrow_mut();
            match (pending.update, pending.row) {
                (UpdateType::Replace, Some(row)) if row < table.rows.len() => {
                    table.rows[row] = pending.values;
                }
                _ => table.rows.push(pending.values),
            }
            table.invalidate();
        }
        self.refresh_entries()
    }

    fn cancel_update(&mut self) {
        self.pending = None;
    }
}
