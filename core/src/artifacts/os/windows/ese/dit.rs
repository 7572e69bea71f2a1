/**
 * Load an ESE database file such as NTDS.dit into a `MemoryDatabase`.
 *
 * The catalog is read first. Every user table is then created with its columns and indexes, its
 * long value tree is collected and each record in the data tree is converted to tagged column values.
 * Unreadable records and pages are skipped with a warning
 */
use super::{
    catalog::{column_type, Catalog, CatalogType, CATALOG_PAGE},
    cursor::ColumnId,
    error::EseError,
    header::EseHeader,
    memory::{ColumnValues, MemoryDatabase},
    reader::EseReader,
    record::{parse_record, ColumnDefinition, StoredValue},
    tags::LARGE_PAGE_SIZE,
};
use crate::filesystem::files::{file_reader, read_bytes};
use common::windows::ColumnType;
use log::{debug, error, warn};
use std::{
    collections::{BTreeMap, HashMap},
    io::{Read, Seek},
};

/// Engine tables that hold no directory data
const SYSTEM_TABLE_PREFIX: &str = "MSys";

impl MemoryDatabase {
    /// Open either an ESE database or a JSON table snapshot based on the file signature
    pub fn open_file(path: &str, read_only: bool) -> Result<MemoryDatabase, EseError> {
        let mut reader = match file_reader(path) {
            Ok(result) => result,
            Err(err) => {
                error!("[ese] Could not open {path}: {err:?}");
                return Err(EseError::OpenDatabase);
            }
        };
        let signature_size = 8;
        let is_ese = read_bytes(0, signature_size, &mut reader)
            .map(|data| EseHeader::is_ese(&data))
            .unwrap_or(false);
        if is_ese {
            return MemoryDatabase::from_ese_reader(reader, read_only);
        }
        MemoryDatabase::from_snapshot_file(path, read_only)
    }

    /// Read an ESE database file
    pub fn from_dit_file(path: &str, read_only: bool) -> Result<MemoryDatabase, EseError> {
        let reader = match file_reader(path) {
            Ok(result) => result,
            Err(err) => {
                error!("[ese] Could not open {path}: {err:?}");
                return Err(EseError::OpenDatabase);
            }
        };
        MemoryDatabase::from_ese_reader(reader, read_only)
    }

    pub(crate) fn from_ese_reader<T: Read + Seek>(
        reader: T,
        read_only: bool,
    ) -> Result<MemoryDatabase, EseError> {
        let mut ese = EseReader::new(reader)?;
        let large_page = ese.page_size as usize >= LARGE_PAGE_SIZE;

        let mut catalog = Vec::new();
        for leaf in ese.tree_entries(CATALOG_PAGE)? {
            match Catalog::parse_row(&leaf.leaf_data, large_page) {
                Ok((_, result)) => catalog.push(result),
                Err(err) => warn!("[ese] Skipping unreadable catalog entry: {err:?}"),
            }
        }

        let mut db = MemoryDatabase::new(read_only);
        for table in catalog
            .iter()
            .filter(|entry| entry.catalog_type == CatalogType::Table)
        {
            if table.name.starts_with(SYSTEM_TABLE_PREFIX) {
                debug!("[ese] Skipping system table {}", table.name);
                continue;
            }
            if !table.template_table.is_empty() {
                warn!(
                    "[ese] Table {} uses template {}. Template columns are not loaded",
                    table.name, table.template_table
                );
            }
            if let Err(err) = load_table(&mut ese, &mut db, table, &catalog, large_page) {
                warn!("[ese] Could not load table {}: {err:?}", table.name);
            }
        }
        Ok(db)
    }
}

fn load_table<T: Read + Seek>(
    ese: &mut EseReader<T>,
    db: &mut MemoryDatabase,
    table: &Catalog,
    catalog: &[Catalog],
    large_page: bool,
) -> Result<(), EseError> {
    let mut columns: Vec<ColumnDefinition> = table_entries(catalog, table, CatalogType::Column)
        .map(|entry| ColumnDefinition {
            id: entry.id as u32,
            name: entry.name.clone(),
            column_type: column_type(entry.column_or_father_data_page),
            space_usage: entry.space_usage as u32,
        })
        .collect();
    columns.sort_by_key(|column| column.id);

    let names: Vec<(&str, ColumnType)> = columns
        .iter()
        .map(|column| (column.name.as_str(), column.column_type))
        .collect();
    db.create_table(&table.name, &names)?;

    let mut column_ids: HashMap<u32, ColumnId> = HashMap::new();
    for column in &columns {
        column_ids.insert(column.id, db.column_info(&table.name, &column.name)?.id);
    }

    for index in table_entries(catalog, table, CatalogType::Index) {
        let key_names: Option<Vec<&str>> = index
            .key_columns(|id| column_ids.contains_key(&id))
            .iter()
            .map(|id| {
                columns
                    .iter()
                    .find(|column| column.id == *id)
                    .map(|column| column.name.as_str())
            })
            .collect();
        match key_names {
            Some(names) if !names.is_empty() => {
                if let Err(err) = db.create_index(&table.name, &index.name, &names) {
                    warn!("[ese] Could not create index {}: {err:?}", index.name);
                }
            }
            _ => warn!(
                "[ese] Index {} on {} has no readable key columns",
                index.name, table.name
            ),
        }
    }

    let long_values = match table_entries(catalog, table, CatalogType::LongValue).next() {
        Some(entry) => match ese.long_values(entry.column_or_father_data_page as u32) {
            Ok(result) => result,
            Err(err) => {
                warn!("[ese] Could not read long values of {}: {err:?}", table.name);
                BTreeMap::new()
            }
        },
        None => BTreeMap::new(),
    };

    for leaf in ese.tree_entries(table.column_or_father_data_page as u32)? {
        let record = match parse_record(&leaf.leaf_data, &columns, large_page) {
            Ok((_, result)) => result,
            Err(err) => {
                warn!("[ese] Skipping unreadable record in {}: {err:?}", table.name);
                continue;
            }
        };

        let mut values: Vec<(ColumnId, ColumnValues)> = Vec::with_capacity(record.len());
        for column in record {
            let Some(id) = column_ids.get(&column.id) else {
                continue;
            };
            let mut data = Vec::with_capacity(column.values.len());
            for value in column.values {
                match value {
                    StoredValue::Data(bytes) => data.push(Some(bytes)),
                    StoredValue::LongValue(key) => {
                        let resolved = resolve_long_value(&long_values, &key);
                        if resolved.is_none() {
                            warn!("[ese] Missing long value {key:?} in {}", table.name);
                        }
                        data.push(resolved);
                    }
                }
            }
            values.push((*id, data));
        }
        db.insert_row(&table.name, values)?;
    }
    Ok(())
}

/// Catalog entries of one type that belong to a table
fn table_entries<'a>(
    catalog: &'a [Catalog],
    table: &'a Catalog,
    catalog_type: CatalogType,
) -> impl Iterator<Item = &'a Catalog> {
    catalog.iter().filter(move |entry| {
        entry.obj_id_table == table.id && entry.catalog_type == catalog_type
    })
}

/// Join the chunks of a long value. Chunk keys are the long value id followed by the big endian offset
fn resolve_long_value(long_values: &BTreeMap<Vec<u8>, Vec<u8>>, key: &[u8]) -> Option<Vec<u8>> {
    let chunk_key_size = key.len() + 4;
    let mut found = false;
    let mut data = Vec::new();
    for (entry_key, chunk) in long_values.range(key.to_vec()..) {
        if !entry_key.starts_with(key) {
            break;
        }
        found = true;
        if entry_key.len() == chunk_key_size {
            data.extend_from_slice(chunk);
        }
    }
    if !found {
        return None;
    }
    Some(data)
}

/**
 * Write a database as an 8KB page ESE file.
 * Every column is stored as a tagged column and every record gets its own leaf page
 */
#[cfg(test)]
pub(crate) fn test_dit(db: &MemoryDatabase) -> Vec<u8> {
    use super::{
        catalog::test_catalog_row,
        page::test_page,
        reader::{branch_entry, leaf_entry, test_file},
    };

    fn write_tree(
        pages: &mut Vec<(u32, Vec<u8>)>,
        next_page: &mut u32,
        root: u32,
        records: Vec<Vec<u8>>,
    ) {
        let mut branches = vec![(0, vec![0; 16])];
        for (index, record) in records.into_iter().enumerate() {
            let key = (index as u32).to_be_bytes();
            let leaf = *next_page;
            *next_page += 1;
            pages.push((
                leaf,
                test_page(0x2, 0, &[(0, Vec::new()), (0, leaf_entry(&key, &record))]),
            ));
            branches.push((0, branch_entry(&key, leaf)));
        }
        pages.push((root, test_page(0x5, 0, &branches)));
    }

    let fid = |id: ColumnId| 255 + id.0;
    let mut pages = Vec::new();
    let mut next_page = 10;
    let mut catalog_rows = vec![test_catalog_row(1, 1, 1, CATALOG_PAGE as i32, "MSysObjects", &[])];

    for (table_index, (name, columns, indexes, rows)) in db.table_parts().into_iter().enumerate() {
        let obj_id = 100 + table_index as i32;
        let father_page = next_page;
        next_page += 1;
        catalog_rows.push(test_catalog_row(obj_id, 1, obj_id, father_page as i32, &name, &[]));

        for column in &columns {
            let code = (0..18)
                .find(|code| column_type(*code) == column.column_type)
                .unwrap_or_default();
            catalog_rows.push(test_catalog_row(
                obj_id,
                2,
                fid(column.id) as i32,
                code,
                &column.name,
                &[],
            ));
        }
        for (index_name, index_columns) in &indexes {
            let mut key = Vec::new();
            for column in index_columns {
                key.extend_from_slice(&[0, 0]);
                key.extend_from_slice(&(fid(*column) as u16).to_le_bytes());
            }
            catalog_rows.push(test_catalog_row(obj_id, 3, obj_id + 1000, father_page as i32, index_name, &key));
        }

        let mut records = Vec::new();
        for row in &rows {
            let mut tagged: Vec<(u32, Vec<&Vec<u8>>)> = row
                .iter()
                .map(|(id, values)| (fid(*id), values.iter().flatten().collect::<Vec<_>>()))
                .filter(|(_, values)| !values.is_empty())
                .collect();
            tagged.sort_by_key(|(id, _)| *id);

            let mut entries = Vec::new();
            let mut data = Vec::new();
            for (id, values) in &tagged {
                let offset = (tagged.len() * 4 + data.len()) as u16 | 0x4000;
                entries.extend_from_slice(&(*id as u16).to_le_bytes());
                entries.extend_from_slice(&offset.to_le_bytes());
                if values.len() == 1 {
                    data.push(0);
                    data.extend_from_slice(values[0]);
                    continue;
                }
                data.push(0x08);
                let mut position = values.len() * 2;
                for value in values {
                    data.extend_from_slice(&(position as u16).to_le_bytes());
                    position += value.len();
                }
                for value in values {
                    data.extend_from_slice(value);
                }
            }

            let mut record = vec![0, 127, 4, 0];
            record.extend(entries);
            record.extend(data);
            records.push(record);
        }
        write_tree(&mut pages, &mut next_page, father_page, records);
    }
    write_tree(&mut pages, &mut next_page, CATALOG_PAGE, catalog_rows);
    test_file(&pages)
}
