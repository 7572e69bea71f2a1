/**
 * The catalog (`MSysObjects`) describes every table, column, index and long value tree in the database.
 * Its root is always page 4 and its own records use a fixed column layout
 */
use super::record::{parse_record, ColumnDefinition, RecordColumn, StoredValue};
use crate::utils::{
    nom_helper::{nom_signed_four_bytes, nom_unsigned_two_bytes, Endian},
    strings::extract_utf8_string,
};
use common::windows::ColumnType;

/// Root page of the catalog B-tree
pub(crate) const CATALOG_PAGE: u32 = 4;

#[derive(Debug, PartialEq, Clone, Copy)]
pub(crate) enum CatalogType {
    Table,
    Column,
    Index,
    LongValue,
    Callback,
    Unknown,
}

#[derive(Debug, PartialEq)]
pub(crate) struct Catalog {
    /**Object id of the table the entry belongs to */
    pub(crate) obj_id_table: i32,
    pub(crate) catalog_type: CatalogType,
    /**Column id if `catalog_type` is Column, otherwise the object id */
    pub(crate) id: i32,
    /**Column type if `catalog_type` is Column, otherwise father data page (FDP) */
    pub(crate) column_or_father_data_page: i32,
    pub(crate) space_usage: i32,
    pub(crate) flags: i32,
    pub(crate) name: String,
    pub(crate) template_table: String,
    pub(crate) key_fld_ids: Vec<u8>,
}

const OBJ_ID_TABLE: u32 = 1;
const TYPE: u32 = 2;
const ID: u32 = 3;
const COLTYP_OR_FDP: u32 = 4;
const SPACE_USAGE: u32 = 5;
const FLAGS: u32 = 6;
const NAME: u32 = 128;
const TEMPLATE_TABLE: u32 = 130;
const KEY_FLD_IDS: u32 = 132;

/// Column layout of the catalog table
fn catalog_columns() -> Vec<ColumnDefinition> {
    let columns = [
        (OBJ_ID_TABLE, "ObjidTable", ColumnType::Long),
        (TYPE, "Type", ColumnType::Short),
        (ID, "Id", ColumnType::Long),
        (COLTYP_OR_FDP, "ColtypOrPgnoFDP", ColumnType::Long),
        (SPACE_USAGE, "SpaceUsage", ColumnType::Long),
        (FLAGS, "Flags", ColumnType::Long),
        (7, "PagesOrLocale", ColumnType::Long),
        (8, "RootFlag", ColumnType::Bit),
        (9, "RecordOffset", ColumnType::Short),
        (10, "LCMapFlags", ColumnType::Long),
        (11, "KeyMost", ColumnType::UnsignedShort),
        (12, "LVChunkMax", ColumnType::Long),
        (13, "SeparateLVThreshold", ColumnType::LongLong),
        (NAME, "Name", ColumnType::Text),
        (129, "Stats", ColumnType::Binary),
        (TEMPLATE_TABLE, "TemplateTable", ColumnType::Text),
        (131, "DefaultValue", ColumnType::Binary),
        (KEY_FLD_IDS, "KeyFldIDs", ColumnType::Binary),
        (133, "VarSegMac", ColumnType::Binary),
        (134, "ConditionalColumns", ColumnType::Binary),
        (135, "TupleLimits", ColumnType::Binary),
        (136, "Version", ColumnType::Binary),
        (137, "SortID", ColumnType::Binary),
    ];
    columns
        .into_iter()
        .map(|(id, name, column_type)| ColumnDefinition {
            id,
            name: name.to_string(),
            column_type,
            space_usage: 0,
        })
        .collect()
}

impl Catalog {
    /// Parse one catalog record
    pub(crate) fn parse_row(data: &[u8], large_page: bool) -> nom::IResult<&[u8], Catalog> {
        let (input, record) = parse_record(data, &catalog_columns(), large_page)?;

        let catalog = Catalog {
            obj_id_table: catalog_number(&record, OBJ_ID_TABLE),
            catalog_type: match catalog_number(&record, TYPE) {
                1 => CatalogType::Table,
                2 => CatalogType::Column,
                3 => CatalogType::Index,
                4 => CatalogType::LongValue,
                5 => CatalogType::Callback,
                _ => CatalogType::Unknown,
            },
            id: catalog_number(&record, ID),
            column_or_father_data_page: catalog_number(&record, COLTYP_OR_FDP),
            space_usage: catalog_number(&record, SPACE_USAGE),
            flags: catalog_number(&record, FLAGS),
            name: extract_utf8_string(catalog_bytes(&record, NAME)),
            template_table: extract_utf8_string(catalog_bytes(&record, TEMPLATE_TABLE)),
            key_fld_ids: catalog_bytes(&record, KEY_FLD_IDS).to_vec(),
        };
        Ok((input, catalog))
    }

    /**
     * Column ids making up an index key.
     * Newer databases store four byte segments (flags, reserved, column id). Older ones store a signed
     * two byte column id that is negative for descending segments. `is_column` picks the layout
     * that only names known columns
     */
    pub(crate) fn key_columns(&self, is_column: impl Fn(u32) -> bool) -> Vec<u32> {
        let segment_size = 4;
        if self.key_fld_ids.len() % segment_size == 0 {
            let mut ids = Vec::new();
            for segment in self.key_fld_ids.chunks(segment_size) {
                match nom_unsigned_two_bytes(&segment[2..], Endian::Le) {
                    Ok((_, id)) => ids.push(id as u32),
                    Err(_) => break,
                }
            }
            if !ids.is_empty() && ids.iter().all(|id| is_column(*id)) {
                return ids;
            }
        }

        self.key_fld_ids
            .chunks_exact(2)
            .map(|segment| i16::from_le_bytes([segment[0], segment[1]]).unsigned_abs() as u32)
            .collect()
    }
}

/// Map a catalog column type to its ESE column type
pub(crate) fn column_type(coltyp: i32) -> ColumnType {
    match coltyp {
        0 => ColumnType::Nil,
        1 => ColumnType::Bit,
        2 => ColumnType::UnsignedByte,
        3 => ColumnType::Short,
        4 => ColumnType::Long,
        5 => ColumnType::Currency,
        6 => ColumnType::Float32,
        7 => ColumnType::Float64,
        8 => ColumnType::DateTime,
        9 => ColumnType::Binary,
        10 => ColumnType::Text,
        11 => ColumnType::LongBinary,
        12 => ColumnType::LongText,
        13 => ColumnType::SuperLong,
        14 => ColumnType::UnsignedLong,
        15 => ColumnType::LongLong,
        16 => ColumnType::Guid,
        17 => ColumnType::UnsignedShort,
        _ => ColumnType::Unknown,
    }
}

fn catalog_bytes(record: &[RecordColumn], id: u32) -> &[u8] {
    for column in record {
        if column.id != id {
            continue;
        }
        if let Some(StoredValue::Data(data)) = column.values.first() {
            return data;
        }
    }
    &[]
}

/// Fixed catalog numbers are two or four bytes. Missing values are 0
fn catalog_number(record: &[RecordColumn], id: u32) -> i32 {
    let data = catalog_bytes(record, id);
    if data.len() == 2 {
        return nom_unsigned_two_bytes(data, Endian::Le)
            .map(|(_, value)| value as i16 as i32)
            .unwrap_or_default();
    }
    nom_signed_four_bytes(data, Endian::Le)
        .map(|(_, value)| value)
        .unwrap_or_default()
}

/// Build a catalog record for tests
#[cfg(test)]
pub(crate) fn test_catalog_row(
    obj_id_table: i32,
    catalog_type: u16,
    id: i32,
    column_or_father_data_page: i32,
    name: &str,
    key_fld_ids: &[u8],
) -> Vec<u8> {
    // Fixed columns 1-5, null bitmap, then variable columns 128-132
    let mut row = vec![5, 132, 0, 0];
    row.extend_from_slice(&obj_id_table.to_le_bytes());
    row.extend_from_slice(&catalog_type.to_le_bytes());
    row.extend_from_slice(&id.to_le_bytes());
    row.extend_from_slice(&column_or_father_data_page.to_le_bytes());
    row.extend_from_slice(&0i32.to_le_bytes());
    row.push(0);
    let variable_offset = row.len() as u16;
    row[2..4].copy_from_slice(&variable_offset.to_le_bytes());

    let name_end = name.len() as u16;
    let key_end = name_end + key_fld_ids.len() as u16;
    for end in [name_end, name_end | 0x8000, name_end | 0x8000, name_end | 0x8000, key_end] {
        row.extend_from_slice(&end.to_le_bytes());
    }
    row.extend_from_slice(name.as_bytes());
    row.extend_from_slice(key_fld_ids);
    row
}
