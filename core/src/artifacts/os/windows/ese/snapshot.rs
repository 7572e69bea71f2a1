/**
 * Load an ESE table snapshot into a `MemoryDatabase`.
 *
 * A snapshot is a JSON export of the NTDS.dit tables:
 * `{ "tables": [ { "name", "columns": [{ "name", "column_type" }], "indexes": [{ "name", "columns" }], "rows": [ { "column": [value, ...] } ] } ] }`
 *
 * Values are converted to column format using the column type. Integers are JSON numbers,
 * text is a JSON string and binary data is base64. A scalar is treated as a single tagged value
 */
use super::{cursor::ColumnId, error::EseError, memory::MemoryDatabase};
use crate::{
    filesystem::files::read_file,
    utils::{encoding::base64_decode_standard, strings::encode_utf16_string},
};
use common::windows::ColumnType;
use log::error;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Deserialize)]
struct Snapshot {
    tables: Vec<SnapshotTable>,
}

#[derive(Debug, Deserialize)]
struct SnapshotTable {
    name: String,
    columns: Vec<SnapshotColumn>,
    #[serde(default)]
    indexes: Vec<SnapshotIndex>,
    #[serde(default)]
    rows: Vec<HashMap<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct SnapshotColumn {
    name: String,
    column_type: ColumnType,
}

#[derive(Debug, Deserialize)]
struct SnapshotIndex {
    name: String,
    columns: Vec<String>,
}

impl MemoryDatabase {
    /// Read a JSON table snapshot from disk
    pub fn from_snapshot_file(path: &str, read_only: bool) -> Result<MemoryDatabase, EseError> {
        let data = match read_file(path) {
            Ok(result) => result,
            Err(err) => {
                error!("[ese] Could not read snapshot {path}: {err:?}");
                return Err(EseError::OpenDatabase);
            }
        };
        MemoryDatabase::from_snapshot(&data, read_only)
    }

    /// Parse JSON table snapshot bytes
    pub fn from_snapshot(data: &[u8], read_only: bool) -> Result<MemoryDatabase, EseError> {
        let snapshot: Snapshot = match serde_json::from_slice(data) {
            Ok(result) => result,
            Err(err) => {
                error!("[ese] Could not parse snapshot JSON: {err:?}");
                return Err(EseError::BadSnapshot);
            }
        };

        let mut db = MemoryDatabase::new(read_only);
        for table in snapshot.tables {
            let columns: Vec<(&str, ColumnType)> = table
                .columns
                .iter()
                .map(|column| (column.name.as_str(), column.column_type))
                .collect();
            db.create_table(&table.name, &columns)?;

            for index in &table.indexes {
                let index_columns: Vec<&str> =
                    index.columns.iter().map(String::as_str).collect();
                db.create_index(&table.name, &index.name, &index_columns)?;
            }

            for row in &table.rows {
                let mut values: Vec<(ColumnId, Vec<Option<Vec<u8>>>)> = Vec::new();
                for (column_name, value) in row {
                    let column = match db.column_info(&table.name, column_name) {
                        Ok(result) => result,
                        Err(err) => {
                            error!(
                                "[ese] Snapshot row references unknown column {column_name} in {}",
                                table.name
                            );
                            return Err(err);
                        }
                    };

                    let tagged = match value {
                        Value::Array(entries) => entries.as_slice(),
                        _ => std::slice::from_ref(value),
                    };
                    let mut column_values = Vec::with_capacity(tagged.len());
                    for entry in tagged {
                        column_values.push(snapshot_value(&column.column_type, entry)?);
                    }
                    values.push((column.id, column_values));
                }
                db.insert_row(&table.name, values)?;
            }
        }
        Ok(db)
    }
}

/// Convert one JSON value to column format bytes
fn snapshot_value(column_type: &ColumnType, value: &Value) -> Result<Option<Vec<u8>>, EseError> {
    if value.is_null() {
        return Ok(None);
    }

    let bytes = match column_type {
        ColumnType::Bit => match value {
            Value::Bool(flag) => Some(vec![*flag as u8]),
            _ => value.as_u64().map(|number| vec![(number != 0) as u8]),
        },
        ColumnType::UnsignedByte => value
            .as_u64()
            .and_then(|number| u8::try_from(number).ok())
            .map(|number| vec![number]),
        ColumnType::Short => value
            .as_i64()
            .and_then(|number| i16::try_from(number).ok())
            .map(|number| number.to_le_bytes().to_vec()),
        ColumnType::UnsignedShort => value
            .as_u64()
            .and_then(|number| u16::try_from(number).ok())
            .map(|number| number.to_le_bytes().to_vec()),
        ColumnType::Long => value
            .as_i64()
            .and_then(|number| i32::try_from(number).ok())
            .map(|number| number.to_le_bytes().to_vec()),
        ColumnType::UnsignedLong => value
            .as_u64()
            .and_then(|number| u32::try_from(number).ok())
            .map(|number| number.to_le_bytes().to_vec()),
        ColumnType::LongLong | ColumnType::Currency | ColumnType::DateTime => value
            .as_i64()
            .map(|number| number.to_le_bytes().to_vec()),
        ColumnType::Float32 => value
            .as_f64()
            .map(|number| (number as f32).to_le_bytes().to_vec()),
        ColumnType::Float64 => value.as_f64().map(|number| number.to_le_bytes().to_vec()),
        ColumnType::Text | ColumnType::LongText => value.as_str().map(encode_utf16_string),
        _ => value
            .as_str()
            .and_then(|text| base64_decode_standard(text).ok()),
    };

    match bytes {
        Some(result) => Ok(Some(result)),
        None => {
            error!("[ese] Snapshot value {value} is not valid for column type {column_type:?}");
            Err(EseError::BadSnapshot)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::snapshot_value;
    use crate::artifacts::os::windows::ese::{
        cursor::{EseCursor, EseDatabase, KeyLimit, SeekType},
        error::EseError,
        memory::MemoryDatabase,
    };
    use common::windows::ColumnType;
    use serde_json::json;
    use std::path::PathBuf;

    #[test]
    fn test_from_snapshot() {
        let data = json!({
            "tables": [{
                "name": "datatable",
                "columns": [
                    {"name": "DNT_col", "column_type": "Long"},
                    {"name": "ATTm589825", "column_type": "LongText"},
                    {"name": "ATTk589826", "column_type": "Binary"}
                ],
                "indexes": [{"name": "DNT_index", "columns": ["DNT_col"]}],
                "rows": [
                    {"DNT_col": 4, "ATTm589825": ["example"], "ATTk589826": "AQID"},
                    {"DNT_col": 5, "ATTm589825": [null]}
                ]
            }]
        });
        let db = MemoryDatabase::from_snapshot(data.to_string().as_bytes(), true).unwrap();
        assert!(db.is_read_only());

        let name = db.column_id("datatable", "ATTm589825").unwrap();
        let guid = db.column_id("datatable", "ATTk589826").unwrap();
        let mut cursor = db.open_table("datatable").unwrap();
        cursor.set_index("DNT_index").unwrap();
        cursor.make_key_i32(4, true, KeyLimit::Exact).unwrap();
        assert!(cursor.seek(SeekType::Equal).unwrap());
        assert_eq!(cursor.read_utf16(name).unwrap().unwrap(), "example");
        assert_eq!(cursor.read_bytes(guid).unwrap().unwrap(), vec![1, 2, 3]);

        cursor.make_key_i32(5, true, KeyLimit::Exact).unwrap();
        assert!(cursor.seek(SeekType::Equal).unwrap());
        assert_eq!(cursor.value_count(name).unwrap(), 1);
        assert_eq!(cursor.read_utf16(name).unwrap(), None);
    }

    #[test]
    fn test_bad_snapshot() {
        let result = MemoryDatabase::from_snapshot(b"{\"tables\": 1}", true);
        assert_eq!(result.err(), Some(EseError::BadSnapshot));

        let data = json!({
            "tables": [{
                "name": "datatable",
                "columns": [{"name": "DNT_col", "column_type": "Long"}],
                "rows": [{"DNT_col": "four"}]
            }]
        });
        let result = MemoryDatabase::from_snapshot(data.to_string().as_bytes(), true);
        assert_eq!(result.err(), Some(EseError::BadSnapshot));
    }

    #[test]
    fn test_snapshot_value() {
        assert_eq!(
            snapshot_value(&ColumnType::Long, &json!(-1)).unwrap(),
            Some(vec![255, 255, 255, 255])
        );
        assert_eq!(
            snapshot_value(&ColumnType::Bit, &json!(true)).unwrap(),
            Some(vec![1])
        );
        assert_eq!(snapshot_value(&ColumnType::Text, &json!(null)).unwrap(), None);
        assert!(snapshot_value(&ColumnType::Long, &json!(5000000000i64)).is_err());
    }

    #[test]
    fn test_from_snapshot_file() {
        let mut test_location = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        test_location.push("tests/test_data/ntds/ntds.json");

        let db = MemoryDatabase::from_snapshot_file(&test_location.display().to_string(), true)
            .unwrap();
        let tables = db.table_names();
        assert!(tables.contains(&String::from("datatable")));
        assert!(tables.contains(&String::from("link_table")));
        assert!(tables.contains(&String::from("sd_table")));
    }
}
