/**
 * Parse table records (data definitions) stored in leaf pages.
 *
 * A record starts with the last fixed column id, the last variable column id and the offset of the
 * variable size array. Fixed columns (1-127) are followed by a null bitmap, variable columns (128-255)
 * by their data and tagged columns (256+) fill the rest of the record
 */
use crate::utils::{
    compression::decompress::{decompress_lz77, decompress_seven_bit},
    nom_helper::{nom_unsigned_one_byte, nom_unsigned_two_bytes, Endian},
};
use common::windows::ColumnType;
use log::warn;
use nom::{bytes::complete::take, error::ErrorKind};

const FIRST_VARIABLE_COLUMN: u32 = 128;
const NULL_VARIABLE: u16 = 0x8000;

const TAGGED_COMPRESSED: u8 = 0x02;
const TAGGED_LONG_VALUE: u8 = 0x04;
const TAGGED_MULTI_VALUE: u8 = 0x08;
const TAGGED_TWO_VALUES: u8 = 0x10;
const TAGGED_HAS_FLAGS: u16 = 0x4000;
const SEPARATED_VALUE: u16 = 0x8000;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ColumnDefinition {
    pub(crate) id: u32,
    pub(crate) name: String,
    pub(crate) column_type: ColumnType,
    /**Size of fixed text and binary columns */
    pub(crate) space_usage: u32,
}

#[derive(Debug, PartialEq)]
pub(crate) enum StoredValue {
    Data(Vec<u8>),
    /**Big endian key of a value kept in the long value tree */
    LongValue(Vec<u8>),
}

#[derive(Debug, PartialEq)]
pub(crate) struct RecordColumn {
    pub(crate) id: u32,
    pub(crate) values: Vec<StoredValue>,
}

/// Parse one record. `columns` must be sorted by column id
pub(crate) fn parse_record<'a>(
    data: &'a [u8],
    columns: &[ColumnDefinition],
    large_page: bool,
) -> nom::IResult<&'a [u8], Vec<RecordColumn>> {
    let (input, last_fixed) = nom_unsigned_one_byte(data, Endian::Le)?;
    let (input, last_variable) = nom_unsigned_one_byte(input, Endian::Le)?;
    let (fixed_data, variable_offset) = nom_unsigned_two_bytes(input, Endian::Le)?;

    let variable_offset = variable_offset as usize;
    let record_header = 4;
    if variable_offset < record_header || variable_offset > data.len() {
        return Err(nom::Err::Failure(nom::error::Error::new(
            input,
            ErrorKind::Verify,
        )));
    }

    let mut record = Vec::new();
    let bitmap_size = (last_fixed as usize).div_ceil(8);
    let null_bitmap = if variable_offset >= record_header + bitmap_size {
        &data[variable_offset - bitmap_size..variable_offset]
    } else {
        &[]
    };
    parse_fixed(fixed_data, last_fixed, null_bitmap, columns, &mut record)?;

    let (_, variable_data) = take(variable_offset)(data)?;
    let tagged_data = parse_variable(variable_data, last_variable, columns, &mut record)?;
    if !tagged_data.is_empty() {
        parse_tagged(tagged_data, large_page, columns, &mut record)?;
    }
    Ok((&data[data.len()..], record))
}

/// Fixed columns are stored back to back in column id order
fn parse_fixed<'a>(
    data: &'a [u8],
    last_fixed: u8,
    null_bitmap: &[u8],
    columns: &[ColumnDefinition],
    record: &mut Vec<RecordColumn>,
) -> nom::IResult<&'a [u8], ()> {
    let mut input = data;
    for id in 1..=last_fixed as u32 {
        let column = match columns.iter().find(|column| column.id == id) {
            Some(result) => result,
            None => {
                warn!("[ese] Fixed column {id} is not in the catalog. Remaining fixed columns skipped");
                break;
            }
        };
        let (remaining, value) = take(fixed_size(column))(input)?;
        input = remaining;

        let bit = (id - 1) as usize;
        let is_null = null_bitmap
            .get(bit / 8)
            .is_some_and(|flags| flags & (1 << (bit % 8)) != 0);
        if !is_null {
            record.push(RecordColumn {
                id,
                values: vec![StoredValue::Data(value.to_vec())],
            });
        }
    }
    Ok((input, ()))
}

/// Variable columns start with an array of cumulative end offsets. Returns the tagged data
fn parse_variable<'a>(
    data: &'a [u8],
    last_variable: u8,
    columns: &[ColumnDefinition],
    record: &mut Vec<RecordColumn>,
) -> Result<&'a [u8], nom::Err<nom::error::Error<&'a [u8]>>> {
    let last_variable = last_variable as u32;
    if last_variable < FIRST_VARIABLE_COLUMN {
        return Ok(data);
    }

    let mut input = data;
    let mut sizes = Vec::new();
    for _ in FIRST_VARIABLE_COLUMN..=last_variable {
        let (remaining, size) = nom_unsigned_two_bytes(input, Endian::Le)?;
        sizes.push(size);
        input = remaining;
    }

    let mut previous_end = 0;
    for (id, size) in (FIRST_VARIABLE_COLUMN..).zip(sizes) {
        let end = (size & !NULL_VARIABLE) as usize;
        if size & NULL_VARIABLE != 0 {
            previous_end = end;
            continue;
        }
        if end < previous_end || end > input.len() {
            return Err(nom::Err::Failure(nom::error::Error::new(
                input,
                ErrorKind::Verify,
            )));
        }
        if columns.iter().any(|column| column.id == id) {
            record.push(RecordColumn {
                id,
                values: vec![StoredValue::Data(input[previous_end..end].to_vec())],
            });
        }
        previous_end = end;
    }

    let (tagged_data, _) = take(previous_end)(input)?;
    Ok(tagged_data)
}

/// Tagged columns start with an array of (column id, offset) entries
fn parse_tagged<'a>(
    data: &'a [u8],
    large_page: bool,
    columns: &[ColumnDefinition],
    record: &mut Vec<RecordColumn>,
) -> nom::IResult<&'a [u8], ()> {
    let offset_mask = if large_page { 0x7fff } else { 0x3fff };

    let (input, _) = nom_unsigned_two_bytes(data, Endian::Le)?;
    let (_, first_offset) = nom_unsigned_two_bytes(input, Endian::Le)?;
    let entry_size = 4;
    let count = (first_offset & offset_mask) as usize / entry_size;

    let mut entries = Vec::with_capacity(count);
    let mut input = data;
    for _ in 0..count {
        let (remaining, column) = nom_unsigned_two_bytes(input, Endian::Le)?;
        let (remaining, offset) = nom_unsigned_two_bytes(remaining, Endian::Le)?;
        entries.push((column as u32, offset));
        input = remaining;
    }

    for (index, (id, offset)) in entries.iter().enumerate() {
        let start = (offset & offset_mask) as usize;
        let end = match entries.get(index + 1) {
            Some((_, next)) => (next & offset_mask) as usize,
            None => data.len(),
        };
        if start > end || end > data.len() {
            return Err(nom::Err::Failure(nom::error::Error::new(
                input,
                ErrorKind::Verify,
            )));
        }
        if !columns.iter().any(|column| column.id == *id) {
            continue;
        }

        let mut value = &data[start..end];
        let mut flags = 0;
        if (large_page || offset & TAGGED_HAS_FLAGS != 0) && !value.is_empty() {
            flags = value[0];
            value = &value[1..];
        }
        record.push(RecordColumn {
            id: *id,
            values: tagged_values(value, flags)?,
        });
    }
    Ok((input, ()))
}

/// Split a tagged column into its values
fn tagged_values(data: &[u8], flags: u8) -> Result<Vec<StoredValue>, nom::Err<nom::error::Error<&[u8]>>> {
    if flags & TAGGED_TWO_VALUES != 0 {
        let (input, first_size) = nom_unsigned_one_byte(data, Endian::Le)?;
        let (second, first) = take(first_size)(input)?;
        return Ok(vec![
            StoredValue::Data(first.to_vec()),
            StoredValue::Data(second.to_vec()),
        ]);
    }

    if flags & TAGGED_MULTI_VALUE != 0 {
        let (_, first_offset) = nom_unsigned_two_bytes(data, Endian::Le)?;
        let count = (first_offset & !SEPARATED_VALUE) as usize / 2;
        let mut offsets = Vec::with_capacity(count);
        let mut input = data;
        for _ in 0..count {
            let (remaining, offset) = nom_unsigned_two_bytes(input, Endian::Le)?;
            offsets.push(offset);
            input = remaining;
        }

        let mut values = Vec::with_capacity(count);
        for (index, offset) in offsets.iter().enumerate() {
            let start = (offset & !SEPARATED_VALUE) as usize;
            let end = match offsets.get(index + 1) {
                Some(next) => (next & !SEPARATED_VALUE) as usize,
                None => data.len(),
            };
            if start > end || end > data.len() {
                return Err(nom::Err::Failure(nom::error::Error::new(
                    data,
                    ErrorKind::Verify,
                )));
            }
            let value = &data[start..end];
            if offset & SEPARATED_VALUE != 0 {
                values.push(StoredValue::LongValue(long_value_key(value)));
            } else {
                values.push(StoredValue::Data(value.to_vec()));
            }
        }
        return Ok(values);
    }

    if flags & TAGGED_LONG_VALUE != 0 {
        return Ok(vec![StoredValue::LongValue(long_value_key(data))]);
    }
    if flags & TAGGED_COMPRESSED != 0 {
        return Ok(vec![StoredValue::Data(decompress_value(data))]);
    }
    Ok(vec![StoredValue::Data(data.to_vec())])
}

/// Long value ids are stored little endian but keyed big endian
pub(crate) fn long_value_key(data: &[u8]) -> Vec<u8> {
    data.iter().rev().copied().collect()
}

/// Decompress a column value based on the compression type in the first byte
pub(crate) fn decompress_value(data: &[u8]) -> Vec<u8> {
    let first = match data.first() {
        Some(result) => *result,
        None => return Vec::new(),
    };

    let bit_check = 3;
    match first >> bit_check {
        1 | 2 => decompress_seven_bit(&data[1..]),
        3 => {
            let size = match data.get(1..3) {
                Some(bytes) => u16::from_le_bytes([bytes[0], bytes[1]]) as usize,
                None => return data.to_vec(),
            };
            match decompress_lz77(&data[3..], size) {
                Ok(result) => result,
                Err(err) => {
                    warn!("[ese] Could not decompress column value: {err:?}");
                    data.to_vec()
                }
            }
        }
        // Flag set but the value is stored as is
        _ => data.to_vec(),
    }
}

/// Size of a fixed column
pub(crate) fn fixed_size(column: &ColumnDefinition) -> usize {
    match column.column_type {
        ColumnType::Bit | ColumnType::UnsignedByte => 1,
        ColumnType::Short | ColumnType::UnsignedShort => 2,
        ColumnType::Long | ColumnType::UnsignedLong | ColumnType::Float32 => 4,
        ColumnType::Float64 | ColumnType::DateTime | ColumnType::LongLong | ColumnType::Currency => {
            8
        }
        ColumnType::Guid => 16,
        _ => column.space_usage as usize,
    }
}

#[cfg(test)]
pub(crate) fn column(id: u32, name: &str, column_type: ColumnType) -> ColumnDefinition {
    ColumnDefinition {
        id,
        name: name.to_string(),
        column_type,
        space_usage: 0,
    }
}
