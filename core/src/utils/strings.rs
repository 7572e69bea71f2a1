use log::warn;

/**
 * Get a UTF16 string from provided bytes data.  
 * NTDS text columns are UTF16LE and usually end with a NUL pair which is stripped before decoding
 */
pub(crate) fn extract_utf16_string(data: &[u8]) -> String {
    let mut trimmed = data;
    if trimmed.ends_with(&[0, 0]) && trimmed.len() % 2 == 0 {
        trimmed = &trimmed[..trimmed.len() - 2];
    }

    let mut utf16_data: Vec<u16> = Vec::with_capacity(trimmed.len() / 2);
    let min_byte_size = 2;
    for wide_char in trimmed.chunks(min_byte_size) {
        if wide_char.len() < min_byte_size {
            warn!("[strings] UTF16 data has an odd number of bytes. Dropping last byte");
            break;
        }
        utf16_data.push(u16::from_le_bytes([wide_char[0], wide_char[1]]));
    }

    match String::from_utf16(&utf16_data) {
        Ok(result) => result,
        Err(err) => {
            warn!("[strings] Failed to get UTF16 string: {err:?}");
            String::from_utf16_lossy(&utf16_data)
        }
    }
}

/// Encode a string as UTF16LE with a trailing NUL pair
pub(crate) fn encode_utf16_string(value: &str) -> Vec<u8> {
    let mut data: Vec<u8> = value.encode_utf16().flat_map(u16::to_le_bytes).collect();
    data.extend_from_slice(&[0, 0]);
    data
}

/// Get a UTF8 string from provided bytes data. Invalid UTF8 is replaced
pub(crate) fn extract_utf8_string(data: &[u8]) -> String {
    let result = String::from_utf8_lossy(data);
    result.trim_end_matches('\0').to_string()
}
