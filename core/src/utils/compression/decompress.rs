use super::error::CompressionError;

/// Expand seven bit packed ASCII. Each input byte carries bits of the next output character
pub(crate) fn decompress_seven_bit(data: &[u8]) -> Vec<u8> {
    let mut decompressed_data: Vec<u8> = Vec::new();
    let mut index: u16 = 0;
    let mut bit_value: u16 = 0;

    let max_value = 7;
    let bit_op = 0x7f;

    for value in data {
        bit_value |= (*value as u16) << index;
        decompressed_data.push((bit_value & bit_op) as u8);
        bit_value >>= max_value;

        index += 1;

        if index == max_value {
            decompressed_data.push((bit_value & bit_op) as u8);
            bit_value >>= max_value;
            index = 0;
        }
    }
    decompressed_data
}

/// Decompress plain LZ77 (XPRESS) data
pub(crate) fn decompress_lz77(data: &[u8], size_hint: usize) -> Result<Vec<u8>, CompressionError> {
    let mut out: Vec<u8> = Vec::with_capacity(size_hint);
    let mut flags: u32 = 0;
    let mut flag_count = 0;
    let mut position = 0;
    let mut last_half_byte: Option<usize> = None;

    let byte_at = |offset: usize| data.get(offset).copied().ok_or(CompressionError::Lz77Truncated);
    let word_at = |offset: usize| match data.get(offset..offset + 2) {
        Some(bytes) => Ok(u16::from_le_bytes([bytes[0], bytes[1]]) as u32),
        None => Err(CompressionError::Lz77Truncated),
    };

    loop {
        if flag_count == 0 {
            flags = match data.get(position..position + 4) {
                Some(bytes) => u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
                None => return Ok(out),
            };
            position += 4;
            flag_count = 32;
        }
        flag_count -= 1;

        if flags & (1 << flag_count) == 0 {
            if position == data.len() {
                return Ok(out);
            }
            out.push(byte_at(position)?);
            position += 1;
            continue;
        }

        if position == data.len() {
            return Ok(out);
        }
        let match_bytes = word_at(position)?;
        position += 2;
        let mut match_length = match_bytes % 8;
        let match_offset = (match_bytes / 8) as usize + 1;
        if match_length == 7 {
            match last_half_byte.take() {
                None => {
                    match_length = byte_at(position)? as u32 % 16;
                    last_half_byte = Some(position);
                    position += 1;
                }
                Some(offset) => match_length = byte_at(offset)? as u32 / 16,
            }
            if match_length == 15 {
                match_length = byte_at(position)? as u32;
                position += 1;
                if match_length == 255 {
                    match_length = word_at(position)?;
                    position += 2;
                    if match_length < 22 {
                        return Err(CompressionError::Lz77BadLength);
                    }
                    match_length -= 22;
                }
                match_length += 15;
            }
            match_length += 7;
        }
        match_length += 3;

        if match_offset > out.len() {
            return Err(CompressionError::Lz77BadLength);
        }
        for _ in 0..match_length {
            out.push(out[out.len() - match_offset]);
        }
    }
}
