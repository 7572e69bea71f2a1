use crate::utils::nom_helper::{nom_unsigned_four_bytes, nom_unsigned_one_byte, Endian};
use byteorder::{BigEndian, ReadBytesExt};
use nom::bytes::complete::take;

/// Revision, sub-authority count and the 48-bit identifier authority
const SID_HEADER_SIZE: usize = 8;

/**
 * Parse the data into a properly formatted SID
 */
pub(crate) fn grab_sid(data: &[u8]) -> nom::IResult<&[u8], String> {
    let (input, sid_revision) = nom_unsigned_one_byte(data, Endian::Le)?;
    let (input, subauthorities) = nom_unsigned_one_byte(input, Endian::Le)?;
    let authority_size: usize = 6;
    let (mut sid_data, mut authority) = take(authority_size)(input)?;

    let auth = authority.read_i48::<BigEndian>().unwrap_or(0);
    let mut windows_sid = format!("S-{sid_revision}-{auth}");
    for _ in 0..subauthorities {
        let (sub_data, subauth_sid) = nom_unsigned_four_bytes(sid_data, Endian::Le)?;
        windows_sid += &format!("-{subauth_sid}");
        sid_data = sub_data;
    }

    Ok((sid_data, windows_sid))
}

/// Size of a SID with the provided sub-authority count
fn sid_size(data: &[u8]) -> Option<usize> {
    let count = *data.get(1)? as usize;
    let size = SID_HEADER_SIZE + count * 4;
    if count == 0 || data.len() < size {
        return None;
    }
    Some(size)
}

/**
 * NTDS stores the final sub-authority (RID) big endian.  
 * Reverse it to get a standard little endian SID
 */
pub(crate) fn directory_sid_to_sid(data: &[u8]) -> Option<Vec<u8>> {
    let size = sid_size(data)?;
    let mut sid = data[..size].to_vec();
    sid[size - 4..].reverse();
    Some(sid)
}

/// The reverse of `directory_sid_to_sid`. The layout change is symmetric
pub(crate) fn sid_to_directory_sid(data: &[u8]) -> Option<Vec<u8>> {
    directory_sid_to_sid(data)
}

/// Format a SID stored in NTDS as `S-1-...`
pub(crate) fn directory_sid_string(data: &[u8]) -> Option<String> {
    let sid = directory_sid_to_sid(data)?;
    let (_, value) = grab_sid(&sid).ok()?;
    Some(value)
}

/// Get the RID of a SID stored in NTDS
pub(crate) fn directory_sid_rid(data: &[u8]) -> Option<u32> {
    let size = sid_size(data)?;
    let rid: [u8; 4] = data[size - 4..size].try_into().ok()?;
    Some(u32::from_be_bytes(rid))
}

/// Replace the RID of a SID stored in NTDS. Used to find primary groups by SID
pub(crate) fn replace_directory_sid_rid(data: &[u8], rid: u32) -> Option<Vec<u8>> {
    let size = sid_size(data)?;
    let mut sid = data[..size].to_vec();
    sid[size - 4..].copy_from_slice(&rid.to_be_bytes());
    Some(sid)
}

/// Convert a `S-1-...` string into standard SID bytes
pub(crate) fn sid_string_to_bytes(value: &str) -> Option<Vec<u8>> {
    let mut parts = value.split('-');
    if !parts.next()?.eq_ignore_ascii_case("s") {
        return None;
    }
    let revision: u8 = parts.next()?.parse().ok()?;
    let authority: u64 = parts.next()?.parse().ok()?;
    if authority > 0xffffffffffff {
        return None;
    }

    let mut sub_authorities = Vec::new();
    for part in parts {
        sub_authorities.push(part.parse::<u32>().ok()?);
    }
    if sub_authorities.is_empty() || sub_authorities.len() > 15 {
        return None;
    }

    let mut data = vec![revision, sub_authorities.len() as u8];
    data.extend_from_slice(&authority.to_be_bytes()[2..]);
    for sub in sub_authorities {
        data.extend_from_slice(&sub.to_le_bytes());
    }
    Some(data)
}
