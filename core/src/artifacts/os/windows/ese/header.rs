use crate::utils::nom_helper::{nom_unsigned_four_bytes, Endian};
use log::error;
use nom::{bytes::complete::take, error::ErrorKind};

/// ESE file signature found at offset 4 of the database header
pub(crate) const ESE_SIGNATURE: u32 = 2309737967;
/// Bytes needed to read the page size from the header
pub(crate) const HEADER_SIZE: u64 = 240;

#[derive(Debug, PartialEq)]
pub(crate) struct EseHeader {
    pub(crate) checksum: u32,
    pub(crate) file_format_version: u32,
    pub(crate) file_type: FileType,
    pub(crate) file_format_revision: u32,
    pub(crate) page_size: u32,
}

#[derive(Debug, PartialEq)]
pub(crate) enum FileType {
    Database,
    Stream,
    Unknown,
}

impl EseHeader {
    /// Parse the start of the database header. This gets us the `page size`
    pub(crate) fn parse_header(data: &[u8]) -> nom::IResult<&[u8], EseHeader> {
        let (input, checksum) = nom_unsigned_four_bytes(data, Endian::Le)?;
        let (input, signature) = nom_unsigned_four_bytes(input, Endian::Le)?;
        if signature != ESE_SIGNATURE {
            error!("[ese] Not an ESE file");
            return Err(nom::Err::Failure(nom::error::Error::new(
                input,
                ErrorKind::Fail,
            )));
        }
        let (input, file_format_version) = nom_unsigned_four_bytes(input, Endian::Le)?;
        let (input, file_type) = nom_unsigned_four_bytes(input, Endian::Le)?;

        // Skip database time, signatures, state, log positions and backup info
        let revision_offset: u8 = 216;
        let (input, _) = take(revision_offset)(input)?;
        let (input, file_format_revision) = nom_unsigned_four_bytes(input, Endian::Le)?;
        let (input, page_size) = nom_unsigned_four_bytes(input, Endian::Le)?;

        let header = EseHeader {
            checksum,
            file_format_version,
            file_type: match file_type {
                0 => FileType::Database,
                1 => FileType::Stream,
                _ => FileType::Unknown,
            },
            file_format_revision,
            page_size,
        };
        Ok((input, header))
    }

    /// Check whether data starts with an ESE database header
    pub(crate) fn is_ese(data: &[u8]) -> bool {
        let signature_data = match data.get(4..8) {
            Some(result) => result,
            None => return false,
        };
        match nom_unsigned_four_bytes(signature_data, Endian::Le) {
            Ok((_, signature)) => signature == ESE_SIGNATURE,
            Err(_) => false,
        }
    }
}

#[cfg(test)]
pub(crate) fn test_header(page_size: u32) -> Vec<u8> {
    let mut data = vec![0; HEADER_SIZE as usize];
    data[4..8].copy_from_slice(&ESE_SIGNATURE.to_le_bytes());
    data[8..12].copy_from_slice(&0x620u32.to_le_bytes());
    data[232..236].copy_from_slice(&0x14u32.to_le_bytes());
    data[236..240].copy_from_slice(&page_size.to_le_bytes());
    data
}
