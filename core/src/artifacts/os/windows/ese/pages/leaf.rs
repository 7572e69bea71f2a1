use crate::{
    artifacts::os::windows::ese::tags::TagFlags,
    utils::nom_helper::{nom_unsigned_two_bytes, Endian},
};
use nom::bytes::complete::take;

/// Key sizes share their first two bytes with the large page tag flags
const KEY_SIZE_MASK: u16 = 0x1fff;

#[derive(Debug, PartialEq)]
pub(crate) struct PageLeaf {
    /**Common key prefix taken from the page external header followed by the local key */
    pub(crate) key: Vec<u8>,
    pub(crate) leaf_data: Vec<u8>,
}

impl PageLeaf {
    /// Parse a leaf entry. `external_key` is the data of tag 0 on the page
    pub(crate) fn parse_leaf_page<'a>(
        data: &'a [u8],
        external_key: &[u8],
        tag_flags: &[TagFlags],
    ) -> nom::IResult<&'a [u8], PageLeaf> {
        let (input, key) = parse_entry_key(data, external_key, tag_flags)?;
        let leaf = PageLeaf {
            key,
            leaf_data: input.to_vec(),
        };
        Ok((&input[input.len()..], leaf))
    }
}

/// Rebuild the full key of a page entry
pub(crate) fn parse_entry_key<'a>(
    data: &'a [u8],
    external_key: &[u8],
    tag_flags: &[TagFlags],
) -> nom::IResult<&'a [u8], Vec<u8>> {
    let mut key = Vec::new();
    let mut input = data;
    if tag_flags.contains(&TagFlags::CommonKey) {
        let (remaining, common_size) = nom_unsigned_two_bytes(input, Endian::Le)?;
        let common_size = ((common_size & KEY_SIZE_MASK) as usize).min(external_key.len());
        key.extend_from_slice(&external_key[..common_size]);
        input = remaining;
    }

    let (input, local_size) = nom_unsigned_two_bytes(input, Endian::Le)?;
    let (input, local_key) = take(local_size & KEY_SIZE_MASK)(input)?;
    key.extend_from_slice(local_key);
    Ok((input, key))
}

#[cfg(test)]
mod tests {
    use super::{parse_entry_key, PageLeaf};
    use crate::artifacts::os::windows::ese::tags::TagFlags;

    #[test]
    fn test_parse_leaf_page() {
        let test = [2, 0, 0x7f, 0x80, 9, 8, 7];
        let (_, result) = PageLeaf::parse_leaf_page(&test, &[], &[]).unwrap();
        assert_eq!(result.key, vec![0x7f, 0x80]);
        assert_eq!(result.leaf_data, vec![9, 8, 7]);
    }

    #[test]
    fn test_parse_common_key() {
        let test = [3, 0x80, 1, 0, 4, 0xaa];
        let (input, key) = parse_entry_key(&test, &[1, 2, 3, 4], &[TagFlags::CommonKey]).unwrap();
        assert_eq!(key, vec![1, 2, 3, 4]);
        assert_eq!(input, [0xaa]);
    }

    #[test]
    fn test_parse_truncated_key() {
        let test = [5, 0, 1];
        assert!(parse_entry_key(&test, &[], &[]).is_err());
    }
}
