use super::leaf::parse_entry_key;
use crate::{
    artifacts::os::windows::ese::tags::TagFlags,
    utils::nom_helper::{nom_unsigned_four_bytes, Endian},
};

#[derive(Debug, PartialEq)]
pub(crate) struct BranchPage {
    pub(crate) key: Vec<u8>,
    pub(crate) child_page: u32,
}

impl BranchPage {
    /// Parse a branch entry. The child page follows the key
    pub(crate) fn parse_branch_page<'a>(
        data: &'a [u8],
        external_key: &[u8],
        tag_flags: &[TagFlags],
    ) -> nom::IResult<&'a [u8], BranchPage> {
        let (input, key) = parse_entry_key(data, external_key, tag_flags)?;
        let (input, child_page) = nom_unsigned_four_bytes(input, Endian::Le)?;
        Ok((input, BranchPage { key, child_page }))
    }
}
