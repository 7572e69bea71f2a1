use crate::utils::nom_helper::{nom_unsigned_two_bytes, Endian};

/// Pages of 16KB or more use wider tag offsets and keep the tag flags in the entry data
pub(crate) const LARGE_PAGE_SIZE: usize = 16384;

#[derive(Debug, PartialEq)]
pub(crate) struct PageTag {
    pub(crate) offset: u16,
    pub(crate) value_size: u16,
    pub(crate) flags: Vec<TagFlags>,
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub(crate) enum TagFlags {
    Value,
    Defunct,
    CommonKey,
}

impl PageTag {
    /// Get the tags at the end of a page
    pub(crate) fn parse_tags(data: &[u8], page_size: usize) -> nom::IResult<&[u8], Vec<PageTag>> {
        let mut tags: Vec<PageTag> = Vec::new();
        let mut tag_data = data;

        let bit_adjust = if page_size >= LARGE_PAGE_SIZE {
            0x7fff
        } else {
            0x1fff
        };
        while !tag_data.is_empty() {
            let (input, value_size) = nom_unsigned_two_bytes(tag_data, Endian::Le)?;
            let (input, offset) = nom_unsigned_two_bytes(input, Endian::Le)?;

            let flags = if page_size >= LARGE_PAGE_SIZE {
                Vec::new()
            } else {
                PageTag::get_flags(offset)
            };
            tags.push(PageTag {
                offset: offset & bit_adjust,
                value_size: value_size & bit_adjust,
                flags,
            });
            tag_data = input;
        }

        // Tags are stored last to first
        tags.reverse();
        Ok((tag_data, tags))
    }

    /// Tag flags live in the upper three bits
    pub(crate) fn get_flags(value: u16) -> Vec<TagFlags> {
        let flag_check = 13;
        let flag = value >> flag_check;

        let mut flags = Vec::new();
        if flag & 0x1 != 0 {
            flags.push(TagFlags::Value);
        }
        if flag & 0x2 != 0 {
            flags.push(TagFlags::Defunct);
        }
        if flag & 0x4 != 0 {
            flags.push(TagFlags::CommonKey);
        }
        flags
    }
}
