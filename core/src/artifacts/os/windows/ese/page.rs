use super::tags::{PageTag, TagFlags, LARGE_PAGE_SIZE};
use crate::utils::nom_helper::{nom_unsigned_four_bytes, nom_unsigned_two_bytes, Endian};
use nom::bytes::complete::take;

/**
 * Page header structure for ESE Windows 7+.
 * Older small page headers share the same layout for the fields read here
 */
#[derive(Debug, PartialEq)]
pub(crate) struct PageHeader {
    pub(crate) previous_page_number: u32,
    pub(crate) next_page_number: u32,
    pub(crate) father_data_page: u32,
    pub(crate) first_available_page_tag: u16,
    pub(crate) page_flags: Vec<PageFlags>,
    pub(crate) page_tags: Vec<PageTag>,
}

#[derive(Debug, PartialEq)]
pub(crate) enum PageFlags {
    Root,
    Leaf,
    ParentBranch,
    Empty,
    SpaceTree,
    Index,
    LongValue,
}

impl PageHeader {
    /// Parse the page header and tags. Returns the page data that tag offsets are relative to
    pub(crate) fn parse_header(data: &[u8]) -> nom::IResult<&[u8], PageHeader> {
        // Checksum and database time
        let (input, _) = take(16_u8)(data)?;
        let (input, previous_page_number) = nom_unsigned_four_bytes(input, Endian::Le)?;
        let (input, next_page_number) = nom_unsigned_four_bytes(input, Endian::Le)?;
        let (input, father_data_page) = nom_unsigned_four_bytes(input, Endian::Le)?;
        // Available data size, uncommitted size and first available data offset
        let (input, _) = take(6_u8)(input)?;
        let (input, mut first_available_page_tag) = nom_unsigned_two_bytes(input, Endian::Le)?;
        let (mut page_data, page_flags) = nom_unsigned_four_bytes(input, Endian::Le)?;

        // Newer versions may keep flags in the upper bits of the tag count
        let tag_size = 4;
        if first_available_page_tag as usize * tag_size > data.len() {
            first_available_page_tag &= 0xfff;
        }

        let large_page = data.len() >= LARGE_PAGE_SIZE;
        if large_page {
            // Extended checksums and page number
            let (input, _) = take(40_u8)(page_data)?;
            page_data = input;
        }

        let tag_data = first_available_page_tag as usize * tag_size;
        if tag_data > data.len() {
            return Err(nom::Err::Failure(nom::error::Error::new(
                page_data,
                nom::error::ErrorKind::Eof,
            )));
        }
        let (tag_start, _) = take(data.len() - tag_data)(data)?;
        let (_, mut page_tags) = PageTag::parse_tags(tag_start, data.len())?;

        // For large page sizes the tag flags are the upper bits of the first 2 bytes of the entry
        if large_page {
            for tag in page_tags.iter_mut() {
                if tag.value_size < 2 {
                    continue;
                }
                let (input, _) = take(tag.offset)(page_data)?;
                let (_, flags) = nom_unsigned_two_bytes(input, Endian::Le)?;
                tag.flags = PageTag::get_flags(flags);
            }
        }

        let header = PageHeader {
            previous_page_number,
            next_page_number,
            father_data_page,
            first_available_page_tag,
            page_flags: PageHeader::get_flags(page_flags),
            page_tags,
        };
        Ok((page_data, header))
    }

    /// Get the page flags
    fn get_flags(page_flags: u32) -> Vec<PageFlags> {
        let known = [
            (0x1, PageFlags::Root),
            (0x2, PageFlags::Leaf),
            (0x4, PageFlags::ParentBranch),
            (0x8, PageFlags::Empty),
            (0x20, PageFlags::SpaceTree),
            (0x40, PageFlags::Index),
            (0x80, PageFlags::LongValue),
        ];

        let mut flags = Vec::new();
        for (bit, flag) in known {
            if page_flags & bit == bit {
                flags.push(flag);
            }
        }
        flags
    }

    /// Data of the entry described by a tag
    pub(crate) fn tag_data<'a>(page_data: &'a [u8], tag: &PageTag) -> nom::IResult<&'a [u8], &'a [u8]> {
        let (input, _) = take(tag.offset)(page_data)?;
        take(tag.value_size)(input)
    }

    pub(crate) fn is_leaf(&self) -> bool {
        self.page_flags.contains(&PageFlags::Leaf)
    }

    /// Tags after the page external header that still hold data
    pub(crate) fn live_tags(&self) -> impl Iterator<Item = &PageTag> {
        self.page_tags
            .iter()
            .skip(1)
            .filter(|tag| !tag.flags.contains(&TagFlags::Defunct))
    }
}

/// Build a small (8KB) page for tests. Entries are `(tag flags, data)`, tag 0 is the external header
#[cfg(test)]
pub(crate) fn test_page(flags: u32, next_page: u32, entries: &[(u16, Vec<u8>)]) -> Vec<u8> {
    let page_size = 8192;
    let header_size = 40;
    let mut page = vec![0u8; page_size];
    page[20..24].copy_from_slice(&next_page.to_le_bytes());
    page[34..36].copy_from_slice(&(entries.len() as u16).to_le_bytes());
    page[36..40].copy_from_slice(&flags.to_le_bytes());

    let mut offset = 0;
    for (index, (tag_flags, data)) in entries.iter().enumerate() {
        let start = header_size + offset;
        page[start..start + data.len()].copy_from_slice(data);

        let tag_start = page_size - (index + 1) * 4;
        page[tag_start..tag_start + 2].copy_from_slice(&(data.len() as u16).to_le_bytes());
        let tag_offset = offset as u16 | (tag_flags << 13);
        page[tag_start + 2..tag_start + 4].copy_from_slice(&tag_offset.to_le_bytes());
        offset += data.len();
    }
    page
}
