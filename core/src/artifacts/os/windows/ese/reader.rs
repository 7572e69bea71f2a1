use super::{
    error::EseError,
    header::{EseHeader, HEADER_SIZE},
    page::{PageFlags, PageHeader},
    pages::{branch::BranchPage, leaf::PageLeaf},
};
use crate::filesystem::files::read_bytes;
use log::{error, warn};
use std::{
    collections::{BTreeMap, HashSet},
    io::{Read, Seek},
};

const PAGE_SIZES: [u32; 5] = [2048, 4096, 8192, 16384, 32768];

/// Page based reader over an ESE database file
pub(crate) struct EseReader<T: Read + Seek> {
    reader: T,
    pub(crate) page_size: u32,
}

impl<T: Read + Seek> EseReader<T> {
    pub(crate) fn new(mut reader: T) -> Result<EseReader<T>, EseError> {
        let header_data = match read_bytes(0, HEADER_SIZE, &mut reader) {
            Ok(result) => result,
            Err(err) => {
                error!("[ese] Could not read database header: {err:?}");
                return Err(EseError::OpenDatabase);
            }
        };
        let header = match EseHeader::parse_header(&header_data) {
            Ok((_, result)) => result,
            Err(err) => {
                error!("[ese] Could not parse database header: {err:?}");
                return Err(EseError::BadDatabase);
            }
        };
        if !PAGE_SIZES.contains(&header.page_size) {
            error!("[ese] Unsupported page size {}", header.page_size);
            return Err(EseError::BadDatabase);
        }

        Ok(EseReader {
            reader,
            page_size: header.page_size,
        })
    }

    /// Page numbers start after the two header pages
    fn read_page(&mut self, page_number: u32) -> Result<Vec<u8>, EseError> {
        let offset = (page_number as u64 + 1) * self.page_size as u64;
        match read_bytes(offset, self.page_size as u64, &mut self.reader) {
            Ok(result) => Ok(result),
            Err(err) => {
                error!("[ese] Could not read page {page_number}: {err:?}");
                Err(EseError::BadPage)
            }
        }
    }

    /// Walk a B-tree from its root page and return the leaf entries in key order
    pub(crate) fn tree_entries(&mut self, root: u32) -> Result<Vec<PageLeaf>, EseError> {
        let mut entries = Vec::new();
        let mut visited = HashSet::new();
        self.walk_page(root, &mut visited, &mut entries)?;
        Ok(entries)
    }

    /// Long value tree entries keyed by the full leaf key
    pub(crate) fn long_values(&mut self, root: u32) -> Result<BTreeMap<Vec<u8>, Vec<u8>>, EseError> {
        let entries = self.tree_entries(root)?;
        Ok(entries
            .into_iter()
            .map(|leaf| (leaf.key, leaf.leaf_data))
            .collect())
    }

    fn walk_page(
        &mut self,
        page_number: u32,
        visited: &mut HashSet<u32>,
        entries: &mut Vec<PageLeaf>,
    ) -> Result<(), EseError> {
        if !visited.insert(page_number) {
            warn!("[ese] Page {page_number} already visited. Tree has a cycle");
            return Ok(());
        }

        let page = self.read_page(page_number)?;
        let (page_data, header) = match PageHeader::parse_header(&page) {
            Ok(result) => result,
            Err(err) => {
                error!("[ese] Could not parse page {page_number} header: {err:?}");
                return Err(EseError::BadPage);
            }
        };
        if header.page_flags.contains(&PageFlags::Empty) {
            return Ok(());
        }

        let external_key: &[u8] = match header.page_tags.first() {
            Some(tag) => PageHeader::tag_data(page_data, tag)
                .map(|(_, data)| data)
                .unwrap_or_default(),
            None => &[],
        };

        let mut children = Vec::new();
        for tag in header.live_tags() {
            let data = match PageHeader::tag_data(page_data, tag) {
                Ok((_, result)) => result,
                Err(err) => {
                    warn!("[ese] Tag outside of page {page_number}: {err:?}");
                    continue;
                }
            };

            if header.is_leaf() {
                match PageLeaf::parse_leaf_page(data, external_key, &tag.flags) {
                    Ok((_, leaf)) => entries.push(leaf),
                    Err(err) => warn!("[ese] Skipping bad leaf entry on page {page_number}: {err:?}"),
                }
                continue;
            }
            match BranchPage::parse_branch_page(data, external_key, &tag.flags) {
                Ok((_, branch)) => children.push(branch.child_page),
                Err(err) => warn!("[ese] Skipping bad branch entry on page {page_number}: {err:?}"),
            }
        }

        for child in children {
            if let Err(err) = self.walk_page(child, visited, entries) {
                warn!("[ese] Skipping child page {child} of page {page_number}: {err:?}");
            }
        }
        Ok(())
    }
}

/// Lay out 8KB pages as they sit in a database file
#[cfg(test)]
pub(crate) fn test_file(pages: &[(u32, Vec<u8>)]) -> Vec<u8> {
    let page_size = 8192;
    let last = pages.iter().map(|(number, _)| *number).max().unwrap_or_default();
    let mut file = vec![0u8; (last as usize + 2) * page_size];
    let header = super::header::test_header(page_size as u32);
    file[..header.len()].copy_from_slice(&header);
    for (number, page) in pages {
        let offset = (*number as usize + 1) * page_size;
        file[offset..offset + page_size].copy_from_slice(page);
    }
    file
}

#[cfg(test)]
pub(crate) fn leaf_entry(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut entry = (key.len() as u16).to_le_bytes().to_vec();
    entry.extend_from_slice(key);
    entry.extend_from_slice(data);
    entry
}

#[cfg(test)]
pub(crate) fn branch_entry(key: &[u8], child: u32) -> Vec<u8> {
    leaf_entry(key, &child.to_le_bytes())
}
