use super::{
    error::NtdsError,
    object::DirectoryObject,
    store::{
        RecordStore, ANCESTORS_INDEX, BACKLINK_INDEX, DATA_TABLE, DNT_INDEX, LINK_INDEX,
        LINK_TABLE, PARENT_NAME_INDEX, PRIMARY_GROUP_INDEX,
    },
};
use crate::artifacts::os::windows::ese::cursor::{
    ColumnId, EseCursor, KeyLimit, RangeType, SeekType,
};
use log::warn;
use std::rc::Rc;

/// Index range walked by a `DirectoryIter`
#[derive(Debug, Clone)]
pub(crate) enum DirectoryQuery {
    /// The single row with the DNT
    Object(u32),
    /// Rows whose PDNT equals the value
    Children(u32),
    /// Rows whose ancestry starts with the bytes. Empty ancestry matches nothing
    Subtree(Vec<u8>),
    /// Rows whose primaryGroupID equals the RID
    PrimaryGroup(u32),
    /// Targets of a link or backlink attribute
    Links { source: u32, link_id: i32 },
    Empty,
}

/**
 * Lazy sequence of directory objects backed by one cursor.  
 * The cursor is opened on the first call to `next` and dropped as soon as the range ends,
 * an error is returned or the iterator itself is dropped
 */
pub struct DirectoryIter<'a> {
    store: &'a RecordStore,
    query: DirectoryQuery,
    cursor: Option<Box<dyn EseCursor>>,
    target_column: Option<ColumnId>,
    finished: bool,
}

/// Smallest byte string greater than every string starting with `prefix`. `None` if there is none
pub(crate) fn prefix_successor(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut limit = prefix.to_vec();
    while let Some(last) = limit.pop() {
        if last < u8::MAX {
            limit.push(last + 1);
            return Some(limit);
        }
    }
    None
}

impl<'a> DirectoryIter<'a> {
    pub(crate) fn new(store: &'a RecordStore, query: DirectoryQuery) -> DirectoryIter<'a> {
        DirectoryIter {
            store,
            query,
            cursor: None,
            target_column: None,
            finished: false,
        }
    }

    /// Open the cursor and position it on the first row of the range
    fn start(&mut self) -> Result<bool, NtdsError> {
        let (cursor, positioned) = match &self.query {
            DirectoryQuery::Empty => return Ok(false),
            DirectoryQuery::Object(dnt) => {
                let mut cursor = self.store.open_index(DATA_TABLE, DNT_INDEX)?;
                cursor.make_key_i32(*dnt as i32, true, KeyLimit::Exact)?;
                let mut positioned = cursor.seek(SeekType::Equal)?;
                if positioned {
                    cursor.make_key_i32(*dnt as i32, true, KeyLimit::Exact)?;
                    positioned = cursor.set_index_range(RangeType::Inclusive)?;
                }
                (cursor, positioned)
            }
            DirectoryQuery::Subtree(ancestry) if ancestry.is_empty() => return Ok(false),
            DirectoryQuery::Children(parent) => {
                let mut cursor = self.store.open_index(DATA_TABLE, PARENT_NAME_INDEX)?;
                cursor.make_key_i32(*parent as i32, true, KeyLimit::StartLimit)?;
                let mut positioned = cursor.seek(SeekType::GreaterOrEqual)?;
                if positioned {
                    cursor.make_key_i32(*parent as i32, true, KeyLimit::EndLimit)?;
                    positioned = cursor.set_index_range(RangeType::Inclusive)?;
                }
                (cursor, positioned)
            }
            DirectoryQuery::Subtree(ancestry) => {
                let mut cursor = self.store.open_index(DATA_TABLE, ANCESTORS_INDEX)?;
                cursor.make_key(ancestry, true, KeyLimit::Exact)?;
                let mut positioned = cursor.seek(SeekType::GreaterOrEqual)?;
                if positioned {
                    if let Some(limit) = prefix_successor(ancestry) {
                        cursor.make_key(&limit, true, KeyLimit::Exact)?;
                        positioned = cursor.set_index_range(RangeType::Exclusive)?;
                    }
                }
                (cursor, positioned)
            }
            DirectoryQuery::PrimaryGroup(rid) => {
                let mut cursor = self.store.open_index(DATA_TABLE, PRIMARY_GROUP_INDEX)?;
                cursor.make_key_i32(*rid as i32, true, KeyLimit::Exact)?;
                let mut positioned = cursor.seek(SeekType::GreaterOrEqual)?;
                if positioned {
                    cursor.make_key_i32(*rid as i32, true, KeyLimit::Exact)?;
                    positioned = cursor.set_index_range(RangeType::Inclusive)?;
                }
                (cursor, positioned)
            }
            DirectoryQuery::Links { source, link_id } => {
                let backlink = link_id % 2 != 0;
                let base = link_id / 2;
                let (index, target) = if backlink {
                    (BACKLINK_INDEX, self.store.links.link_dnt)
                } else {
                    (LINK_INDEX, self.store.links.backlink_dnt)
                };
                self.target_column = Some(target);

                let mut cursor = self.store.open_index(LINK_TABLE, index)?;
                cursor.make_key_i32(*source as i32, true, KeyLimit::Exact)?;
                cursor.make_key_i32(base, false, KeyLimit::StartLimit)?;
                let mut positioned = cursor.seek(SeekType::GreaterOrEqual)?;
                if positioned {
                    cursor.make_key_i32(*source as i32, true, KeyLimit::Exact)?;
                    cursor.make_key_i32(base, false, KeyLimit::EndLimit)?;
                    positioned = cursor.set_index_range(RangeType::Inclusive)?;
                }
                (cursor, positioned)
            }
        };

        if !positioned {
            return Ok(false);
        }
        self.cursor = Some(cursor);
        Ok(true)
    }

    /// Materialize the current row. `None` skips the row
    fn current(&self) -> Result<Option<Rc<DirectoryObject>>, NtdsError> {
        let Some(cursor) = self.cursor.as_deref() else {
            return Ok(None);
        };
        let Some(target_column) = self.target_column else {
            return self.store.materialize(cursor).map(Some);
        };

        match cursor.read_i32(target_column)? {
            Some(target) => self.store.get_by_dnt(target as u32).map(Some),
            None => {
                warn!("[ntds] Link row without a target. Skipping");
                Ok(None)
            }
        }
    }

    fn finish(&mut self) {
        self.cursor = None;
        self.finished = true;
    }
}

impl Iterator for DirectoryIter<'_> {
    type Item = Result<Rc<DirectoryObject>, NtdsError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.finished {
                return None;
            }

            let positioned = if self.cursor.is_none() {
                self.start()
            } else if let Some(cursor) = self.cursor.as_mut() {
                cursor.move_next().map_err(NtdsError::from)
            } else {
                Ok(false)
            };

            match positioned {
                Ok(true) => {}
                Ok(false) => {
                    self.finish();
                    return None;
                }
                Err(err) => {
                    self.finish();
                    return Some(Err(err));
                }
            }

            match self.current() {
                Ok(Some(object)) => return Some(Ok(object)),
                Ok(None) => continue,
                Err(err) => {
                    self.finish();
                    return Some(Err(err));
                }
            }
        }
    }
}
