/**
 * Link table values and group membership.
 *
 * Explicit members are stored in the link_table. Primary group membership is not linked,
 * it is derived from the primaryGroupID attribute and the SID of the group
 */
use super::{
    directory::NtdsDirectory,
    enumerator::{DirectoryIter, DirectoryQuery},
    error::NtdsError,
    object::DirectoryObject,
    schema::AttributeSchema,
    store::{BACKLINK_INDEX, DATA_TABLE, LINK_INDEX, LINK_TABLE, OBJECT_SID_INDEX},
    values::{AttributeValue, ObjectReference},
};
use crate::artifacts::os::windows::{
    ese::cursor::{KeyLimit, RangeType, SeekType},
    securitydescriptor::sid::{directory_sid_rid, replace_directory_sid_rid},
};
use log::warn;
use std::rc::Rc;

pub(crate) const MEMBER_ID: u32 = 31;
pub(crate) const MEMBER_OF_ID: u32 = 131174;
pub(crate) const OBJECT_SID_ID: u32 = 589970;
pub(crate) const PRIMARY_GROUP_ID: u32 = 589922;

/// Get references to every target of a link attribute in index order
pub(crate) fn link_values(
    directory: &NtdsDirectory,
    source: &DirectoryObject,
    attribute: &AttributeSchema,
) -> Result<Vec<ObjectReference>, NtdsError> {
    if !attribute.is_link() {
        return Err(NtdsError::AttributeNotFound);
    }

    let store = directory.store();
    let (index, target) = if attribute.is_backlink() {
        (BACKLINK_INDEX, store.links.link_dnt)
    } else {
        (LINK_INDEX, store.links.backlink_dnt)
    };
    let base = attribute.link_base();

    let mut cursor = store.open_index(LINK_TABLE, index)?;
    cursor.make_key_i32(source.dnt() as i32, true, KeyLimit::Exact)?;
    cursor.make_key_i32(base, false, KeyLimit::StartLimit)?;
    let mut references = Vec::new();
    if !cursor.seek(SeekType::GreaterOrEqual)? {
        return Ok(references);
    }
    cursor.make_key_i32(source.dnt() as i32, true, KeyLimit::Exact)?;
    cursor.make_key_i32(base, false, KeyLimit::EndLimit)?;
    if !cursor.set_index_range(RangeType::Inclusive)? {
        return Ok(references);
    }

    loop {
        match cursor.read_i32(target) {
            Ok(Some(value)) => references.push(ObjectReference::new(value as u32)),
            Ok(None) => warn!("[ntds] Link row without a target. Skipping"),
            Err(err) => warn!("[ntds] Could not read link target: {err:?}"),
        }
        if !cursor.move_next()? {
            break;
        }
    }
    Ok(references)
}

fn schema_attribute(directory: &NtdsDirectory, id: u32) -> Result<&AttributeSchema, NtdsError> {
    match directory
        .schema()
        .attribute_by_id(id)
        .and_then(|attribute| attribute.attribute_schema())
    {
        Some(result) => Ok(result),
        None => {
            warn!("[ntds] Schema has no attribute {id}");
            Err(NtdsError::AttributeNotFound)
        }
    }
}

/// Raw objectSid of an object
fn raw_sid(directory: &NtdsDirectory, object: &DirectoryObject) -> Result<Option<Vec<u8>>, NtdsError> {
    let attribute = schema_attribute(directory, OBJECT_SID_ID)?;
    match directory.read_attribute(object, attribute, 1, false)? {
        Some(AttributeValue::Binary(data)) if !data.is_empty() => Ok(Some(data)),
        _ => Ok(None),
    }
}

/// Members of a group. Objects using the group as primary group come first, then the member links
pub(crate) fn members<'a>(
    directory: &'a NtdsDirectory,
    group: &DirectoryObject,
) -> Result<impl Iterator<Item = Result<Rc<DirectoryObject>, NtdsError>> + 'a, NtdsError> {
    let member = schema_attribute(directory, MEMBER_ID)?;
    let links = DirectoryQuery::Links {
        source: group.dnt(),
        link_id: member.link_id,
    };

    let primary = match raw_sid(directory, group)?.and_then(|sid| directory_sid_rid(&sid)) {
        Some(rid) => DirectoryQuery::PrimaryGroup(rid),
        None => DirectoryQuery::Empty,
    };

    let store = directory.store();
    Ok(DirectoryIter::new(store, primary).chain(DirectoryIter::new(store, links)))
}

/// Groups an object belongs to. Linked groups come first, then the primary group
pub(crate) fn member_of<'a>(
    directory: &'a NtdsDirectory,
    member: &DirectoryObject,
) -> Result<impl Iterator<Item = Result<Rc<DirectoryObject>, NtdsError>> + 'a, NtdsError> {
    let member_of = schema_attribute(directory, MEMBER_OF_ID)?;
    let links = DirectoryIter::new(
        directory.store(),
        DirectoryQuery::Links {
            source: member.dnt(),
            link_id: member_of.link_id,
        },
    );

    let primary_group = primary_group(directory, member)?;
    Ok(links.chain(primary_group.into_iter().map(Ok)))
}

/// Find the primary group by replacing the RID of the object SID with primaryGroupID
fn primary_group(
    directory: &NtdsDirectory,
    member: &DirectoryObject,
) -> Result<Option<Rc<DirectoryObject>>, NtdsError> {
    let attribute = schema_attribute(directory, PRIMARY_GROUP_ID)?;
    let group_id = match directory.read_attribute(member, attribute, 1, false)? {
        Some(AttributeValue::Integer(value)) => value as u32,
        _ => return Ok(None),
    };
    let Some(sid) = raw_sid(directory, member)? else {
        return Ok(None);
    };
    let Some(group_sid) = replace_directory_sid_rid(&sid, group_id) else {
        warn!("[ntds] Could not build primary group SID for {}", member.dnt());
        return Ok(None);
    };

    let store = directory.store();
    let mut cursor = store.open_index(DATA_TABLE, OBJECT_SID_INDEX)?;
    cursor.make_key(&group_sid, true, KeyLimit::Exact)?;
    if !cursor.seek(SeekType::Equal)? {
        warn!("[ntds] Primary group {group_id} of {} not found", member.dnt());
        return Ok(None);
    }
    store.materialize(&*cursor).map(Some)
}
