use super::{
    error::WinArtifactError,
    ntds::{
        directory::NtdsDirectory,
        entries::{attribute_entry, class_entry, directory_entry},
        error::NtdsError,
        object::DirectoryObject,
    },
};
use crate::{artifacts::output::output_artifact, structs::toml::Output, structs::toml::Query};
use common::windows::DirectoryEntry;
use log::{error, warn};
use serde::Serialize;
use serde_json::Value;
use std::rc::Rc;

/// The root domain naming context
pub(crate) fn root(directory: &NtdsDirectory, query: &Query) -> Result<Value, WinArtifactError> {
    let attributes = query_attributes(directory, &query.attributes);
    let entry = match directory_entry(directory, directory.root_domain(), &attributes) {
        Ok(result) => result,
        Err(err) => {
            error!("[ntds] Could not read root domain: {err:?}");
            return Err(WinArtifactError::Query);
        }
    };
    serialize(&vec![entry])
}

/// Direct children of the object at the query path
pub(crate) fn children(directory: &NtdsDirectory, query: &Query) -> Result<Value, WinArtifactError> {
    let parent = query_object(directory, query)?;
    let attributes = query_attributes(directory, &query.attributes);
    let entries = collect_entries(directory, parent.children(directory), &attributes)?;
    serialize(&entries)
}

/// Every object below the query path, the path object included
pub(crate) fn subtree(directory: &NtdsDirectory, query: &Query) -> Result<Value, WinArtifactError> {
    let root = query_object(directory, query)?;
    let attributes = query_attributes(directory, &query.attributes);
    let entries = collect_entries(directory, directory.search_subtree(&root), &attributes)?;
    serialize(&entries)
}

/// ANR search below the query path with an optional class filter
pub(crate) fn search(directory: &NtdsDirectory, query: &Query) -> Result<Value, WinArtifactError> {
    let root = query_object(directory, query)?;
    let class = match &query.class {
        Some(name) => match directory.class(name) {
            Ok(result) => Some(result.as_ref()),
            Err(err) => {
                error!("[ntds] Unknown search class {name}: {err:?}");
                return Err(WinArtifactError::Query);
            }
        },
        None => None,
    };

    let results = match directory.search(
        &root,
        query.search.as_deref(),
        class,
        query.include_subclasses,
    ) {
        Ok(result) => result,
        Err(err) => {
            error!("[ntds] Could not start search: {err:?}");
            return Err(WinArtifactError::Query);
        }
    };
    let attributes = query_attributes(directory, &query.attributes);
    let entries = collect_entries(directory, results, &attributes)?;
    serialize(&entries)
}

/// The single object at the query path
pub(crate) fn object(directory: &NtdsDirectory, query: &Query) -> Result<Value, WinArtifactError> {
    let object = query_object(directory, query)?;
    let attributes = query_attributes(directory, &query.attributes);
    let entry = match directory_entry(directory, &object, &attributes) {
        Ok(result) => result,
        Err(err) => {
            error!("[ntds] Could not read object {}: {err:?}", object.dnt());
            return Err(WinArtifactError::Query);
        }
    };
    serialize(&vec![entry])
}

/// Members of the group at the query path
pub(crate) fn members(directory: &NtdsDirectory, query: &Query) -> Result<Value, WinArtifactError> {
    let group = query_object(directory, query)?;
    let results = match group.members(directory) {
        Ok(result) => result,
        Err(err) => {
            error!("[ntds] Could not get members of {}: {err:?}", group.dnt());
            return Err(WinArtifactError::Query);
        }
    };
    let attributes = query_attributes(directory, &query.attributes);
    let entries = collect_entries(directory, results, &attributes)?;
    serialize(&entries)
}

/// Groups the object at the query path belongs to
pub(crate) fn memberof(directory: &NtdsDirectory, query: &Query) -> Result<Value, WinArtifactError> {
    let member = query_object(directory, query)?;
    let results = match member.member_of(directory) {
        Ok(result) => result,
        Err(err) => {
            error!("[ntds] Could not get groups of {}: {err:?}", member.dnt());
            return Err(WinArtifactError::Query);
        }
    };
    let attributes = query_attributes(directory, &query.attributes);
    let entries = collect_entries(directory, results, &attributes)?;
    serialize(&entries)
}

/// Every class in the schema
pub(crate) fn classes(directory: &NtdsDirectory) -> Result<Value, WinArtifactError> {
    let entries: Vec<_> = directory
        .schema()
        .classes()
        .iter()
        .filter_map(|class| class_entry(directory, class))
        .collect();
    serialize(&entries)
}

/// Every attribute in the schema
pub(crate) fn attributes(directory: &NtdsDirectory) -> Result<Value, WinArtifactError> {
    let entries: Vec<_> = directory
        .schema()
        .attributes()
        .iter()
        .filter_map(|attribute| attribute_entry(attribute))
        .collect();
    serialize(&entries)
}

/// Output query results
pub(crate) fn output_data(
    serde_data: &Value,
    output_name: &str,
    output: &Output,
    start_time: &u64,
) -> Result<(), WinArtifactError> {
    match output_artifact(serde_data, output_name, output, start_time) {
        Ok(_) => Ok(()),
        Err(err) => {
            error!("[ntds] Failed to output {output_name} data: {err:?}");
            Err(WinArtifactError::Output)
        }
    }
}

/**
 * Walk child names separated by `/` starting at the root domain.
 * An absent or empty path is the root domain itself
 */
pub(crate) fn resolve_path(
    directory: &NtdsDirectory,
    path: Option<&str>,
) -> Result<Rc<DirectoryObject>, NtdsError> {
    let mut object = directory.root_domain().clone();
    let Some(names) = path else {
        return Ok(object);
    };

    for name in names.split('/').filter(|name| !name.is_empty()) {
        object = object.child(directory, name)?;
    }
    Ok(object)
}

fn query_object(
    directory: &NtdsDirectory,
    query: &Query,
) -> Result<Rc<DirectoryObject>, WinArtifactError> {
    match resolve_path(directory, query.path.as_deref()) {
        Ok(result) => Ok(result),
        Err(err) => {
            error!(
                "[ntds] Could not resolve path {:?} for {}: {err:?}",
                query.path, query.query_name
            );
            Err(WinArtifactError::Query)
        }
    }
}

/// Look up the requested attribute names. Unknown names are skipped
fn query_attributes<'a>(directory: &'a NtdsDirectory, names: &[String]) -> Vec<&'a DirectoryObject> {
    let mut attributes = Vec::with_capacity(names.len());
    for name in names {
        match directory.attribute(name) {
            Ok(attribute) => attributes.push(attribute.as_ref()),
            Err(err) => warn!("[ntds] Skipping unknown attribute {name}: {err:?}"),
        }
    }
    attributes
}

fn collect_entries<I>(
    directory: &NtdsDirectory,
    objects: I,
    attributes: &[&DirectoryObject],
) -> Result<Vec<DirectoryEntry>, WinArtifactError>
where
    I: Iterator<Item = Result<Rc<DirectoryObject>, NtdsError>>,
{
    let mut entries = Vec::new();
    for object in objects {
        let object = match object {
            Ok(result) => result,
            Err(err) => {
                error!("[ntds] Failed to enumerate directory objects: {err:?}");
                return Err(WinArtifactError::Query);
            }
        };
        match directory_entry(directory, &object, attributes) {
            Ok(entry) => entries.push(entry),
            Err(err) => {
                error!("[ntds] Could not read object {}: {err:?}", object.dnt());
                return Err(WinArtifactError::Query);
            }
        }
    }
    Ok(entries)
}

fn serialize<T: Serialize>(data: &T) -> Result<Value, WinArtifactError> {
    match serde_json::to_value(data) {
        Ok(result) => Ok(result),
        Err(err) => {
            error!("[ntds] Failed to serialize directory data: {err:?}");
            Err(WinArtifactError::Serialize)
        }
    }
}
