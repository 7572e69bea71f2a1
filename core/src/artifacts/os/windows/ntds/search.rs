use super::{directory::NtdsDirectory, error::NtdsError, object::DirectoryObject};
use log::warn;
use std::rc::Rc;

/**
 * Ambiguous name resolution over a subtree.  
 * An object matches when any value of an ANR attribute contains the search text, ignoring case
 */
pub(crate) fn search_subtree<'a>(
    directory: &'a NtdsDirectory,
    root: &DirectoryObject,
    search: Option<&str>,
    class: Option<&DirectoryObject>,
    include_subclasses: bool,
) -> Result<impl Iterator<Item = Result<Rc<DirectoryObject>, NtdsError>> + 'a, NtdsError> {
    let class_id = match class {
        Some(class) => match class.class_schema() {
            Some(schema) => Some(schema.governs_id_raw),
            None => {
                warn!("[ntds] Search class {} is not a class schema", class.name());
                return Err(NtdsError::ClassNotFound);
            }
        },
        None => None,
    };

    let search = search
        .filter(|value| !value.is_empty())
        .map(str::to_lowercase);
    let anr_attributes: Vec<&'a DirectoryObject> = match search {
        Some(_) => directory
            .schema()
            .anr_attributes()
            .into_iter()
            .map(|attribute| attribute.as_ref())
            .collect(),
        None => Vec::new(),
    };

    let results = directory
        .search_subtree(root)
        .filter_map(move |entry| {
            let object = match entry {
                Ok(result) => result,
                Err(err) => return Some(Err(err)),
            };
            if let Some(class_id) = class_id {
                if !class_matches(&object, class_id, include_subclasses) {
                    return None;
                }
            }
            let Some(search) = &search else {
                return Some(Ok(object));
            };
            match anr_matches(directory, &object, &anr_attributes, search) {
                Ok(true) => Some(Ok(object)),
                Ok(false) => None,
                Err(err) => Some(Err(err)),
            }
        });
    Ok(results)
}

fn class_matches(object: &DirectoryObject, class_id: u32, include_subclasses: bool) -> bool {
    if include_subclasses {
        return object.superclass_chain().contains(&class_id);
    }
    object.object_class_id() == class_id
}

fn anr_matches(
    directory: &NtdsDirectory,
    object: &DirectoryObject,
    attributes: &[&DirectoryObject],
    search: &str,
) -> Result<bool, NtdsError> {
    let values = directory.get_values_batch(object, attributes, true)?;
    Ok(values
        .iter()
        .flatten()
        .any(|value| value.to_string().to_lowercase().contains(search)))
}
