/**
 * Convert directory objects into the serializable records written by collections.
 * Attribute values become JSON: binary as base64, times as RFC 3339, flags as name lists and
 * object references as the distinguished name of the target
 */
use super::{
    directory::NtdsDirectory,
    error::NtdsError,
    flags::{instance_type_flags, search_flags, system_flags},
    object::DirectoryObject,
    values::AttributeValue,
};
use crate::utils::encoding::base64_encode_standard;
use common::windows::{AttributeEntry, ClassEntry, DirectoryEntry};
use log::warn;
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Build a `DirectoryEntry` holding the requested attributes. Attributes without values are left out
pub(crate) fn directory_entry(
    directory: &NtdsDirectory,
    object: &DirectoryObject,
    attributes: &[&DirectoryObject],
) -> Result<DirectoryEntry, NtdsError> {
    let object_class = match object.object_class(directory) {
        Ok(class) => class
            .class_schema()
            .map(|schema| schema.ldap_name.clone())
            .unwrap_or_default(),
        Err(err) => {
            warn!(
                "[ntds] Could not find class {} of {}: {err:?}",
                object.object_class_id(),
                object.dnt()
            );
            String::new()
        }
    };

    let mut entry_attributes = BTreeMap::new();
    if !attributes.is_empty() {
        let values = directory.get_values_batch(object, attributes, true)?;
        for (attribute, values) in attributes.iter().zip(values) {
            let Some(schema) = attribute.attribute_schema() else {
                continue;
            };
            if values.is_empty() {
                continue;
            }

            let mut json_values: Vec<Value> = values
                .iter()
                .map(|value| value_to_json(directory, value))
                .collect();
            let value = if schema.is_single_valued && json_values.len() == 1 {
                json_values.remove(0)
            } else {
                Value::Array(json_values)
            };
            entry_attributes.insert(schema.ldap_name.clone(), value);
        }
    }

    Ok(DirectoryEntry {
        dnt: object.dnt(),
        parent_dnt: object.parent_dnt(),
        name: object.name().to_string(),
        distinguished_name: object.distinguished_name(directory)?,
        object_path: object.object_path(directory)?,
        object_class,
        is_deleted: object.is_deleted(),
        is_nc_head: object.is_nc_head(),
        instance_type: instance_type_flags(&object.instance_type())
            .iter()
            .map(|flag| format!("{flag:?}"))
            .collect(),
        attributes: entry_attributes,
    })
}

/// JSON form of one attribute value
pub(crate) fn value_to_json(directory: &NtdsDirectory, value: &AttributeValue) -> Value {
    match value {
        AttributeValue::Boolean(flag) => json!(flag),
        AttributeValue::Integer(number) => json!(number),
        AttributeValue::LargeInteger(number) => json!(number),
        AttributeValue::Text(text)
        | AttributeValue::Guid(text)
        | AttributeValue::Sid(text)
        | AttributeValue::Oid(text)
        | AttributeValue::SecurityDescriptor(text) => json!(text),
        AttributeValue::Binary(data) => json!(base64_encode_standard(data)),
        AttributeValue::Time(time) => json!(time.to_rfc3339()),
        AttributeValue::Object(reference) => {
            let name = reference
                .target(directory)
                .and_then(|target| target.distinguished_name(directory));
            match name {
                Ok(result) => json!(result),
                Err(err) => {
                    warn!(
                        "[ntds] Could not resolve referenced object {}: {err:?}",
                        reference.dnt()
                    );
                    json!(reference.dnt())
                }
            }
        }
        AttributeValue::InstanceType(flags) => json!(instance_type_flags(flags)),
        AttributeValue::SystemFlags(flags) => json!(system_flags(flags)),
        AttributeValue::SearchFlags(flags) => json!(search_flags(flags)),
    }
}

pub(crate) fn class_entry(directory: &NtdsDirectory, class: &DirectoryObject) -> Option<ClassEntry> {
    let schema = class.class_schema()?;
    let index = directory.schema();
    let superclass = index
        .superclass(class)
        .and_then(|parent| parent.class_schema())
        .map(|parent| parent.ldap_name.clone())
        .unwrap_or_default();
    let attributes = index
        .class_attributes(class, true)
        .iter()
        .filter_map(|attribute| attribute.attribute_schema())
        .map(|attribute| attribute.ldap_name.clone())
        .collect();

    Some(ClassEntry {
        dnt: class.dnt(),
        ldap_name: schema.ldap_name.clone(),
        governs_id: schema.governs_id(),
        governs_id_raw: schema.governs_id_raw,
        superclass,
        admin_description: schema.admin_description.clone(),
        attributes,
    })
}

pub(crate) fn attribute_entry(attribute: &DirectoryObject) -> Option<AttributeEntry> {
    let schema = attribute.attribute_schema()?;
    Some(AttributeEntry {
        dnt: attribute.dnt(),
        ldap_name: schema.ldap_name.clone(),
        attribute_id: schema.attribute_id(),
        attribute_id_raw: schema.attribute_id_raw,
        column_name: schema.column_name.clone().unwrap_or_default(),
        exists_in_database: schema.exists_in_database(),
        syntax: schema
            .syntax
            .map(|syntax| syntax.ldap_name.to_string())
            .unwrap_or_default(),
        syntax_oid: schema.syntax_oid(),
        om_syntax: schema.om_syntax,
        is_single_valued: schema.is_single_valued,
        link_id: schema.link_id,
        search_flags: schema
            .search_flags()
            .iter()
            .map(|flag| format!("{flag:?}"))
            .collect(),
        admin_description: schema.admin_description.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::{attribute_entry, class_entry, directory_entry, value_to_json};
    use crate::artifacts::os::windows::ntds::{
        fixture::{fixture_directory, ALICE_DNT, EXAMPLE_DNT},
        values::{AttributeValue, ObjectReference},
    };
    use serde_json::json;

    #[test]
    fn test_directory_entry() {
        let directory = fixture_directory();
        let alice = directory.get_by_dnt(ALICE_DNT).unwrap();
        let attributes = [
            directory.attribute("sAMAccountName").unwrap().as_ref(),
            directory.attribute("objectSid").unwrap().as_ref(),
            directory.attribute("description").unwrap().as_ref(),
            directory.attribute("memberOf").unwrap().as_ref(),
            directory.attribute("ou").unwrap().as_ref(),
        ];

        let entry = directory_entry(&directory, &alice, &attributes).unwrap();
        assert_eq!(entry.name, "Smith, Alice");
        assert_eq!(entry.object_class, "user");
        assert_eq!(entry.object_path, "com\\example\\Users\\Smith, Alice");
        assert_eq!(entry.attributes["sAMAccountName"], json!("alice"));
        assert_eq!(entry.attributes["objectSid"], json!("S-1-5-21-1-2-3-1104"));
        assert_eq!(entry.attributes["description"], json!(["first", "second"]));
        assert_eq!(
            entry.attributes["memberOf"],
            json!(["CN=Admins,CN=Users,DC=example,DC=com"])
        );
        assert!(!entry.attributes.contains_key("ou"));

        let root = directory_entry(&directory, directory.root_domain(), &[]).unwrap();
        assert!(root.is_nc_head);
        assert_eq!(root.instance_type, vec!["HeadOfNamingContext", "Writable"]);
        assert!(root.attributes.is_empty());
    }

    #[test]
    fn test_value_to_json() {
        let directory = fixture_directory();
        assert_eq!(
            value_to_json(&directory, &AttributeValue::Binary(vec![1, 2, 3])),
            json!("AQID")
        );
        assert_eq!(
            value_to_json(&directory, &AttributeValue::Object(ObjectReference::new(EXAMPLE_DNT))),
            json!("DC=example,DC=com")
        );
        assert_eq!(
            value_to_json(&directory, &AttributeValue::Object(ObjectReference::new(99999))),
            json!(99999)
        );
        assert_eq!(
            value_to_json(&directory, &AttributeValue::InstanceType(5)),
            json!(["HeadOfNamingContext", "Writable"])
        );
    }

    #[test]
    fn test_schema_entries() {
        let directory = fixture_directory();
        let user = directory.class("user").unwrap();
        let entry = class_entry(&directory, user).unwrap();
        assert_eq!(entry.superclass, "organizationalPerson");
        assert_eq!(entry.governs_id, "1.2.134.72.134.247.20.1.5.9");
        assert!(entry.attributes.contains(&String::from("objectSid")));
        assert!(entry.attributes.contains(&String::from("cn")));

        let member = directory.attribute("member").unwrap();
        let entry = attribute_entry(member).unwrap();
        assert_eq!(entry.link_id, 2);
        assert!(!entry.exists_in_database);
        assert!(entry.column_name.is_empty());
        assert_eq!(entry.syntax, "Object(DS-DN)");

        let name = directory.attribute("name").unwrap();
        let entry = attribute_entry(name).unwrap();
        assert_eq!(entry.column_name, "ATTm589825");
        assert_eq!(entry.search_flags, vec!["Indexed", "Anr"]);

        assert!(attribute_entry(user).is_none());
        assert!(class_entry(&directory, member).is_none());
    }
}
