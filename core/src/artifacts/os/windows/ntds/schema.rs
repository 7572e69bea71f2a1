use super::{
    error::NtdsError,
    flags::{search_flags, SearchFlag, SEARCH_ANR},
    object::{DirectoryObject, ObjectKind},
    oid::decode_prefixed_oid,
    syntax::AttributeSyntax,
};
use crate::artifacts::os::windows::ese::cursor::ColumnId;
use log::warn;
use std::{
    collections::{HashMap, HashSet, VecDeque},
    rc::Rc,
};

/// governsID of the classSchema class
pub(crate) const CLASS_SCHEMA_ID: u32 = 196621;
/// governsID of the attributeSchema class
pub(crate) const ATTRIBUTE_SCHEMA_ID: u32 = 196622;

/// A classSchema row
#[derive(Debug, Clone, Default)]
pub struct ClassSchema {
    pub governs_id_raw: u32,
    pub ldap_name: String,
    pub admin_description: String,
    pub subclass_of_id: u32,
    pub auxiliary_class_ids: Vec<u32>,
    pub system_auxiliary_class_ids: Vec<u32>,
    pub must_contain_ids: Vec<u32>,
    pub system_must_contain_ids: Vec<u32>,
    pub may_contain_ids: Vec<u32>,
    pub system_may_contain_ids: Vec<u32>,
}

impl ClassSchema {
    pub fn governs_id(&self) -> String {
        decode_prefixed_oid(self.governs_id_raw)
    }

    /// Attribute ids the class itself declares. Inherited attributes are not included
    pub fn own_attribute_ids(&self) -> Vec<u32> {
        let mut ids = Vec::new();
        for id in self
            .system_must_contain_ids
            .iter()
            .chain(&self.must_contain_ids)
            .chain(&self.system_may_contain_ids)
            .chain(&self.may_contain_ids)
        {
            if !ids.contains(id) {
                ids.push(*id);
            }
        }
        ids
    }

    fn auxiliary_ids(&self) -> impl Iterator<Item = &u32> {
        self.auxiliary_class_ids
            .iter()
            .chain(&self.system_auxiliary_class_ids)
    }
}

/// An attributeSchema row
#[derive(Debug, Clone)]
pub struct AttributeSchema {
    pub attribute_id_raw: u32,
    pub ldap_name: String,
    pub admin_description: String,
    pub attribute_syntax_raw: u32,
    pub om_syntax: i32,
    pub is_single_valued: bool,
    pub link_id: i32,
    pub search_flags_raw: u32,
    pub syntax: Option<&'static AttributeSyntax>,
    /**Derived datatable column name. Link attributes have none */
    pub column_name: Option<String>,
    pub(crate) column_id: Option<ColumnId>,
}

impl AttributeSchema {
    pub fn attribute_id(&self) -> String {
        decode_prefixed_oid(self.attribute_id_raw)
    }

    pub fn syntax_oid(&self) -> String {
        decode_prefixed_oid(self.attribute_syntax_raw)
    }

    pub fn is_link(&self) -> bool {
        self.link_id != 0
    }

    /// Odd link ids are backlinks
    pub fn is_backlink(&self) -> bool {
        self.link_id % 2 != 0
    }

    pub fn link_base(&self) -> i32 {
        self.link_id / 2
    }

    pub fn used_for_anr(&self) -> bool {
        (self.search_flags_raw & SEARCH_ANR) == SEARCH_ANR
    }

    pub fn search_flags(&self) -> Vec<SearchFlag> {
        search_flags(&self.search_flags_raw)
    }

    /// Token used for this attribute in a distinguished name (CN, OU, DC...)
    pub fn rdn_token(&self) -> String {
        self.ldap_name.to_uppercase()
    }

    /// True if a datatable column backs the attribute
    pub fn exists_in_database(&self) -> bool {
        self.column_id.is_some()
    }
}

/**
 * Lookup tables over every class and attribute below `Configuration/Schema`.  
 * Superclasses are stored as arena indexes so cyclic schema data cannot leak or loop
 */
#[derive(Debug, Default)]
pub struct SchemaIndex {
    classes: Vec<Rc<DirectoryObject>>,
    attributes: Vec<Rc<DirectoryObject>>,
    class_by_governs_id: HashMap<u32, usize>,
    class_by_name: HashMap<String, usize>,
    attribute_by_id: HashMap<u32, usize>,
    attribute_by_name: HashMap<String, usize>,
    superclass: Vec<Option<usize>>,
    anr: Vec<usize>,
}

impl SchemaIndex {
    /// Build the schema from the children of the schema container
    pub(crate) fn load<I>(children: I) -> Result<SchemaIndex, NtdsError>
    where
        I: Iterator<Item = Result<Rc<DirectoryObject>, NtdsError>>,
    {
        let mut schema = SchemaIndex::default();
        for child in children {
            let object = child?;
            match object.kind() {
                ObjectKind::Class(class) => {
                    let key = class.ldap_name.to_lowercase();
                    if schema.class_by_name.contains_key(&key)
                        || schema.class_by_governs_id.contains_key(&class.governs_id_raw)
                    {
                        warn!(
                            "[ntds] Duplicate class {} ({}). Keeping the first",
                            class.ldap_name, class.governs_id_raw
                        );
                        continue;
                    }
                    let index = schema.classes.len();
                    schema.class_by_name.insert(key, index);
                    schema
                        .class_by_governs_id
                        .insert(class.governs_id_raw, index);
                    schema.classes.push(object.clone());
                }
                ObjectKind::Attribute(attribute) => {
                    let key = attribute.ldap_name.to_lowercase();
                    if schema.attribute_by_name.contains_key(&key)
                        || schema
                            .attribute_by_id
                            .contains_key(&attribute.attribute_id_raw)
                    {
                        warn!(
                            "[ntds] Duplicate attribute {} ({}). Keeping the first",
                            attribute.ldap_name, attribute.attribute_id_raw
                        );
                        continue;
                    }
                    let index = schema.attributes.len();
                    schema.attribute_by_name.insert(key, index);
                    schema
                        .attribute_by_id
                        .insert(attribute.attribute_id_raw, index);
                    if attribute.used_for_anr() {
                        schema.anr.push(index);
                    }
                    schema.attributes.push(object.clone());
                }
                ObjectKind::Generic => {}
            }
        }

        // Second pass once every class is known. top is its own superclass
        let mut superclass = Vec::with_capacity(schema.classes.len());
        for object in &schema.classes {
            let link = object.class_schema().and_then(|class| {
                if class.subclass_of_id == class.governs_id_raw {
                    return None;
                }
                let parent = schema.class_by_governs_id.get(&class.subclass_of_id).copied();
                if parent.is_none() {
                    warn!(
                        "[ntds] Superclass {} of {} not found",
                        class.subclass_of_id, class.ldap_name
                    );
                }
                parent
            });
            superclass.push(link);
        }
        schema.superclass = superclass;

        if schema.classes.is_empty() {
            warn!("[ntds] Schema container has no classes");
            return Err(NtdsError::SchemaNotFound);
        }
        Ok(schema)
    }

    pub fn classes(&self) -> &[Rc<DirectoryObject>] {
        &self.classes
    }

    pub fn attributes(&self) -> &[Rc<DirectoryObject>] {
        &self.attributes
    }

    pub fn anr_attributes(&self) -> Vec<&Rc<DirectoryObject>> {
        self.anr
            .iter()
            .filter_map(|index| self.attributes.get(*index))
            .collect()
    }

    pub fn class_by_governs_id(&self, governs_id: u32) -> Option<&Rc<DirectoryObject>> {
        self.class_by_governs_id
            .get(&governs_id)
            .and_then(|index| self.classes.get(*index))
    }

    /// Case-insensitive lookup by lDAPDisplayName
    pub fn class_by_ldap_name(&self, name: &str) -> Option<&Rc<DirectoryObject>> {
        self.class_by_name
            .get(&name.to_lowercase())
            .and_then(|index| self.classes.get(*index))
    }

    pub fn attribute_by_id(&self, attribute_id: u32) -> Option<&Rc<DirectoryObject>> {
        self.attribute_by_id
            .get(&attribute_id)
            .and_then(|index| self.attributes.get(*index))
    }

    /// Case-insensitive lookup by lDAPDisplayName. An empty name matches nothing
    pub fn attribute_by_ldap_name(&self, name: &str) -> Option<&Rc<DirectoryObject>> {
        if name.is_empty() {
            return None;
        }
        self.attribute_by_name
            .get(&name.to_lowercase())
            .and_then(|index| self.attributes.get(*index))
    }

    fn class_index(&self, class: &DirectoryObject) -> Option<usize> {
        let governs_id = class.class_schema()?.governs_id_raw;
        let index = *self.class_by_governs_id.get(&governs_id)?;
        // A duplicate that was skipped during load is not part of the index
        if self.classes.get(index)?.dnt() != class.dnt() {
            return None;
        }
        Some(index)
    }

    pub fn superclass(&self, class: &DirectoryObject) -> Option<&Rc<DirectoryObject>> {
        let index = self.class_index(class)?;
        let parent = (*self.superclass.get(index)?)?;
        self.classes.get(parent)
    }

    /**
     * Attribute ids a class may hold.  
     * With `include_base` the superclass and auxiliary classes are walked breadth first
     */
    pub fn attribute_ids(&self, class: &DirectoryObject, include_base: bool) -> Vec<u32> {
        let Some(schema) = class.class_schema() else {
            return Vec::new();
        };
        if !include_base {
            return schema.own_attribute_ids();
        }
        let Some(start) = self.class_index(class) else {
            return schema.own_attribute_ids();
        };

        let mut ids = Vec::new();
        let mut seen_ids = HashSet::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([start]);
        while let Some(index) = queue.pop_front() {
            let Some(object) = self.classes.get(index) else {
                continue;
            };
            if !visited.insert(object.dnt()) {
                continue;
            }
            let Some(current) = object.class_schema() else {
                continue;
            };

            for id in current.own_attribute_ids() {
                if seen_ids.insert(id) {
                    ids.push(id);
                }
            }
            if let Some(Some(parent)) = self.superclass.get(index) {
                queue.push_back(*parent);
            }
            for aux in current.auxiliary_ids() {
                match self.class_by_governs_id.get(aux) {
                    Some(aux_index) => queue.push_back(*aux_index),
                    None => warn!(
                        "[ntds] Auxiliary class {aux} of {} not found",
                        current.ldap_name
                    ),
                }
            }
        }
        ids
    }

    /// Attribute schema objects a class may hold. Ids missing from the schema are skipped
    pub fn class_attributes(
        &self,
        class: &DirectoryObject,
        include_base: bool,
    ) -> Vec<&Rc<DirectoryObject>> {
        self.attribute_ids(class, include_base)
            .into_iter()
            .filter_map(|id| self.attribute_by_id(id))
            .collect()
    }

    /// True if the class or one of its superclasses declares the attribute
    pub fn has_attribute(&self, class: &DirectoryObject, name: &str) -> bool {
        let Some(attribute_id) = self
            .attribute_by_ldap_name(name)
            .and_then(|attribute| attribute.attribute_schema())
            .map(|attribute| attribute.attribute_id_raw)
        else {
            return false;
        };

        let mut visited = HashSet::new();
        let mut current = self.class_index(class);
        while let Some(index) = current {
            if !visited.insert(index) {
                break;
            }
            let declares = self
                .classes
                .get(index)
                .and_then(|object| object.class_schema())
                .is_some_and(|schema| schema.own_attribute_ids().contains(&attribute_id));
            if declares {
                return true;
            }
            current = self.superclass.get(index).copied().flatten();
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::{AttributeSchema, ClassSchema, SchemaIndex};
    use crate::artifacts::os::windows::ntds::{
        fixture::fixture_directory,
        object::{DirectoryObject, ObjectKind},
    };
    use std::{cell::OnceCell, collections::HashSet, rc::Rc};

    fn schema_object(dnt: u32, name: &str, kind: ObjectKind) -> Rc<DirectoryObject> {
        Rc::new(DirectoryObject {
            dnt,
            parent_dnt: 6,
            ancestry_bytes: Vec::new(),
            ancestors: Vec::new(),
            deleted: false,
            object_class_id: 0,
            superclass_chain: Vec::new(),
            name: name.to_string(),
            instance_type: 0,
            rdn_attribute_id: 3,
            kind,
            distinguished_name: OnceCell::new(),
            object_path: OnceCell::new(),
        })
    }

    fn class(
        dnt: u32,
        governs_id: u32,
        subclass_of_id: u32,
        aux: u32,
        may: u32,
    ) -> Rc<DirectoryObject> {
        let name = format!("class{governs_id}");
        let schema = ClassSchema {
            governs_id_raw: governs_id,
            ldap_name: name.clone(),
            subclass_of_id,
            auxiliary_class_ids: if aux == 0 { Vec::new() } else { vec![aux] },
            may_contain_ids: vec![may],
            ..Default::default()
        };
        schema_object(dnt, &name, ObjectKind::Class(schema))
    }

    fn attribute(dnt: u32, id: u32, name: &str) -> Rc<DirectoryObject> {
        let schema = AttributeSchema {
            attribute_id_raw: id,
            ldap_name: name.to_string(),
            admin_description: String::new(),
            attribute_syntax_raw: 0x80009,
            om_syntax: 2,
            is_single_valued: true,
            link_id: 0,
            search_flags_raw: 0,
            syntax: None,
            column_name: None,
            column_id: None,
        };
        schema_object(dnt, name, ObjectKind::Attribute(schema))
    }

    #[test]
    fn test_cyclic_schema() {
        // 1 and 2 are each other's superclass. 3 and 4 name each other as auxiliary classes
        let objects = vec![
            class(10, 1, 2, 3, 100),
            class(11, 2, 1, 0, 200),
            class(12, 3, 4, 4, 100),
            class(13, 4, 3, 3, 300),
            attribute(20, 200, "secondValue"),
            attribute(21, 999, "unusedValue"),
        ];
        let schema = SchemaIndex::load(objects.into_iter().map(Ok)).unwrap();
        let first = schema.class_by_governs_id(1).unwrap();

        assert_eq!(schema.attribute_ids(first, true), vec![100, 200, 300]);
        assert_eq!(schema.attribute_ids(first, false), vec![100]);
        assert!(schema.has_attribute(first, "secondValue"));
        assert!(!schema.has_attribute(first, "unusedValue"));

        let second = schema.superclass(first).unwrap();
        assert_eq!(second.dnt(), 11);
        assert_eq!(schema.superclass(second).unwrap().dnt(), 10);
    }

    #[test]
    fn test_own_attribute_ids() {
        let class = ClassSchema {
            must_contain_ids: vec![1, 2],
            system_must_contain_ids: vec![2, 3],
            may_contain_ids: vec![4],
            ..Default::default()
        };
        assert_eq!(class.own_attribute_ids(), vec![2, 3, 1, 4]);
    }

    #[test]
    fn test_link_attribute() {
        let attribute = AttributeSchema {
            attribute_id_raw: 131174,
            ldap_name: String::from("memberOf"),
            admin_description: String::new(),
            attribute_syntax_raw: 0x80001,
            om_syntax: 127,
            is_single_valued: false,
            link_id: 3,
            search_flags_raw: 0,
            syntax: None,
            column_name: None,
            column_id: None,
        };
        assert!(attribute.is_link());
        assert!(attribute.is_backlink());
        assert_eq!(attribute.link_base(), 1);
        assert_eq!(attribute.rdn_token(), "MEMBEROF");
        assert!(!attribute.exists_in_database());
        assert_eq!(attribute.syntax_oid(), "2.5.5.1");
    }

    #[test]
    fn test_schema_lookups() {
        let directory = fixture_directory();
        let schema = directory.schema();

        let user = schema.class_by_ldap_name("USER").unwrap();
        assert_eq!(user.class_schema().unwrap().ldap_name, "user");
        let person = schema.superclass(user).unwrap();
        assert_eq!(person.class_schema().unwrap().ldap_name, "person");

        let top = schema.class_by_ldap_name("top").unwrap();
        assert!(schema.superclass(top).is_none());

        let cn = schema.attribute_by_ldap_name("cn").unwrap();
        assert_eq!(cn.attribute_schema().unwrap().attribute_id_raw, 3);
        assert!(schema.attribute_by_ldap_name("").is_none());
        assert!(schema.attribute_by_id(3).is_some());

        let anr: Vec<&str> = schema
            .anr_attributes()
            .iter()
            .map(|attribute| attribute.attribute_schema().unwrap().ldap_name.as_str())
            .collect();
        assert!(anr.contains(&"name"));
        assert!(anr.contains(&"sAMAccountName"));
    }

    #[test]
    fn test_attribute_closure() {
        let directory = fixture_directory();
        let schema = directory.schema();
        let user = schema.class_by_ldap_name("user").unwrap();

        let own: HashSet<u32> = schema.attribute_ids(user, false).into_iter().collect();
        let all = schema.attribute_ids(user, true);
        let all_set: HashSet<u32> = all.iter().copied().collect();
        assert_eq!(all.len(), all_set.len());
        assert!(own.is_subset(&all_set));

        // Inherited from person, top and the auxiliary securityPrincipal class
        assert!(all_set.contains(&3));
        assert!(all_set.contains(&589825));
        assert!(all_set.contains(&589970));
    }

    #[test]
    fn test_has_attribute() {
        let directory = fixture_directory();
        let schema = directory.schema();
        let user = schema.class_by_ldap_name("user").unwrap();

        assert!(schema.has_attribute(user, "cn"));
        assert!(schema.has_attribute(user, "sAMAccountName"));
        // Only reachable through an auxiliary class
        assert!(!schema.has_attribute(user, "objectSid"));
        assert!(!schema.has_attribute(user, "doesNotExist"));
    }
}
