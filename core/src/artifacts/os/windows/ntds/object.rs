use super::{
    directory::NtdsDirectory,
    enumerator::DirectoryIter,
    error::NtdsError,
    flags::{instance_type_flags, InstanceTypeFlag, HEAD_OF_NAMING_CONTEXT},
    links::{member_of, members},
    schema::{AttributeSchema, ClassSchema},
    values::AttributeValue,
};
use std::{cell::OnceCell, rc::Rc};

/// DNTs below this value are synthetic database roots and never part of a name
pub(crate) const FIRST_OBJECT_DNT: u32 = 3;

/// Shape of a directory row, picked once from its object class
#[derive(Debug)]
pub enum ObjectKind {
    Class(ClassSchema),
    Attribute(AttributeSchema),
    Generic,
}

/// One record of the directory datatable
#[derive(Debug)]
pub struct DirectoryObject {
    pub(crate) dnt: u32,
    pub(crate) parent_dnt: u32,
    /**Raw Ancestors_col value. Used as the key for subtree scans */
    pub(crate) ancestry_bytes: Vec<u8>,
    /**Ancestor DNTs root first. The object itself is not included */
    pub(crate) ancestors: Vec<u32>,
    pub(crate) deleted: bool,
    pub(crate) object_class_id: u32,
    pub(crate) superclass_chain: Vec<u32>,
    pub(crate) name: String,
    pub(crate) instance_type: u32,
    pub(crate) rdn_attribute_id: u32,
    pub(crate) kind: ObjectKind,
    pub(crate) distinguished_name: OnceCell<String>,
    pub(crate) object_path: OnceCell<String>,
}

impl DirectoryObject {
    pub fn dnt(&self) -> u32 {
        self.dnt
    }

    pub fn parent_dnt(&self) -> u32 {
        self.parent_dnt
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ancestors(&self) -> &[u32] {
        &self.ancestors
    }

    pub fn ancestry_bytes(&self) -> &[u8] {
        &self.ancestry_bytes
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// governsID of the structural class
    pub fn object_class_id(&self) -> u32 {
        self.object_class_id
    }

    /// Every class the object is an instance of
    pub fn superclass_chain(&self) -> &[u32] {
        &self.superclass_chain
    }

    pub fn instance_type(&self) -> u32 {
        self.instance_type
    }

    pub fn instance_type_flags(&self) -> Vec<InstanceTypeFlag> {
        instance_type_flags(&self.instance_type)
    }

    /// Head of a naming context (domain, configuration, schema)
    pub fn is_nc_head(&self) -> bool {
        (self.instance_type & HEAD_OF_NAMING_CONTEXT) == HEAD_OF_NAMING_CONTEXT
    }

    pub fn rdn_attribute_id(&self) -> u32 {
        self.rdn_attribute_id
    }

    pub fn kind(&self) -> &ObjectKind {
        &self.kind
    }

    pub fn class_schema(&self) -> Option<&ClassSchema> {
        match &self.kind {
            ObjectKind::Class(class) => Some(class),
            _ => None,
        }
    }

    pub fn attribute_schema(&self) -> Option<&AttributeSchema> {
        match &self.kind {
            ObjectKind::Attribute(attribute) => Some(attribute),
            _ => None,
        }
    }

    /// Check the cached class chain. Does not walk the schema
    pub fn is_instance_of(&self, class: &DirectoryObject) -> bool {
        match class.class_schema() {
            Some(schema) => self.superclass_chain.contains(&schema.governs_id_raw),
            None => false,
        }
    }

    /// Schema class of the object
    pub fn object_class(&self, directory: &NtdsDirectory) -> Result<Rc<DirectoryObject>, NtdsError> {
        match directory.schema().class_by_governs_id(self.object_class_id) {
            Some(class) => Ok(class.clone()),
            None => Err(NtdsError::ClassNotFound),
        }
    }

    /// Get the distinguished name. Computed on first use
    pub fn distinguished_name(&self, directory: &NtdsDirectory) -> Result<String, NtdsError> {
        if let Some(dn) = self.distinguished_name.get() {
            return Ok(dn.clone());
        }

        let mut parts = vec![format!(
            "{}={}",
            directory.rdn_token(self.rdn_attribute_id),
            escape_rdn(&self.name)
        )];
        for ancestor in self.ancestors.iter().rev() {
            if *ancestor < FIRST_OBJECT_DNT {
                break;
            }
            let object = directory.get_by_dnt(*ancestor)?;
            parts.push(format!(
                "{}={}",
                directory.rdn_token(object.rdn_attribute_id),
                escape_rdn(&object.name)
            ));
        }

        let dn = parts.join(",");
        let _ = self.distinguished_name.set(dn.clone());
        Ok(dn)
    }

    /// Ancestor names joined by `\`, most general first
    pub fn object_path(&self, directory: &NtdsDirectory) -> Result<String, NtdsError> {
        if let Some(path) = self.object_path.get() {
            return Ok(path.clone());
        }

        let mut names = Vec::new();
        for ancestor in &self.ancestors {
            if *ancestor < FIRST_OBJECT_DNT {
                continue;
            }
            names.push(directory.get_by_dnt(*ancestor)?.name.clone());
        }
        let path = format!("{}\\{}", names.join("\\"), self.name);
        let _ = self.object_path.set(path.clone());
        Ok(path)
    }

    pub fn parent(&self, directory: &NtdsDirectory) -> Result<Rc<DirectoryObject>, NtdsError> {
        directory.get_by_dnt(self.parent_dnt)
    }

    /// Find a direct child by name. Names compare case-insensitively
    pub fn child(
        &self,
        directory: &NtdsDirectory,
        name: &str,
    ) -> Result<Rc<DirectoryObject>, NtdsError> {
        directory.get_by_parent_and_name(self.dnt, name)
    }

    pub fn children<'a>(&self, directory: &'a NtdsDirectory) -> DirectoryIter<'a> {
        directory.children_of(self.dnt)
    }

    /// Read one tagged value. `decode` false returns the column value as stored
    pub fn get_value(
        &self,
        directory: &NtdsDirectory,
        attribute: &DirectoryObject,
        tag: u32,
        decode: bool,
    ) -> Result<Option<AttributeValue>, NtdsError> {
        directory.get_value(self, attribute, tag, decode)
    }

    /// Read every value of a multi-valued attribute
    pub fn get_multi_values(
        &self,
        directory: &NtdsDirectory,
        attribute: &DirectoryObject,
    ) -> Result<Vec<AttributeValue>, NtdsError> {
        directory.get_multi_values(self, attribute)
    }

    /// Objects that are members of this group, primary group members first
    pub fn members<'a>(
        &self,
        directory: &'a NtdsDirectory,
    ) -> Result<impl Iterator<Item = Result<Rc<DirectoryObject>, NtdsError>> + 'a, NtdsError> {
        members(directory, self)
    }

    /// Groups this object belongs to, including its primary group
    pub fn member_of<'a>(
        &self,
        directory: &'a NtdsDirectory,
    ) -> Result<impl Iterator<Item = Result<Rc<DirectoryObject>, NtdsError>> + 'a, NtdsError> {
        member_of(directory, self)
    }
}

/// Escape characters that are not allowed in a DN component
pub(crate) fn escape_rdn(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for character in value.chars() {
        match character {
            '\r' => escaped.push_str("\\r"),
            '\n' => escaped.push_str("\\n"),
            ',' => escaped.push_str("\\,"),
            _ => escaped.push(character),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::escape_rdn;
    use crate::artifacts::os::windows::ntds::{
        error::NtdsError,
        fixture::{fixture_directory, ALICE_DNT, EXAMPLE_DNT, USERS_DNT},
    };
    use std::rc::Rc;

    #[test]
    fn test_escape_rdn() {
        assert_eq!(escape_rdn("Smith, Alice"), "Smith\\, Alice");
        assert_eq!(escape_rdn("a\r\nb"), "a\\r\\nb");
        assert_eq!(escape_rdn("plain"), "plain");
    }

    #[test]
    fn test_distinguished_name() {
        let directory = fixture_directory();
        let alice = directory.get_by_dnt(ALICE_DNT).unwrap();
        assert_eq!(alice.ancestors(), &[2, 3, EXAMPLE_DNT, USERS_DNT]);
        assert_eq!(
            alice.distinguished_name(&directory).unwrap(),
            "CN=Smith\\, Alice,CN=Users,DC=example,DC=com"
        );
        // Cached after the first call
        assert!(alice.distinguished_name.get().is_some());

        let root = directory.root_domain();
        assert_eq!(root.distinguished_name(&directory).unwrap(), "DC=example,DC=com");
    }

    #[test]
    fn test_object_path() {
        let directory = fixture_directory();
        let alice = directory.get_by_dnt(ALICE_DNT).unwrap();
        assert_eq!(
            alice.object_path(&directory).unwrap(),
            "com\\example\\Users\\Smith, Alice"
        );

        let database_root = directory.get_by_dnt(2).unwrap();
        assert_eq!(database_root.object_path(&directory).unwrap(), "\\$ROOT_OBJECT$");
    }

    #[test]
    fn test_parent_and_child() {
        let directory = fixture_directory();
        let root = directory.root_domain();

        let users = root.child(&directory, "USERS").unwrap();
        assert_eq!(users.dnt(), USERS_DNT);
        assert!(Rc::ptr_eq(&users.parent(&directory).unwrap(), root));

        assert_eq!(
            root.child(&directory, "missing").err(),
            Some(NtdsError::ObjectNotFound)
        );
        assert_eq!(root.child(&directory, "").err(), Some(NtdsError::InvalidName));
    }

    #[test]
    fn test_class_membership() {
        let directory = fixture_directory();
        let alice = directory.get_by_dnt(ALICE_DNT).unwrap();
        let schema = directory.schema();

        let class = alice.object_class(&directory).unwrap();
        assert_eq!(class.class_schema().unwrap().ldap_name, "user");
        assert!(alice.is_instance_of(schema.class_by_ldap_name("person").unwrap()));
        assert!(alice.is_instance_of(schema.class_by_ldap_name("top").unwrap()));
        assert!(!alice.is_instance_of(schema.class_by_ldap_name("group").unwrap()));
        assert!(!alice.is_nc_head());
        assert!(directory.root_domain().is_nc_head());
    }
}
