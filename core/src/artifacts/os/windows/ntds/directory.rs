/**
 * An open NTDS directory.
 *
 * Opening resolves the special datatable columns, finds the root domain (either the configured DN
 * or the first naming context head below the database root) and loads the schema from
 * `Configuration/Schema`. Everything after that is read on demand
 */
use super::{
    enumerator::{DirectoryIter, DirectoryQuery},
    error::NtdsError,
    links::link_values,
    object::DirectoryObject,
    schema::{AttributeSchema, SchemaIndex},
    search::search_subtree,
    store::RecordStore,
    values::{AttributeValue, RawValue},
};
use crate::artifacts::os::windows::ese::{cursor::EseDatabase, memory::MemoryDatabase};
use log::{error, warn};
use std::rc::Rc;

const CONFIGURATION_NAME: &str = "Configuration";
const SCHEMA_NAME: &str = "Schema";

#[derive(Debug, Clone)]
pub struct OpenOptions {
    pub read_only: bool,
    /**DN of the root domain such as `DC=example,DC=com`. Detected when not provided */
    pub root_domain: Option<String>,
    /**Keep every materialized object in the identity cache, not just schema objects */
    pub cache_generic_objects: bool,
}

impl Default for OpenOptions {
    fn default() -> Self {
        OpenOptions {
            read_only: true,
            root_domain: None,
            cache_generic_objects: true,
        }
    }
}

pub struct NtdsDirectory {
    store: RecordStore,
    root_domain: Rc<DirectoryObject>,
    schema: SchemaIndex,
}

impl NtdsDirectory {
    /// Open an NTDS.dit file or a JSON table snapshot of one
    pub fn open(path: &str, options: &OpenOptions) -> Result<NtdsDirectory, NtdsError> {
        let db = match MemoryDatabase::open_file(path, options.read_only) {
            Ok(result) => result,
            Err(err) => {
                error!("[ntds] Could not open directory database {path}: {err:?}");
                return Err(NtdsError::OpenDirectory);
            }
        };
        NtdsDirectory::from_database(Box::new(db), options)
    }

    /// Open a directory on any storage engine implementing the cursor contract
    pub fn from_database(
        db: Box<dyn EseDatabase>,
        options: &OpenOptions,
    ) -> Result<NtdsDirectory, NtdsError> {
        let store = RecordStore::new(db, options.cache_generic_objects)?;
        let root_domain = match &options.root_domain {
            Some(dn) => find_root_by_name(&store, dn)?,
            None => detect_root(&store)?,
        };

        let schema_container = match store
            .get_by_parent_and_name(root_domain.dnt(), CONFIGURATION_NAME)
            .and_then(|configuration| store.get_by_parent_and_name(configuration.dnt(), SCHEMA_NAME))
        {
            Ok(result) => result,
            Err(err) => {
                error!("[ntds] Could not find Configuration/Schema below the root domain: {err:?}");
                return Err(NtdsError::SchemaNotFound);
            }
        };
        let schema = SchemaIndex::load(DirectoryIter::new(
            &store,
            DirectoryQuery::Children(schema_container.dnt()),
        ))?;

        Ok(NtdsDirectory {
            store,
            root_domain,
            schema,
        })
    }

    pub(crate) fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn is_read_only(&self) -> bool {
        self.store.database().is_read_only()
    }

    pub fn root_domain(&self) -> &Rc<DirectoryObject> {
        &self.root_domain
    }

    pub fn schema(&self) -> &SchemaIndex {
        &self.schema
    }

    pub fn get_by_dnt(&self, dnt: u32) -> Result<Rc<DirectoryObject>, NtdsError> {
        self.store.get_by_dnt(dnt)
    }

    pub fn get_by_parent_and_name(
        &self,
        parent_dnt: u32,
        name: &str,
    ) -> Result<Rc<DirectoryObject>, NtdsError> {
        self.store.get_by_parent_and_name(parent_dnt, name)
    }

    /// Attribute schema object by LDAP name
    pub fn attribute(&self, name: &str) -> Result<&Rc<DirectoryObject>, NtdsError> {
        match self.schema.attribute_by_ldap_name(name) {
            Some(result) => Ok(result),
            None => Err(NtdsError::AttributeNotFound),
        }
    }

    /// Class schema object by LDAP name
    pub fn class(&self, name: &str) -> Result<&Rc<DirectoryObject>, NtdsError> {
        match self.schema.class_by_ldap_name(name) {
            Some(result) => Ok(result),
            None => Err(NtdsError::ClassNotFound),
        }
    }

    /// Token used for an RDN attribute in a DN. Defaults to `CN`
    pub fn rdn_token(&self, rdn_attribute_id: u32) -> String {
        if rdn_attribute_id == 0 {
            return String::from("CN");
        }
        match self
            .schema
            .attribute_by_id(rdn_attribute_id)
            .and_then(|attribute| attribute.attribute_schema())
        {
            Some(attribute) => attribute.rdn_token(),
            None => String::from("CN"),
        }
    }

    pub fn children_of(&self, parent_dnt: u32) -> DirectoryIter<'_> {
        DirectoryIter::new(&self.store, DirectoryQuery::Children(parent_dnt))
    }

    /**
     * The object and every descendant, using the ancestry index.  
     * An object without ancestry cannot be placed in the index and yields only itself
     */
    pub fn search_subtree(&self, root: &DirectoryObject) -> DirectoryIter<'_> {
        if root.ancestry_bytes().is_empty() {
            warn!("[ntds] Object {} has no ancestry", root.dnt());
            return DirectoryIter::new(&self.store, DirectoryQuery::Object(root.dnt()));
        }
        DirectoryIter::new(
            &self.store,
            DirectoryQuery::Subtree(root.ancestry_bytes().to_vec()),
        )
    }

    /**
     * Find objects below `root` whose ANR attributes contain `search` (case-insensitive).  
     * No search text matches every object that passes the class filter
     */
    pub fn search<'a>(
        &'a self,
        root: &DirectoryObject,
        search: Option<&str>,
        class: Option<&DirectoryObject>,
        include_subclasses: bool,
    ) -> Result<impl Iterator<Item = Result<Rc<DirectoryObject>, NtdsError>> + 'a, NtdsError> {
        search_subtree(self, root, search, class, include_subclasses)
    }

    fn schema_of<'b>(&self, attribute: &'b DirectoryObject) -> Result<&'b AttributeSchema, NtdsError> {
        match attribute.attribute_schema() {
            Some(result) => Ok(result),
            None => {
                warn!("[ntds] Object {} is not an attribute schema", attribute.dnt());
                Err(NtdsError::AttributeNotFound)
            }
        }
    }

    /// Read one tagged value of an attribute
    pub fn get_value(
        &self,
        object: &DirectoryObject,
        attribute: &DirectoryObject,
        tag: u32,
        decode: bool,
    ) -> Result<Option<AttributeValue>, NtdsError> {
        let schema = self.schema_of(attribute)?;
        self.read_attribute(object, schema, tag, decode)
    }

    pub(crate) fn read_attribute(
        &self,
        object: &DirectoryObject,
        attribute: &AttributeSchema,
        tag: u32,
        decode: bool,
    ) -> Result<Option<AttributeValue>, NtdsError> {
        if attribute.is_link() {
            let values = link_values(self, object, attribute)?;
            let index = tag.saturating_sub(1) as usize;
            return Ok(values.into_iter().nth(index).map(AttributeValue::Object));
        }

        let Some(syntax) = attribute.syntax.filter(|syntax| syntax.can_read()) else {
            warn!(
                "[ntds] Syntax of {} is not supported",
                attribute.ldap_name
            );
            return Err(NtdsError::UnsupportedSyntax);
        };
        let Some(column) = attribute.column_id else {
            return Ok(None);
        };

        let raw = self
            .store
            .with_record(object.dnt(), |cursor| syntax.read(cursor, column, tag))?;
        let raw = match raw {
            Ok(Some(result)) => result,
            Ok(None) => return Ok(None),
            Err(err) => {
                warn!(
                    "[ntds] Could not read {} of {}: {err:?}",
                    attribute.ldap_name,
                    object.dnt()
                );
                return Ok(None);
            }
        };

        if !decode {
            return Ok(Some(raw.into_value()));
        }
        Ok(syntax.decode(raw, &self.store))
    }

    /// Read every value of a multi-valued attribute. Null and undecodable values are skipped
    pub fn get_multi_values(
        &self,
        object: &DirectoryObject,
        attribute: &DirectoryObject,
    ) -> Result<Vec<AttributeValue>, NtdsError> {
        let schema = self.schema_of(attribute)?;
        if schema.is_single_valued {
            return Err(NtdsError::SingleValued);
        }
        self.read_all_values(object, schema)
    }

    fn read_all_values(
        &self,
        object: &DirectoryObject,
        attribute: &AttributeSchema,
    ) -> Result<Vec<AttributeValue>, NtdsError> {
        if attribute.is_link() {
            let values = link_values(self, object, attribute)?;
            return Ok(values.into_iter().map(AttributeValue::Object).collect());
        }

        let Some(syntax) = attribute.syntax.filter(|syntax| syntax.can_read()) else {
            warn!(
                "[ntds] Syntax of {} is not supported",
                attribute.ldap_name
            );
            return Err(NtdsError::UnsupportedSyntax);
        };
        let Some(column) = attribute.column_id else {
            return Ok(Vec::new());
        };

        let raw_values = self.store.with_record(object.dnt(), |cursor| {
            let count = match cursor.value_count(column) {
                Ok(result) => result,
                Err(err) => {
                    warn!("[ntds] Could not count values of {}: {err:?}", attribute.ldap_name);
                    return Vec::new();
                }
            };
            let mut values = Vec::new();
            for tag in 1..=count {
                match syntax.read(cursor, column, tag) {
                    Ok(Some(value)) => values.push(value),
                    Ok(None) => {}
                    Err(err) => warn!(
                        "[ntds] Could not read value {tag} of {}: {err:?}",
                        attribute.ldap_name
                    ),
                }
            }
            values
        })?;

        Ok(raw_values
            .into_iter()
            .filter_map(|raw| syntax.decode(raw, &self.store))
            .collect())
    }

    /**
     * Read several attributes with a single seek.  
     * Single-valued attributes return at most one value. Unsupported attributes return no values
     */
    pub fn get_values_batch(
        &self,
        object: &DirectoryObject,
        attributes: &[&DirectoryObject],
        decode: bool,
    ) -> Result<Vec<Vec<AttributeValue>>, NtdsError> {
        let schemas: Vec<Option<&AttributeSchema>> = attributes
            .iter()
            .map(|attribute| attribute.attribute_schema())
            .collect();

        let raw = self.store.with_record(object.dnt(), |cursor| {
            let mut results: Vec<Vec<RawValue>> = Vec::with_capacity(schemas.len());
            for schema in &schemas {
                let mut values = Vec::new();
                let readable = schema.and_then(|attribute| {
                    let syntax = attribute.syntax.filter(|syntax| syntax.can_read())?;
                    Some((attribute, syntax, attribute.column_id?))
                });
                if let Some((attribute, syntax, column)) = readable {
                    let count = if attribute.is_single_valued {
                        1
                    } else {
                        cursor.value_count(column).unwrap_or_default()
                    };
                    for tag in 1..=count {
                        match syntax.read(cursor, column, tag) {
                            Ok(Some(value)) => values.push(value),
                            Ok(None) => {}
                            Err(err) => warn!(
                                "[ntds] Could not read value {tag} of {}: {err:?}",
                                attribute.ldap_name
                            ),
                        }
                    }
                }
                results.push(values);
            }
            results
        })?;

        let mut results = Vec::with_capacity(schemas.len());
        for (schema, values) in schemas.iter().zip(raw) {
            let Some(attribute) = schema else {
                results.push(Vec::new());
                continue;
            };
            if attribute.is_link() {
                let links = link_values(self, object, attribute)?;
                results.push(links.into_iter().map(AttributeValue::Object).collect());
                continue;
            }
            let Some(syntax) = attribute.syntax else {
                results.push(Vec::new());
                continue;
            };
            let decoded = if decode {
                values
                    .into_iter()
                    .filter_map(|raw| syntax.decode(raw, &self.store))
                    .collect()
            } else {
                values.into_iter().map(RawValue::into_value).collect()
            };
            results.push(decoded);
        }
        Ok(results)
    }
}

/// Start at the database root and descend through the first live child until a naming context head
fn detect_root(store: &RecordStore) -> Result<Rc<DirectoryObject>, NtdsError> {
    let Some(database_root) = DirectoryIter::new(store, DirectoryQuery::Children(0)).next() else {
        error!("[ntds] Database has no root object");
        return Err(NtdsError::NoRootFound);
    };
    let mut current = database_root?;

    loop {
        let mut next = None;
        for child in DirectoryIter::new(store, DirectoryQuery::Children(current.dnt())) {
            let child = child?;
            if child.is_deleted() {
                continue;
            }
            next = Some(child);
            break;
        }

        let Some(child) = next else {
            error!("[ntds] No naming context found below {}", current.name());
            return Err(NtdsError::NoRootFound);
        };
        if child.is_nc_head() {
            return Ok(child);
        }
        current = child;
    }
}

/// Split a DN into unescaped RDN values, most specific first
pub(crate) fn parse_dn_values(dn: &str) -> Option<Vec<String>> {
    let mut values = Vec::new();
    let mut component = String::new();
    let mut chars = dn.chars();
    while let Some(character) = chars.next() {
        match character {
            '\\' => match chars.next()? {
                'r' => component.push('\r'),
                'n' => component.push('\n'),
                escaped => component.push(escaped),
            },
            ',' => values.push(std::mem::take(&mut component)),
            _ => component.push(character),
        }
    }
    values.push(component);

    let mut names = Vec::with_capacity(values.len());
    for value in values {
        let (_, name) = value.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        names.push(name.to_string());
    }
    Some(names)
}

/// Walk from the database root through each RDN value, most general first
fn find_root_by_name(store: &RecordStore, dn: &str) -> Result<Rc<DirectoryObject>, NtdsError> {
    let Some(names) = parse_dn_values(dn) else {
        error!("[ntds] Root domain {dn} is not a valid DN");
        return Err(NtdsError::NoRootFound);
    };
    let Some(database_root) = DirectoryIter::new(store, DirectoryQuery::Children(0)).next() else {
        error!("[ntds] Database has no root object");
        return Err(NtdsError::NoRootFound);
    };

    let mut current = database_root?;
    for name in names.iter().rev() {
        current = match store.get_by_parent_and_name(current.dnt(), name) {
            Ok(result) => result,
            Err(NtdsError::ObjectNotFound) => {
                error!("[ntds] Root domain {dn} not found at {name}");
                return Err(NtdsError::NoRootFound);
            }
            Err(err) => return Err(err),
        };
    }
    Ok(current)
}
