/**
 * Record access for the NTDS datatable.
 *
 * Holds the long lived cursors (DNT lookups and security descriptors), the resolved
 * special column ids and the identity cache of materialized objects
 */
use super::{
    error::NtdsError,
    object::{DirectoryObject, ObjectKind},
    schema::{AttributeSchema, ClassSchema, ATTRIBUTE_SCHEMA_ID, CLASS_SCHEMA_ID},
    syntax::{column_name, syntax_for_attribute},
};
use crate::artifacts::os::windows::{
    ese::{
        cursor::{ColumnId, EseCursor, EseDatabase, KeyLimit, SeekType},
        error::EseError,
    },
    securitydescriptor::descriptor::descriptor_to_sddl,
};
use log::{error, warn};
use std::{
    cell::{OnceCell, RefCell},
    collections::HashMap,
    rc::Rc,
};

pub(crate) const DATA_TABLE: &str = "datatable";
pub(crate) const DNT_INDEX: &str = "DNT_index";
pub(crate) const PARENT_NAME_INDEX: &str = "PDNT_index";
pub(crate) const ANCESTORS_INDEX: &str = "Ancestors_index";
pub(crate) const OBJECT_SID_INDEX: &str = "INDEX_00090092";
pub(crate) const PRIMARY_GROUP_INDEX: &str = "INDEX_00090062";

pub(crate) const LINK_TABLE: &str = "link_table";
pub(crate) const LINK_INDEX: &str = "link_index";
pub(crate) const BACKLINK_INDEX: &str = "backlink_index";

const SD_TABLE: &str = "sd_table";
const SD_VALUE: &str = "sd_value";
const SD_ID_INDEX: &str = "sd_id_index";

/// Datatable columns read for every record
pub(crate) struct SpecialColumns {
    dnt: ColumnId,
    pdnt: ColumnId,
    ancestors: ColumnId,
    rdn_type: ColumnId,
    name: ColumnId,
    is_deleted: ColumnId,
    instance_type: ColumnId,
    object_class: ColumnId,
    admin_description: ColumnId,
    ldap_display_name: ColumnId,
    attribute_syntax: ColumnId,
    om_syntax: ColumnId,
    attribute_id: ColumnId,
    is_single_valued: ColumnId,
    link_id: ColumnId,
    search_flags: ColumnId,
    governs_id: ColumnId,
    subclass_of: ColumnId,
    auxiliary_class: ColumnId,
    system_auxiliary_class: ColumnId,
    must_contain: ColumnId,
    system_must_contain: ColumnId,
    may_contain: ColumnId,
    system_may_contain: ColumnId,
}

/// link_table columns
pub(crate) struct LinkColumns {
    pub(crate) backlink_dnt: ColumnId,
    pub(crate) link_dnt: ColumnId,
}

pub(crate) struct RecordStore {
    db: Box<dyn EseDatabase>,
    columns: SpecialColumns,
    pub(crate) links: LinkColumns,
    dnt_cursor: RefCell<Box<dyn EseCursor>>,
    sd_cursor: Option<(RefCell<Box<dyn EseCursor>>, ColumnId)>,
    cache: RefCell<HashMap<u32, Rc<DirectoryObject>>>,
    cache_generic: bool,
}

fn required_column(db: &dyn EseDatabase, table: &str, column: &str) -> Result<ColumnId, NtdsError> {
    match db.column_id(table, column) {
        Ok(result) => Ok(result),
        Err(err) => {
            error!("[ntds] Missing column {column} in {table}: {err:?}. Not an NTDS database");
            Err(NtdsError::NotNtds)
        }
    }
}

impl SpecialColumns {
    fn resolve(db: &dyn EseDatabase) -> Result<SpecialColumns, NtdsError> {
        let column = |name: &str| required_column(db, DATA_TABLE, name);
        Ok(SpecialColumns {
            dnt: column("DNT_col")?,
            pdnt: column("PDNT_col")?,
            ancestors: column("Ancestors_col")?,
            rdn_type: column("RDNtyp_col")?,
            name: column("ATTm589825")?,
            is_deleted: column("ATTi131120")?,
            instance_type: column("ATTj131073")?,
            object_class: column("ATTc0")?,
            admin_description: column("ATTm131298")?,
            ldap_display_name: column("ATTm131532")?,
            attribute_syntax: column("ATTc131104")?,
            om_syntax: column("ATTj131303")?,
            attribute_id: column("ATTc131102")?,
            is_single_valued: column("ATTi131105")?,
            link_id: column("ATTj131122")?,
            search_flags: column("ATTj131406")?,
            governs_id: column("ATTc131094")?,
            subclass_of: column("ATTc131093")?,
            auxiliary_class: column("ATTc131423")?,
            system_auxiliary_class: column("ATTc590022")?,
            must_contain: column("ATTc131096")?,
            system_must_contain: column("ATTc590021")?,
            may_contain: column("ATTc131097")?,
            system_may_contain: column("ATTc590020")?,
        })
    }
}

/// Decode the Ancestors_col blob. The last entry is the object itself and is dropped
pub(crate) fn parse_ancestors(data: &[u8]) -> Vec<u32> {
    if data.len() < 8 {
        return Vec::new();
    }
    let count = data.len() / 4 - 1;
    data.chunks_exact(4)
        .take(count)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

impl RecordStore {
    pub(crate) fn new(db: Box<dyn EseDatabase>, cache_generic: bool) -> Result<RecordStore, NtdsError> {
        let columns = SpecialColumns::resolve(db.as_ref())?;
        let links = LinkColumns {
            backlink_dnt: required_column(db.as_ref(), LINK_TABLE, "backlink_DNT")?,
            link_dnt: required_column(db.as_ref(), LINK_TABLE, "link_DNT")?,
        };
        // link_base is only used as a key segment but must exist
        required_column(db.as_ref(), LINK_TABLE, "link_base")?;

        let mut dnt_cursor = db.open_table(DATA_TABLE)?;
        dnt_cursor.set_index(DNT_INDEX)?;

        let sd_cursor = match RecordStore::open_sd_cursor(db.as_ref()) {
            Ok(result) => Some(result),
            Err(err) => {
                warn!("[ntds] Security descriptor table unavailable: {err:?}");
                None
            }
        };

        Ok(RecordStore {
            db,
            columns,
            links,
            dnt_cursor: RefCell::new(dnt_cursor),
            sd_cursor,
            cache: RefCell::new(HashMap::new()),
            cache_generic,
        })
    }

    fn open_sd_cursor(
        db: &dyn EseDatabase,
    ) -> Result<(RefCell<Box<dyn EseCursor>>, ColumnId), NtdsError> {
        let value = db.column_id(SD_TABLE, SD_VALUE)?;
        let mut cursor = db.open_table(SD_TABLE)?;
        cursor.set_index(SD_ID_INDEX)?;
        Ok((RefCell::new(cursor), value))
    }

    pub(crate) fn database(&self) -> &dyn EseDatabase {
        self.db.as_ref()
    }

    /// Open a short lived datatable cursor on an index
    pub(crate) fn open_index(&self, table: &str, index: &str) -> Result<Box<dyn EseCursor>, NtdsError> {
        let mut cursor = self.db.open_table(table)?;
        cursor.set_index(index)?;
        Ok(cursor)
    }

    pub(crate) fn get_by_dnt(&self, dnt: u32) -> Result<Rc<DirectoryObject>, NtdsError> {
        if let Some(object) = self.cache.borrow().get(&dnt) {
            return Ok(object.clone());
        }

        let mut cursor = self.dnt_cursor.borrow_mut();
        cursor.make_key_i32(dnt as i32, true, KeyLimit::Exact)?;
        if !cursor.seek(SeekType::Equal)? {
            return Err(NtdsError::ObjectNotFound);
        }
        self.materialize(&**cursor)
    }

    pub(crate) fn get_by_parent_and_name(
        &self,
        parent_dnt: u32,
        name: &str,
    ) -> Result<Rc<DirectoryObject>, NtdsError> {
        if name.is_empty() {
            return Err(NtdsError::InvalidName);
        }
        let mut cursor = self.open_index(DATA_TABLE, PARENT_NAME_INDEX)?;
        cursor.make_key_i32(parent_dnt as i32, true, KeyLimit::Exact)?;
        cursor.make_key_text(name, false, KeyLimit::Exact)?;
        if !cursor.seek(SeekType::Equal)? {
            return Err(NtdsError::ObjectNotFound);
        }
        self.materialize(&*cursor)
    }

    /// Run a read against the record of an object using the DNT cursor
    pub(crate) fn with_record<T, F>(&self, dnt: u32, read: F) -> Result<T, NtdsError>
    where
        F: FnOnce(&dyn EseCursor) -> T,
    {
        let mut cursor = self.dnt_cursor.borrow_mut();
        cursor.make_key_i32(dnt as i32, true, KeyLimit::Exact)?;
        if !cursor.seek(SeekType::Equal)? {
            return Err(NtdsError::ObjectNotFound);
        }
        Ok(read(&**cursor))
    }

    /**
     * Build a `DirectoryObject` from the current record of a datatable cursor.  
     * Returns the cached instance if the DNT was already materialized
     */
    pub(crate) fn materialize(&self, cursor: &dyn EseCursor) -> Result<Rc<DirectoryObject>, NtdsError> {
        let columns = &self.columns;
        let dnt = match cursor.read_i32(columns.dnt)? {
            Some(result) => result as u32,
            None => {
                error!("[ntds] Record has no DNT");
                return Err(NtdsError::ObjectNotFound);
            }
        };
        if let Some(object) = self.cache.borrow().get(&dnt) {
            return Ok(object.clone());
        }

        let parent_dnt = lossy(cursor.read_i32(columns.pdnt), "PDNT").unwrap_or_default() as u32;
        let ancestry_bytes = lossy(cursor.read_bytes(columns.ancestors), "ancestors").unwrap_or_default();
        let ancestors = parse_ancestors(&ancestry_bytes);
        let deleted = lossy(cursor.read_i32(columns.is_deleted), "isDeleted").unwrap_or_default() != 0;
        let object_class_id =
            lossy(cursor.read_i32(columns.object_class), "objectClass").unwrap_or_default() as u32;
        let superclass_chain = lossy_multi(cursor, columns.object_class);
        let name = lossy(cursor.read_utf16(columns.name), "name").unwrap_or_default();
        let instance_type =
            lossy(cursor.read_i32(columns.instance_type), "instanceType").unwrap_or_default() as u32;
        let rdn_attribute_id =
            lossy(cursor.read_i32(columns.rdn_type), "RDNtyp").unwrap_or_default() as u32;

        let kind = match object_class_id {
            CLASS_SCHEMA_ID => ObjectKind::Class(self.read_class(cursor)),
            ATTRIBUTE_SCHEMA_ID => ObjectKind::Attribute(self.read_attribute(cursor)),
            _ => ObjectKind::Generic,
        };
        let cache = !matches!(kind, ObjectKind::Generic) || self.cache_generic;

        let object = Rc::new(DirectoryObject {
            dnt,
            parent_dnt,
            ancestry_bytes,
            ancestors,
            deleted,
            object_class_id,
            superclass_chain,
            name,
            instance_type,
            rdn_attribute_id,
            kind,
            distinguished_name: OnceCell::new(),
            object_path: OnceCell::new(),
        });
        if cache {
            self.cache.borrow_mut().insert(dnt, object.clone());
        }
        Ok(object)
    }

    fn read_class(&self, cursor: &dyn EseCursor) -> ClassSchema {
        let columns = &self.columns;
        ClassSchema {
            governs_id_raw: lossy(cursor.read_i32(columns.governs_id), "governsID").unwrap_or_default()
                as u32,
            ldap_name: lossy(cursor.read_utf16(columns.ldap_display_name), "lDAPDisplayName")
                .unwrap_or_default(),
            admin_description: lossy(cursor.read_utf16(columns.admin_description), "adminDescription")
                .unwrap_or_default(),
            subclass_of_id: lossy(cursor.read_i32(columns.subclass_of), "subClassOf").unwrap_or_default()
                as u32,
            auxiliary_class_ids: lossy_multi(cursor, columns.auxiliary_class),
            system_auxiliary_class_ids: lossy_multi(cursor, columns.system_auxiliary_class),
            must_contain_ids: lossy_multi(cursor, columns.must_contain),
            system_must_contain_ids: lossy_multi(cursor, columns.system_must_contain),
            may_contain_ids: lossy_multi(cursor, columns.may_contain),
            system_may_contain_ids: lossy_multi(cursor, columns.system_may_contain),
        }
    }

    fn read_attribute(&self, cursor: &dyn EseCursor) -> AttributeSchema {
        let columns = &self.columns;
        let attribute_id_raw =
            lossy(cursor.read_i32(columns.attribute_id), "attributeID").unwrap_or_default() as u32;
        let attribute_syntax_raw =
            lossy(cursor.read_i32(columns.attribute_syntax), "attributeSyntax").unwrap_or_default()
                as u32;
        let om_syntax = lossy(cursor.read_i32(columns.om_syntax), "oMSyntax").unwrap_or_default();
        let link_id = lossy(cursor.read_i32(columns.link_id), "linkID").unwrap_or_default();

        let mut column = None;
        let mut column_id = None;
        if link_id == 0 {
            column = column_name(attribute_id_raw, attribute_syntax_raw);
            // The column only exists once the attribute has been populated
            if let Some(name) = &column {
                column_id = self.db.column_id(DATA_TABLE, name).ok();
            }
        }

        AttributeSchema {
            attribute_id_raw,
            ldap_name: lossy(cursor.read_utf16(columns.ldap_display_name), "lDAPDisplayName")
                .unwrap_or_default(),
            admin_description: lossy(cursor.read_utf16(columns.admin_description), "adminDescription")
                .unwrap_or_default(),
            attribute_syntax_raw,
            om_syntax,
            is_single_valued: lossy(cursor.read_i32(columns.is_single_valued), "isSingleValued")
                .unwrap_or_default()
                != 0,
            link_id,
            search_flags_raw: lossy(cursor.read_i32(columns.search_flags), "searchFlags")
                .unwrap_or_default() as u32,
            syntax: syntax_for_attribute(attribute_id_raw, attribute_syntax_raw, om_syntax),
            column_name: column,
            column_id,
        }
    }

    /**
     * Resolve a security descriptor value to SDDL.  
     * An 8 byte value is a key into sd_table, anything else is parsed as an inline descriptor
     */
    pub(crate) fn security_descriptor(&self, data: &[u8]) -> Option<String> {
        let key: [u8; 8] = match data.try_into() {
            Ok(result) => result,
            Err(_) => return descriptor_to_sddl(data),
        };
        let Some((cursor, value_column)) = &self.sd_cursor else {
            warn!("[ntds] No sd_table to resolve descriptor key");
            return None;
        };

        let id = i64::from_le_bytes(key);
        let mut cursor = cursor.borrow_mut();
        let found = cursor
            .make_key_i64(id, true, KeyLimit::Exact)
            .and_then(|_| cursor.seek(SeekType::Equal));
        match found {
            Ok(true) => {}
            Ok(false) => {
                warn!("[ntds] Security descriptor {id} not found");
                return None;
            }
            Err(err) => {
                warn!("[ntds] Could not seek security descriptor {id}: {err:?}");
                return None;
            }
        }

        let descriptor = match cursor.read_bytes(*value_column) {
            Ok(Some(result)) => result,
            Ok(None) => return None,
            Err(err) => {
                warn!("[ntds] Could not read security descriptor {id}: {err:?}");
                return None;
            }
        };
        let sddl = descriptor_to_sddl(&descriptor);
        if sddl.is_none() {
            warn!("[ntds] Security descriptor {id} is malformed");
        }
        sddl
    }

    #[cfg(test)]
    pub(crate) fn is_cached(&self, dnt: u32) -> bool {
        self.cache.borrow().contains_key(&dnt)
    }
}

/// Column reads while materializing never fail the whole record
fn lossy<T>(value: Result<Option<T>, EseError>, column: &str) -> Option<T> {
    match value {
        Ok(result) => result,
        Err(err) => {
            warn!("[ntds] Could not read {column}: {err:?}");
            None
        }
    }
}

fn lossy_multi(cursor: &dyn EseCursor, column: ColumnId) -> Vec<u32> {
    match cursor.read_nonnull_multi_i32(column) {
        Ok(values) => values.into_iter().map(|value| value as u32).collect(),
        Err(err) => {
            warn!("[ntds] Could not read multi-valued column {column:?}: {err:?}");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_ancestors, RecordStore};
    use crate::artifacts::os::windows::{
        ese::memory::MemoryDatabase,
        ntds::{
            error::NtdsError,
            fixture::{fixture_database, fixture_directory, ALICE_DNT, SCHEMA_DNT},
        },
    };
    use std::rc::Rc;

    #[test]
    fn test_parse_ancestors() {
        let data = [2, 0, 0, 0, 3, 0, 0, 0, 4, 0, 0, 0];
        assert_eq!(parse_ancestors(&data), vec![2, 3]);
        assert!(parse_ancestors(&[2, 0, 0, 0]).is_empty());
        assert!(parse_ancestors(&[]).is_empty());
    }

    #[test]
    fn test_not_ntds() {
        let mut db = MemoryDatabase::new(true);
        db.create_table("datatable", &[]).unwrap();
        let result = RecordStore::new(Box::new(db), true);
        assert_eq!(result.err(), Some(NtdsError::NotNtds));
    }

    #[test]
    fn test_identity_cache() {
        let directory = fixture_directory();
        let first = directory.get_by_dnt(SCHEMA_DNT + 1).unwrap();
        let second = directory.get_by_dnt(SCHEMA_DNT + 1).unwrap();
        assert!(Rc::ptr_eq(&first, &second));

        let first = directory.get_by_dnt(ALICE_DNT).unwrap();
        let second = directory.get_by_dnt(ALICE_DNT).unwrap();
        assert!(Rc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_schema_only_cache() {
        let store = RecordStore::new(Box::new(fixture_database()), false).unwrap();
        let first = store.get_by_dnt(ALICE_DNT).unwrap();
        let second = store.get_by_dnt(ALICE_DNT).unwrap();
        assert!(!Rc::ptr_eq(&first, &second));
        assert!(!store.is_cached(ALICE_DNT));

        store.get_by_dnt(SCHEMA_DNT + 1).unwrap();
        assert!(store.is_cached(SCHEMA_DNT + 1));
    }

    #[test]
    fn test_missing_object() {
        let directory = fixture_directory();
        assert_eq!(
            directory.get_by_dnt(99999).err(),
            Some(NtdsError::ObjectNotFound)
        );
    }

    #[test]
    fn test_security_descriptor() {
        let store = RecordStore::new(Box::new(fixture_database()), true).unwrap();
        assert_eq!(
            store.security_descriptor(&1i64.to_le_bytes()).unwrap(),
            "O:S-1-5-18G:S-1-5-18"
        );
        assert!(store.security_descriptor(&77i64.to_le_bytes()).is_none());
        assert!(store.security_descriptor(&[1, 2, 3]).is_none());
    }
}
