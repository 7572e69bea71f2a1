use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Nil,
    Bit,
    UnsignedByte,
    Short,
    Long,
    Currency,
    Float32,
    Float64,
    DateTime,
    Binary,
    /**Can be ASCII OR Unicode */
    Text,
    LongBinary,
    /**Can be ASCII or Unicode */
    LongText,
    /**No longer used */
    SuperLong,
    UnsignedLong,
    LongLong,
    Guid,
    UnsignedShort,
    Unknown,
}

/**
 * A single object from the directory tree  
 * Attribute values are keyed by LDAP display name. Binary values are base64 encoded
 */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryEntry {
    /**Distinguished name tag (row identifier) */
    pub dnt: u32,
    /**Row identifier of the parent object */
    pub parent_dnt: u32,
    pub name: String,
    pub distinguished_name: String,
    /**Ancestor names separated by a backslash */
    pub object_path: String,
    /**LDAP display name of the structural object class */
    pub object_class: String,
    pub is_deleted: bool,
    pub is_nc_head: bool,
    pub instance_type: Vec<String>,
    pub attributes: BTreeMap<String, Value>,
}

/**
 * An object class defined in the directory schema
 */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassEntry {
    pub dnt: u32,
    pub ldap_name: String,
    /**Decoded governsID OID */
    pub governs_id: String,
    pub governs_id_raw: u32,
    /**LDAP display name of the superclass. Empty for the root class */
    pub superclass: String,
    pub admin_description: String,
    /**LDAP names of every attribute the class may hold, including inherited ones */
    pub attributes: Vec<String>,
}

/**
 * An attribute defined in the directory schema
 */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeEntry {
    pub dnt: u32,
    pub ldap_name: String,
    /**Decoded attributeID OID */
    pub attribute_id: String,
    pub attribute_id_raw: u32,
    /**Name of the backing datatable column. Empty when the attribute has no column */
    pub column_name: String,
    pub exists_in_database: bool,
    /**LDAP name of the attribute syntax. Empty when the syntax is not supported */
    pub syntax: String,
    pub syntax_oid: String,
    pub om_syntax: i32,
    pub is_single_valued: bool,
    pub link_id: i32,
    pub search_flags: Vec<String>,
    pub admin_description: String,
}
