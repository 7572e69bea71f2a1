/**
 * Attribute syntaxes supported when reading directory values.
 *
 * A syntax is identified by the prefix encoded attributeSyntax OID and the omSyntax of an attribute.
 * It describes how the backing column is read (`RawType`) and how the raw value is presented (`ValueKind`).
 * A few attributes use non-standard combinations and are matched by attribute id instead
 */
use super::{
    error::NtdsError,
    oid::{decode_prefixed_oid, encode_prefixed_oid},
    store::RecordStore,
    values::{AttributeValue, ObjectReference, RawValue},
};
use crate::{
    artifacts::os::windows::{
        ese::{
            cursor::{bytes_to_i32, bytes_to_i64, ColumnId, EseCursor},
            error::EseError,
        },
        securitydescriptor::sid::{directory_sid_string, sid_string_to_bytes, sid_to_directory_sid},
    },
    utils::{
        strings::{encode_utf16_string, extract_utf16_string, extract_utf8_string},
        time::{datetime_to_ntds_seconds, ntds_seconds_to_datetime},
        uuid::{format_guid_le_bytes, guid_to_le_bytes},
    },
};
use log::warn;

/// How a column value is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawType {
    Int32,
    Int64,
    Bytes,
    Text,
}

/// How a raw value is presented
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Raw,
    Boolean,
    Utf8,
    Sid,
    SecurityDescriptor,
    Oid,
    Object,
    Time,
    Guid,
    InstanceType,
    SystemFlags,
    SearchFlags,
}

#[derive(Debug, PartialEq, Eq)]
pub struct AttributeSyntax {
    pub ldap_name: &'static str,
    pub syntax_oid: &'static str,
    pub prefix_encoded_id: u32,
    pub om_syntax: i32,
    pub om_object_class: Option<&'static str>,
    /**`None` if values of this syntax cannot be read */
    pub raw_type: Option<RawType>,
    pub kind: ValueKind,
}

const SYNTAX_BASE: u32 = 0x80000;

const fn syntax(
    ldap_name: &'static str,
    syntax_oid: &'static str,
    id: u32,
    om_syntax: i32,
    om_object_class: Option<&'static str>,
    raw_type: Option<RawType>,
    kind: ValueKind,
) -> AttributeSyntax {
    AttributeSyntax {
        ldap_name,
        syntax_oid,
        prefix_encoded_id: SYNTAX_BASE + id,
        om_syntax,
        om_object_class,
        raw_type,
        kind,
    }
}

static SYNTAXES: [AttributeSyntax; 21] = [
    syntax("Boolean", "2.5.5.8", 8, 1, None, Some(RawType::Int32), ValueKind::Boolean),
    syntax("Enumeration", "2.5.5.9", 9, 10, None, Some(RawType::Int32), ValueKind::Raw),
    syntax("Integer", "2.5.5.9", 9, 2, None, Some(RawType::Int32), ValueKind::Raw),
    syntax("LargeInteger", "2.5.5.16", 16, 64, None, Some(RawType::Int64), ValueKind::Raw),
    syntax(
        "Object(DN-String)",
        "2.5.5.14",
        14,
        127,
        Some("1.2.840.113556.1.1.1.12"),
        None,
        ValueKind::Raw,
    ),
    syntax(
        "Object(DN-Binary)",
        "2.5.5.7",
        7,
        127,
        Some("1.2.840.113556.1.1.1.11"),
        Some(RawType::Bytes),
        ValueKind::Raw,
    ),
    syntax(
        "Object(DS-DN)",
        "2.5.5.1",
        1,
        127,
        Some("1.3.12.2.1011.28.0.714"),
        Some(RawType::Int32),
        ValueKind::Object,
    ),
    syntax(
        "Object(Presentation-Address)",
        "2.5.5.13",
        13,
        127,
        Some("1.3.12.2.1011.28.0.732"),
        Some(RawType::Text),
        ValueKind::Raw,
    ),
    syntax(
        "Object(Replica-Link)",
        "2.5.5.10",
        10,
        127,
        Some("1.2.840.113556.1.1.1.6"),
        Some(RawType::Bytes),
        ValueKind::Raw,
    ),
    syntax("String(Case)", "2.5.5.3", 3, 27, None, Some(RawType::Text), ValueKind::Raw),
    syntax("String(IA5)", "2.5.5.5", 5, 22, None, Some(RawType::Bytes), ValueKind::Utf8),
    syntax(
        "String(NT-Sec-Desc)",
        "2.5.5.15",
        15,
        66,
        None,
        Some(RawType::Bytes),
        ValueKind::SecurityDescriptor,
    ),
    syntax("String(Numeric)", "2.5.5.6", 6, 18, None, Some(RawType::Bytes), ValueKind::Raw),
    syntax(
        "String(Object-Identifier)",
        "2.5.5.2",
        2,
        6,
        None,
        Some(RawType::Int32),
        ValueKind::Oid,
    ),
    syntax("String(Octet)", "2.5.5.10", 10, 4, None, Some(RawType::Bytes), ValueKind::Raw),
    syntax("String(Printable)", "2.5.5.5", 5, 19, None, Some(RawType::Bytes), ValueKind::Raw),
    syntax("String(Sid)", "2.5.5.17", 17, 4, None, Some(RawType::Bytes), ValueKind::Sid),
    syntax("String(Teletex)", "2.5.5.4", 4, 20, None, Some(RawType::Text), ValueKind::Raw),
    syntax("String(Unicode)", "2.5.5.12", 12, 64, None, Some(RawType::Text), ValueKind::Raw),
    syntax("String(UTC-Time)", "2.5.5.11", 11, 23, None, Some(RawType::Int64), ValueKind::Time),
    syntax(
        "String(Generalized-Time)",
        "2.5.5.11",
        11,
        24,
        None,
        Some(RawType::Int64),
        ValueKind::Time,
    ),
];

static GUID_SYNTAX: AttributeSyntax =
    syntax("String(Guid)", "2.5.5.10", 10, 4, None, Some(RawType::Bytes), ValueKind::Guid);
static INSTANCE_TYPE_SYNTAX: AttributeSyntax = syntax(
    "Enumeration(InstanceType)",
    "2.5.5.9",
    9,
    2,
    None,
    Some(RawType::Int32),
    ValueKind::InstanceType,
);
static SYSTEM_FLAGS_SYNTAX: AttributeSyntax = syntax(
    "Enumeration(SystemFlags)",
    "2.5.5.9",
    9,
    2,
    None,
    Some(RawType::Int32),
    ValueKind::SystemFlags,
);
static SEARCH_FLAGS_SYNTAX: AttributeSyntax = syntax(
    "Enumeration(SearchFlags)",
    "2.5.5.9",
    9,
    10,
    None,
    Some(RawType::Int32),
    ValueKind::SearchFlags,
);

const OBJECT_GUID_ID: u32 = 589826;
const INSTANCE_TYPE_ID: u32 = 131073;
const SYSTEM_FLAGS_ID: u32 = 590199;
const SEARCH_FLAGS_ID: u32 = 131406;
const SCHEMA_ID_GUID_ID: u32 = 589972;
const ATTRIBUTE_SECURITY_GUID_ID: u32 = 589973;

/// Look up a syntax by prefix encoded syntax id and omSyntax
pub fn resolve_syntax(prefix_encoded_id: u32, om_syntax: i32) -> Option<&'static AttributeSyntax> {
    SYNTAXES
        .iter()
        .find(|entry| entry.prefix_encoded_id == prefix_encoded_id && entry.om_syntax == om_syntax)
}

/// Get the syntax used to read an attribute. Some well known attributes override the generic table
pub(crate) fn syntax_for_attribute(
    attribute_id: u32,
    prefix_encoded_id: u32,
    om_syntax: i32,
) -> Option<&'static AttributeSyntax> {
    match attribute_id {
        OBJECT_GUID_ID | SCHEMA_ID_GUID_ID | ATTRIBUTE_SECURITY_GUID_ID => Some(&GUID_SYNTAX),
        INSTANCE_TYPE_ID => Some(&INSTANCE_TYPE_SYNTAX),
        SYSTEM_FLAGS_ID => Some(&SYSTEM_FLAGS_SYNTAX),
        SEARCH_FLAGS_ID => Some(&SEARCH_FLAGS_SYNTAX),
        _ => resolve_syntax(prefix_encoded_id, om_syntax),
    }
}

/**
 * Datatable columns are named `ATT` + type character + attribute id.  
 * The type character is derived from the syntax id: DS-DN is `b`, Object-Identifier is `c` and so on
 */
pub(crate) fn column_name(attribute_id: u32, prefix_encoded_id: u32) -> Option<String> {
    let offset = prefix_encoded_id.checked_sub(SYNTAX_BASE + 1)?;
    if offset > ('z' as u32 - 'b' as u32) {
        return None;
    }
    let type_char = char::from_u32('b' as u32 + offset)?;
    Some(format!("ATT{type_char}{attribute_id}"))
}

impl AttributeSyntax {
    pub fn can_read(&self) -> bool {
        self.raw_type.is_some()
    }

    /// Read one tagged value from the current record
    pub(crate) fn read(
        &self,
        cursor: &dyn EseCursor,
        column: ColumnId,
        tag: u32,
    ) -> Result<Option<RawValue>, EseError> {
        let Some(raw_type) = self.raw_type else {
            return Ok(None);
        };
        let Some(data) = cursor.read_column(column, tag)? else {
            return Ok(None);
        };

        let value = match raw_type {
            RawType::Int32 => RawValue::Int32(bytes_to_i32(&data)?),
            RawType::Int64 => RawValue::Int64(bytes_to_i64(&data)?),
            RawType::Bytes => RawValue::Bytes(data),
            RawType::Text => RawValue::Text(extract_utf16_string(&data)),
        };
        Ok(Some(value))
    }

    /// Decode a raw value. `None` if the value cannot be decoded
    pub(crate) fn decode(&self, raw: RawValue, store: &RecordStore) -> Option<AttributeValue> {
        let value = match (self.kind, raw) {
            (ValueKind::Raw, raw) => raw.into_value(),
            (ValueKind::Boolean, RawValue::Int32(value)) => AttributeValue::Boolean(value != 0),
            (ValueKind::Utf8, RawValue::Bytes(data)) => {
                AttributeValue::Text(extract_utf8_string(&data))
            }
            (ValueKind::Sid, RawValue::Bytes(data)) => {
                let Some(sid) = directory_sid_string(&data) else {
                    warn!("[ntds] Could not decode SID value");
                    return None;
                };
                AttributeValue::Sid(sid)
            }
            (ValueKind::SecurityDescriptor, RawValue::Bytes(data)) => {
                AttributeValue::SecurityDescriptor(store.security_descriptor(&data)?)
            }
            (ValueKind::Oid, RawValue::Int32(value)) => {
                AttributeValue::Oid(decode_prefixed_oid(value as u32))
            }
            (ValueKind::Object, RawValue::Int32(value)) => {
                AttributeValue::Object(ObjectReference::new(value as u32))
            }
            (ValueKind::Time, RawValue::Int64(value)) => {
                let Some(time) = ntds_seconds_to_datetime(value) else {
                    warn!("[ntds] Time value {value} out of range");
                    return None;
                };
                AttributeValue::Time(time)
            }
            (ValueKind::Guid, RawValue::Bytes(data)) => {
                let Some(guid) = format_guid_le_bytes(&data) else {
                    warn!("[ntds] GUID value has {} bytes", data.len());
                    return None;
                };
                AttributeValue::Guid(guid)
            }
            (ValueKind::InstanceType, RawValue::Int32(value)) => {
                AttributeValue::InstanceType(value as u32)
            }
            (ValueKind::SystemFlags, RawValue::Int32(value)) => {
                AttributeValue::SystemFlags(value as u32)
            }
            (ValueKind::SearchFlags, RawValue::Int32(value)) => {
                AttributeValue::SearchFlags(value as u32)
            }
            (kind, raw) => {
                warn!("[ntds] Raw value {raw:?} cannot be decoded as {kind:?}");
                return None;
            }
        };
        Some(value)
    }

    /// Convert a raw value to column data
    pub fn encode_raw(&self, raw: &RawValue) -> Result<Vec<u8>, NtdsError> {
        let Some(raw_type) = self.raw_type else {
            return Err(NtdsError::UnsupportedSyntax);
        };
        let data = match (raw_type, raw) {
            (RawType::Int32, RawValue::Int32(value)) => value.to_le_bytes().to_vec(),
            (RawType::Int64, RawValue::Int64(value)) => value.to_le_bytes().to_vec(),
            (RawType::Bytes, RawValue::Bytes(value)) => value.clone(),
            (RawType::Text, RawValue::Text(value)) => encode_utf16_string(value),
            _ => {
                warn!("[ntds] Raw value {raw:?} does not match syntax {}", self.ldap_name);
                return Err(NtdsError::EncodeValue);
            }
        };
        Ok(data)
    }

    /// Convert a decoded value back to column data
    pub fn encode(&self, value: &AttributeValue) -> Result<Vec<u8>, NtdsError> {
        let raw = match (self.kind, value) {
            (ValueKind::Boolean, AttributeValue::Boolean(flag)) => Some(RawValue::Int32(*flag as i32)),
            (ValueKind::Utf8, AttributeValue::Text(text)) => {
                Some(RawValue::Bytes(text.as_bytes().to_vec()))
            }
            (ValueKind::Sid, AttributeValue::Sid(sid)) => sid_string_to_bytes(sid)
                .and_then(|data| sid_to_directory_sid(&data))
                .map(RawValue::Bytes),
            (ValueKind::SecurityDescriptor, AttributeValue::Binary(data)) => {
                Some(RawValue::Bytes(data.clone()))
            }
            (ValueKind::Oid, AttributeValue::Oid(oid)) => {
                encode_prefixed_oid(oid).map(|value| RawValue::Int32(value as i32))
            }
            (ValueKind::Object, AttributeValue::Object(reference)) => {
                Some(RawValue::Int32(reference.dnt() as i32))
            }
            (ValueKind::Time, AttributeValue::Time(time)) => {
                datetime_to_ntds_seconds(time).map(RawValue::Int64)
            }
            (ValueKind::Guid, AttributeValue::Guid(guid)) => {
                guid_to_le_bytes(guid).map(RawValue::Bytes)
            }
            (ValueKind::InstanceType, AttributeValue::InstanceType(value))
            | (ValueKind::SystemFlags, AttributeValue::SystemFlags(value))
            | (ValueKind::SearchFlags, AttributeValue::SearchFlags(value)) => {
                Some(RawValue::Int32(*value as i32))
            }
            (ValueKind::Raw, AttributeValue::Integer(value)) => Some(RawValue::Int32(*value)),
            (ValueKind::Raw, AttributeValue::LargeInteger(value)) => Some(RawValue::Int64(*value)),
            (ValueKind::Raw, AttributeValue::Text(value)) => Some(RawValue::Text(value.clone())),
            (ValueKind::Raw, AttributeValue::Binary(value)) => Some(RawValue::Bytes(value.clone())),
            _ => None,
        };

        match raw {
            Some(result) => self.encode_raw(&result),
            None => {
                warn!("[ntds] Value {value} cannot be encoded as {}", self.ldap_name);
                Err(NtdsError::EncodeValue)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{column_name, resolve_syntax, syntax_for_attribute, RawType, ValueKind, SYNTAXES};
    use crate::artifacts::os::windows::ntds::{
        error::NtdsError,
        fixture::fixture_directory,
        values::{AttributeValue, ObjectReference, RawValue},
    };

    #[test]
    fn test_resolve_syntax() {
        let result = resolve_syntax(0x80000 + 12, 64).unwrap();
        assert_eq!(result.ldap_name, "String(Unicode)");
        assert_eq!(result.raw_type, Some(RawType::Text));

        let result = resolve_syntax(0x80000 + 9, 10).unwrap();
        assert_eq!(result.ldap_name, "Enumeration");
        assert!(resolve_syntax(0x80000 + 12, 1).is_none());
    }

    #[test]
    fn test_syntax_keys_unique() {
        for (index, entry) in SYNTAXES.iter().enumerate() {
            let first = resolve_syntax(entry.prefix_encoded_id, entry.om_syntax).unwrap();
            assert_eq!(first, &SYNTAXES[index]);
        }
    }

    #[test]
    fn test_syntax_for_attribute() {
        // objectGUID is stored as an octet string
        let result = syntax_for_attribute(589826, 0x80000 + 10, 4).unwrap();
        assert_eq!(result.kind, ValueKind::Guid);
        let result = syntax_for_attribute(131073, 0x80000 + 9, 2).unwrap();
        assert_eq!(result.kind, ValueKind::InstanceType);
        let result = syntax_for_attribute(3, 0x80000 + 12, 64).unwrap();
        assert_eq!(result.kind, ValueKind::Raw);
        assert!(syntax_for_attribute(3, 0x80000 + 30, 64).is_none());
    }

    #[test]
    fn test_dn_string_not_readable() {
        let result = resolve_syntax(0x80000 + 14, 127).unwrap();
        assert!(!result.can_read());
        assert_eq!(
            result.encode_raw(&RawValue::Bytes(vec![1])),
            Err(NtdsError::UnsupportedSyntax)
        );
    }

    #[test]
    fn test_column_name() {
        assert_eq!(column_name(3, 0x80000 + 12).unwrap(), "ATTm3");
        assert_eq!(column_name(131073, 0x80000 + 9).unwrap(), "ATTj131073");
        assert_eq!(column_name(589970, 0x80000 + 17).unwrap(), "ATTr589970");
        assert_eq!(column_name(0, 0x80000 + 2).unwrap(), "ATTc0");
        assert!(column_name(1, 0x80000).is_none());
        assert!(column_name(1, 0x80000 + 40).is_none());
    }

    #[test]
    fn test_decode_values() {
        let directory = fixture_directory();
        let store = directory.store();

        let boolean = resolve_syntax(0x80000 + 8, 1).unwrap();
        assert_eq!(
            boolean.decode(RawValue::Int32(1), store).unwrap(),
            AttributeValue::Boolean(true)
        );
        assert!(boolean.decode(RawValue::Text(String::from("true")), store).is_none());

        let oid = resolve_syntax(0x80000 + 2, 6).unwrap();
        assert_eq!(
            oid.decode(RawValue::Int32(0x80001), store).unwrap(),
            AttributeValue::Oid(String::from("2.5.5.1"))
        );

        let dn = resolve_syntax(0x80000 + 1, 127).unwrap();
        assert_eq!(
            dn.decode(RawValue::Int32(4), store).unwrap(),
            AttributeValue::Object(ObjectReference::new(4))
        );

        let sid = resolve_syntax(0x80000 + 17, 4).unwrap();
        let data = vec![
            1, 5, 0, 0, 0, 0, 0, 5, 21, 0, 0, 0, 1, 0, 0, 0, 2, 0, 0, 0, 3, 0, 0, 0, 0, 0, 4, 80,
        ];
        assert_eq!(
            sid.decode(RawValue::Bytes(data), store).unwrap(),
            AttributeValue::Sid(String::from("S-1-5-21-1-2-3-1104"))
        );

        let ia5 = resolve_syntax(0x80000 + 5, 22).unwrap();
        assert_eq!(
            ia5.decode(RawValue::Bytes(b"mail".to_vec()), store).unwrap(),
            AttributeValue::Text(String::from("mail"))
        );
    }

    #[test]
    fn test_time_round_trip() {
        let directory = fixture_directory();
        let time = resolve_syntax(0x80000 + 11, 23).unwrap();
        let value = time
            .decode(RawValue::Int64(13224476641), directory.store())
            .unwrap();
        match &value {
            AttributeValue::Time(result) => {
                assert_eq!(result.to_rfc3339(), "2020-01-26T01:44:01+00:00")
            }
            _ => panic!("expected a time value"),
        }
        assert_eq!(
            time.encode(&value).unwrap(),
            13224476641i64.to_le_bytes().to_vec()
        );
    }

    #[test]
    fn test_encode_values() {
        let sid = resolve_syntax(0x80000 + 17, 4).unwrap();
        let data = sid
            .encode(&AttributeValue::Sid(String::from("S-1-5-21-1-2-3-1104")))
            .unwrap();
        assert_eq!(&data[24..], &[0, 0, 4, 80]);

        let unicode = resolve_syntax(0x80000 + 12, 64).unwrap();
        assert_eq!(
            unicode.encode(&AttributeValue::Text(String::from("a"))).unwrap(),
            vec![97, 0, 0, 0]
        );
        assert_eq!(
            unicode.encode(&AttributeValue::Integer(1)),
            Err(NtdsError::EncodeValue)
        );

        let oid = resolve_syntax(0x80000 + 2, 6).unwrap();
        assert_eq!(
            oid.encode(&AttributeValue::Oid(String::from("2.5.5.1"))).unwrap(),
            0x80001i32.to_le_bytes().to_vec()
        );
    }
}
