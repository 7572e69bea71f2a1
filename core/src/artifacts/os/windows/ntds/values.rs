use super::{directory::NtdsDirectory, error::NtdsError, object::DirectoryObject};
use crate::utils::encoding::base64_encode_standard;
use chrono::{DateTime, Utc};
use std::{cell::OnceCell, fmt, rc::Rc};

/// Column data read with an attribute syntax before any decoding
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Int32(i32),
    Int64(i64),
    Bytes(Vec<u8>),
    Text(String),
}

/// A decoded attribute value
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Boolean(bool),
    Integer(i32),
    LargeInteger(i64),
    Text(String),
    Binary(Vec<u8>),
    Time(DateTime<Utc>),
    Guid(String),
    Sid(String),
    Oid(String),
    SecurityDescriptor(String),
    Object(ObjectReference),
    InstanceType(u32),
    SystemFlags(u32),
    SearchFlags(u32),
}

impl RawValue {
    /// Present a raw value without decoding
    pub fn into_value(self) -> AttributeValue {
        match self {
            RawValue::Int32(value) => AttributeValue::Integer(value),
            RawValue::Int64(value) => AttributeValue::LargeInteger(value),
            RawValue::Bytes(value) => AttributeValue::Binary(value),
            RawValue::Text(value) => AttributeValue::Text(value),
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Boolean(value) => write!(f, "{value}"),
            AttributeValue::Integer(value) => write!(f, "{value}"),
            AttributeValue::LargeInteger(value) => write!(f, "{value}"),
            AttributeValue::Text(value)
            | AttributeValue::Guid(value)
            | AttributeValue::Sid(value)
            | AttributeValue::Oid(value)
            | AttributeValue::SecurityDescriptor(value) => write!(f, "{value}"),
            AttributeValue::Binary(value) => write!(f, "{}", base64_encode_standard(value)),
            AttributeValue::Time(value) => write!(f, "{}", value.to_rfc3339()),
            AttributeValue::Object(value) => write!(f, "{}", value.dnt()),
            AttributeValue::InstanceType(value)
            | AttributeValue::SystemFlags(value)
            | AttributeValue::SearchFlags(value) => write!(f, "{value}"),
        }
    }
}

/**
 * Reference to another directory object by row identifier.  
 * The target is only materialized on first access and then kept
 */
#[derive(Debug, Clone)]
pub struct ObjectReference {
    dnt: u32,
    target: OnceCell<Rc<DirectoryObject>>,
}

impl ObjectReference {
    pub(crate) fn new(dnt: u32) -> ObjectReference {
        ObjectReference {
            dnt,
            target: OnceCell::new(),
        }
    }

    pub fn dnt(&self) -> u32 {
        self.dnt
    }

    pub fn is_resolved(&self) -> bool {
        self.target.get().is_some()
    }

    /// Resolve the referenced object
    pub fn target(&self, directory: &NtdsDirectory) -> Result<Rc<DirectoryObject>, NtdsError> {
        if let Some(object) = self.target.get() {
            return Ok(object.clone());
        }
        let object = directory.get_by_dnt(self.dnt)?;
        let _ = self.target.set(object.clone());
        Ok(object)
    }
}

impl PartialEq for ObjectReference {
    fn eq(&self, other: &Self) -> bool {
        self.dnt == other.dnt
    }
}

#[cfg(test)]
mod tests {
    use super::{AttributeValue, ObjectReference, RawValue};
    use crate::artifacts::os::windows::ntds::fixture::fixture_directory;
    use std::rc::Rc;

    #[test]
    fn test_into_value() {
        assert_eq!(RawValue::Int32(5).into_value(), AttributeValue::Integer(5));
        assert_eq!(
            RawValue::Bytes(vec![1, 2]).into_value(),
            AttributeValue::Binary(vec![1, 2])
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(AttributeValue::Binary(vec![1, 2, 3]).to_string(), "AQID");
        assert_eq!(AttributeValue::Boolean(true).to_string(), "true");
        assert_eq!(
            AttributeValue::Object(ObjectReference::new(9)).to_string(),
            "9"
        );
    }

    #[test]
    fn test_object_reference() {
        let directory = fixture_directory();
        let reference = ObjectReference::new(4);
        assert!(!reference.is_resolved());

        let first = reference.target(&directory).unwrap();
        assert!(reference.is_resolved());
        assert_eq!(first.name(), "example");

        let second = reference.target(&directory).unwrap();
        assert!(Rc::ptr_eq(&first, &second));
    }
}
