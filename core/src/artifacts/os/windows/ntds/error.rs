use crate::artifacts::os::windows::ese::error::EseError;
use std::fmt;

#[derive(Debug, PartialEq, Eq)]
pub enum NtdsError {
    OpenDirectory,
    NotNtds,
    NoRootFound,
    SchemaNotFound,
    ObjectNotFound,
    ClassNotFound,
    AttributeNotFound,
    UnsupportedSyntax,
    SingleValued,
    InvalidName,
    EncodeValue,
    Storage,
}

impl std::error::Error for NtdsError {}

impl fmt::Display for NtdsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NtdsError::OpenDirectory => write!(f, "Failed to open NTDS directory"),
            NtdsError::NotNtds => write!(f, "Database is not an NTDS directory"),
            NtdsError::NoRootFound => write!(f, "No root naming context found"),
            NtdsError::SchemaNotFound => write!(f, "Schema container not found"),
            NtdsError::ObjectNotFound => write!(f, "Directory object not found"),
            NtdsError::ClassNotFound => write!(f, "Object class not found"),
            NtdsError::AttributeNotFound => write!(f, "Attribute not found"),
            NtdsError::UnsupportedSyntax => write!(f, "Attribute syntax not supported"),
            NtdsError::SingleValued => write!(f, "Attribute is single-valued"),
            NtdsError::InvalidName => write!(f, "Object name cannot be empty"),
            NtdsError::EncodeValue => write!(f, "Value does not match attribute syntax"),
            NtdsError::Storage => write!(f, "Storage engine error"),
        }
    }
}

impl From<EseError> for NtdsError {
    fn from(_err: EseError) -> Self {
        NtdsError::Storage
    }
}
