use std::fmt;

#[derive(Debug, PartialEq, Eq)]
pub enum EseError {
    OpenDatabase,
    BadSnapshot,
    BadDatabase,
    BadPage,
    TableNotFound,
    ColumnNotFound,
    IndexNotFound,
    NoIndex,
    NoCurrentRecord,
    NoKey,
    ReadColumn,
    ReadOnly,
    NoPendingUpdate,
}

impl std::error::Error for EseError {}

impl fmt::Display for EseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EseError::OpenDatabase => write!(f, "Failed to open ESE db"),
            EseError::BadSnapshot => write!(f, "Failed to parse ESE table snapshot"),
            EseError::BadDatabase => write!(f, "Not a supported ESE database"),
            EseError::BadPage => write!(f, "Failed to read ESE page"),
            EseError::TableNotFound => write!(f, "Table not found"),
            EseError::ColumnNotFound => write!(f, "Column not found"),
            EseError::IndexNotFound => write!(f, "Index not found"),
            EseError::NoIndex => write!(f, "No index selected on cursor"),
            EseError::NoCurrentRecord => write!(f, "Cursor is not positioned on a record"),
            EseError::NoKey => write!(f, "Search key does not match the current index"),
            EseError::ReadColumn => write!(f, "Failed to read column value"),
            EseError::ReadOnly => write!(f, "Database opened read-only"),
            EseError::NoPendingUpdate => write!(f, "No update prepared on cursor"),
        }
    }
}
