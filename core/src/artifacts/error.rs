use std::fmt;

#[derive(Debug)]
pub(crate) enum CollectionError {
    Output,
    Format,
}

impl std::error::Error for CollectionError {}

impl fmt::Display for CollectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionError::Output => write!(f, "Failed to output data"),
            CollectionError::Format => write!(f, "Unknown formatter provided"),
        }
    }
}
