use std::fmt;

#[derive(Debug)]
pub enum UtilsError {
    BadToml,
    CreateDirectory,
    LogFile,
}

impl std::error::Error for UtilsError {}

impl fmt::Display for UtilsError {
    fn fmt<'a>(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UtilsError::BadToml => write!(f, "Failed to parse TOML data"),
            UtilsError::CreateDirectory => write!(f, "Could not create directory(ies)"),
            UtilsError::LogFile => write!(f, "Could not create log file"),
        }
    }
}
