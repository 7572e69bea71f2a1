use std::fmt;

#[derive(Debug)]
pub(crate) enum WinArtifactError {
    BadToml,
    Directory,
    Query,
    Output,
    Serialize,
}

impl std::error::Error for WinArtifactError {}

impl fmt::Display for WinArtifactError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WinArtifactError::BadToml => write!(f, "Failed to parse collection TOML"),
            WinArtifactError::Directory => write!(f, "Failed to open NTDS directory"),
            WinArtifactError::Query => write!(f, "Failed to run directory query"),
            WinArtifactError::Output => write!(f, "Failed to output data"),
            WinArtifactError::Serialize => write!(f, "Failed to serialize directory data"),
        }
    }
}
