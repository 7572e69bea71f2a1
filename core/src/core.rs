use crate::{
    artifacts::{ntds_collection::ntds_collection, os::windows::error::WinArtifactError},
    error::TomlError,
    filesystem::files::read_file,
    structs::toml::NtdsToml,
    utils::logging::create_log_file,
};
use log::{error, info};
use simplelog::{Config, WriteLogger};

/// Parse a TOML file at provided path
pub fn parse_toml_file(path: &str) -> Result<(), TomlError> {
    let buffer = match read_file(path) {
        Ok(results) => results,
        Err(err) => {
            error!("[ntds] Could not read TOML file {path}: {err:?}");
            return Err(TomlError::NoFile);
        }
    };
    parse_toml_data(&buffer)
}

/// Parse an already read TOML file
pub fn parse_toml_data(data: &[u8]) -> Result<(), TomlError> {
    let collector = match NtdsToml::parse_ntds_toml(data) {
        Ok(results) => results,
        Err(_) => return Err(TomlError::BadToml),
    };
    toml_data(&collector, data)
}

/// Set up logging then run the collection
fn toml_data(collector: &NtdsToml, toml_data: &[u8]) -> Result<(), TomlError> {
    if let Ok((log_file, level)) = create_log_file(&collector.output) {
        let _ = WriteLogger::init(level, Config::default(), log_file);
    }

    match ntds_collection(toml_data) {
        Ok(_) => {
            info!("[ntds] Core parsed NTDS TOML data");
            Ok(())
        }
        Err(err) => {
            error!("[ntds] Core failed to parse NTDS TOML data: {err:?}");
            match err {
                WinArtifactError::BadToml => Err(TomlError::BadToml),
                WinArtifactError::Directory => Err(TomlError::Directory),
                _ => Err(TomlError::Output),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_toml_data, parse_toml_file};
    use crate::error::TomlError;
    use std::path::PathBuf;

    #[test]
    fn test_parse_toml_file() {
        let mut test_location = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        test_location.push("tests/test_data/ntds/collection.toml");

        parse_toml_file(&test_location.display().to_string()).unwrap();
    }

    #[test]
    fn test_parse_toml_file_missing() {
        let result = parse_toml_file("./tests/test_data/ntds/missing.toml");
        assert!(matches!(result, Err(TomlError::NoFile)));
    }

    #[test]
    fn test_parse_toml_data_bad() {
        let result = parse_toml_data(b"not = [toml");
        assert!(matches!(result, Err(TomlError::BadToml)));
    }

    #[test]
    fn test_parse_toml_data_bad_directory() {
        let toml = r#"
[output]
name = "core_bad_directory"
directory = "./tmp"
format = "jsonl"
compress = false

[directory]
path = "./missing.json"
"#;
        let result = parse_toml_data(toml.as_bytes());
        assert!(matches!(result, Err(TomlError::Directory)));
    }
}
