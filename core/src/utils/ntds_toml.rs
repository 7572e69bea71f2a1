use super::error::UtilsError;
use crate::structs::toml::NtdsToml;
use log::error;
use std::str::from_utf8;

impl NtdsToml {
    /// Parse the NTDS TOML collector file
    pub(crate) fn parse_ntds_toml(toml_data: &[u8]) -> Result<NtdsToml, UtilsError> {
        let toml_results = toml::from_str(from_utf8(toml_data).unwrap_or_default());
        let mut collector: NtdsToml = match toml_results {
            Ok(results) => results,
            Err(err) => {
                error!("[ntds] Failed to parse TOML data. Error: {err:?}");
                return Err(UtilsError::BadToml);
            }
        };

        // Format is always lowercase
        collector.output.format = collector.output.format.to_lowercase();
        Ok(collector)
    }
}
