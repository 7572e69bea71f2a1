use uuid::Uuid;

/// Generate a random UUID used for output and log file names
pub(crate) fn generate_uuid() -> String {
    Uuid::new_v4().hyphenated().to_string()
}

/// Format GUID bytes stored in little endian (Windows) layout
pub(crate) fn format_guid_le_bytes(data: &[u8]) -> Option<String> {
    let bytes: [u8; 16] = data.try_into().ok()?;
    Some(Uuid::from_bytes_le(bytes).hyphenated().to_string())
}

/// Convert a GUID string back into its little endian byte layout
pub(crate) fn guid_to_le_bytes(guid: &str) -> Option<Vec<u8>> {
    let value = Uuid::parse_str(guid).ok()?;
    Some(value.to_bytes_le().to_vec())
}
