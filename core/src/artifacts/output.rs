use crate::{
    artifacts::error::CollectionError,
    output::formats::{json::json_format, jsonl::jsonl_format},
    structs::toml::Output,
};
use log::error;
use serde_json::Value;

/// Output directory query results in the format configured by the TOML `Output`
pub(crate) fn output_artifact(
    serde_data: &Value,
    output_name: &str,
    output: &Output,
    start_time: &u64,
) -> Result<String, CollectionError> {
    let output_status = match output.format.to_lowercase().as_str() {
        "json" => json_format(serde_data, output_name, output, start_time),
        "jsonl" => jsonl_format(serde_data, output_name, output, start_time),
        _ => {
            error!("[ntds] Unknown formatter provided: {}", output.format);
            return Err(CollectionError::Format);
        }
    };
    match output_status {
        Ok(path) => Ok(path),
        Err(err) => {
            error!("[ntds] Could not output data: {err:?}");
            Err(CollectionError::Output)
        }
    }
}
