use super::error::FormatError;
use crate::{
    output::local::output::local_output,
    structs::toml::Output,
    utils::{compression::compress::compress_gzip_data, time::time_now, uuid::generate_uuid},
};
use log::{error, info};
use serde_json::{json, Value};

/**
 * Output to `jsonl` files. Each array element is written as its own line with the metadata attached.  
 * An empty array only writes the metadata
 */
pub(crate) fn jsonl_format(
    serde_data: &Value,
    output_name: &str,
    output: &Output,
    start_time: &u64,
) -> Result<String, FormatError> {
    let uuid = generate_uuid();
    let metadata = json![{
        "uuid": uuid,
        "query_name": output_name,
        "complete_time": time_now(),
        "start_time": start_time,
    }];

    let mut lines = Vec::new();
    match serde_data.as_array() {
        Some(entries) if !entries.is_empty() => {
            for entry in entries {
                lines.push(create_line(&metadata, entry)?);
            }
        }
        Some(_) => lines.push(create_line(&metadata, &Value::Null)?),
        None => lines.push(create_line(&metadata, serde_data)?),
    }
    let collection_data = lines.join("");

    let output_data = if output.compress {
        match compress_gzip_data(collection_data.as_bytes()) {
            Ok(result) => result,
            Err(err) => {
                error!("[ntds] Failed to compress data: {err:?}");
                return Err(FormatError::Output);
            }
        }
    } else {
        collection_data.into_bytes()
    };

    let output_result =
        local_output(&output_data, output, &format!("{output_name}_{uuid}"), "jsonl");
    match output_result {
        Ok(path) => {
            info!("[ntds] {output_name} jsonl output success");
            Ok(path)
        }
        Err(err) => {
            error!("[ntds] Failed to output {output_name} jsonl: {err:?}");
            Err(FormatError::Output)
        }
    }
}

/// Serialize one line of JSONL output
fn create_line(metadata: &Value, entry: &Value) -> Result<String, FormatError> {
    let line = json![{
        "metadata": metadata,
        "data": entry,
    }];
    match serde_json::to_string(&line) {
        Ok(result) => Ok(format!("{result}\n")),
        Err(err) => {
            error!("[ntds] Failed to serialize jsonl line: {err:?}");
            Err(FormatError::Serialize)
        }
    }
}
