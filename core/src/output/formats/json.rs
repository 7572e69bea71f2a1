use super::error::FormatError;
use crate::{
    output::local::output::local_output,
    structs::toml::Output,
    utils::{compression::compress::compress_gzip_data, time::time_now, uuid::generate_uuid},
};
use log::{error, info};
use serde_json::{json, Value};

/// Output to `json` format. Returns the path of the written file
pub(crate) fn json_format(
    serde_data: &Value,
    output_name: &str,
    output: &Output,
    start_time: &u64,
) -> Result<String, FormatError> {
    let uuid = generate_uuid();
    let mut collection_output = json![{
        "metadata": {
            "uuid": uuid,
            "query_name": output_name,
            "complete_time": time_now(),
            "start_time": start_time,
        }
    }];
    collection_output["data"] = serde_data.clone();

    let serde_collection = match serde_json::to_string(&collection_output) {
        Ok(results) => results,
        Err(err) => {
            error!("[ntds] Failed to serialize json output: {err:?}");
            return Err(FormatError::Serialize);
        }
    };

    let output_data = if output.compress {
        match compress_gzip_data(serde_collection.as_bytes()) {
            Ok(result) => result,
            Err(err) => {
                error!("[ntds] Failed to compress data: {err:?}");
                return Err(FormatError::Output);
            }
        }
    } else {
        serde_collection.into_bytes()
    };

    let output_result = local_output(&output_data, output, &format!("{output_name}_{uuid}"), "json");
    match output_result {
        Ok(path) => {
            info!("[ntds] {output_name} json output success");
            Ok(path)
        }
        Err(err) => {
            error!("[ntds] Failed to output {output_name} json: {err:?}");
            Err(FormatError::Output)
        }
    }
}
