use super::error::CompressionError;
use flate2::{write::GzEncoder, Compression};
use log::error;
use std::io::Write;

/// Compress provided data with GZIP
pub(crate) fn compress_gzip_data(data: &[u8]) -> Result<Vec<u8>, CompressionError> {
    let mut gz = GzEncoder::new(Vec::new(), Compression::default());
    let status = gz.write_all(data);
    match status {
        Ok(_) => {}
        Err(err) => {
            error!("[compression] Could not compress data with gzip: {err:?}");
            return Err(CompressionError::CompressCreate);
        }
    }
    let finish_status = gz.finish();

    let data = match finish_status {
        Ok(results) => results,
        Err(err) => {
            error!("[compression] Could not finish gzip compressing data: {err:?}");
            return Err(CompressionError::GzipFinish);
        }
    };
    Ok(data)
}
