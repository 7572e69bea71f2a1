use std::fmt;

#[derive(Debug)]
pub(crate) enum CompressionError {
    CompressCreate,
    GzipFinish,
    Lz77BadLength,
    Lz77Truncated,
}

impl std::error::Error for CompressionError {}

impl fmt::Display for CompressionError {
    fn fmt<'a>(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompressionError::CompressCreate => write!(f, "Could not compress data"),
            CompressionError::GzipFinish => write!(f, "Could not finish gzip compression"),
            CompressionError::Lz77BadLength => write!(f, "Bad LZ77 match length"),
            CompressionError::Lz77Truncated => write!(f, "LZ77 data ended early"),
        }
    }
}
