use super::error::FileSystemError;
use log::error;
use std::{
    fs::{metadata, read, File},
    io::{BufReader, Read, Seek, SeekFrom},
    path::Path,
};

/// Default read limit. Snapshots and collector files larger than 2GB are rejected
const MAX_FILE_SIZE: u64 = 2147483648;

/// Check if path is a file
pub(crate) fn is_file(path: &str) -> bool {
    Path::new(path).is_file()
}

/// Read a file that is less than 2GB in size
pub(crate) fn read_file(path: &str) -> Result<Vec<u8>, FileSystemError> {
    if !is_file(path) {
        return Err(FileSystemError::NotFile);
    }
    if file_too_large(path)? {
        return Err(FileSystemError::LargeFile);
    }

    let read_result = read(path);
    match read_result {
        Ok(result) => Ok(result),
        Err(err) => {
            error!("[ntds] Failed to read file {path}: {err:?}");
            Err(FileSystemError::ReadFile)
        }
    }
}

/// Open a file for buffered random access reads
pub(crate) fn file_reader(path: &str) -> Result<BufReader<File>, FileSystemError> {
    if !is_file(path) {
        return Err(FileSystemError::NotFile);
    }
    match File::open(path) {
        Ok(result) => Ok(BufReader::new(result)),
        Err(err) => {
            error!("[ntds] Failed to open file {path}: {err:?}");
            Err(FileSystemError::OpenFile)
        }
    }
}

/// Read `bytes` bytes starting at `offset`
pub(crate) fn read_bytes<T: Read + Seek>(
    offset: u64,
    bytes: u64,
    reader: &mut T,
) -> Result<Vec<u8>, FileSystemError> {
    if reader.seek(SeekFrom::Start(offset)).is_err() {
        error!("[ntds] Could not seek to offset {offset}");
        return Err(FileSystemError::ReadFile);
    }

    let mut buff_size = vec![0u8; bytes as usize];
    if let Err(err) = reader.read_exact(&mut buff_size) {
        error!("[ntds] Could not read {bytes} bytes at offset {offset}: {err:?}");
        return Err(FileSystemError::ReadFile);
    }
    Ok(buff_size)
}

fn file_too_large(path: &str) -> Result<bool, FileSystemError> {
    let meta = match metadata(path) {
        Ok(result) => result,
        Err(err) => {
            error!("[ntds] Failed to get metadata for {path}: {err:?}");
            return Err(FileSystemError::OpenFile);
        }
    };
    Ok(meta.len() > MAX_FILE_SIZE)
}
