use std::io::Error as IoError;
use std::path::Display;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IOEntry<'a> {
    #[error("Failed to read file {0}: {1}")]
    ReadFileError(Display<'a>, IoError),
}

impl From<IOEntry<'_>> for String {
    #[inline(always)]
    fn from(value: IOEntry) -> Self {
        value.to_string()
    }
}
