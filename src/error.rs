use thiserror::Error;

use crate::NO_VALUE;

pub type Result<T> = std::result::Result<T, CedarError>;

#[derive(Error, Debug)]
pub enum CedarError {
    /// `NO_VALUE` marks an interior node and cannot be stored.
    #[error("value {} is reserved and cannot be stored", NO_VALUE)]
    ReservedValue,

    /// The root has no terminal slot of its own.
    #[error("failed to insert zero-length key")]
    EmptyKey,

    /// Byte 0 is the terminal label.
    #[error("key contains a 0x00 byte at position {position}")]
    NulByte { position: usize },

    /// A serialized image ended before a field or section could be read.
    #[error("serialized image truncated: needed {needed} bytes, found {available}")]
    Truncated { needed: usize, available: usize },

    /// A length or count field of a serialized image is negative.
    #[error("serialized image has negative {field}: {value}")]
    Corrupt { field: &'static str, value: i32 },

    /// The target of `serialize_to` cannot hold the image.
    #[error("target buffer too small: needed {needed} bytes, found {available}")]
    BufferTooSmall { needed: usize, available: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
