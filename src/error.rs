use std::io;
use thiserror::Error;

use crate::core::entry::ValueKind;

#[derive(Error, Debug)]
pub enum KvError {
    #[error(
        "Invalid key size: key must be 1-{} bytes",
        crate::constants::MAX_KEY_SIZE
    )]
    InvalidKeySize,

    #[error(
        "Invalid value size: value must be at most {} bytes",
        crate::constants::MAX_VALUE_SIZE
    )]
    InvalidValueSize,

    #[error("Out of arena memory: could not allocate {requested} bytes")]
    OutOfMemory { requested: usize },

    #[error("Wrong kind for operation: expected {expected}, found {found}")]
    WrongType {
        expected: ValueKind,
        found: ValueKind,
    },

    #[error("Invalid arena pointer: {0:#x}")]
    InvalidArenaPointer(u64),

    #[error("Arena block freed twice: {0:#x}")]
    DoubleFree(u64),

    #[error("Unknown or released handle: {0}")]
    InvalidHandle(u64),

    #[error("Index was created for a different entry layout")]
    IndexMismatch,

    #[error("Corrupted shared structure: {0}")]
    Corrupted(&'static str),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, KvError>;

impl KvError {
    /// Returns true for errors that point at a damaged shared structure
    /// rather than at the request that hit them.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            KvError::InvalidArenaPointer(_)
                | KvError::DoubleFree(_)
                | KvError::IndexMismatch
                | KvError::Corrupted(_)
        )
    }
}
