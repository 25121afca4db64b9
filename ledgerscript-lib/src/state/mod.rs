//! Persistent script state.
//!
//! The VM never touches a storage backend directly, every access of a `State<T>` handle
//! goes through the [`StateObserver`] passed to [`Vm::execute`](crate::vm::Vm::execute).
//! Keys are strings and entries are opaque bytes, the VM encodes values with postcard.

use std::io;
use thiserror::Error;

mod json_store;
mod memory_store;

pub use json_store::JsonStateStore;
pub use memory_store::MemoryStateStore;

pub type StateKey = String;
pub type StateEntry = Vec<u8>;

/// outcome of a state operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Ok,
    Error,
    /// the entry exists, but the buffer passed to `read` cannot hold it. The required
    /// size has been reported
    BufferTooSmall,
}

/// the interface the VM uses for all state access
pub trait StateObserver {
    /// `Ok` if the key is present, `Error` otherwise
    fn exists(&mut self, key: &str) -> Status;

    /// reads an entry. On input `size` is the capacity of the read, it is clamped to
    /// the length of `buffer`. Whenever the key exists, `size` is set to the size of
    /// the stored entry, and the entry is copied into `buffer` if it fits. An absent
    /// key leaves `size` and `buffer` untouched
    fn read(&mut self, key: &str, buffer: &mut [u8], size: &mut u64) -> Status;

    /// stores an entry, replacing any previous one
    fn write(&mut self, key: &str, data: &[u8]) -> Status;
}

/// the common part of `read` for stores that have the entry's bytes at hand
pub(crate) fn copy_out(entry: &[u8], buffer: &mut [u8], size: &mut u64) -> Status {
    let capacity = usize::try_from(*size)
        .unwrap_or(usize::MAX)
        .min(buffer.len());
    *size = entry.len() as u64;
    if capacity < entry.len() {
        return Status::BufferTooSmall;
    }
    buffer[..entry.len()].copy_from_slice(entry);
    Status::Ok
}

#[derive(Error, Debug)]
pub enum StateStoreError {
    #[error("could not access the state file: {0}")]
    Io(#[from] io::Error),

    #[error("the state file is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("the state file must contain a JSON object, found {found}")]
    RootNotObject { found: &'static str },

    #[error("the state could not be serialized: {0}")]
    Serialize(#[source] serde_json::Error),
}

impl StateStoreError {
    /// whether the file exists but its content can't be used. A host should stop rather
    /// than run with state it doesn't understand
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::InvalidJson(_) | Self::RootNotObject { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_out() {
        let mut buffer = [0u8; 4];

        let mut size = 0;
        assert_eq!(copy_out(&[1, 2, 3], &mut buffer, &mut size), Status::BufferTooSmall);
        assert_eq!(size, 3);
        assert_eq!(buffer, [0; 4]);

        // the capacity is clamped to the buffer
        let mut size = 100;
        assert_eq!(copy_out(&[1, 2, 3], &mut buffer[..2], &mut size), Status::BufferTooSmall);
        assert_eq!(size, 3);

        let mut size = 4;
        assert_eq!(copy_out(&[1, 2, 3], &mut buffer, &mut size), Status::Ok);
        assert_eq!(size, 3);
        assert_eq!(buffer, [1, 2, 3, 0]);
    }
}
