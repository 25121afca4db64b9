use std::collections::BTreeMap;
use tracing::trace;

use super::{copy_out, StateEntry, StateKey, StateObserver, Status};

/// keeps the state in memory only, for tests and hosts that persist state themselves
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStateStore {
    entries: BTreeMap<StateKey, StateEntry>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(StateKey, StateEntry)> for MemoryStateStore {
    fn from_iter<I: IntoIterator<Item = (StateKey, StateEntry)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl StateObserver for MemoryStateStore {
    fn exists(&mut self, key: &str) -> Status {
        if self.entries.contains_key(key) {
            Status::Ok
        } else {
            Status::Error
        }
    }

    fn read(&mut self, key: &str, buffer: &mut [u8], size: &mut u64) -> Status {
        let status = match self.entries.get(key) {
            Some(entry) => copy_out(entry, buffer, size),
            None => Status::Error,
        };
        trace!(key, ?status, "memory store read");
        status
    }

    fn write(&mut self, key: &str, data: &[u8]) -> Status {
        trace!(key, len = data.len(), "memory store write");
        self.entries.insert(key.into(), data.to_vec());
        Status::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read() {
        let mut store = MemoryStateStore::new();
        assert_eq!(store.exists("k"), Status::Error);
        assert_eq!(store.write("k", &[9, 8]), Status::Ok);
        assert_eq!(store.exists("k"), Status::Ok);

        let mut size = 0;
        assert_eq!(store.read("k", &mut [], &mut size), Status::BufferTooSmall);
        assert_eq!(size, 2);

        let mut buffer = vec![0; 2];
        assert_eq!(store.read("k", &mut buffer, &mut size), Status::Ok);
        assert_eq!(buffer, vec![9, 8]);
    }

    #[test]
    fn test_absent_key_leaves_size_untouched() {
        let mut store = MemoryStateStore::new();
        let mut buffer = [7u8; 3];
        let mut size = 3;
        assert_eq!(store.read("missing", &mut buffer, &mut size), Status::Error);
        assert_eq!(size, 3);
        assert_eq!(buffer, [7; 3]);
    }
}
