use serde_json::{Map, Value as JsonValue};
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, trace, warn};

use super::{copy_out, StateObserver, StateStoreError, Status};

/// State backed by a JSON object whose members are hex encoded entries, like
/// `{"counter": "02000000"}`.
///
/// Entries stay hex text in memory and are only decoded when they are read, so an
/// entry that doesn't decode only fails the script that reads it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JsonStateStore {
    root: Map<String, JsonValue>,
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

impl JsonStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// creates a store from a file. See [`JsonStateStore::load`]
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, StateStoreError> {
        let mut store = Self::new();
        store.load(path)?;
        Ok(store)
    }

    /// replaces the content of the store with the content of the file. A file that
    /// doesn't exist or only contains whitespace leaves the store empty
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<(), StateStoreError> {
        let path = path.as_ref();
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no state file, starting empty");
                self.root.clear();
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        *self = Self::from_json_str(&text)?;
        debug!(path = %path.display(), entries = self.len(), "loaded state");
        Ok(())
    }

    pub fn from_json_str(text: &str) -> Result<Self, StateStoreError> {
        if text.trim().is_empty() {
            return Ok(Self::new());
        }
        match serde_json::from_str(text).map_err(StateStoreError::InvalidJson)? {
            JsonValue::Object(root) => Ok(Self { root }),
            other => Err(StateStoreError::RootNotObject {
                found: json_kind(&other),
            }),
        }
    }

    pub fn to_json_string(&self) -> Result<String, StateStoreError> {
        serde_json::to_string_pretty(&self.root).map_err(StateStoreError::Serialize)
    }

    /// writes the whole store to the file, replacing it
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), StateStoreError> {
        let path = path.as_ref();
        let mut text = self.to_json_string()?;
        text.push('\n');
        fs::write(path, text)?;
        debug!(path = %path.display(), entries = self.len(), "saved state");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.root.len()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.root.keys().map(String::as_str)
    }

    /// the decoded entry, `None` if it's absent or can't be decoded
    fn decode(&self, key: &str) -> Option<Vec<u8>> {
        match self.root.get(key)? {
            JsonValue::String(text) => match hex::decode(text) {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    warn!(key, error = %e, "state entry is not valid hex");
                    None
                }
            },
            other => {
                warn!(key, found = json_kind(other), "state entry is not a string");
                None
            }
        }
    }
}

impl StateObserver for JsonStateStore {
    fn exists(&mut self, key: &str) -> Status {
        if self.root.contains_key(key) {
            Status::Ok
        } else {
            Status::Error
        }
    }

    fn read(&mut self, key: &str, buffer: &mut [u8], size: &mut u64) -> Status {
        let status = match self.decode(key) {
            Some(entry) => copy_out(&entry, buffer, size),
            None => Status::Error,
        };
        trace!(key, ?status, "json store read");
        status
    }

    fn write(&mut self, key: &str, data: &[u8]) -> Status {
        trace!(key, len = data.len(), "json store write");
        self.root
            .insert(key.into(), JsonValue::String(hex::encode(data)));
        Status::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_hex_entry() {
        let mut store = JsonStateStore::from_json_str(r#"{"x": "deadbeef"}"#).unwrap();
        let mut buffer = [0u8; 4];
        let mut size = 4;
        assert_eq!(store.read("x", &mut buffer, &mut size), Status::Ok);
        assert_eq!(size, 4);
        assert_eq!(buffer, [0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn test_upper_case_hex_is_accepted() {
        let mut store = JsonStateStore::from_json_str(r#"{"x": "DEADBEEF"}"#).unwrap();
        let mut buffer = [0u8; 4];
        let mut size = 4;
        assert_eq!(store.read("x", &mut buffer, &mut size), Status::Ok);
        assert_eq!(buffer, [0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn test_undecodable_entries_read_as_error() {
        let mut store =
            JsonStateStore::from_json_str(r#"{"odd": "abc", "num": 12, "bad": "zz"}"#).unwrap();
        for key in ["odd", "num", "bad"] {
            let mut size = 0;
            assert_eq!(store.read(key, &mut [], &mut size), Status::Error, "{key}");
            assert_eq!(size, 0);
            // the key is still there
            assert_eq!(store.exists(key), Status::Ok);
        }
    }

    #[test]
    fn test_malformed_documents() {
        for text in ["[1, 2]", "\"text\"", "42"] {
            let err = JsonStateStore::from_json_str(text).unwrap_err();
            assert!(matches!(err, StateStoreError::RootNotObject { .. }), "{text}");
            assert!(err.is_malformed());
        }
        let err = JsonStateStore::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, StateStoreError::InvalidJson(_)));
        assert!(err.is_malformed());
    }

    #[test]
    fn test_blank_document_is_empty() {
        for text in ["", "  \n\t "] {
            assert!(JsonStateStore::from_json_str(text).unwrap().is_empty());
        }
    }

    #[test]
    fn test_write_is_stored_as_hex() {
        let mut store = JsonStateStore::new();
        assert_eq!(store.write("b", &[0x01, 0xff]), Status::Ok);
        assert_eq!(store.write("a", &[]), Status::Ok);
        assert_eq!(
            store.to_json_string().unwrap(),
            "{\n  \"a\": \"\",\n  \"b\": \"01ff\"\n}"
        );
    }
}
