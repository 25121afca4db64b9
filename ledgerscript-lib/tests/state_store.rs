use std::fs;

use ledgerscript_lib::state::{JsonStateStore, StateObserver, StateStoreError, Status};

#[test]
fn reads_hex_encoded_entries() {
    let mut store = JsonStateStore::from_json_str(r#"{"x": "deadbeef"}"#).unwrap();
    let mut buffer = [0u8; 4];
    let mut size = 4;
    assert_eq!(store.read("x", &mut buffer, &mut size), Status::Ok);
    assert_eq!(size, 4);
    assert_eq!(buffer, [0xde, 0xad, 0xbe, 0xef]);
}

#[test]
fn zero_capacity_probe_reports_the_size() {
    let mut store = JsonStateStore::new();
    assert_eq!(store.write("blob", &[1, 2, 3, 4, 5]), Status::Ok);

    let mut size = 0;
    let mut buffer = [0u8; 8];
    assert_eq!(store.read("blob", &mut buffer, &mut size), Status::BufferTooSmall);
    assert_eq!(size, 5);
    assert_eq!(buffer, [0; 8]);

    let mut small = [0u8; 2];
    let mut size = 2;
    assert_eq!(store.read("blob", &mut small, &mut size), Status::BufferTooSmall);
    assert_eq!(size, 5);
    assert_eq!(small, [0, 0]);

    let mut size = 8;
    assert_eq!(store.read("blob", &mut buffer, &mut size), Status::Ok);
    assert_eq!(size, 5);
    assert_eq!(&buffer[..5], &[1, 2, 3, 4, 5]);
}

#[test]
fn absent_keys() {
    let mut store = JsonStateStore::new();
    assert_eq!(store.exists("k"), Status::Error);
    let mut buffer = [9u8; 2];
    let mut size = 2;
    assert_eq!(store.read("k", &mut buffer, &mut size), Status::Error);
    assert_eq!(size, 2);
    assert_eq!(buffer, [9, 9]);

    store.write("k", &[]);
    assert_eq!(store.exists("k"), Status::Ok);
}

#[test]
fn writes_overwrite() {
    let mut store = JsonStateStore::new();
    store.write("k", &[1, 1, 1]);
    store.write("k", &[2]);
    let mut buffer = [0u8; 3];
    let mut size = 3;
    assert_eq!(store.read("k", &mut buffer, &mut size), Status::Ok);
    assert_eq!(size, 1);
    assert_eq!(buffer[0], 2);
}

#[test]
fn save_and_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");

    let mut store = JsonStateStore::new();
    store.write("zeta", &[0x00, 0x7f, 0xff]);
    store.write("alpha", b"text");
    store.save_to_file(&path).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    let alpha = text.find("alpha").unwrap();
    let zeta = text.find("zeta").unwrap();
    assert!(alpha < zeta, "keys are sorted: {text}");
    assert!(text.contains("\"007fff\""));

    let mut loaded = JsonStateStore::load_from_file(&path).unwrap();
    assert_eq!(loaded, store);
    let mut buffer = [0u8; 4];
    let mut size = 4;
    assert_eq!(loaded.read("alpha", &mut buffer, &mut size), Status::Ok);
    assert_eq!(&buffer, b"text");
}

#[test]
fn absent_and_blank_files_give_an_empty_store() {
    let dir = tempfile::tempdir().unwrap();
    let absent = dir.path().join("absent.json");
    assert!(JsonStateStore::load_from_file(&absent).unwrap().is_empty());

    let blank = dir.path().join("blank.json");
    fs::write(&blank, " \n").unwrap();
    assert!(JsonStateStore::load_from_file(&blank).unwrap().is_empty());
}

#[test]
fn load_replaces_the_content() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    fs::write(&path, r#"{"b": "02"}"#).unwrap();

    let mut store = JsonStateStore::new();
    store.write("a", &[1]);
    store.load(&path).unwrap();
    assert_eq!(store.keys().collect::<Vec<_>>(), vec!["b"]);
}

#[test]
fn malformed_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");

    fs::write(&path, "[\"a\", \"b\"]").unwrap();
    let err = JsonStateStore::load_from_file(&path).unwrap_err();
    assert!(matches!(err, StateStoreError::RootNotObject { found: "an array" }));
    assert!(err.is_malformed());

    fs::write(&path, "{\"a\": ").unwrap();
    let err = JsonStateStore::load_from_file(&path).unwrap_err();
    assert!(matches!(err, StateStoreError::InvalidJson(_)));
}

#[test]
fn io_errors_are_not_malformed() {
    let dir = tempfile::tempdir().unwrap();
    // a directory can't be read as a file
    let err = JsonStateStore::load_from_file(dir.path()).unwrap_err();
    assert!(matches!(err, StateStoreError::Io(_)));
    assert!(!err.is_malformed());
}
