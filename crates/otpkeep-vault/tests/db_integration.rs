#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

//! On-disk behaviour of the SQLite metadata store.

use otpkeep_vault::{
    add_key, generate_token, get_key, AddKeyParams, KeyKind, MemorySecretStore, MetadataStore,
    SqliteMetadataStore,
};
use tempfile::TempDir;

#[test]
fn fresh_database_is_migrated() {
    let dir = TempDir::new().unwrap();
    let db = SqliteMetadataStore::open(&dir.path().join("keys.db")).unwrap();
    assert_eq!(db.schema_version().unwrap(), 1);
    assert!(db.list().unwrap().is_empty());
}

#[test]
fn records_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("keys.db");

    {
        let mut db = SqliteMetadataStore::open(&path).unwrap();
        db.put("one", br#"{"name":"one"}"#).unwrap();
        db.put("two", b"{}").unwrap();
    }

    let db = SqliteMetadataStore::open(&path).unwrap();
    assert_eq!(db.schema_version().unwrap(), 1);
    assert_eq!(db.list().unwrap(), vec!["one", "two"]);
    assert_eq!(db.get("one").unwrap().unwrap(), br#"{"name":"one"}"#);
}

#[test]
fn hotp_counter_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("keys.db");
    let mut secrets = MemorySecretStore::new();

    {
        let mut db = SqliteMetadataStore::open(&path).unwrap();
        add_key(
            &mut db,
            &mut secrets,
            AddKeyParams {
                name: "hotp".into(),
                secret: "ORSXG5A=".into(),
                kind: Some(KeyKind::Hotp),
                counter: Some(7),
                ..AddKeyParams::default()
            },
        )
        .unwrap();
        generate_token(&mut db, &secrets, "hotp", std::time::SystemTime::now()).unwrap();
    }

    let db = SqliteMetadataStore::open(&path).unwrap();
    let record = get_key(&db, "hotp").unwrap();
    assert_eq!(record.kind, KeyKind::Hotp);
    assert_eq!(record.counter, 8);
}

#[test]
fn put_replaces_and_delete_reports() {
    let dir = TempDir::new().unwrap();
    let mut db = SqliteMetadataStore::open(&dir.path().join("keys.db")).unwrap();

    db.put("k", b"first").unwrap();
    db.put("k", b"second").unwrap();
    assert_eq!(db.get("k").unwrap().unwrap(), b"second");

    assert!(db.delete("k").unwrap());
    assert!(!db.delete("k").unwrap());
    assert!(db.get("k").unwrap().is_none());
}

#[test]
fn opening_a_directory_fails() {
    let dir = TempDir::new().unwrap();
    assert!(SqliteMetadataStore::open(dir.path()).is_err());
}
