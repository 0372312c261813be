#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

//! Integration tests for the Aegis vault importer against exported fixtures.

use otpkeep_vault::import::aegis::{self, SlotLookup};
use otpkeep_vault::{
    decode_secret, get_key, import_entries, ImportError, KeyKind, MemoryMetadataStore,
    MemorySecretStore, OtpAlgorithm, SecretStore,
};

const PLAIN: &str = include_str!("fixtures/aegis_plain.json");
const ENCRYPTED: &str = include_str!("fixtures/aegis_encrypted.json");

/// (display name, kind, digits, interval, counter) for each fixture entry.
const EXPECTED: [(&str, KeyKind, u32, u32, u64); 7] = [
    ("Deno - Mason", KeyKind::Totp, 6, 30, 1),
    ("SPDX - James", KeyKind::Totp, 6, 30, 1),
    ("Airbnb - Elijah", KeyKind::Totp, 8, 30, 1),
    ("Issuu - James", KeyKind::Hotp, 6, 30, 1),
    ("Air Canada - Benjamin", KeyKind::Hotp, 6, 30, 50),
    ("WWE - Mason", KeyKind::Hotp, 8, 30, 10_300),
    ("Boeing - Sophia", KeyKind::Totp, 5, 30, 1),
];

/// Raw fields of each fixture entry: (type, name, issuer, secret, algo).
const ENTRIES: [(&str, &str, &str, &str, &str); 7] = [
    ("totp", "Mason", "Deno", "4SJHB4GSD43FZBAI7C2HLRJGPQ", "SHA1"),
    ("totp", "James", "SPDX", "5OM4WOOGPLQEF6UGN3CPEOOLWU", "SHA256"),
    ("totp", "Elijah", "Airbnb", "7ELGJSGXNCCTV3O6LKJWYFV2RA", "SHA512"),
    ("hotp", "James", "Issuu", "YOOMIXWS5GN6RTBPUFFWKTW5M4", "SHA1"),
    ("hotp", "Benjamin", "Air Canada", "KUVJJOM753IHTNDSZVCNKL7GII", "SHA256"),
    ("hotp", "Mason", "WWE", "5VAML3X35THCEBVRLV24CGBKOY", "SHA512"),
    ("steam", "Sophia", "Boeing", "JRZCL47CMXVOQMNPZR2F7J4RGI", "SHA1"),
];

// -------------------------------------------------------------------------
// Plain export
// -------------------------------------------------------------------------

#[test]
fn plain_fixture_parses_all_entries() {
    let envelope = aegis::parse(PLAIN.as_bytes()).unwrap();
    assert!(!envelope.is_encrypted());
    assert!(matches!(envelope.find_password_slot(), SlotLookup::NotFound));

    let db = envelope.parse_plain().unwrap();
    assert_eq!(db.version, 1);
    assert_eq!(db.entries.len(), ENTRIES.len());
    for (entry, (entry_type, name, issuer, secret, algo)) in db.entries.iter().zip(ENTRIES) {
        assert_eq!(entry.entry_type, entry_type, "{issuer} - {name}");
        assert_eq!(entry.name, name);
        assert_eq!(entry.issuer, issuer);
        assert_eq!(entry.info["secret"].as_str(), Some(secret), "{issuer} - {name}");
        assert_eq!(entry.info["algo"].as_str(), Some(algo), "{issuer} - {name}");
    }
}

#[test]
fn plain_fixture_cannot_be_decrypted() {
    let envelope = aegis::parse(PLAIN.as_bytes()).unwrap();
    assert!(matches!(
        envelope.decrypt(b"test"),
        Err(ImportError::NotEncrypted)
    ));
}

#[test]
fn plain_fixture_imports_every_entry() {
    let db = aegis::parse(PLAIN.as_bytes())
        .unwrap()
        .parse_plain()
        .unwrap();
    let mut meta = MemoryMetadataStore::new();
    let mut secrets = MemorySecretStore::new();

    let report = import_entries(&mut meta, &mut secrets, &db.entries);

    assert!(report.skipped.is_empty(), "skipped: {:?}", report.skipped);
    let names: Vec<&str> = EXPECTED.iter().map(|e| e.0).collect();
    assert_eq!(report.imported, names);

    for ((name, kind, digits, interval, counter), (.., secret, algo)) in EXPECTED.into_iter().zip(ENTRIES) {
        let record = get_key(&meta, name).unwrap();
        assert_eq!(record.kind, kind, "{name}");
        assert_eq!(record.digits, digits, "{name}");
        assert_eq!(record.interval, interval, "{name}");
        assert_eq!(record.counter, counter, "{name}");
        assert_eq!(record.algorithm, algo.parse::<OtpAlgorithm>().unwrap(), "{name}");
        assert_eq!(
            secrets.get(name).unwrap().expose(),
            decode_secret(secret).unwrap().as_slice(),
            "{name}"
        );
    }
    // Secrets are stored decoded: 26 Base32 chars → 16 bytes.
    assert_eq!(secrets.get("Deno - Mason").unwrap().len(), 16);
}

// -------------------------------------------------------------------------
// Encrypted export
// -------------------------------------------------------------------------

#[test]
fn encrypted_fixture_is_detected() {
    let envelope = aegis::parse(ENCRYPTED.as_bytes()).unwrap();
    assert!(envelope.is_encrypted());
    match envelope.find_password_slot() {
        SlotLookup::Found(slot) => {
            assert_eq!(slot.slot_type, 1);
            assert_eq!(slot.n, Some(1024));
        }
        SlotLookup::NotFound => panic!("fixture has a password slot"),
    }
    assert!(matches!(
        envelope.parse_plain(),
        Err(ImportError::Encrypted)
    ));
}

#[test]
fn encrypted_fixture_decrypts_to_plain_contents() {
    let decrypted = aegis::parse(ENCRYPTED.as_bytes())
        .unwrap()
        .decrypt(b"test")
        .unwrap();
    let plain = aegis::parse(PLAIN.as_bytes())
        .unwrap()
        .parse_plain()
        .unwrap();

    assert_eq!(decrypted.entries.len(), plain.entries.len());
    for (a, b) in decrypted.entries.iter().zip(&plain.entries) {
        assert_eq!(a.uuid, b.uuid);
        assert_eq!(a.name, b.name);
        assert_eq!(a.issuer, b.issuer);
        assert_eq!(a.info, b.info);
    }
}

#[test]
fn encrypted_fixture_wrong_password() {
    let envelope = aegis::parse(ENCRYPTED.as_bytes()).unwrap();
    for wrong in [&b"Test"[..], b"", b"test "] {
        assert!(matches!(
            envelope.decrypt(wrong),
            Err(ImportError::MasterKeyUnwrap)
        ));
    }
}

#[test]
fn encrypted_fixture_with_swapped_db_tag_fails() {
    let mut vault: serde_json::Value = serde_json::from_str(ENCRYPTED).unwrap();
    let slot_tag = vault["header"]["slots"][1]["key_params"]["tag"].clone();
    vault["header"]["params"]["tag"] = slot_tag;
    let envelope = aegis::parse(vault.to_string().as_bytes()).unwrap();
    assert!(matches!(
        envelope.decrypt(b"test"),
        Err(ImportError::DatabaseDecrypt)
    ));
}

#[test]
fn encrypted_fixture_with_bad_base64_db() {
    let mut vault: serde_json::Value = serde_json::from_str(ENCRYPTED).unwrap();
    vault["db"] = serde_json::json!("not base64!");
    let envelope = aegis::parse(vault.to_string().as_bytes()).unwrap();
    assert!(matches!(
        envelope.decrypt(b"test"),
        Err(ImportError::Encoding(_))
    ));
}
