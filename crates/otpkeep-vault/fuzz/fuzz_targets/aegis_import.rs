//! Fuzz target for the Aegis vault parser and importer.
//!
//! Parses arbitrary bytes as a vault and imports any plain db into memory
//! stores. Encrypted vaults are not decrypted: attacker-chosen scrypt
//! parameters would only measure the KDF.
//!
//! # Usage
//!
//! ```sh
//! cd crates/otpkeep-vault
//! cargo +nightly fuzz run aegis_import -- -max_len=8192
//! ```

#![no_main]

use libfuzzer_sys::fuzz_target;
use otpkeep_vault::import::aegis;
use otpkeep_vault::{import_entries, MemoryMetadataStore, MemorySecretStore};

fuzz_target!(|data: &[u8]| {
    let Ok(envelope) = aegis::parse(data) else {
        return;
    };
    let _ = envelope.is_encrypted();
    let _ = envelope.find_password_slot();
    if let Ok(db) = envelope.parse_plain() {
        let mut meta = MemoryMetadataStore::new();
        let mut secrets = MemorySecretStore::new();
        let report = import_entries(&mut meta, &mut secrets, &db.entries);
        assert_eq!(
            report.imported.len() + report.skipped.len(),
            db.entries.len()
        );
    }
});
