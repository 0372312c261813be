//! Aegis Authenticator vault parser and decryption.
//!
//! An encrypted Aegis export wraps its database twice:
//! 1. scrypt(password, slot salt) → key-encryption key
//! 2. AES-256-GCM(KEK) unwraps the 32-byte master key stored in the slot
//! 3. AES-256-GCM(master key) decrypts the Base64 `db` payload
//!
//! Nonces, tags, salts and wrapped keys are lowercase hex. Tags are stored
//! apart from their ciphertext and are appended to it before opening.

use data_encoding::{BASE64, HEXLOWER_PERMISSIVE};
use otpkeep_crypto_core::{derive_scrypt, open, ScryptParams, SecretBytes, KEY_LEN};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use super::ImportError;

/// Slot type of a password slot.
pub const PASSWORD_SLOT_TYPE: u32 = 1;

// ---------------------------------------------------------------------------
// Aegis JSON structures
// ---------------------------------------------------------------------------

/// `null` deserializes as `T::default()`.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Top-level Aegis export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultEnvelope {
    /// Envelope format version.
    #[serde(default)]
    pub version: u32,
    /// Key slots and db crypto parameters. Empty for plain exports.
    #[serde(default, deserialize_with = "null_as_default")]
    pub header: VaultHeader,
    /// Base64 ciphertext (encrypted) or inline [`VaultDb`] object (plain).
    #[serde(default)]
    pub db: serde_json::Value,
}

/// Encryption header.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VaultHeader {
    /// Key slots, each wrapping the master key.
    #[serde(default)]
    pub slots: Option<Vec<Slot>>,
    /// Nonce and tag for the db payload.
    #[serde(default)]
    pub params: Option<CryptoParams>,
}

/// A key slot. Only password slots carry scrypt parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Slot {
    /// 1 = password; other types are ignored.
    #[serde(rename = "type", default)]
    pub slot_type: u32,
    /// Slot identifier.
    #[serde(default, deserialize_with = "null_as_default")]
    pub uuid: String,
    /// Wrapped master key (hex, without tag).
    #[serde(default, deserialize_with = "null_as_default")]
    pub key: String,
    /// Nonce and tag for unwrapping `key`.
    #[serde(default, deserialize_with = "null_as_default")]
    pub key_params: CryptoParams,
    /// scrypt cost `N`. Bounded by `ScryptParams::check_cost` before use.
    #[serde(default)]
    pub n: Option<u64>,
    /// scrypt block size `r`.
    #[serde(default)]
    pub r: Option<u32>,
    /// scrypt parallelism `p`.
    #[serde(default)]
    pub p: Option<u32>,
    /// scrypt salt (hex).
    #[serde(default)]
    pub salt: Option<String>,
}

/// AES-256-GCM nonce and tag (hex).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CryptoParams {
    /// 96-bit nonce.
    #[serde(default)]
    pub nonce: String,
    /// 128-bit authentication tag.
    #[serde(default)]
    pub tag: String,
}

/// Decrypted (or inline) vault database.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VaultDb {
    /// Database content version.
    #[serde(default)]
    pub version: u32,
    /// OTP entries.
    #[serde(default, deserialize_with = "null_as_default")]
    pub entries: Vec<Entry>,
    /// Entry groups. Parsed but not imported.
    #[serde(default, deserialize_with = "null_as_default")]
    pub groups: Vec<Group>,
}

/// One vault entry. `info` stays untyped until [`OtpInfo`](super::OtpInfo)
/// interprets it, so one odd entry cannot fail the whole parse.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Entry {
    /// `totp`, `hotp`, `steam`, ...
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub entry_type: String,
    /// Entry identifier.
    #[serde(default, deserialize_with = "null_as_default")]
    pub uuid: String,
    /// Account name.
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    /// Service issuer.
    #[serde(default, deserialize_with = "null_as_default")]
    pub issuer: String,
    /// Free-form note.
    #[serde(default)]
    pub note: Option<String>,
    /// Favourite flag.
    #[serde(default, deserialize_with = "null_as_default")]
    pub favorite: bool,
    /// Type-specific OTP parameters (`secret`, `digits`, `period`, ...).
    #[serde(default, deserialize_with = "null_as_default")]
    pub info: serde_json::Map<String, serde_json::Value>,
    /// Group UUIDs.
    #[serde(default, deserialize_with = "null_as_default")]
    pub groups: Vec<String>,
}

/// Entry group.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Group {
    /// Group identifier.
    #[serde(default, deserialize_with = "null_as_default")]
    pub uuid: String,
    /// Display name.
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
}

/// Outcome of the password slot scan.
#[derive(Debug, Clone, Copy)]
pub enum SlotLookup<'a> {
    /// First slot of type [`PASSWORD_SLOT_TYPE`].
    Found(&'a Slot),
    /// No password slot in the header.
    NotFound,
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse an Aegis export.
///
/// # Errors
///
/// Returns [`ImportError::Parse`] on malformed JSON.
pub fn parse(bytes: &[u8]) -> Result<VaultEnvelope, ImportError> {
    serde_json::from_slice(bytes)
        .map_err(|e| ImportError::Parse(format!("invalid Aegis vault JSON: {e}")))
}

/// `ciphertext || tag`, the layout AES-GCM expects.
///
/// Aegis keeps the tag in a separate field; it always goes after the
/// ciphertext, for both the wrapped master key and the db payload.
#[must_use]
pub fn reconstruct_ciphertext(ciphertext: &[u8], tag: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(ciphertext.len().saturating_add(tag.len()));
    out.extend_from_slice(ciphertext);
    out.extend_from_slice(tag);
    out
}

fn decode_hex(field: &str, hex: &str) -> Result<Vec<u8>, ImportError> {
    HEXLOWER_PERMISSIVE
        .decode(hex.as_bytes())
        .map_err(|e| ImportError::Encoding(format!("invalid hex in {field}: {e}")))
}

impl VaultEnvelope {
    /// `true` iff the header has at least one slot.
    #[must_use]
    pub fn is_encrypted(&self) -> bool {
        self.header.slots.as_ref().is_some_and(|slots| !slots.is_empty())
    }

    /// First password slot, if any. Other slot types are skipped.
    #[must_use]
    pub fn find_password_slot(&self) -> SlotLookup<'_> {
        self.header
            .slots
            .iter()
            .flatten()
            .find(|slot| slot.slot_type == PASSWORD_SLOT_TYPE)
            .map_or(SlotLookup::NotFound, SlotLookup::Found)
    }

    /// Decrypt the db of an encrypted export.
    ///
    /// # Errors
    ///
    /// - [`ImportError::NotEncrypted`] if the export has no slots.
    /// - [`ImportError::NoPasswordSlot`] if no slot has type 1.
    /// - [`ImportError::KeyDerivation`] for a bad salt or scrypt parameters.
    /// - [`ImportError::MasterKeyUnwrap`] for a wrong password or tampered slot.
    /// - [`ImportError::DatabaseDecrypt`] if the payload does not authenticate.
    /// - [`ImportError::Encoding`] for malformed hex or Base64 fields.
    /// - [`ImportError::Parse`] if the decrypted payload is not a db.
    pub fn decrypt(&self, password: &[u8]) -> Result<VaultDb, ImportError> {
        if !self.is_encrypted() {
            return Err(ImportError::NotEncrypted);
        }
        let SlotLookup::Found(slot) = self.find_password_slot() else {
            return Err(ImportError::NoPasswordSlot);
        };

        let kek = derive_slot_key(slot, password)?;
        let master_key = unwrap_master_key(slot, &kek)?;
        drop(kek);

        let params = self
            .header
            .params
            .as_ref()
            .ok_or_else(|| ImportError::Parse("encrypted vault has no header params".into()))?;
        let payload = self
            .db
            .as_str()
            .ok_or_else(|| ImportError::Parse("encrypted db must be a Base64 string".into()))?;
        let ciphertext = BASE64
            .decode(payload.as_bytes())
            .map_err(|e| ImportError::Encoding(format!("invalid Base64 in db: {e}")))?;
        let nonce = decode_hex("header.params.nonce", &params.nonce)?;
        let tag = decode_hex("header.params.tag", &params.tag)?;

        let plaintext = open(
            master_key.expose(),
            &nonce,
            &reconstruct_ciphertext(&ciphertext, &tag),
        )
        .map_err(|_| ImportError::DatabaseDecrypt)?;

        debug!(bytes = plaintext.len(), "decrypted Aegis db");
        serde_json::from_slice(plaintext.expose())
            .map_err(|e| ImportError::Parse(format!("invalid decrypted Aegis db: {e}")))
    }

    /// Read the inline db of a plain export.
    ///
    /// # Errors
    ///
    /// - [`ImportError::Encrypted`] if the export has slots.
    /// - [`ImportError::Parse`] if `db` is not a db object.
    pub fn parse_plain(&self) -> Result<VaultDb, ImportError> {
        if self.is_encrypted() {
            return Err(ImportError::Encrypted);
        }
        serde_json::from_value(self.db.clone())
            .map_err(|e| ImportError::Parse(format!("invalid plain Aegis db: {e}")))
    }

    /// Decrypt or read the db, whichever the export needs.
    ///
    /// # Errors
    ///
    /// See [`decrypt`](Self::decrypt) and [`parse_plain`](Self::parse_plain).
    pub fn read_db(&self, password: &[u8]) -> Result<VaultDb, ImportError> {
        if self.is_encrypted() {
            self.decrypt(password)
        } else {
            self.parse_plain()
        }
    }
}

// ---------------------------------------------------------------------------
// Slot crypto
// ---------------------------------------------------------------------------

fn derive_slot_key(slot: &Slot, password: &[u8]) -> Result<SecretBytes<KEY_LEN>, ImportError> {
    let missing = |what: &str| ImportError::KeyDerivation(format!("password slot has no {what}"));
    let params = ScryptParams {
        n: slot.n.ok_or_else(|| missing("scrypt N"))?,
        r: slot.r.ok_or_else(|| missing("scrypt r"))?,
        p: slot.p.ok_or_else(|| missing("scrypt p"))?,
    };
    let salt_hex = slot.salt.as_deref().ok_or_else(|| missing("salt"))?;
    let salt = HEXLOWER_PERMISSIVE
        .decode(salt_hex.as_bytes())
        .map_err(|e| ImportError::KeyDerivation(format!("invalid salt: {e}")))?;

    derive_scrypt(password, &salt, params).map_err(|e| ImportError::KeyDerivation(e.to_string()))
}

fn unwrap_master_key(
    slot: &Slot,
    kek: &SecretBytes<KEY_LEN>,
) -> Result<SecretBytes<KEY_LEN>, ImportError> {
    let wrapped = decode_hex("slot.key", &slot.key)?;
    let nonce = decode_hex("slot.key_params.nonce", &slot.key_params.nonce)?;
    let tag = decode_hex("slot.key_params.tag", &slot.key_params.tag)?;

    let master = open(
        kek.expose(),
        &nonce,
        &reconstruct_ciphertext(&wrapped, &tag),
    )
    .map_err(|_| ImportError::MasterKeyUnwrap)?;
    SecretBytes::from_slice(master.expose()).map_err(|_| ImportError::MasterKeyUnwrap)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use otpkeep_crypto_core::{seal, NONCE_LEN, TAG_LEN};
    use serde_json::json;

    const FAST_N: u64 = 1024;

    /// Aegis keeps nonce, ciphertext and tag in separate fields.
    struct Detached {
        nonce: Vec<u8>,
        ciphertext: Vec<u8>,
        tag: Vec<u8>,
    }

    impl Detached {
        fn split(sealed: &[u8]) -> Self {
            let (nonce, body) = sealed.split_at(NONCE_LEN);
            let (ciphertext, tag) = body.split_at(body.len() - TAG_LEN);
            Self {
                nonce: nonce.to_vec(),
                ciphertext: ciphertext.to_vec(),
                tag: tag.to_vec(),
            }
        }
    }

    fn hex(bytes: &[u8]) -> String {
        data_encoding::HEXLOWER.encode(bytes)
    }

    fn plain_db() -> serde_json::Value {
        json!({
            "version": 1,
            "entries": [{
                "type": "totp",
                "uuid": "0",
                "name": "Mason",
                "issuer": "Deno",
                "favorite": false,
                "info": {"secret": "4SJHB4GSD43FZBAI7C2HLRJGPQ", "digits": 6, "period": 30},
                "groups": []
            }],
            "groups": []
        })
    }

    /// Build an encrypted export the way Aegis does, with a biometric slot first.
    fn encrypted_vault(password: &[u8]) -> String {
        let salt = [0x11u8; 32];
        let master = [0x42u8; 32];
        let params = ScryptParams { n: FAST_N, r: 8, p: 1 };
        let kek = derive_scrypt(password, &salt, params).unwrap();
        let wrapped = Detached::split(&seal(kek.expose(), &master).unwrap());
        let db = Detached::split(&seal(&master, plain_db().to_string().as_bytes()).unwrap());

        json!({
            "version": 1,
            "header": {
                "slots": [
                    {
                        "type": 2,
                        "uuid": "bio",
                        "key": hex(&[0u8; 32]),
                        "key_params": {"nonce": hex(&[0u8; 12]), "tag": hex(&[0u8; 16])}
                    },
                    {
                        "type": 1,
                        "uuid": "pw",
                        "key": hex(&wrapped.ciphertext),
                        "key_params": {"nonce": hex(&wrapped.nonce), "tag": hex(&wrapped.tag)},
                        "n": FAST_N, "r": 8, "p": 1,
                        "salt": hex(&salt)
                    }
                ],
                "params": {"nonce": hex(&db.nonce), "tag": hex(&db.tag)}
            },
            "db": BASE64.encode(&db.ciphertext)
        })
        .to_string()
    }

    #[test]
    fn malformed_json_is_parse_error() {
        assert!(matches!(parse(b"{not json"), Err(ImportError::Parse(_))));
    }

    #[test]
    fn null_header_and_empty_slots_are_plain() {
        let null_header = parse(br#"{"version":1,"header":null,"db":{}}"#).unwrap();
        assert!(!null_header.is_encrypted());
        let null_slots =
            parse(br#"{"version":1,"header":{"slots":null,"params":null},"db":{}}"#).unwrap();
        assert!(!null_slots.is_encrypted());
        let empty_slots = parse(br#"{"version":1,"header":{"slots":[]},"db":{}}"#).unwrap();
        assert!(!empty_slots.is_encrypted());
    }

    #[test]
    fn parse_plain_reads_inline_db() {
        let vault = json!({"version": 1, "header": {"slots": null, "params": null}, "db": plain_db()});
        let envelope = parse(vault.to_string().as_bytes()).unwrap();
        let db = envelope.parse_plain().unwrap();
        assert_eq!(db.entries.len(), 1);
        assert_eq!(db.entries[0].issuer, "Deno");
    }

    #[test]
    fn reconstruct_appends_tag() {
        assert_eq!(reconstruct_ciphertext(&[1, 2], &[9]), vec![1, 2, 9]);
    }

    #[test]
    fn find_password_slot_skips_other_types() {
        let envelope = parse(encrypted_vault(b"test").as_bytes()).unwrap();
        match envelope.find_password_slot() {
            SlotLookup::Found(slot) => assert_eq!(slot.uuid, "pw"),
            SlotLookup::NotFound => panic!("password slot should be found"),
        }
    }

    #[test]
    fn decrypt_roundtrip() {
        let envelope = parse(encrypted_vault(b"test").as_bytes()).unwrap();
        assert!(envelope.is_encrypted());
        let db = envelope.decrypt(b"test").unwrap();
        assert_eq!(db.entries[0].name, "Mason");
        assert!(matches!(envelope.parse_plain(), Err(ImportError::Encrypted)));
    }

    #[test]
    fn wrong_password_fails_master_key_unwrap() {
        let envelope = parse(encrypted_vault(b"test").as_bytes()).unwrap();
        assert!(matches!(
            envelope.decrypt(b"nope"),
            Err(ImportError::MasterKeyUnwrap)
        ));
    }

    #[test]
    fn tampered_db_fails_database_decrypt() {
        let mut vault: serde_json::Value = serde_json::from_str(&encrypted_vault(b"test")).unwrap();
        vault["header"]["params"]["tag"] = json!(hex(&[0u8; 16]));
        let envelope = parse(vault.to_string().as_bytes()).unwrap();
        assert!(matches!(
            envelope.decrypt(b"test"),
            Err(ImportError::DatabaseDecrypt)
        ));
    }

    #[test]
    fn only_biometric_slot_is_no_password_slot() {
        let mut vault: serde_json::Value = serde_json::from_str(&encrypted_vault(b"test")).unwrap();
        vault["header"]["slots"].as_array_mut().unwrap().truncate(1);
        let envelope = parse(vault.to_string().as_bytes()).unwrap();
        assert!(matches!(envelope.find_password_slot(), SlotLookup::NotFound));
        assert!(matches!(
            envelope.decrypt(b"test"),
            Err(ImportError::NoPasswordSlot)
        ));
    }

    #[test]
    fn bad_salt_or_params_fail_key_derivation() {
        let mut vault: serde_json::Value = serde_json::from_str(&encrypted_vault(b"test")).unwrap();
        vault["header"]["slots"][1]["salt"] = json!("zz");
        let envelope = parse(vault.to_string().as_bytes()).unwrap();
        assert!(matches!(
            envelope.decrypt(b"test"),
            Err(ImportError::KeyDerivation(_))
        ));

        vault["header"]["slots"][1]["salt"] = json!("00");
        vault["header"]["slots"][1]["n"] = json!(1000);
        let envelope = parse(vault.to_string().as_bytes()).unwrap();
        assert!(matches!(
            envelope.decrypt(b"test"),
            Err(ImportError::KeyDerivation(_))
        ));
    }

    #[test]
    fn oversized_scrypt_cost_fails_key_derivation() {
        let mut vault: serde_json::Value = serde_json::from_str(&encrypted_vault(b"test")).unwrap();
        for (n, r, p) in [(1u64 << 40, 8u32, 1u32), (1 << 20, 8, 1), (FAST_N, 8, 1000)] {
            vault["header"]["slots"][1]["n"] = json!(n);
            vault["header"]["slots"][1]["r"] = json!(r);
            vault["header"]["slots"][1]["p"] = json!(p);
            let envelope = parse(vault.to_string().as_bytes()).unwrap();
            assert!(
                matches!(envelope.decrypt(b"test"), Err(ImportError::KeyDerivation(_))),
                "N={n} r={r} p={p} should be rejected"
            );
        }
    }

    #[test]
    fn decrypt_plain_vault_is_not_encrypted() {
        let vault = json!({"version": 1, "header": {"slots": null}, "db": plain_db()});
        let envelope = parse(vault.to_string().as_bytes()).unwrap();
        assert!(matches!(
            envelope.decrypt(b"test"),
            Err(ImportError::NotEncrypted)
        ));
    }
}
