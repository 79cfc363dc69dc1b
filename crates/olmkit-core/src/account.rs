//! Long-lived device identity and one-time key management
//!
//! An account owns the device's Ed25519 signing key, its Curve25519 identity
//! key, a bounded bag of one-time keys, and up to two fallback keys. Peers
//! claim a published one-time key to start a session with us; once the
//! pre-key message arrives the key is removed so it is never used twice.
//!
//! # Key Ids
//!
//! One-time and fallback keys share a single counter. Ids are strictly
//! increasing and never reused, even after the key they named was evicted
//! or consumed.

use std::fmt::Write as _;

use olmkit_crypto::{
    CURVE25519_RANDOM_LENGTH, Curve25519KeyPair, Curve25519PublicKey, ED25519_RANDOM_LENGTH,
    Ed25519KeyPair, Ed25519PublicKey, base64, memory,
};
use olmkit_proto::{Pickle, PickleError, PickleReader, PickleWriter, Unpickle};
use tracing::debug;
use zeroize::Zeroizing;

use crate::{error::OlmError, list::BoundedList, pickle, session::Session};

/// Most one-time keys an account holds at once
pub const MAX_ONE_TIME_KEYS: usize = 100;

/// Current account pickle version
pub const ACCOUNT_PICKLE_VERSION: u32 = 4;

/// Random bytes consumed by [`Account::new`]
pub const ACCOUNT_RANDOM_LENGTH: usize = ED25519_RANDOM_LENGTH + CURVE25519_RANDOM_LENGTH;

/// A one-time or fallback key with its id.
#[derive(Debug, Clone)]
pub struct OneTimeKey {
    /// Numeric id, unique within the account
    pub id: u32,
    /// Whether the key has been handed to the server
    pub published: bool,
    /// The key pair
    pub key: Curve25519KeyPair,
}

/// Id, published flag, then the key pair.
impl Pickle for OneTimeKey {
    fn pickle(&self, writer: &mut PickleWriter) {
        writer.write_u32(self.id).write_bool(self.published).write(&self.key);
    }
}

impl Unpickle for OneTimeKey {
    fn unpickle(reader: &mut PickleReader<'_>) -> Result<Self, PickleError> {
        Ok(Self { id: reader.read_u32()?, published: reader.read_bool()?, key: reader.read()? })
    }
}

/// The device's long-term key pairs.
#[derive(Debug, Clone)]
pub struct IdentityKeys {
    /// Signing key
    pub ed25519: Ed25519KeyPair,
    /// Key-agreement key
    pub curve25519: Curve25519KeyPair,
}

/// Device account.
///
/// # Invariants
///
/// - At most [`MAX_ONE_TIME_KEYS`] one-time keys, newest first
/// - Every key id is at most `next_one_time_key_id`
/// - Identity keys never change after creation
pub struct Account {
    identity_keys: IdentityKeys,
    one_time_keys: BoundedList<OneTimeKey, MAX_ONE_TIME_KEYS>,
    current_fallback_key: Option<OneTimeKey>,
    prev_fallback_key: Option<OneTimeKey>,
    next_one_time_key_id: u32,
}

/// Append `"<b64 id>":"<b64 key>"` entries to `json`.
fn write_key_entries<'a>(json: &mut String, keys: impl Iterator<Item = &'a OneTimeKey>) {
    for (i, key) in keys.enumerate() {
        if i > 0 {
            json.push(',');
        }
        let _ = write!(
            json,
            "\"{}\":\"{}\"",
            base64::encode(&key.id.to_be_bytes()),
            key.key.public_key.to_base64()
        );
    }
}

fn keys_json<'a>(keys: impl Iterator<Item = &'a OneTimeKey>) -> String {
    let mut json = String::from("{\"curve25519\":{");
    write_key_entries(&mut json, keys);
    json.push_str("}}");
    json
}

impl Account {
    /// Create an account from [`ACCOUNT_RANDOM_LENGTH`] random bytes.
    ///
    /// The first 32 bytes seed the Ed25519 key, the next 32 the Curve25519
    /// key.
    ///
    /// # Errors
    ///
    /// - `NotEnoughRandom` if `random` is too short
    pub fn new(random: &[u8]) -> Result<Self, OlmError> {
        let random = memory::load_prefix::<ACCOUNT_RANDOM_LENGTH>(random)
            .map(Zeroizing::new)
            .ok_or(OlmError::NotEnoughRandom)?;

        let mut ed25519_seed = Zeroizing::new([0u8; ED25519_RANDOM_LENGTH]);
        ed25519_seed.copy_from_slice(&random[..ED25519_RANDOM_LENGTH]);
        let mut curve25519_seed = Zeroizing::new([0u8; CURVE25519_RANDOM_LENGTH]);
        curve25519_seed.copy_from_slice(&random[ED25519_RANDOM_LENGTH..]);

        let account = Self {
            identity_keys: IdentityKeys {
                ed25519: Ed25519KeyPair::from_random(&ed25519_seed),
                curve25519: Curve25519KeyPair::from_random(&curve25519_seed),
            },
            one_time_keys: BoundedList::new(),
            current_fallback_key: None,
            prev_fallback_key: None,
            next_one_time_key_id: 0,
        };
        debug!(identity_key = %account.curve25519_key().to_base64(), "created account");
        Ok(account)
    }

    /// Long-term key pairs.
    pub fn identity_keys(&self) -> &IdentityKeys {
        &self.identity_keys
    }

    /// Public Curve25519 identity key.
    pub fn curve25519_key(&self) -> &Curve25519PublicKey {
        &self.identity_keys.curve25519.public_key
    }

    /// Public Ed25519 signing key.
    pub fn ed25519_key(&self) -> &Ed25519PublicKey {
        &self.identity_keys.ed25519.public_key
    }

    /// `{"curve25519":"<b64>","ed25519":"<b64>"}`
    pub fn identity_keys_json(&self) -> String {
        format!(
            "{{\"curve25519\":\"{}\",\"ed25519\":\"{}\"}}",
            self.curve25519_key().to_base64(),
            self.ed25519_key().to_base64()
        )
    }

    /// Base64 Ed25519 signature over `message` with the identity key.
    pub fn sign(&self, message: &[u8]) -> String {
        base64::encode(&self.identity_keys.ed25519.sign(message))
    }

    /// One-time keys, newest first.
    pub fn one_time_keys(&self) -> &BoundedList<OneTimeKey, MAX_ONE_TIME_KEYS> {
        &self.one_time_keys
    }

    /// Unpublished one-time keys as
    /// `{"curve25519":{"<b64 id>":"<b64 key>",...}}`, newest first.
    pub fn one_time_keys_json(&self) -> String {
        keys_json(self.one_time_keys.iter().filter(|key| !key.published))
    }

    /// Mark every unpublished one-time key, and the current fallback key,
    /// as published.
    ///
    /// Returns the number of one-time keys that changed.
    pub fn mark_keys_as_published(&mut self) -> usize {
        let mut count = 0;
        for key in self.one_time_keys.iter_mut().filter(|key| !key.published) {
            key.published = true;
            count += 1;
        }
        if let Some(fallback) = self.current_fallback_key.as_mut() {
            fallback.published = true;
        }
        count
    }

    /// Capacity of the one-time key bag.
    pub fn max_number_of_one_time_keys(&self) -> usize {
        MAX_ONE_TIME_KEYS
    }

    /// Random bytes needed to generate `count` one-time keys.
    pub fn generate_one_time_keys_random_length(count: usize) -> usize {
        count.saturating_mul(CURVE25519_RANDOM_LENGTH)
    }

    /// Generate `count` one-time keys from caller randomness.
    ///
    /// When the bag is full the oldest keys are evicted.
    ///
    /// # Errors
    ///
    /// - `NotEnoughRandom` if `random` is shorter than
    ///   [`generate_one_time_keys_random_length`](Self::generate_one_time_keys_random_length)
    pub fn generate_one_time_keys(&mut self, count: usize, random: &[u8]) -> Result<(), OlmError> {
        if random.len() < Self::generate_one_time_keys_random_length(count) {
            return Err(OlmError::NotEnoughRandom);
        }

        let mut evicted = 0usize;
        for chunk in random.chunks_exact(CURVE25519_RANDOM_LENGTH).take(count) {
            let key = self.new_key(chunk)?;
            if self.one_time_keys.insert_front(key).is_some() {
                evicted += 1;
            }
        }

        debug!(count, evicted, next_id = self.next_one_time_key_id, "generated one-time keys");
        Ok(())
    }

    fn new_key(&mut self, random: &[u8]) -> Result<OneTimeKey, OlmError> {
        let random = memory::load_prefix::<CURVE25519_RANDOM_LENGTH>(random)
            .map(Zeroizing::new)
            .ok_or(OlmError::NotEnoughRandom)?;
        self.next_one_time_key_id = self.next_one_time_key_id.wrapping_add(1);
        Ok(OneTimeKey {
            id: self.next_one_time_key_id,
            published: false,
            key: Curve25519KeyPair::from_random(&random),
        })
    }

    /// Random bytes needed by [`generate_fallback_key`](Self::generate_fallback_key).
    pub fn generate_fallback_key_random_length() -> usize {
        CURVE25519_RANDOM_LENGTH
    }

    /// Rotate the fallback key: the current key becomes the previous one
    /// and a fresh unpublished key takes its place.
    ///
    /// # Errors
    ///
    /// - `NotEnoughRandom` if `random` is shorter than 32 bytes
    pub fn generate_fallback_key(&mut self, random: &[u8]) -> Result<(), OlmError> {
        let key = self.new_key(random)?;
        debug!(id = key.id, "generated fallback key");
        self.prev_fallback_key = self.current_fallback_key.replace(key);
        Ok(())
    }

    /// Erase the previous fallback key.
    pub fn forget_old_fallback_key(&mut self) {
        self.prev_fallback_key = None;
    }

    /// Current fallback key, published or not, in the one-time key JSON
    /// shape.
    pub fn fallback_key_json(&self) -> String {
        keys_json(self.current_fallback_key.iter())
    }

    /// Current fallback key while it is unpublished, in the one-time key
    /// JSON shape.
    pub fn unpublished_fallback_key_json(&self) -> String {
        keys_json(self.current_fallback_key.iter().filter(|key| !key.published))
    }

    /// Find the private half of a one-time or fallback public key.
    pub fn lookup_key(&self, public_key: &Curve25519PublicKey) -> Option<&OneTimeKey> {
        self.one_time_keys
            .iter()
            .chain(self.current_fallback_key.iter())
            .chain(self.prev_fallback_key.iter())
            .find(|key| key.key.public_key.ct_eq(public_key))
    }

    /// Remove a consumed one-time key, returning its id.
    ///
    /// Fallback keys are never removed here.
    pub fn remove_key(&mut self, public_key: &Curve25519PublicKey) -> Option<u32> {
        let index = self.one_time_keys.position(|key| key.key.public_key.ct_eq(public_key))?;
        let removed = self.one_time_keys.remove(index)?;
        debug!(id = removed.id, "removed one-time key");
        Some(removed.id)
    }

    /// Remove the one-time key that `session` was established with.
    ///
    /// # Errors
    ///
    /// - `BadMessageKeyId` if the account no longer holds that key
    pub fn remove_one_time_keys(&mut self, session: &Session) -> Result<(), OlmError> {
        self.remove_key(session.bob_one_time_key()).map(|_| ()).ok_or(OlmError::BadMessageKeyId)
    }

    /// Encrypted pickle of the account under `key`.
    pub fn pickle(&self, key: &[u8]) -> String {
        pickle::pickle_with(key, |writer| {
            writer
                .write_u32(ACCOUNT_PICKLE_VERSION)
                .write(&self.identity_keys.ed25519)
                .write(&self.identity_keys.curve25519)
                .write(&self.one_time_keys);

            let fallback_count = match (&self.current_fallback_key, &self.prev_fallback_key) {
                (None, _) => 0,
                (Some(_), None) => 1,
                (Some(_), Some(_)) => 2,
            };
            writer.write_u8(fallback_count);
            for fallback in self.current_fallback_key.iter().chain(self.prev_fallback_key.iter()) {
                writer.write(fallback);
            }

            writer.write_u32(self.next_one_time_key_id);
        })
    }

    /// Restore an account from an encrypted pickle.
    ///
    /// Versions 2 to 4 are accepted.
    ///
    /// # Errors
    ///
    /// - `InvalidBase64` or `BadAccountKey` if the pickle cannot be decrypted
    /// - `BadLegacyAccountPickle` for version 1
    /// - `UnknownPickleVersion` for any other unsupported version
    /// - `CorruptedPickle` if the content is malformed
    pub fn from_pickle(key: &[u8], pickle: &str) -> Result<Self, OlmError> {
        pickle::unpickle_with(key, pickle, |reader| {
            let version = reader.read_u32()?;
            match version {
                2..=ACCOUNT_PICKLE_VERSION => {},
                1 => return Err(OlmError::BadLegacyAccountPickle),
                version => return Err(PickleError::UnknownVersion { version }.into()),
            }

            let ed25519 = reader.read()?;
            let curve25519 = reader.read()?;
            let one_time_keys: BoundedList<OneTimeKey, MAX_ONE_TIME_KEYS> = reader.read()?;

            let (current_fallback_key, prev_fallback_key) = if version >= 4 {
                let count = reader.read_u8()?;
                if count > 2 {
                    return Err(PickleError::InvalidValue { field: "fallback key count" }.into());
                }
                let current = if count >= 1 { Some(reader.read()?) } else { None };
                let previous = if count >= 2 { Some(reader.read()?) } else { None };
                (current, previous)
            } else {
                (None, None)
            };

            // Version 2 did not store the counter; resume after the highest
            // id still present.
            let next_one_time_key_id = if version >= 3 {
                reader.read_u32()?
            } else {
                one_time_keys.iter().map(|key| key.id).max().unwrap_or(0)
            };

            Ok(Self {
                identity_keys: IdentityKeys { ed25519, curve25519 },
                one_time_keys,
                current_fallback_key,
                prev_fallback_key,
                next_one_time_key_id,
            })
        })
    }
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("curve25519", self.curve25519_key())
            .field("ed25519", self.ed25519_key())
            .field("one_time_keys", &self.one_time_keys.len())
            .field("next_one_time_key_id", &self.next_one_time_key_id)
            .finish_non_exhaustive()
    }
}
