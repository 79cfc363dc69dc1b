//! Integration tests for accounts and pairwise sessions
//!
//! 1. **Handshake agreement**: an outbound session and the inbound session
//!    built from its first pre-key message share a session id and decrypt
//!    each other's traffic
//! 2. **Pre-key latch**: the initiator sends pre-key messages until it has
//!    decrypted a reply, then plain messages
//! 3. **One-time key consumption**: a consumed key cannot open a second
//!    inbound session
//! 4. **Account bounds**: the one-time key bag never exceeds its capacity
//! 5. **Identity JSON**: fixed random input yields a stable identity document

use olmkit_core::{Account, MAX_ONE_TIME_KEYS, MessageType, OlmError, OlmMessage, Session};
use olmkit_crypto::Curve25519PublicKey;
use proptest::prelude::*;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

fn random(rng: &mut ChaCha20Rng, length: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; length];
    rng.fill_bytes(&mut bytes);
    bytes
}

fn account(rng: &mut ChaCha20Rng) -> Account {
    Account::new(&random(rng, 64)).expect("64 bytes of random")
}

fn encrypt(session: &mut Session, rng: &mut ChaCha20Rng, plaintext: &str) -> OlmMessage {
    let bytes = random(rng, session.encrypt_random_length());
    session.encrypt(plaintext.as_bytes(), &bytes).expect("encrypt with enough random")
}

/// Alice opens a session to Bob's newest one-time key.
fn handshake(rng: &mut ChaCha20Rng, alice: &Account, bob: &mut Account) -> Session {
    bob.generate_one_time_keys(1, &random(rng, 32)).expect("32 bytes per key");
    let one_time_key = bob.one_time_keys().iter().next().expect("one key generated").key.public_key;
    Session::new_outbound(alice, bob.curve25519_key(), &one_time_key, &random(rng, 64))
        .expect("64 bytes of random")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// INVARIANT: both sides of a fresh handshake agree and can talk.
    #[test]
    fn prop_handshake_agreement(seed in any::<u64>(), plaintext in "[ -~]{0,64}") {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let alice = account(&mut rng);
        let mut bob = account(&mut rng);
        let mut outbound = handshake(&mut rng, &alice, &mut bob);

        let first = encrypt(&mut outbound, &mut rng, &plaintext);
        prop_assert_eq!(first.message_type, MessageType::PreKey);

        let mut inbound = Session::new_inbound_from(&bob, alice.curve25519_key(), &first.body)
            .expect("inbound session from pre-key message");
        prop_assert_eq!(inbound.session_id(), outbound.session_id());
        prop_assert!(inbound.matches_inbound_session(&first.body).expect("valid base64"));

        let decrypted = inbound.decrypt(first.message_type, &first.body).expect("first message");
        prop_assert_eq!(&decrypted[..], plaintext.as_bytes());

        let reply = encrypt(&mut inbound, &mut rng, "reply");
        prop_assert_eq!(reply.message_type, MessageType::Message);
        let decrypted = outbound.decrypt(reply.message_type, &reply.body).expect("reply");
        prop_assert_eq!(&decrypted[..], b"reply");
    }

    /// INVARIANT: the bag holds at most `MAX_ONE_TIME_KEYS`, keeping the
    /// newest keys.
    #[test]
    fn prop_one_time_keys_bounded(
        seed in any::<u64>(),
        batches in prop::collection::vec(0usize..60, 1..6),
    ) {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let mut account = account(&mut rng);

        let mut generated = 0usize;
        for count in batches {
            let bytes = random(&mut rng, Account::generate_one_time_keys_random_length(count));
            account.generate_one_time_keys(count, &bytes).expect("enough random");
            generated += count;

            prop_assert_eq!(account.one_time_keys().len(), generated.min(MAX_ONE_TIME_KEYS));
        }

        let ids: Vec<u32> = account.one_time_keys().iter().map(|key| key.id).collect();
        prop_assert!(ids.windows(2).all(|pair| pair[0] > pair[1]), "newest first, unique ids");
        if let Some(newest) = ids.first() {
            prop_assert_eq!(*newest as usize, generated);
        }
    }
}

/// INVARIANT: the initiator keeps sending pre-key messages until the first
/// reply decrypts.
#[test]
fn prekey_messages_until_first_reply() {
    let mut rng = ChaCha20Rng::seed_from_u64(11);
    let alice = account(&mut rng);
    let mut bob = account(&mut rng);
    let mut outbound = handshake(&mut rng, &alice, &mut bob);

    let first = encrypt(&mut outbound, &mut rng, "one");
    let second = encrypt(&mut outbound, &mut rng, "two");
    assert_eq!(second.message_type, MessageType::PreKey);

    let mut inbound = Session::new_inbound(&bob, &first.body).expect("inbound");
    assert!(inbound.matches_inbound_session(&second.body).expect("valid base64"));
    inbound.decrypt(second.message_type, &second.body).expect("second");
    inbound.decrypt(first.message_type, &first.body).expect("first, out of order");

    assert!(!outbound.has_received_message());
    let reply = encrypt(&mut inbound, &mut rng, "reply");
    outbound.decrypt(reply.message_type, &reply.body).expect("reply");
    assert!(outbound.has_received_message());
    assert_eq!(outbound.encrypt_message_type(), MessageType::Message);
    assert_eq!(encrypt(&mut outbound, &mut rng, "three").message_type, MessageType::Message);
}

/// INVARIANT: once removed, a one-time key cannot be used again.
#[test]
fn consumed_one_time_key_is_rejected() {
    let mut rng = ChaCha20Rng::seed_from_u64(12);
    let alice = account(&mut rng);
    let mut bob = account(&mut rng);
    let mut outbound = handshake(&mut rng, &alice, &mut bob);
    let first = encrypt(&mut outbound, &mut rng, "hello");

    let inbound = Session::new_inbound(&bob, &first.body).expect("inbound");
    bob.remove_one_time_keys(&inbound).expect("key present");
    assert!(bob.one_time_keys().is_empty());

    assert_eq!(Session::new_inbound(&bob, &first.body).err(), Some(OlmError::BadMessageKeyId));
    assert_eq!(bob.remove_one_time_keys(&inbound), Err(OlmError::BadMessageKeyId));
}

/// INVARIANT: a pre-key message from one sender does not open a session
/// attributed to another.
#[test]
fn inbound_from_wrong_identity_is_rejected() {
    let mut rng = ChaCha20Rng::seed_from_u64(13);
    let alice = account(&mut rng);
    let mut bob = account(&mut rng);
    let mallory = account(&mut rng);
    let mut outbound = handshake(&mut rng, &alice, &mut bob);
    let first = encrypt(&mut outbound, &mut rng, "hello");

    assert_eq!(
        Session::new_inbound_from(&bob, mallory.curve25519_key(), &first.body).err(),
        Some(OlmError::BadMessageKeyId)
    );
    let inbound = Session::new_inbound(&bob, &first.body).expect("inbound");
    let from_mallory = inbound.matches_inbound_session_from(mallory.curve25519_key(), &first.body);
    assert!(!from_mallory.expect("base64"));
    let from_alice = inbound.matches_inbound_session_from(alice.curve25519_key(), &first.body);
    assert!(from_alice.expect("base64"));
}

/// INVARIANT: the fallback key opens sessions and survives being used.
#[test]
fn fallback_key_opens_sessions() {
    let mut rng = ChaCha20Rng::seed_from_u64(14);
    let alice = account(&mut rng);
    let mut bob = account(&mut rng);
    bob.generate_fallback_key(&random(&mut rng, 32)).expect("32 bytes");

    let json = bob.fallback_key_json();
    let encoded = json.rsplit('"').nth(1).expect("key value in json");
    let fallback = Curve25519PublicKey::from_base64(encoded).expect("fallback key");

    for _ in 0..2 {
        let mut outbound =
            Session::new_outbound(&alice, bob.curve25519_key(), &fallback, &random(&mut rng, 64))
                .expect("outbound");
        let first = encrypt(&mut outbound, &mut rng, "via fallback");
        let mut inbound = Session::new_inbound(&bob, &first.body).expect("inbound via fallback");
        let plaintext = inbound.decrypt(first.message_type, &first.body).expect("decrypt");
        assert_eq!(&plaintext[..], b"via fallback");
    }
}

/// INVARIANT: tampering with a session message is rejected without
/// desynchronising the receiver.
#[test]
fn tampered_session_message_rejected() {
    let mut rng = ChaCha20Rng::seed_from_u64(15);
    let alice = account(&mut rng);
    let mut bob = account(&mut rng);
    let mut outbound = handshake(&mut rng, &alice, &mut bob);
    let first = encrypt(&mut outbound, &mut rng, "genuine");
    let mut inbound = Session::new_inbound(&bob, &first.body).expect("inbound");

    let mut raw = olmkit_crypto::base64::decode(first.body.as_bytes()).expect("base64");
    let last = raw.len() - 1;
    raw[last] ^= 0x80;
    let tampered = olmkit_crypto::base64::encode(&raw);

    assert_eq!(
        inbound.decrypt(MessageType::PreKey, &tampered).err(),
        Some(OlmError::BadMessageMac)
    );
    assert!(!inbound.has_received_message());
    assert_eq!(&inbound.decrypt(first.message_type, &first.body).expect("genuine")[..], b"genuine");
}

/// INVARIANT: identity keys derive deterministically from the account
/// random input and serialize in a fixed order.
#[test]
fn identity_json_from_fixed_random() {
    let random: Vec<u8> = (0u8..64).collect();
    let account = Account::new(&random).expect("64 bytes");
    let json = account.identity_keys_json();

    assert_eq!(
        json,
        "{\"curve25519\":\"NYBy1jZYgNGu6jKa35EhODhR7SGijjt16WXQ0s0WYlQ\",\
         \"ed25519\":\"A6EHv/POEL4dcN0Y50vAmWfk1jCbpQ1fHdyGZBJVMbg\"}"
    );
    assert_eq!(account.curve25519_key().to_base64().len(), 43);
    assert_eq!(account.ed25519_key().to_base64().len(), 43);
    assert_eq!(Account::new(&random).expect("64 bytes").identity_keys_json(), json);
}

/// INVARIANT: published one-time keys drop out of the JSON listing.
#[test]
fn published_keys_leave_json() {
    let mut rng = ChaCha20Rng::seed_from_u64(16);
    let mut account = account(&mut rng);
    account.generate_one_time_keys(1, &random(&mut rng, 32)).expect("32 bytes");
    assert_ne!(account.one_time_keys_json(), "{\"curve25519\":{}}");

    assert_eq!(account.mark_keys_as_published(), 1);
    assert_eq!(account.one_time_keys_json(), "{\"curve25519\":{}}");
    assert_eq!(account.mark_keys_as_published(), 0);
}
