//! Property-based tests for the Megolm and Olm ratchets
//!
//! 1. **Megolm equivalence**: `advance_to(counter + n)` matches `n` calls to
//!    `advance`, and jumps compose
//! 2. **Megolm idempotence**: `advance_to(counter)` changes nothing
//! 3. **Ratchet symmetry**: a paired Alice and Bob decrypt each other's
//!    messages in single exchanges, bursts and shuffled delivery
//! 4. **Skipped-key window**: a message older than the window fails
//! 5. **Tamper detection**: flipping any bit of a message makes decryption
//!    fail and leaves the ratchet untouched

use olmkit_core::{
    OlmError, Ratchet,
    megolm::{MEGOLM_RATCHET_LENGTH, Megolm},
    ratchet::MAX_SKIPPED_MESSAGE_KEYS,
};
use olmkit_crypto::Curve25519KeyPair;
use proptest::prelude::*;
use rand::{RngCore, SeedableRng, seq::SliceRandom};
use rand_chacha::ChaCha20Rng;

fn paired(seed: u64) -> (Ratchet, Ratchet, ChaCha20Rng) {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let mut secret = [0u8; 96];
    rng.fill_bytes(&mut secret);
    let mut ratchet_random = [0u8; 32];
    rng.fill_bytes(&mut ratchet_random);

    let ratchet_key = Curve25519KeyPair::from_random(&ratchet_random);
    let bob = Ratchet::initialise_as_bob(&secret, ratchet_key.public_key);
    let alice = Ratchet::initialise_as_alice(&secret, ratchet_key);
    (alice, bob, rng)
}

fn encrypt(ratchet: &mut Ratchet, rng: &mut ChaCha20Rng, plaintext: &[u8]) -> Vec<u8> {
    let mut random = vec![0u8; ratchet.encrypt_random_length()];
    rng.fill_bytes(&mut random);
    ratchet.encrypt(plaintext, &random).expect("encrypt with enough random")
}

fn megolm_strategy() -> impl Strategy<Value = Megolm> {
    // Counters stay clear of u32::MAX so no test wraps.
    let data = prop::collection::vec(any::<u8>(), MEGOLM_RATCHET_LENGTH);
    (data, 0u32..u32::MAX - (1 << 22)).prop_map(|(data, counter)| {
        let data: [u8; MEGOLM_RATCHET_LENGTH] = data.try_into().expect("exact length");
        Megolm::new(&data, counter)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// INVARIANT: jumping and stepping reach the same state.
    #[test]
    fn prop_megolm_advance_to_matches_stepping(start in megolm_strategy(), steps in 0u32..600) {
        let mut stepped = start.clone();
        for _ in 0..steps {
            stepped.advance();
        }

        let mut jumped = start.clone();
        jumped.advance_to(start.counter().wrapping_add(steps));

        prop_assert_eq!(jumped, stepped);
    }

    /// INVARIANT: jumps compose.
    #[test]
    fn prop_megolm_jumps_compose(
        start in megolm_strategy(),
        first in 0u32..1 << 20,
        second in 0u32..1 << 20,
    ) {
        let target = start.counter().wrapping_add(first).wrapping_add(second);

        let mut direct = start.clone();
        direct.advance_to(target);

        let mut two_hops = start.clone();
        two_hops.advance_to(start.counter().wrapping_add(first));
        two_hops.advance_to(target);

        prop_assert_eq!(direct, two_hops);
    }

    /// INVARIANT: advancing to the current counter is a no-op.
    #[test]
    fn prop_megolm_advance_to_current_is_noop(start in megolm_strategy()) {
        let mut megolm = start.clone();
        megolm.advance_to(start.counter());
        prop_assert_eq!(megolm, start);
    }

    /// INVARIANT: every message of a burst decrypts in any delivery order.
    #[test]
    fn prop_burst_decrypts_in_any_order(seed in any::<u64>(), count in 1usize..30) {
        let (mut alice, mut bob, mut rng) = paired(seed);
        let mut messages: Vec<(usize, Vec<u8>)> = (0..count)
            .map(|i| (i, encrypt(&mut alice, &mut rng, format!("message {i}").as_bytes())))
            .collect();
        messages.shuffle(&mut rng);

        for (i, message) in &messages {
            let plaintext = bob.decrypt(message).expect("in-window message decrypts");
            let expected = format!("message {i}");
            prop_assert_eq!(&plaintext[..], expected.as_bytes());
        }
        prop_assert!(bob.skipped_message_keys().is_empty());
    }

    /// INVARIANT: alternating conversations stay in sync across ratchet
    /// steps.
    #[test]
    fn prop_conversation_round_trips(
        seed in any::<u64>(),
        turns in prop::collection::vec(1usize..4, 1..8),
    ) {
        let (mut alice, mut bob, mut rng) = paired(seed);

        for (turn, burst) in turns.iter().enumerate() {
            let (sender, receiver) =
                if turn % 2 == 0 { (&mut alice, &mut bob) } else { (&mut bob, &mut alice) };
            for i in 0..*burst {
                let plaintext = format!("turn {turn} message {i}");
                let message = encrypt(sender, &mut rng, plaintext.as_bytes());
                let decrypted = receiver.decrypt(&message).expect("in-order message decrypts");
                prop_assert_eq!(&decrypted[..], plaintext.as_bytes());
            }
        }
    }

    /// INVARIANT: a single flipped bit is always detected and never
    /// changes the receiver's state.
    #[test]
    fn prop_bit_flip_is_rejected(
        seed in any::<u64>(),
        position in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let (mut alice, mut bob, mut rng) = paired(seed);
        let mut message = encrypt(&mut alice, &mut rng, b"attack at dawn");
        let index = position.index(message.len());
        message[index] ^= 1 << bit;

        let before = bob.describe();
        let result = bob.decrypt(&message);
        prop_assert!(result.is_err());
        prop_assert_eq!(bob.describe(), before);
    }
}

/// INVARIANT: a message whose skipped key was evicted can no longer be
/// decrypted.
#[test]
fn message_older_than_skipped_window_fails() {
    let (mut alice, mut bob, mut rng) = paired(7);
    let messages: Vec<_> =
        (0..MAX_SKIPPED_MESSAGE_KEYS + 2).map(|_| encrypt(&mut alice, &mut rng, b"m")).collect();

    let last = messages.last().expect("non-empty");
    bob.decrypt(last).expect("newest message decrypts");
    assert_eq!(bob.skipped_message_keys().len(), MAX_SKIPPED_MESSAGE_KEYS);

    assert_eq!(bob.decrypt(&messages[0]).err(), Some(OlmError::BadMessageMac));
    assert!(bob.decrypt(&messages[1]).is_ok(), "oldest retained key still works");
}

/// INVARIANT: single messages in each direction decrypt.
#[test]
fn single_message_each_direction() {
    let (mut alice, mut bob, mut rng) = paired(1);

    let to_bob = encrypt(&mut alice, &mut rng, b"hello bob");
    assert_eq!(&bob.decrypt(&to_bob).expect("decrypts")[..], b"hello bob");

    let to_alice = encrypt(&mut bob, &mut rng, b"hello alice");
    assert_eq!(&alice.decrypt(&to_alice).expect("decrypts")[..], b"hello alice");
}

/// INVARIANT: late messages from a previous chain still decrypt after the
/// conversation has changed direction.
#[test]
fn late_message_from_previous_chain() {
    let (mut alice, mut bob, mut rng) = paired(3);
    let early = encrypt(&mut alice, &mut rng, b"early");
    let on_time = encrypt(&mut alice, &mut rng, b"on time");

    bob.decrypt(&on_time).expect("decrypts");
    let reply = encrypt(&mut bob, &mut rng, b"reply");
    alice.decrypt(&reply).expect("decrypts");
    let next = encrypt(&mut alice, &mut rng, b"new chain");
    bob.decrypt(&next).expect("decrypts");

    assert_eq!(&bob.decrypt(&early).expect("skipped key kept")[..], b"early");
}
