//! Fuzz target for session and group decryption
//!
//! Arbitrary bodies are fed to live Olm and Megolm receivers.
//!
//! # Invariants
//!
//! - A rejected message leaves the receiver able to decrypt genuine traffic
//! - NEVER panic on arbitrary input

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use olmkit_core::{Account, InboundGroupSession, MessageType, OutboundGroupSession, Session};
use olmkit_crypto::base64;

#[derive(Debug, Arbitrary)]
struct Input {
    seed: [u8; 32],
    prekey: bool,
    body: Vec<u8>,
}

fuzz_target!(|input: Input| {
    let random = |salt: u8, length: usize| -> Vec<u8> {
        (0..length).map(|i| input.seed[i % 32] ^ salt ^ i as u8).collect()
    };

    let alice = Account::new(&random(1, 64)).expect("random");
    let mut bob = Account::new(&random(2, 64)).expect("random");
    bob.generate_one_time_keys(1, &random(3, 32)).expect("random");
    let one_time_key = bob.one_time_keys().iter().next().expect("one key").key.public_key;

    let mut outbound =
        Session::new_outbound(&alice, bob.curve25519_key(), &one_time_key, &random(4, 64))
            .expect("outbound");
    let genuine = outbound.encrypt(b"genuine", &[]).expect("encrypt");
    let mut inbound = Session::new_inbound(&bob, &genuine.body).expect("inbound");

    let message_type = if input.prekey { MessageType::PreKey } else { MessageType::Message };
    let forged = base64::encode(&input.body);
    // Only a replay of the genuine message can decrypt; it consumes the key.
    if inbound.decrypt(message_type, &forged).is_err() {
        inbound.decrypt(genuine.message_type, &genuine.body).expect("genuine message decrypts");
    }

    let mut group = OutboundGroupSession::new(&random(5, 160)).expect("random");
    let mut receiver = InboundGroupSession::new(&group.session_key()).expect("session key");
    let _ = receiver.decrypt(&forged);
    let message = group.encrypt(b"genuine");
    receiver.decrypt(&message).expect("genuine group message decrypts");
});
