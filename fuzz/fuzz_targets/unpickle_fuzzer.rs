//! Fuzz target for every unpickler
//!
//! # Strategy
//!
//! - Sealed: arbitrary raw state encrypted under the right key, so the MAC
//!   passes and the bytes reach the object parsers
//! - Text: arbitrary pickle text, exercising base64 and MAC rejection
//!
//! # Invariants
//!
//! - Malformed state is rejected with an error, never partially restored
//! - Anything that restores pickles again and restores a second time
//! - NEVER panic on arbitrary input

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use olmkit_core::{
    Account, InboundGroupSession, OutboundGroupSession, PkDecryption, Session,
    pickle::encrypt_pickle,
};

const KEY: &[u8] = b"fuzz pickle key";

#[derive(Debug, Arbitrary)]
enum Input {
    Sealed(Vec<u8>),
    Text(String),
}

fuzz_target!(|input: Input| {
    let pickle = match input {
        Input::Sealed(raw) => encrypt_pickle(KEY, &raw),
        Input::Text(text) => text,
    };

    if let Ok(account) = Account::from_pickle(KEY, &pickle) {
        let again = Account::from_pickle(KEY, &account.pickle(KEY)).expect("account repickles");
        assert_eq!(again.identity_keys_json(), account.identity_keys_json());
    }
    if let Ok(session) = Session::from_pickle(KEY, &pickle) {
        let again = Session::from_pickle(KEY, &session.pickle(KEY)).expect("session repickles");
        assert_eq!(again.session_id(), session.session_id());
    }
    if let Ok(session) = OutboundGroupSession::from_pickle(KEY, &pickle) {
        let again = OutboundGroupSession::from_pickle(KEY, &session.pickle(KEY))
            .expect("outbound group session repickles");
        assert_eq!(again.message_index(), session.message_index());
    }
    if let Ok(session) = InboundGroupSession::from_pickle(KEY, &pickle) {
        let again = InboundGroupSession::from_pickle(KEY, &session.pickle(KEY))
            .expect("inbound group session repickles");
        assert_eq!(again.first_known_index(), session.first_known_index());
    }
    if let Ok(decryption) = PkDecryption::from_pickle(KEY, &pickle) {
        assert!(PkDecryption::from_pickle(KEY, &decryption.pickle(KEY)).is_ok());
    }
});
