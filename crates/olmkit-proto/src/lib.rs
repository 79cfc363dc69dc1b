//! Olmkit Wire and Pickle Encodings
//!
//! Byte-level formats shared by the protocol objects:
//!
//! - [`message`]: Olm normal and pre-key messages (tagged fields)
//! - [`group_message`]: Megolm group messages
//! - [`pickle`]: flat serialization of object state
//!
//! # Security
//!
//! Decoders here only check structure. Every length is bounds-checked before
//! it is used, and a malformed field comes back as absent rather than as an
//! error or a panic. Authenticity is the caller's job: a decoded message must
//! still pass its MAC (and for group messages, its signature) before any of
//! its content is trusted.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod error;
pub mod group_message;
pub mod message;
pub mod pickle;
pub mod varint;

pub use error::PickleError;
pub use group_message::{
    DecodedGroupMessage, decode_group_message, encode_group_message, group_message_length,
};
pub use message::{
    DecodedMessage, DecodedPreKeyMessage, FramedMessage, decode_message, decode_prekey_message,
    encode_message, encode_prekey_message, message_length, prekey_message_length,
};
pub use pickle::{Pickle, PickleReader, PickleWriter, Unpickle};
