//! Olmkit Protocol Objects
//!
//! Stateful Olm and Megolm objects built on [`olmkit_crypto`] and
//! [`olmkit_proto`]. Nothing here performs I/O or generates randomness:
//! every operation that needs entropy takes it from the caller and
//! reports how much it needs up front.
//!
//! # Components
//!
//! - [`Account`]: device identity keys, one-time keys and fallback keys
//! - [`Session`]: pairwise Olm session over a [`Ratchet`]
//! - [`OutboundGroupSession`] / [`InboundGroupSession`]: Megolm sessions
//! - [`PkEncryption`] / [`PkDecryption`] / [`PkSigning`]: one-shot
//!   public-key encryption and standalone signing
//! - [`Sas`]: short authentication string agreement
//! - [`utility`]: hashing and signature verification
//!
//! # Errors
//!
//! Every fallible call returns [`OlmError`]. Its variants and their
//! [`code`](OlmError::code) strings are the stable names callers match on.
//!
//! # Persistence
//!
//! Every object can be pickled: its state is serialized, encrypted under a
//! caller key and base64-encoded. See [`pickle`] for the format.
//!
//! # Threading
//!
//! Objects are plain owned values with no interior mutability. Share them
//! across threads behind whatever lock the caller already uses.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod account;
pub mod error;
pub mod group;
pub mod list;
pub mod megolm;
pub mod pickle;
pub mod pk;
pub mod ratchet;
pub mod sas;
pub mod session;
pub mod utility;

pub use account::{Account, IdentityKeys, MAX_ONE_TIME_KEYS, OneTimeKey};
pub use error::OlmError;
pub use group::{InboundGroupSession, OutboundGroupSession};
pub use list::BoundedList;
pub use megolm::Megolm;
pub use pk::{PkDecryption, PkEncryption, PkMessage, PkSigning};
pub use ratchet::Ratchet;
pub use sas::Sas;
pub use session::{MessageType, OlmMessage, Session};
