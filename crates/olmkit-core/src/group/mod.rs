//! Megolm group sessions
//!
//! A sender owns one [`OutboundGroupSession`] per room. It shares the
//! ratchet state as a signed session key with every recipient over
//! pairwise Olm sessions; each recipient keeps an [`InboundGroupSession`].
//!
//! ```text
//! sender                                     recipient
//! ──────                                     ─────────
//! OutboundGroupSession::new(random)
//!   session_key() ──── via Olm ────────────► InboundGroupSession::new(key)
//!   encrypt(m) ─────── broadcast ──────────► decrypt(message) → (m, index)
//! ```
//!
//! Every message is MACed with keys derived from the ratchet state at its
//! index and signed with the session's Ed25519 key. Recipients check the
//! signature before deriving anything, so a forged message costs one
//! signature verification.

mod inbound;
mod outbound;
mod session_key;

use olmkit_crypto::AesSha256Cipher;

pub use inbound::{INBOUND_GROUP_PICKLE_VERSION, InboundGroupSession};
pub use outbound::{
    OUTBOUND_GROUP_PICKLE_VERSION, OUTBOUND_GROUP_SESSION_RANDOM_LENGTH, OutboundGroupSession,
};
pub use session_key::{
    SESSION_EXPORT_LENGTH, SESSION_EXPORT_VERSION, SESSION_KEY_LENGTH, SESSION_KEY_VERSION,
};

/// Megolm message protocol version
pub const MEGOLM_PROTOCOL_VERSION: u8 = 3;

/// Cipher for group message payloads, keyed with the full ratchet state
pub(crate) const MEGOLM_CIPHER: AesSha256Cipher = AesSha256Cipher::new(b"MEGOLM_KEYS");
