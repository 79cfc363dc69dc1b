//! Megolm hash ratchet
//!
//! The ratchet state is four 32-byte parts `R(0)..R(3)` and a 32-bit counter.
//! Each part is tied to one byte of the counter, high byte first: `R(0)`
//! changes every 2^24 steps, `R(3)` on every step. Advancing re-derives a
//! part from the part above it whenever that part's byte of the counter
//! rolls over, so a snapshot at index `i` can reach any later index but
//! never an earlier one.
//!
//! ```text
//! counter:  [ byte 3 ][ byte 2 ][ byte 1 ][ byte 0 ]
//! parts:      R(0)      R(1)      R(2)      R(3)
//! ```
//!
//! Rehashing `R(i) → R(j)` is `HMAC-SHA-256(key = R(i), data = [j])`.

use olmkit_crypto::digest::hmac_sha256;
use olmkit_proto::{Pickle, PickleError, PickleReader, PickleWriter, Unpickle};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Number of ratchet parts
pub const MEGOLM_RATCHET_PARTS: usize = 4;

/// Length of one ratchet part
pub const MEGOLM_RATCHET_PART_LENGTH: usize = 32;

/// Length of the whole ratchet state, which doubles as cipher key material
pub const MEGOLM_RATCHET_LENGTH: usize = MEGOLM_RATCHET_PARTS * MEGOLM_RATCHET_PART_LENGTH;

/// Megolm ratchet state.
///
/// # Invariants
///
/// - `advance_to(counter + n)` reaches the same bytes as `n` calls to
///   [`advance`](Self::advance)
/// - State never moves backwards except through a full 2^32 wrap
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Megolm {
    data: [u8; MEGOLM_RATCHET_LENGTH],
    #[zeroize(skip)]
    counter: u32,
}

impl Megolm {
    /// Ratchet seeded with `random` at index `counter`.
    pub fn new(random: &[u8; MEGOLM_RATCHET_LENGTH], counter: u32) -> Self {
        Self { data: *random, counter }
    }

    /// Current index.
    pub fn counter(&self) -> u32 {
        self.counter
    }

    /// Full ratchet state, used as cipher key material.
    pub fn data(&self) -> &[u8; MEGOLM_RATCHET_LENGTH] {
        &self.data
    }

    fn rehash_part(&mut self, from: usize, to: usize) {
        let start = from * MEGOLM_RATCHET_PART_LENGTH;
        let mut next =
            hmac_sha256(&self.data[start..start + MEGOLM_RATCHET_PART_LENGTH], &[to as u8]);

        let start = to * MEGOLM_RATCHET_PART_LENGTH;
        self.data[start..start + MEGOLM_RATCHET_PART_LENGTH].copy_from_slice(&next);
        next.zeroize();
    }

    /// Step to `counter + 1`.
    pub fn advance(&mut self) {
        self.counter = self.counter.wrapping_add(1);

        // Find the highest part whose counter byte rolled over.
        let mut mask = 0x00FF_FFFFu32;
        let mut h = 0;
        while h < MEGOLM_RATCHET_PARTS && self.counter & mask != 0 {
            h += 1;
            mask >>= 8;
        }

        // R(h) is rehashed last so the lower parts are derived from its old
        // value.
        for part in (h..MEGOLM_RATCHET_PARTS).rev() {
            self.rehash_part(h, part);
        }
    }

    /// Jump to index `target` in O(log distance) hash operations.
    ///
    /// `target == counter` is a no-op. A `target` below the current counter
    /// is treated as having wrapped past `u32::MAX`: part 0 is stepped a full
    /// 256 times and the lower parts are realigned, exactly as if
    /// [`advance`](Self::advance) had been called until the counter wrapped
    /// round to `target`.
    pub fn advance_to(&mut self, target: u32) {
        for part in 0..MEGOLM_RATCHET_PARTS {
            let shift = (MEGOLM_RATCHET_PARTS - part - 1) * 8;
            let mask = u32::MAX << shift;

            let mut steps = (target >> shift).wrapping_sub(self.counter >> shift) & 0xFF;
            if steps == 0 {
                if target < self.counter {
                    steps = 0x100;
                } else {
                    continue;
                }
            }

            // Only the final step needs to reseed the lower parts.
            for _ in 1..steps {
                self.rehash_part(part, part);
            }
            for lower in (part..MEGOLM_RATCHET_PARTS).rev() {
                self.rehash_part(part, lower);
            }

            self.counter = target & mask;
        }
    }
}

impl std::fmt::Debug for Megolm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Megolm").field("counter", &self.counter).finish_non_exhaustive()
    }
}

/// 128 bytes of state followed by the counter.
impl Pickle for Megolm {
    fn pickle(&self, writer: &mut PickleWriter) {
        writer.write_bytes(&self.data).write_u32(self.counter);
    }
}

impl Unpickle for Megolm {
    fn unpickle(reader: &mut PickleReader<'_>) -> Result<Self, PickleError> {
        let data = reader.read_array()?;
        let counter = reader.read_u32()?;
        Ok(Self { data, counter })
    }
}
