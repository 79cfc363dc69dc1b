//! Constant-time comparison and fixed-array helpers
//!
//! Secure erasure itself is delegated to [`zeroize`]: every type holding key
//! material derives `ZeroizeOnDrop`, and temporaries are wrapped in
//! [`zeroize::Zeroizing`] so they are wiped on every exit path.

use subtle::ConstantTimeEq;

/// Compare two byte strings in constant time.
///
/// The running time depends only on the lengths, never on the position of
/// the first differing byte. Slices of different length compare unequal.
pub fn is_equal(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

/// Copy a slice into a fixed-size array.
///
/// Returns `None` unless `input` is exactly `N` bytes long.
pub fn load_array<const N: usize>(input: &[u8]) -> Option<[u8; N]> {
    <[u8; N]>::try_from(input).ok()
}

/// Copy the first `N` bytes of a slice into a fixed-size array.
///
/// Returns `None` if `input` is shorter than `N`. Used for carving fixed
/// lengths out of caller-supplied random buffers.
pub fn load_prefix<const N: usize>(input: &[u8]) -> Option<[u8; N]> {
    input.get(..N).and_then(load_array)
}
