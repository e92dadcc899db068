//! Keyed-hash authentication of firmware images
//!
//! The gate treats the keyed hash as a black box behind [`KeyedHash`]. The
//! shipped implementation is HMAC-SHA256 ([`HmacSha256`]); a board with a
//! hardware HMAC engine can supply its own.

pub mod mac;

use core::fmt;

use crate::errors::HashFault;

pub use mac::HmacSha256;

/// Size of the pre-shared secret key. SHA-256 takes a 32 byte key.
pub const SECRET_KEY_SIZE: usize = 32;

/// Size of an authentication tag; equal to the HMAC-SHA256 digest.
pub const TAG_SIZE: usize = 32;

pub type Tag = [u8; TAG_SIZE];

/// Pre-shared secret key living in protected flash.
///
/// Once wrapped, the key bytes are only handed to the validator's
/// [`KeyedHash`]; nothing public reads them back:
///
/// ```compile_fail
/// let raw = [0u8; 32];
/// let key = dfu_hmac_init::SecretKey::new(&raw);
/// let _leak = key.expose_secret();
/// ```
pub struct SecretKey<'a> {
    bytes: &'a [u8; SECRET_KEY_SIZE],
}

impl<'a> SecretKey<'a> {
    pub const fn new(bytes: &'a [u8; SECRET_KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Key bytes, passed to the `KeyedHash` during authentication.
    pub(crate) fn expose_secret(&self) -> &[u8; SECRET_KEY_SIZE] {
        self.bytes
    }
}

impl SecretKey<'static> {
    /// Key stored at a fixed flash address.
    ///
    /// # Safety
    /// `address` must point at `SECRET_KEY_SIZE` readable bytes that are
    /// never written while the bootloader runs.
    pub unsafe fn at_address(address: u32) -> Self {
        Self::new(&*(address as usize as *const [u8; SECRET_KEY_SIZE]))
    }
}

impl fmt::Debug for SecretKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

/// Keyed hash primitive: `compute(message, key) -> digest | failure`.
///
/// The validator calls this with the bytes of its [`SecretKey`].
/// Implementations must not retain the key.
pub trait KeyedHash {
    fn compute(&self, message: &[u8], key: &[u8; SECRET_KEY_SIZE]) -> Result<Tag, HashFault>;
}

impl<H: KeyedHash + ?Sized> KeyedHash for &H {
    fn compute(&self, message: &[u8], key: &[u8; SECRET_KEY_SIZE]) -> Result<Tag, HashFault> {
        (**self).compute(message, key)
    }
}

/// Compare two tags without an early exit on the first differing byte.
pub fn tags_match(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_never_prints_key() {
        let raw = [0x42u8; SECRET_KEY_SIZE];
        let key = SecretKey::new(&raw);
        let shown = std::format!("{:?}", key);
        assert_eq!(shown, "SecretKey(..)");
    }

    #[test]
    fn tag_comparison() {
        let a = [1u8; TAG_SIZE];
        let mut b = a;
        assert!(tags_match(&a, &b));
        b[TAG_SIZE - 1] ^= 0x80;
        assert!(!tags_match(&a, &b));
        assert!(!tags_match(&a, &a[..TAG_SIZE - 1]));
        assert!(tags_match(&[], &[]));
    }
}
