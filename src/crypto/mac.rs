//! HMAC-SHA256 keyed hash

use ::hmac::{Hmac, Mac};
use sha2::Sha256;

use super::{KeyedHash, Tag, SECRET_KEY_SIZE};
use crate::errors::HashFault;

/// Software HMAC-SHA256.
#[derive(Debug, Clone, Copy, Default)]
pub struct HmacSha256;

impl KeyedHash for HmacSha256 {
    fn compute(&self, message: &[u8], key: &[u8; SECRET_KEY_SIZE]) -> Result<Tag, HashFault> {
        let mut mac = Hmac::<Sha256>::new_from_slice(key).map_err(|_| HashFault)?;
        mac.update(message);
        Ok(mac.finalize().into_bytes().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    // RFC 4231 test case 1; HMAC zero-pads short keys, so padding the
    // 20-byte key out to 32 bytes gives the same MAC.
    #[test]
    fn rfc4231_case1() {
        let mut key = [0u8; SECRET_KEY_SIZE];
        key[..20].copy_from_slice(&[0x0b; 20]);
        assert_eq!(
            HmacSha256.compute(b"Hi There", &key).unwrap(),
            hex!("b0344c61d8db38535ca8afceaf0bf12b881dc200c9833da726e9376c2e32cff7")
        );
    }

    #[test]
    fn different_images_differ() {
        let key = [0x11u8; SECRET_KEY_SIZE];
        assert_ne!(
            HmacSha256.compute(b"image-a", &key).unwrap(),
            HmacSha256.compute(b"image-b", &key).unwrap()
        );
    }
}
