//! Per-update session context
//!
//! One `DfuSession` lives for one update attempt. Prevalidation writes the
//! tag carried by the init packet into it; postvalidation reads it back. The
//! orchestrator owns the session, so there is no hidden global between the
//! two stages.

use heapless::Vec;
use zeroize::Zeroize;

use crate::crypto::TAG_SIZE;

#[derive(Default)]
pub struct DfuSession {
    tag: Vec<u8, TAG_SIZE>,
}

impl DfuSession {
    pub const fn new() -> Self {
        Self { tag: Vec::new() }
    }

    /// Replace the cached tag. `tag` longer than `TAG_SIZE` is refused and
    /// leaves the session empty.
    pub(crate) fn store_tag(&mut self, tag: &[u8]) -> Result<(), ()> {
        self.reset();
        self.tag.extend_from_slice(tag)
    }

    /// Tag cached by the last prevalidation, if any.
    pub fn cached_tag(&self) -> Option<&[u8]> {
        if self.tag.is_empty() {
            None
        } else {
            Some(self.tag.as_slice())
        }
    }

    pub fn tag_len(&self) -> usize {
        self.tag.len()
    }

    /// Wipe the cached tag and start over.
    pub fn reset(&mut self) {
        self.tag.as_mut_slice().zeroize();
        self.tag.clear();
    }
}

impl core::fmt::Debug for DfuSession {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DfuSession").field("tag_len", &self.tag.len()).finish()
    }
}

impl Drop for DfuSession {
    fn drop(&mut self) {
        self.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty() {
        let s = DfuSession::new();
        assert_eq!(s.cached_tag(), None);
        assert_eq!(s.tag_len(), 0);
    }

    #[test]
    fn store_overwrites() {
        let mut s = DfuSession::new();
        s.store_tag(&[1u8; TAG_SIZE]).unwrap();
        s.store_tag(&[2u8; TAG_SIZE]).unwrap();
        assert_eq!(s.cached_tag(), Some(&[2u8; TAG_SIZE][..]));
    }

    #[test]
    fn oversized_tag_leaves_session_empty() {
        let mut s = DfuSession::new();
        s.store_tag(&[1u8; TAG_SIZE]).unwrap();
        assert!(s.store_tag(&[3u8; TAG_SIZE + 1]).is_err());
        assert_eq!(s.cached_tag(), None);
    }

    #[test]
    fn reset_clears() {
        let mut s = DfuSession::new();
        s.store_tag(&[9u8; TAG_SIZE]).unwrap();
        s.reset();
        assert_eq!(s.cached_tag(), None);
    }
}
