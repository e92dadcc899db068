//! Stage 2: keyed-hash authentication of the transferred image

use super::{DfuValidator, VersionPolicy};
use crate::crypto::{tags_match, KeyedHash};
use crate::errors::AuthError;
use crate::flash::FlashController;
use crate::image::FirmwareImage;
use crate::log::logger::{log_error, log_info};
use crate::recovery::{erase_and_reset, SystemControl};
use crate::session::DfuSession;

/// Proof that an image passed postvalidation. Only `authenticate` can make
/// one, so activation code can demand it.
#[derive(Debug, PartialEq, Eq)]
#[must_use]
pub struct Authenticated(());

impl<H: KeyedHash, V: VersionPolicy> DfuValidator<'_, H, V> {
    /// Recompute the image's keyed hash and compare it with the tag cached
    /// by `prevalidate`. Side-effect free; see `postvalidate` for the
    /// enforcing variant.
    pub fn authenticate(&self, session: &DfuSession, image: &FirmwareImage<'_>) -> Result<Authenticated, AuthError> {
        let expected = session.cached_tag().ok_or(AuthError::NoTag)?;
        let digest = self.hasher.compute(image.bytes(), self.key.expose_secret())?;

        if tags_match(&digest, expected) {
            Ok(Authenticated(()))
        } else {
            Err(AuthError::Mismatch)
        }
    }

    /// Authenticate the image or destroy it.
    ///
    /// Returns only on success. On a mismatch, a hash fault or a missing tag
    /// the settings page and every page of the image are erased and the chip
    /// is reset.
    pub fn postvalidate<P>(&self, session: &DfuSession, image: &FirmwareImage<'_>, platform: &mut P) -> Authenticated
    where
        P: FlashController + SystemControl + ?Sized,
    {
        match self.authenticate(session, image) {
            Ok(token) => {
                log_info(
                    "postvalidate",
                    format_args!("image at {:#010x} ({} bytes) authenticated", image.address(), image.len()),
                );
                token
            }
            Err(e) => {
                log_error("postvalidate", format_args!("{}", e.as_str()));
                erase_and_reset(&self.layout, image.address(), image.len(), platform)
            }
        }
    }
}
