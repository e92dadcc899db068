//! HMAC-SHA256 init packet validation for an nRF51 DFU bootloader.
//!
//! The gate runs in two stages around an image transfer:
//! - [`DfuValidator::prevalidate`] checks the init packet against the device
//!   and caches its authentication tag in a [`DfuSession`].
//! - [`DfuValidator::postvalidate`] recomputes the image's tag and either
//!   hands back an [`Authenticated`] token or erases the settings page and
//!   the image and resets the chip.

#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod crypto;
pub mod device;
pub mod errors;
pub mod flash;
pub mod image;
pub mod log;
pub mod packet;
pub mod recovery;
pub mod session;
pub mod verify;

#[cfg(any(test, feature = "sim"))]
pub mod testing;

pub use config::{DfuConfig, FlashLayout, MemoryMap};
pub use crypto::{HmacSha256, KeyedHash, SecretKey};
pub use device::DeviceIdentity;
pub use errors::{AuthError, ConfigError, DfuError, ImageError};
pub use flash::FlashController;
pub use image::FirmwareImage;
pub use recovery::{erase_and_reset, SystemControl};
pub use session::DfuSession;
pub use verify::{Authenticated, DfuValidator};
