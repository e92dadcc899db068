//! DFU init packet validation pipeline
//!
//! Two stages gate an update:
//! - `prevalidate` runs on the init packet before the image is transferred.
//!   It checks the packet is meant for this device and caches its tag in the
//!   session. A rejection is recoverable: no flash has been touched.
//! - `postvalidate` runs once the image is in flash. It recomputes the keyed
//!   hash and either returns an [`Authenticated`] token or erases the image
//!   and resets the chip.

pub mod postvalidate;
pub mod prevalidate;

use crate::config::FlashLayout;
use crate::crypto::{HmacSha256, KeyedHash, SecretKey};
use crate::device::DeviceIdentity;
use crate::errors::ConfigError;
use crate::log::logger::log_error;

pub use postvalidate::Authenticated;

/// Application version hook consulted during prevalidation.
///
/// The default accepts every version; a product that wants anti-rollback
/// supplies its own policy.
pub trait VersionPolicy {
    fn accept(&self, app_version: u32) -> bool;
}

/// Accept any application version.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyVersion;

impl VersionPolicy for AnyVersion {
    fn accept(&self, _app_version: u32) -> bool {
        true
    }
}

/// Reject images older than the wrapped version.
#[derive(Debug, Clone, Copy)]
pub struct MinimumVersion(pub u32);

impl VersionPolicy for MinimumVersion {
    fn accept(&self, app_version: u32) -> bool {
        app_version >= self.0
    }
}

/// Everything resident the gate checks against: who the device is, the
/// pre-shared key, the keyed-hash primitive, and the flash layout recovery
/// erases.
#[derive(Debug)]
pub struct DfuValidator<'k, H = HmacSha256, V = AnyVersion> {
    device: DeviceIdentity,
    key: SecretKey<'k>,
    hasher: H,
    version: V,
    layout: FlashLayout,
}

impl<'k> DfuValidator<'k> {
    /// Validator with HMAC-SHA256 and no version policy.
    ///
    /// The layout is checked here, since the erase path trusts it: a layout
    /// that fails [`FlashLayout::validate`] is refused.
    pub fn new(device: DeviceIdentity, key: SecretKey<'k>, layout: FlashLayout) -> Result<Self, ConfigError> {
        layout.validate().map_err(|e| {
            log_error("config", format_args!("{}", e.as_str()));
            e
        })?;
        Ok(Self { device, key, hasher: HmacSha256, version: AnyVersion, layout })
    }
}

impl<'k, H: KeyedHash, V: VersionPolicy> DfuValidator<'k, H, V> {
    /// Swap in another keyed-hash primitive (e.g. a hardware engine).
    pub fn with_hasher<H2: KeyedHash>(self, hasher: H2) -> DfuValidator<'k, H2, V> {
        DfuValidator {
            device: self.device,
            key: self.key,
            hasher,
            version: self.version,
            layout: self.layout,
        }
    }

    pub fn with_version_policy<V2: VersionPolicy>(self, version: V2) -> DfuValidator<'k, H, V2> {
        DfuValidator {
            device: self.device,
            key: self.key,
            hasher: self.hasher,
            version,
            layout: self.layout,
        }
    }

    pub fn device(&self) -> &DeviceIdentity {
        &self.device
    }

    pub fn layout(&self) -> &FlashLayout {
        &self.layout
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unusable_flash_layout_is_refused() {
        let key = [0u8; crate::crypto::SECRET_KEY_SIZE];
        for code_page_size in [1000, 0] {
            let layout = FlashLayout { code_page_size, ..FlashLayout::default() };
            let result = DfuValidator::new(fixtures::device(), SecretKey::new(&key), layout);
            assert_eq!(result.err(), Some(ConfigError::PageSizeNotPowerOfTwo), "page size {}", code_page_size);
        }

        let layout = FlashLayout {
            settings_address: crate::config::BOOTLOADER_SETTINGS_ADDRESS + 0x10,
            ..FlashLayout::default()
        };
        let result = DfuValidator::new(fixtures::device(), SecretKey::new(&key), layout);
        assert_eq!(result.err(), Some(ConfigError::SettingsNotPageAligned));
    }

    #[test]
    fn version_policies() {
        assert!(AnyVersion.accept(0));
        assert!(MinimumVersion(5).accept(5));
        assert!(!MinimumVersion(5).accept(4));
    }
}
