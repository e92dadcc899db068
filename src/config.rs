//! Platform configuration for the DFU gate
//!
//! This module collects the addresses and sizes the gate needs:
//! - Flash geometry (code page size)
//! - Location of the bootloader settings page erased on failure
//! - Location of the pre-shared secret key
//! - Where the device identity and resident SoftDevice id live
//!
//! Defaults describe an nRF51 with the S110 SoftDevice and the stock
//! bootloader linker layout.

use crate::errors::ConfigError;
use crate::log::logger::log_debug;

/// nRF51 code page size in bytes.
pub const CODE_PAGE_SIZE: u32 = 1024;

/// Bootloader settings page; must start on a page boundary.
pub const BOOTLOADER_SETTINGS_ADDRESS: u32 = 0x0003_FC00;

/// Secret key page. The key must never be moved or updated.
pub const SECRET_KEY_ADDRESS: u32 = 0x0003_F800;

/// UICR customer word holding `{ device_type: u16, device_rev: u16 }`.
pub const DEVICE_INFO_ADDRESS: u32 = 0x1000_1080;

/// `firmware_id` field of the SoftDevice information structure.
pub const SOFTDEVICE_FWID_ADDRESS: u32 = 0x0000_300C;

/// UICR readback protection register.
pub const UICR_RBPCONF_ADDRESS: u32 = 0x1000_1004;

/// RBPCONF value with PALL enabled: protects all flash from debugger reads.
pub const RBPCONF_PALL_ENABLED: u32 = 0xFFFF_00FF;

/// Flash geometry and the fixed pages the gate touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashLayout {
    pub code_page_size: u32,
    pub settings_address: u32,
    pub secret_key_address: u32,
}

impl Default for FlashLayout {
    fn default() -> Self {
        Self {
            code_page_size: CODE_PAGE_SIZE,
            settings_address: BOOTLOADER_SETTINGS_ADDRESS,
            secret_key_address: SECRET_KEY_ADDRESS,
        }
    }
}

impl FlashLayout {
    /// Check the invariants the erase path relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.code_page_size.is_power_of_two() {
            return Err(ConfigError::PageSizeNotPowerOfTwo);
        }
        if self.settings_address % self.code_page_size != 0 {
            return Err(ConfigError::SettingsNotPageAligned);
        }
        if self.secret_key_address % self.code_page_size != 0 {
            return Err(ConfigError::KeyNotPageAligned);
        }
        // Erasing settings must never take the key with it.
        if self.page_base(self.secret_key_address) == self.settings_address {
            return Err(ConfigError::KeyOverlapsSettings);
        }
        Ok(())
    }

    /// Base address of the page containing `address`.
    #[inline]
    pub fn page_base(&self, address: u32) -> u32 {
        address & !(self.code_page_size - 1)
    }
}

/// Where resident identity data is read from on target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryMap {
    pub device_info_address: u32,
    pub softdevice_fwid_address: u32,
}

impl Default for MemoryMap {
    fn default() -> Self {
        Self {
            device_info_address: DEVICE_INFO_ADDRESS,
            softdevice_fwid_address: SOFTDEVICE_FWID_ADDRESS,
        }
    }
}

/// Gate configuration structure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DfuConfig {
    pub layout: FlashLayout,
    pub memory: MemoryMap,
}

impl DfuConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.layout.validate()?;
        log_debug(
            "config",
            format_args!(
                "page {} bytes, settings {:#010x}, key page {:#010x}",
                self.layout.code_page_size, self.layout.settings_address, self.layout.secret_key_address
            ),
        );
        Ok(())
    }
}

/// Readback protection word, linked into UICR so a debugger cannot read the
/// secret key back out of flash.
#[cfg(feature = "readback-protect")]
#[used]
#[link_section = ".uicr_rbpconf"]
pub static UICR_RBPCONF: u32 = RBPCONF_PALL_ENABLED;
