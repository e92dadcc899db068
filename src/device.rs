//! Resident device identity
//!
//! The device type and revision are burned into UICR at provisioning time;
//! the runtime component id is the `firmware_id` of the installed SoftDevice.
//! An all-ones type or revision means "not provisioned", which disables the
//! corresponding check.

use core::ptr;

use crate::config::MemoryMap;

/// Unprovisioned device type: any image type is accepted.
pub const DEVICE_TYPE_ANY: u16 = 0xFFFF;
/// Unprovisioned device revision: any image revision is accepted.
pub const DEVICE_REV_ANY: u16 = 0xFFFF;
/// Runtime id entry in an init packet that matches any SoftDevice.
pub const RUNTIME_ID_ANY: u16 = 0xFFFE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub device_type: u16,
    pub device_rev: u16,
    pub runtime_id: u16,
}

impl DeviceIdentity {
    pub const fn new(device_type: u16, device_rev: u16, runtime_id: u16) -> Self {
        Self { device_type, device_rev, runtime_id }
    }

    /// Identity of a device with nothing provisioned in UICR.
    pub const fn unprovisioned(runtime_id: u16) -> Self {
        Self::new(DEVICE_TYPE_ANY, DEVICE_REV_ANY, runtime_id)
    }

    /// Read the identity from UICR and the SoftDevice information block.
    ///
    /// # Safety
    /// Both addresses in `map` must be readable, halfword aligned and stable
    /// for the lifetime of the bootloader.
    pub unsafe fn from_memory(map: &MemoryMap) -> Self {
        let info = map.device_info_address as usize;
        Self {
            device_type: ptr::read_volatile(info as *const u16),
            device_rev: ptr::read_volatile((info + 2) as *const u16),
            runtime_id: ptr::read_volatile(map.softdevice_fwid_address as usize as *const u16),
        }
    }

    #[inline]
    pub fn accepts_type(&self, packet_type: u16) -> bool {
        self.device_type == DEVICE_TYPE_ANY || self.device_type == packet_type
    }

    #[inline]
    pub fn accepts_rev(&self, packet_rev: u16) -> bool {
        self.device_rev == DEVICE_REV_ANY || self.device_rev == packet_rev
    }

    /// Left-to-right scan; the first entry that is the wildcard or the
    /// resident id accepts.
    pub fn accepts_runtime<I>(&self, ids: I) -> bool
    where
        I: IntoIterator<Item = u16>,
    {
        ids.into_iter().any(|id| id == RUNTIME_ID_ANY || id == self.runtime_id)
    }
}
