//! Stage 1: init packet compatibility checks

use super::{DfuValidator, VersionPolicy};
use crate::crypto::KeyedHash;
use crate::errors::DfuError;
use crate::log::logger::{log_debug, log_warn};
use crate::packet::InitPacket;
use crate::session::DfuSession;

impl<H: KeyedHash, V: VersionPolicy> DfuValidator<'_, H, V> {
    /// Check that the incoming image targets this device and its resident
    /// SoftDevice, caching the packet's authentication tag in `session`.
    ///
    /// The tag is cached as soon as the packet is well formed, before the
    /// compatibility checks; a rejected session is abandoned by the caller
    /// anyway. Nothing here touches flash.
    pub fn prevalidate(&self, session: &mut DfuSession, init_data: &[u8]) -> Result<(), DfuError> {
        let packet = InitPacket::parse(init_data).map_err(|e| {
            log_warn("prevalidate", format_args!("{} ({} bytes)", e.as_str(), init_data.len()));
            e
        })?;

        session.store_tag(packet.tag()).map_err(|_| DfuError::InvalidLength)?;

        let device = &self.device;

        if !device.accepts_type(packet.device_type()) {
            log_warn(
                "prevalidate",
                format_args!("device type {:#06x}, expected {:#06x}", packet.device_type(), device.device_type),
            );
            return Err(DfuError::InvalidData);
        }

        if !device.accepts_rev(packet.device_rev()) {
            log_warn(
                "prevalidate",
                format_args!("device revision {:#06x}, expected {:#06x}", packet.device_rev(), device.device_rev),
            );
            return Err(DfuError::InvalidData);
        }

        if !self.version.accept(packet.app_version()) {
            log_warn(
                "prevalidate",
                format_args!("application version {:#010x} refused by policy", packet.app_version()),
            );
            return Err(DfuError::InvalidData);
        }

        if !device.accepts_runtime(packet.runtime_ids()) {
            log_warn(
                "prevalidate",
                format_args!(
                    "none of {} runtime ids match resident {:#06x}",
                    packet.runtime_id_count(),
                    device.runtime_id
                ),
            );
            return Err(DfuError::InvalidData);
        }

        log_debug("prevalidate", format_args!("init packet accepted"));
        Ok(())
    }
}
