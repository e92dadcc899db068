//! Error taxonomy for the DFU gate
//!
//! `DfuError` is the only error the orchestrator ever sees from
//! prevalidation; it maps 1:1 onto the Nordic `NRF_ERROR_*` codes so the
//! surrounding bootloader can forward it over the transport unchanged.
//! Everything else here is internal to postvalidation and recovery and ends
//! in an erase-and-reset rather than a returned code.

/// `NRF_SUCCESS`
pub const NRF_SUCCESS: u32 = 0;
/// `NRF_ERROR_INVALID_LENGTH`
pub const NRF_ERROR_INVALID_LENGTH: u32 = 9;
/// `NRF_ERROR_INVALID_DATA`
pub const NRF_ERROR_INVALID_DATA: u32 = 11;

/// Recoverable rejection of an init packet. No flash has been touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DfuError {
    /// Packet too short for its header, runtime-id list overruns the
    /// buffer, or the extended data is not exactly one tag long.
    InvalidLength,
    /// Packet is well formed but targets another device, revision,
    /// application version or runtime component.
    InvalidData,
}

impl DfuError {
    pub fn as_str(self) -> &'static str {
        match self {
            DfuError::InvalidLength => "dfu: init packet length invalid",
            DfuError::InvalidData => "dfu: init packet not compatible with device",
        }
    }

    /// Nordic error code for the orchestrator.
    pub fn code(self) -> u32 {
        match self {
            DfuError::InvalidLength => NRF_ERROR_INVALID_LENGTH,
            DfuError::InvalidData => NRF_ERROR_INVALID_DATA,
        }
    }
}

/// Nordic status code for a whole prevalidation result.
pub fn status_code(result: Result<(), DfuError>) -> u32 {
    match result {
        Ok(()) => NRF_SUCCESS,
        Err(e) => e.code(),
    }
}

/// The keyed-hash primitive could not produce a digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashFault;

/// Why an image failed authentication. Every variant is fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    /// No tag cached: postvalidate without a successful prevalidate.
    NoTag,
    HashFault,
    Mismatch,
}

impl AuthError {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthError::NoTag => "auth: no init packet tag in session",
            AuthError::HashFault => "auth: keyed hash primitive failed",
            AuthError::Mismatch => "auth: image tag mismatch",
        }
    }
}

impl From<HashFault> for AuthError {
    fn from(_: HashFault) -> Self {
        AuthError::HashFault
    }
}

/// The resident runtime component refused to shut down. Recovery logs this
/// and carries on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeError(pub u32);

/// Image that does not fit the 32-bit flash address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageError;

impl ImageError {
    pub fn as_str(self) -> &'static str {
        "image: extends past the end of the address space"
    }
}

/// Flash layout that the erase path cannot safely work with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    PageSizeNotPowerOfTwo,
    SettingsNotPageAligned,
    KeyNotPageAligned,
    KeyOverlapsSettings,
}

impl ConfigError {
    pub fn as_str(self) -> &'static str {
        match self {
            ConfigError::PageSizeNotPowerOfTwo => "config: code page size must be a power of two",
            ConfigError::SettingsNotPageAligned => "config: settings address not page aligned",
            ConfigError::KeyNotPageAligned => "config: secret key address not page aligned",
            ConfigError::KeyOverlapsSettings => "config: secret key shares the settings page",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nordic_codes() {
        assert_eq!(status_code(Ok(())), 0);
        assert_eq!(status_code(Err(DfuError::InvalidLength)), 9);
        assert_eq!(status_code(Err(DfuError::InvalidData)), 11);
    }

    #[test]
    fn hash_fault_converts() {
        assert_eq!(AuthError::from(HashFault), AuthError::HashFault);
    }
}
