//! Received firmware image as seen by postvalidation

use core::slice;

use crate::errors::ImageError;

/// The transferred image together with the flash address it was written to.
/// The address is what recovery erases; the bytes are what gets hashed.
#[derive(Debug, Clone, Copy)]
pub struct FirmwareImage<'a> {
    address: u32,
    len: u32,
    bytes: &'a [u8],
}

impl<'a> FirmwareImage<'a> {
    /// Fails unless `[address, address + bytes.len())` lies inside the 32-bit
    /// address space, so the span hashed is always the span erased.
    pub fn new(address: u32, bytes: &'a [u8]) -> Result<Self, ImageError> {
        let len = u32::try_from(bytes.len()).map_err(|_| ImageError)?;
        address.checked_add(len).ok_or(ImageError)?;
        Ok(Self { address, len, bytes })
    }

    pub fn address(&self) -> u32 {
        self.address
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Length in bytes, as the flash controller counts it.
    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl FirmwareImage<'static> {
    /// Image already written to memory-mapped flash.
    ///
    /// # Safety
    /// `[address, address + len)` must be mapped, readable and not written
    /// while the returned image is in use.
    pub unsafe fn in_flash(address: u32, len: u32) -> Result<Self, ImageError> {
        address.checked_add(len).ok_or(ImageError)?;
        Self::new(address, slice::from_raw_parts(address as usize as *const u8, len as usize))
    }
}
