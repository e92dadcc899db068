//! Init packet reader
//!
//! On-wire layout (packed, little-endian), as produced by `initpkt-gen`:
//!   struct InitPacket {
//!     u16 device_type;
//!     u16 device_rev;
//!     u32 app_version;
//!     u16 softdevice_len;            // number of runtime ids that follow
//!     u16 softdevice[softdevice_len];
//!     u8  extended[TAG_SIZE];        // HMAC-SHA256 of the image
//!   }
//!
//! `softdevice_len` is attacker controlled. It is checked against what is
//! left of the buffer before the extended-data offset is derived from it, so
//! a hostile count yields `InvalidLength` instead of an out-of-bounds read.

use zerocopy::byteorder::{LittleEndian, U16, U32};
use zerocopy::{AsBytes, FromBytes, LayoutVerified, Unaligned};

use crate::crypto::TAG_SIZE;
use crate::errors::DfuError;

/// Shortest extended data accepted: one full tag.
pub const EXT_LENGTH_MIN: usize = TAG_SIZE;
/// Longest extended data accepted: one full tag.
pub const EXT_LENGTH_MAX: usize = TAG_SIZE;

/// Fixed part of the init packet.
#[derive(FromBytes, AsBytes, Unaligned, Debug, Clone, Copy)]
#[repr(C)]
pub struct InitPacketHeader {
    pub device_type: U16<LittleEndian>,
    pub device_rev: U16<LittleEndian>,
    pub app_version: U32<LittleEndian>,
    pub softdevice_len: U16<LittleEndian>,
}

pub const HEADER_SIZE: usize = core::mem::size_of::<InitPacketHeader>();

/// Borrowed, bounds-checked view of an init packet.
#[derive(Debug, Clone, Copy)]
pub struct InitPacket<'a> {
    header: &'a InitPacketHeader,
    runtime_ids: &'a [U16<LittleEndian>],
    extended: &'a [u8],
}

impl<'a> InitPacket<'a> {
    pub fn parse(data: &'a [u8]) -> Result<Self, DfuError> {
        let (header, rest) = LayoutVerified::<_, InitPacketHeader>::new_unaligned_from_prefix(data)
            .ok_or(DfuError::InvalidLength)?;
        let header = header.into_ref();

        // u16 count * 2 cannot overflow usize.
        let ids_len = usize::from(header.softdevice_len.get()) * core::mem::size_of::<u16>();
        if ids_len > rest.len() {
            return Err(DfuError::InvalidLength);
        }
        let (id_bytes, extended) = rest.split_at(ids_len);
        let runtime_ids = LayoutVerified::<_, [U16<LittleEndian>]>::new_slice_unaligned(id_bytes)
            .ok_or(DfuError::InvalidLength)?
            .into_slice();

        if extended.len() < EXT_LENGTH_MIN {
            return Err(DfuError::InvalidLength);
        }
        if extended.len() > EXT_LENGTH_MAX {
            return Err(DfuError::InvalidLength);
        }

        Ok(Self { header, runtime_ids, extended })
    }

    pub fn device_type(&self) -> u16 {
        self.header.device_type.get()
    }

    pub fn device_rev(&self) -> u16 {
        self.header.device_rev.get()
    }

    pub fn app_version(&self) -> u32 {
        self.header.app_version.get()
    }

    pub fn runtime_ids(&self) -> impl Iterator<Item = u16> + 'a {
        self.runtime_ids.iter().map(|id| id.get())
    }

    pub fn runtime_id_count(&self) -> usize {
        self.runtime_ids.len()
    }

    /// Extended data; exactly one tag once `parse` has succeeded.
    pub fn tag(&self) -> &'a [u8] {
        self.extended
    }

    /// Offset of the extended data within the packet.
    pub fn extended_offset(&self) -> usize {
        HEADER_SIZE + self.runtime_ids.len() * core::mem::size_of::<u16>()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Build a packet the way `initpkt-gen` lays it out.
    pub(crate) fn encode(
        device_type: u16,
        device_rev: u16,
        app_version: u32,
        ids: &[u16],
        extended: &[u8],
    ) -> std::vec::Vec<u8> {
        let header = InitPacketHeader {
            device_type: U16::new(device_type),
            device_rev: U16::new(device_rev),
            app_version: U32::new(app_version),
            softdevice_len: U16::new(ids.len() as u16),
        };
        let mut out = header.as_bytes().to_vec();
        for id in ids {
            out.extend_from_slice(&id.to_le_bytes());
        }
        out.extend_from_slice(extended);
        out
    }

    #[test]
    fn header_is_ten_bytes() {
        assert_eq!(HEADER_SIZE, 10);
    }

    #[test]
    fn parses_fields() {
        let tag = [0xA5u8; TAG_SIZE];
        let raw = encode(0x0102, 0x0304, 0x0506_0708, &[0x0064, 0xFFFE], &tag);
        let pkt = InitPacket::parse(&raw).unwrap();
        assert_eq!(pkt.device_type(), 0x0102);
        assert_eq!(pkt.device_rev(), 0x0304);
        assert_eq!(pkt.app_version(), 0x0506_0708);
        assert_eq!(pkt.runtime_ids().collect::<std::vec::Vec<_>>(), [0x0064, 0xFFFE]);
        assert_eq!(pkt.extended_offset(), 14);
        assert_eq!(pkt.tag(), &tag[..]);
    }

    #[test]
    fn shorter_than_header() {
        let raw = encode(1, 1, 0, &[], &[]);
        for len in 0..HEADER_SIZE {
            assert_eq!(InitPacket::parse(&raw[..len]).unwrap_err(), DfuError::InvalidLength);
        }
    }

    #[test]
    fn extended_must_be_exactly_one_tag() {
        for ext_len in [0, 1, TAG_SIZE - 1, TAG_SIZE + 1, 2 * TAG_SIZE] {
            let raw = encode(1, 1, 0, &[0x0064], &std::vec![0u8; ext_len]);
            assert_eq!(
                InitPacket::parse(&raw).unwrap_err(),
                DfuError::InvalidLength,
                "extended length {}",
                ext_len
            );
        }
    }

    #[test]
    fn hostile_id_count_is_bounded() {
        let mut raw = encode(1, 1, 0, &[0x0064], &[0u8; TAG_SIZE]);
        // Claim far more ids than the buffer holds.
        raw[8..10].copy_from_slice(&u16::MAX.to_le_bytes());
        assert_eq!(InitPacket::parse(&raw).unwrap_err(), DfuError::InvalidLength);

        // Claim just enough ids to swallow the tag.
        let count = (1 + TAG_SIZE / 2) as u16;
        raw[8..10].copy_from_slice(&count.to_le_bytes());
        assert_eq!(InitPacket::parse(&raw).unwrap_err(), DfuError::InvalidLength);
    }

    #[test]
    fn odd_trailing_byte_lands_in_extended() {
        let mut raw = encode(1, 1, 0, &[], &[0u8; TAG_SIZE]);
        raw.push(0);
        assert_eq!(InitPacket::parse(&raw).unwrap_err(), DfuError::InvalidLength);
    }
}
