//! initpkt-gen: build a DFU init packet whose extended data is the
//! HMAC-SHA256 of the application image, plus the key blob (raw or Intel
//! HEX) to provision into the device.
//!
//! Images ending in `.hex` are read as Intel HEX and flattened to a binary
//! starting at their lowest address, with gaps filled with 0xFF.

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use dfu_hmac_init::crypto::{SECRET_KEY_SIZE, TAG_SIZE};
use dfu_hmac_init::packet::{InitPacket, HEADER_SIZE};
use hmac::{Hmac, Mac};
use ihex::Record;
use sha2::Sha256;
use tempfile::NamedTempFile;
use zeroize::{Zeroize, Zeroizing};

/// Payload bytes per Intel HEX data record.
const HEX_RECORD_LEN: usize = 16;

/// Largest span a hex image may cover once flattened.
const MAX_HEX_SPAN: u64 = 16 * 1024 * 1024;

#[derive(Parser, Debug)]
#[command(name = "initpkt-gen", about = "Generate an HMAC-SHA256 authenticated DFU init packet")]
struct Args {
    /// Application image: Intel HEX if it ends in `.hex`, raw binary otherwise
    #[arg(long, value_name = "HEX|BIN")]
    image: PathBuf,

    /// Device type (hex); ffff matches any device
    #[arg(long, value_parser = parse_hex_u16, default_value = "ffff")]
    device_type: u16,

    /// Device revision (hex); ffff matches any revision
    #[arg(long, value_parser = parse_hex_u16, default_value = "ffff")]
    device_rev: u16,

    /// Application version (hex)
    #[arg(long, value_parser = parse_hex_u32, default_value = "0")]
    app_version: u32,

    /// Compatible SoftDevice firmware id (hex), repeatable; fffe matches any
    #[arg(long = "softdevice", value_parser = parse_hex_u16, required = true)]
    softdevices: Vec<u16>,

    /// File holding the 32-byte secret key as 64 hex characters
    #[arg(long, value_name = "PATH")]
    key: PathBuf,

    /// Bytes to skip at the start of the image (size of the MBR for
    /// SoftDevice updates)
    #[arg(long, default_value_t = 0)]
    offset: usize,

    /// Init packet output
    #[arg(long, value_name = "DAT")]
    out: PathBuf,

    /// Raw key blob output for provisioning the key page
    #[arg(long, value_name = "BIN")]
    key_out: Option<PathBuf>,

    /// Intel HEX key output
    #[arg(long, value_name = "HEX")]
    key_hex: Option<PathBuf>,

    /// Load address of the key in `--key-hex` (hex); defaults to the UICR
    /// customer registers
    #[arg(long, value_parser = parse_hex_u32, default_value = "100010e0")]
    key_hex_base: u32,
}

fn parse_hex_u16(s: &str) -> Result<u16, String> {
    u16::from_str_radix(s.trim_start_matches("0x"), 16).map_err(|e| e.to_string())
}

fn parse_hex_u32(s: &str) -> Result<u32, String> {
    u32::from_str_radix(s.trim_start_matches("0x"), 16).map_err(|e| e.to_string())
}

/// Packet fields; everything except the tag.
#[derive(Debug, Clone)]
struct PacketFields {
    device_type: u16,
    device_rev: u16,
    app_version: u32,
    softdevices: Vec<u16>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let key = read_key(&args.key)?;
    let image = load_image(&args.image)?;
    if args.offset > image.len() {
        bail!("offset {} is past the end of a {} byte image", args.offset, image.len());
    }
    let message = &image[args.offset..];

    let fields = PacketFields {
        device_type: args.device_type,
        device_rev: args.device_rev,
        app_version: args.app_version,
        softdevices: args.softdevices.clone(),
    };
    let tag = compute_tag(&key, message)?;
    let packet = build_packet(&fields, &tag)?;

    // Refuse to emit anything the bootloader would not parse.
    InitPacket::parse(&packet).map_err(|e| anyhow!("generated packet rejected: {}", e.as_str()))?;

    write_atomic(&args.out, &packet)?;
    println!("{} *{}", hex::encode(tag), args.image.display());
    println!("hashed {} bytes (offset {}), wrote {} byte init packet -> {}", message.len(), args.offset, packet.len(), args.out.display());

    if let Some(key_out) = &args.key_out {
        write_atomic(key_out, &key[..])?;
        println!("wrote key blob -> {}", key_out.display());
    }

    if let Some(key_hex) = &args.key_hex {
        let text = bin_to_hex(args.key_hex_base, &key[..])?;
        write_atomic(key_hex, text.as_bytes())?;
        println!("wrote key hex at {:#010x} -> {}", args.key_hex_base, key_hex.display());
    }

    Ok(())
}

/// Key file: 64 hex characters, surrounding whitespace ignored.
fn read_key(path: &Path) -> Result<Zeroizing<[u8; SECRET_KEY_SIZE]>> {
    let text = Zeroizing::new(fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?);
    let mut key = Zeroizing::new([0u8; SECRET_KEY_SIZE]);
    hex::decode_to_slice(text.trim(), &mut key[..])
        .with_context(|| format!("key must be exactly {} hex characters", 2 * SECRET_KEY_SIZE))?;
    Ok(key)
}

fn is_intel_hex(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| ext.eq_ignore_ascii_case("hex"))
}

/// Image bytes as they sit in flash.
fn load_image(path: &Path) -> Result<Vec<u8>> {
    if !is_intel_hex(path) {
        return fs::read(path).with_context(|| format!("reading {}", path.display()));
    }
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let (base, image) = hex_to_bin(&text).with_context(|| format!("parsing {}", path.display()))?;
    println!("{}: {} bytes from {:#010x}", path.display(), image.len(), base);
    Ok(image)
}

/// Flatten Intel HEX into `(lowest address, bytes)`. Gaps read as erased
/// flash (0xFF); start address records are ignored.
fn hex_to_bin(text: &str) -> Result<(u32, Vec<u8>)> {
    let mut base = 0u32;
    let mut chunks: Vec<(u32, Vec<u8>)> = Vec::new();

    for record in ihex::Reader::new(text) {
        match record.map_err(|e| anyhow!("intel hex: {}", e))? {
            Record::Data { offset, value } => {
                let address = base
                    .checked_add(u32::from(offset))
                    .context("data record past the 32-bit address space")?;
                chunks.push((address, value));
            }
            Record::ExtendedSegmentAddress(segment) => base = u32::from(segment) << 4,
            Record::ExtendedLinearAddress(upper) => base = u32::from(upper) << 16,
            Record::EndOfFile => break,
            Record::StartSegmentAddress { .. } | Record::StartLinearAddress(_) => {}
        }
    }

    let start = match chunks.iter().map(|(address, _)| *address).min() {
        Some(start) => start,
        None => bail!("no data records"),
    };
    let end = chunks
        .iter()
        .map(|(address, value)| u64::from(*address) + value.len() as u64)
        .max()
        .unwrap_or(u64::from(start));
    let span = end - u64::from(start);
    if span > MAX_HEX_SPAN {
        bail!("data spans {} bytes from {:#010x}; is there a UICR or SoftDevice section in the file?", span, start);
    }

    let mut image = vec![0xFF; span as usize];
    for (address, value) in chunks {
        let at = (address - start) as usize;
        image[at..at + value.len()].copy_from_slice(&value);
    }
    Ok((start, image))
}

/// Intel HEX for `data` loaded at `base`, using extended linear address
/// records. No data record crosses a 64 KiB boundary.
fn bin_to_hex(base: u32, data: &[u8]) -> Result<Zeroizing<String>> {
    let mut records = Vec::new();
    let mut upper = None;
    let mut pos = 0usize;

    while pos < data.len() {
        let address = u32::try_from(pos)
            .ok()
            .and_then(|pos| base.checked_add(pos))
            .context("data runs past the 32-bit address space")?;
        let hi = (address >> 16) as u16;
        if upper != Some(hi) {
            records.push(Record::ExtendedLinearAddress(hi));
            upper = Some(hi);
        }
        let room = 0x1_0000 - (address & 0xFFFF) as usize;
        let n = HEX_RECORD_LEN.min(room).min(data.len() - pos);
        records.push(Record::Data { offset: address as u16, value: data[pos..pos + n].to_vec() });
        pos += n;
    }
    records.push(Record::EndOfFile);

    let text = ihex::create_object_file_representation(&records).map_err(|e| anyhow!("intel hex: {}", e));
    for record in &mut records {
        if let Record::Data { value, .. } = record {
            value.zeroize();
        }
    }
    Ok(Zeroizing::new(text?))
}

fn compute_tag(key: &[u8; SECRET_KEY_SIZE], message: &[u8]) -> Result<[u8; TAG_SIZE]> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key).map_err(|_| anyhow!("invalid HMAC key"))?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().into())
}

fn build_packet(fields: &PacketFields, tag: &[u8; TAG_SIZE]) -> Result<Vec<u8>> {
    let count = u16::try_from(fields.softdevices.len()).context("too many softdevice ids")?;
    let mut pkt = Vec::with_capacity(HEADER_SIZE + 2 * fields.softdevices.len() + TAG_SIZE);
    pkt.extend_from_slice(&fields.device_type.to_le_bytes());
    pkt.extend_from_slice(&fields.device_rev.to_le_bytes());
    pkt.extend_from_slice(&fields.app_version.to_le_bytes());
    pkt.extend_from_slice(&count.to_le_bytes());
    for sd in &fields.softdevices {
        pkt.extend_from_slice(&sd.to_le_bytes());
    }
    pkt.extend_from_slice(tag);
    Ok(pkt)
}

/// Write bytes via tempfile -> sync -> persist(rename) for atomicity.
fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).with_context(|| format!("persisting to {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dfu_hmac_init::config::FlashLayout;
    use dfu_hmac_init::crypto::SecretKey;
    use dfu_hmac_init::device::DeviceIdentity;
    use dfu_hmac_init::image::FirmwareImage;
    use dfu_hmac_init::session::DfuSession;
    use dfu_hmac_init::verify::DfuValidator;
    use tempfile::tempdir;

    const KEY: [u8; SECRET_KEY_SIZE] = [0x5A; SECRET_KEY_SIZE];

    fn fields() -> PacketFields {
        PacketFields {
            device_type: 0x0001,
            device_rev: 0x0002,
            app_version: 0x0000_0103,
            softdevices: vec![0x004F, 0x0064],
        }
    }

    #[test]
    fn packet_layout() {
        let tag = [0xC3u8; TAG_SIZE];
        let pkt = build_packet(&fields(), &tag).unwrap();
        assert_eq!(pkt.len(), HEADER_SIZE + 4 + TAG_SIZE);
        assert_eq!(&pkt[..HEADER_SIZE], &[0x01, 0x00, 0x02, 0x00, 0x03, 0x01, 0x00, 0x00, 0x02, 0x00]);
        assert_eq!(&pkt[HEADER_SIZE..HEADER_SIZE + 4], &[0x4F, 0x00, 0x64, 0x00]);
        assert_eq!(&pkt[HEADER_SIZE + 4..], &tag);
    }

    #[test]
    fn generated_packet_passes_the_gate() {
        let image = b"application image bytes".repeat(50);
        let tag = compute_tag(&KEY, &image).unwrap();
        let pkt = build_packet(&fields(), &tag).unwrap();

        let validator = DfuValidator::new(
            DeviceIdentity::new(0x0001, 0x0002, 0x0064),
            SecretKey::new(&KEY),
            FlashLayout::default(),
        )
        .unwrap();
        let mut session = DfuSession::new();
        validator.prevalidate(&mut session, &pkt).unwrap();
        assert!(validator
            .authenticate(&session, &FirmwareImage::new(0x1_8000, &image).unwrap())
            .is_ok());
    }

    #[test]
    fn key_file_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("key.txt");
        write_atomic(&path, format!("{}\n", hex::encode(KEY)).as_bytes()).unwrap();
        assert_eq!(*read_key(&path).unwrap(), KEY);

        write_atomic(&path, b"abcd").unwrap();
        assert!(read_key(&path).is_err());
    }

    #[test]
    fn hex_arguments() {
        assert_eq!(parse_hex_u16("fffe"), Ok(0xFFFE));
        assert_eq!(parse_hex_u16("0x0064"), Ok(0x0064));
        assert!(parse_hex_u16("10000").is_err());
        assert_eq!(parse_hex_u32("00010203"), Ok(0x0001_0203));
    }

    #[test]
    fn hex_image_is_flattened_with_erased_gaps() {
        let text = ihex::create_object_file_representation(&[
            Record::ExtendedLinearAddress(0x0001),
            Record::Data { offset: 0x8000, value: vec![1, 2, 3] },
            Record::Data { offset: 0x8008, value: vec![4] },
            Record::StartLinearAddress(0x0001_8000),
            Record::EndOfFile,
        ])
        .unwrap();

        let (base, image) = hex_to_bin(&text).unwrap();
        assert_eq!(base, 0x0001_8000);
        assert_eq!(image, [1, 2, 3, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 4]);
    }

    #[test]
    fn segment_addressed_hex() {
        let text = ihex::create_object_file_representation(&[
            Record::ExtendedSegmentAddress(0x1000),
            Record::Data { offset: 0x0010, value: vec![0xAB, 0xCD] },
            Record::EndOfFile,
        ])
        .unwrap();
        assert_eq!(hex_to_bin(&text).unwrap(), (0x0001_0010, vec![0xAB, 0xCD]));
    }

    #[test]
    fn hex_without_data_or_with_bad_checksum_is_rejected() {
        assert!(hex_to_bin(":00000001FF").is_err());
        assert!(hex_to_bin(":0100000001FF").is_err());
    }

    #[test]
    fn key_hex_loads_at_uicr_by_default() {
        let text = bin_to_hex(0x1000_10E0, &KEY).unwrap();
        assert!(text.to_ascii_uppercase().starts_with(":020000041000EA"));
        assert_eq!(hex_to_bin(&text).unwrap(), (0x1000_10E0, KEY.to_vec()));
    }

    #[test]
    fn hex_output_splits_at_64k_boundary() {
        let data: Vec<u8> = (0u8..40).collect();
        let text = bin_to_hex(0x0001_FFF8, &data).unwrap();
        let extended = ihex::Reader::new(&text)
            .filter(|r| matches!(r, Ok(Record::ExtendedLinearAddress(_))))
            .count();
        assert_eq!(extended, 2);
        assert_eq!(hex_to_bin(&text).unwrap(), (0x0001_FFF8, data));
    }

    #[test]
    fn hex_image_file_is_read_by_extension() {
        let dir = tempdir().unwrap();
        let body = b"firmware".to_vec();
        let text = bin_to_hex(0x0001_8000, &body).unwrap();

        let hex_path = dir.path().join("app.HEX");
        write_atomic(&hex_path, text.as_bytes()).unwrap();
        assert_eq!(load_image(&hex_path).unwrap(), body);

        let bin_path = dir.path().join("app.bin");
        write_atomic(&bin_path, text.as_bytes()).unwrap();
        assert_eq!(load_image(&bin_path).unwrap(), text.as_bytes());
    }
}
