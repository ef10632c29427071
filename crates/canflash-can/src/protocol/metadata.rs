//! Metadata frame decoding
//!
//! A metadata frame carries a little-endian value in its leading bytes
//! and the tag in the last byte. Frames shorter than 8 bytes read as if
//! zero-padded.

use canflash_core::{CanFrame, MetadataRecord, MetadataTag};

/// Byte holding the tag
const TAG_INDEX: usize = 7;

/// Decode one metadata frame. Unknown tags still decode (2-byte value).
pub fn decode(frame: &CanFrame) -> MetadataRecord {
    let mut payload = [0u8; 8];
    payload[..frame.len()].copy_from_slice(frame.data());

    let tag = payload[TAG_INDEX];
    let width = MetadataTag::from_u8(tag).map_or(2, MetadataTag::value_width);

    let value = if width == 4 {
        u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]])
    } else {
        u32::from(u16::from_le_bytes([payload[0], payload[1]]))
    };

    MetadataRecord {
        tag,
        value,
        raw: frame.data().to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canflash_core::CanId;

    fn frame(data: &[u8]) -> CanFrame {
        CanFrame::new(CanId::extended(0x1B00_0000), data).unwrap()
    }

    #[test]
    fn test_wide_tags_read_four_bytes() {
        let entry = decode(&frame(&[0x00, 0x40, 0x00, 0x08, 0xAA, 0xBB, 0xCC, 0x06]));
        assert_eq!(entry.value, 0x0800_4000);
        assert_eq!(entry.label(), "Application_entry_addr");

        let update = decode(&frame(&[0x78, 0x56, 0x34, 0x12, 0xFF, 0xFF, 0xFF, 0x07]));
        assert_eq!(update.value, 0x1234_5678);
        assert_eq!(update.label(), "Last_Update");
    }

    #[test]
    fn test_other_tags_read_two_bytes() {
        let version = decode(&frame(&[0x02, 0x01, 0xFF, 0xFF, 0, 0, 0, 0x04]));
        assert_eq!(version.value, 0x0102);
        assert_eq!(version.kind(), Some(MetadataTag::FirmwareVersion));

        let crc = decode(&frame(&[0xEF, 0xBE, 0x12, 0x34, 0, 0, 0, 0x0A]));
        assert_eq!(crc.value, 0xBEEF);
        assert_eq!(crc.label(), "Calculated_CRC");
    }

    #[test]
    fn test_unknown_tag_is_labelled_not_rejected() {
        let record = decode(&frame(&[0x34, 0x12, 0, 0, 0, 0, 0, 0xFF]));
        assert_eq!(record.value, 0x1234);
        assert_eq!(record.label(), "Unknown_FF");
        assert_eq!(record.raw_hex(), "34120000000000ff");
    }

    #[test]
    fn test_short_frame_reads_zero_padded() {
        let record = decode(&frame(&[0x05]));
        assert_eq!(record.tag, 0x00);
        assert_eq!(record.value, 0x0005);
        assert_eq!(record.raw, vec![0x05]);
    }
}
