//! Block-structured firmware CRC
//!
//! The image is a chain of blocks. Each block starts with a little-endian
//! size field counted in 16-bit words, followed by a 4-byte load address
//! and then the block data. The next size field follows the data
//! directly; a zero size ends the chain.
//!
//! All data words are summed (mod 2^32), each block padded with 0xFFFF
//! words to a multiple of 8 words, and the sum is folded into a CRC-16
//! that must match what the bootloader computes over the flashed image.

use crc::{Crc, CRC_16_CMS};

use super::error::ChecksumError;

/// Offset of the first block-size field
pub const FIRST_BLOCK_OFFSET: usize = 22;

/// Size field plus load address
const BLOCK_HEADER_LEN: usize = 6;

/// Blocks are padded to a multiple of this many words
const BLOCK_ALIGN_WORDS: u32 = 8;

const PAD_WORD: u32 = 0xFFFF;

/// Poly 0x8005, init 0xFFFF, unreflected
const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_CMS);

/// Result of a checksum walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageCrc {
    pub crc: u16,
    /// Data size in words, padding included
    pub data_size_words: u32,
    pub word_sum: u32,
    pub blocks: u32,
    pub pad_words: u32,
}

impl ImageCrc {
    /// Walk the block chain of `image` and fold the word sum
    pub fn compute(image: &[u8]) -> Result<Self, ChecksumError> {
        if image.len() < FIRST_BLOCK_OFFSET + 2 {
            return Err(ChecksumError::TooShort(image.len()));
        }

        let mut word_sum: u32 = 0;
        let mut data_size_words: u32 = 0;
        let mut blocks = 0;
        let mut pad_words = 0;
        let mut offset = FIRST_BLOCK_OFFSET;

        while let Some(words) = read_u16(image, offset) {
            if words == 0 {
                break;
            }

            let start = offset + BLOCK_HEADER_LEN;
            let end = start + usize::from(words) * 2;
            let data = image
                .get(start..end)
                .ok_or(ChecksumError::TruncatedBlock {
                    offset,
                    words,
                    len: image.len(),
                })?;

            for word in data.chunks_exact(2) {
                word_sum = word_sum.wrapping_add(u32::from(u16::from_le_bytes([word[0], word[1]])));
            }
            data_size_words += u32::from(words);

            let rem = u32::from(words) % BLOCK_ALIGN_WORDS;
            if rem != 0 {
                let pad = BLOCK_ALIGN_WORDS - rem;
                word_sum = word_sum.wrapping_add(pad * PAD_WORD);
                data_size_words += pad;
                pad_words += pad;
            }

            tracing::trace!(offset, words, word_sum, "Checksummed block");
            blocks += 1;
            offset = end;
        }

        Ok(Self {
            crc: fold_crc16(word_sum),
            data_size_words,
            word_sum,
            blocks,
            pad_words,
        })
    }
}

/// CRC-16/CMS over the sum's bytes, MSB first
pub fn fold_crc16(word_sum: u32) -> u16 {
    CRC16.checksum(&word_sum.to_be_bytes())
}

fn read_u16(image: &[u8], offset: usize) -> Option<u16> {
    let bytes = image.get(offset..offset + 2)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 22 header bytes, then each block as size/address/data, then a zero terminator
    fn image(blocks: &[&[u16]]) -> Vec<u8> {
        let mut out = vec![0u8; FIRST_BLOCK_OFFSET];
        for words in blocks {
            out.extend_from_slice(&(words.len() as u16).to_le_bytes());
            out.extend_from_slice(&[0; 4]);
            for w in words.iter() {
                out.extend_from_slice(&w.to_le_bytes());
            }
        }
        out.extend_from_slice(&[0, 0]);
        out
    }

    #[test]
    fn test_fold_known_values() {
        assert_eq!(fold_crc16(0), 0x0024);
        assert_eq!(fold_crc16(0x1234_5678), 0x1EA7);
        assert_eq!(fold_crc16(8), 0x8017);
        assert_eq!(fold_crc16(0x80000), 0x8087);
        assert_eq!(fold_crc16(3 * 0x1234 + 5 * 0xFFFF), 0x3711);
    }

    /// Same fold as the bootloader's bit loop
    fn fold_bitwise(word_sum: u32) -> u16 {
        let mut crc: u16 = 0xFFFF;
        for byte in word_sum.to_be_bytes() {
            crc ^= u16::from(byte) << 8;
            for _ in 0..8 {
                crc = if crc & 0x8000 != 0 { (crc << 1) ^ 0x8005 } else { crc << 1 };
            }
        }
        crc
    }

    #[test]
    fn test_fold_matches_bootloader_bit_loop() {
        for sum in [0, 8, 0x1234_5678, 0x80000, 3 * 0x1234 + 5 * 0xFFFF, u32::MAX, 0xDEAD_BEEF] {
            assert_eq!(fold_crc16(sum), fold_bitwise(sum), "sum 0x{:08X}", sum);
        }
    }

    #[test]
    fn test_aligned_block_has_no_padding() {
        let crc = ImageCrc::compute(&image(&[&[0x0001; 8]])).unwrap();
        assert_eq!(crc.word_sum, 8);
        assert_eq!(crc.data_size_words, 8);
        assert_eq!(crc.pad_words, 0);
        assert_eq!(crc.crc, 0x8017);
        assert_eq!(crc.crc, fold_crc16(8));
    }

    #[test]
    fn test_unaligned_block_pads_with_ffff() {
        let crc = ImageCrc::compute(&image(&[&[0x1234; 3]])).unwrap();
        assert_eq!(crc.pad_words, 5);
        assert_eq!(crc.data_size_words, 8);
        assert_eq!(crc.word_sum, 3 * 0x1234 + 5 * 0xFFFF);
        assert_eq!(crc.crc, 0x3711);
    }

    #[test]
    fn test_words_are_little_endian() {
        let mut img = vec![0u8; FIRST_BLOCK_OFFSET];
        img.extend_from_slice(&[2, 0, 0, 0, 0, 0, 0x01, 0x02, 0x03, 0x04, 0, 0]);

        let crc = ImageCrc::compute(&img).unwrap();
        assert_eq!(crc.word_sum, 0x0201 + 0x0403 + 6 * 0xFFFF);
        assert_eq!(crc.crc, 0x9C5B);
    }

    #[test]
    fn test_blocks_chain() {
        let crc = ImageCrc::compute(&image(&[&[0xFFFF; 8], &[0x0001; 8]])).unwrap();
        assert_eq!(crc.blocks, 2);
        assert_eq!(crc.data_size_words, 16);
        assert_eq!(crc.word_sum, 0x80000);
        assert_eq!(crc.crc, 0x8087);
    }

    #[test]
    fn test_zero_first_block_is_empty_walk() {
        let crc = ImageCrc::compute(&[0u8; 24]).unwrap();
        assert_eq!(crc.blocks, 0);
        assert_eq!(crc.data_size_words, 0);
        assert_eq!(crc.crc, 0x0024);
    }

    #[test]
    fn test_chain_ends_at_end_of_data() {
        let mut img = image(&[&[0x0001; 8]]);
        // Drop the terminator; the walk stops at the end of the image
        img.truncate(img.len() - 2);

        let crc = ImageCrc::compute(&img).unwrap();
        assert_eq!(crc.blocks, 1);
        assert_eq!(crc.crc, 0x8017);
    }

    #[test]
    fn test_short_image() {
        assert_eq!(
            ImageCrc::compute(&[0u8; 23]),
            Err(ChecksumError::TooShort(23))
        );
    }

    #[test]
    fn test_truncated_block() {
        let mut img = vec![0u8; FIRST_BLOCK_OFFSET];
        img.extend_from_slice(&[4, 0, 0, 0, 0, 0, 0xAA, 0xBB]);

        assert!(matches!(
            ImageCrc::compute(&img),
            Err(ChecksumError::TruncatedBlock { offset: 22, words: 4, .. })
        ));
    }
}
