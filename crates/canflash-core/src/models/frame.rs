//! CAN identifiers and frames

use std::fmt;

use crate::error::FrameError;

/// Maximum classic CAN payload
pub const MAX_DATA_LEN: usize = 8;

/// Bits carried by an 11-bit standard identifier
pub const STANDARD_ID_MASK: u32 = 0x7FF;

/// Bits carried by a 29-bit extended identifier
pub const EXTENDED_ID_MASK: u32 = 0x1FFF_FFFF;

/// CAN arbitration identifier
///
/// Keeps the identifier exactly as the protocol names it. Adapters put
/// [`CanId::wire_id`] on the bus, which masks the raw value to the width
/// of the frame format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CanId {
    raw: u32,
    extended: bool,
}

impl CanId {
    /// Identifier sent in standard (11-bit) frame format
    pub const fn standard(raw: u32) -> Self {
        Self {
            raw,
            extended: false,
        }
    }

    /// Identifier sent in extended (29-bit) frame format
    pub const fn extended(raw: u32) -> Self {
        Self {
            raw,
            extended: true,
        }
    }

    /// Identifier as named by the protocol
    pub const fn raw(&self) -> u32 {
        self.raw
    }

    pub const fn is_extended(&self) -> bool {
        self.extended
    }

    /// Identifier bits that fit the frame format
    pub const fn wire_id(&self) -> u32 {
        if self.extended {
            self.raw & EXTENDED_ID_MASK
        } else {
            self.raw & STANDARD_ID_MASK
        }
    }
}

impl fmt::Display for CanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.extended {
            write!(f, "0x{:08X}", self.raw)
        } else {
            write!(f, "0x{:X}", self.raw)
        }
    }
}

/// A classic CAN data frame (up to 8 bytes)
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct CanFrame {
    id: CanId,
    len: u8,
    data: [u8; MAX_DATA_LEN],
}

impl CanFrame {
    /// Build a frame carrying `data` as-is
    pub fn new(id: CanId, data: &[u8]) -> Result<Self, FrameError> {
        if data.len() > MAX_DATA_LEN {
            return Err(FrameError::TooLong(data.len()));
        }

        let mut buf = [0u8; MAX_DATA_LEN];
        buf[..data.len()].copy_from_slice(data);

        Ok(Self {
            id,
            len: data.len() as u8,
            data: buf,
        })
    }

    /// Build a full 8-byte frame, filling the tail with `fill`
    pub fn padded(id: CanId, data: &[u8], fill: u8) -> Result<Self, FrameError> {
        if data.len() > MAX_DATA_LEN {
            return Err(FrameError::TooLong(data.len()));
        }

        let mut buf = [fill; MAX_DATA_LEN];
        buf[..data.len()].copy_from_slice(data);

        Ok(Self {
            id,
            len: MAX_DATA_LEN as u8,
            data: buf,
        })
    }

    pub fn id(&self) -> CanId {
        self.id
    }

    pub fn data(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl fmt::Debug for CanFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CanFrame")
            .field("id", &format_args!("{}", self.id))
            .field("data", &format_args!("{}", hex::encode(self.data())))
            .finish()
    }
}
