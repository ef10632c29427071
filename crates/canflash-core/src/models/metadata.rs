//! Device metadata models

use serde::{Deserialize, Serialize};

/// Metadata tags reported by the bootloader after a successful key exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetadataTag {
    SecurityKey,
    BootloaderVersion,
    HardwareVersion,
    FirmwareVersion,
    UnitNumber,
    ApplicationEntryAddr,
    LastUpdate,
    StoredCrc,
    ApplicationSize,
    CalculatedCrc,
}

impl MetadataTag {
    pub fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0x01 => Some(Self::SecurityKey),
            0x02 => Some(Self::BootloaderVersion),
            0x03 => Some(Self::HardwareVersion),
            0x04 => Some(Self::FirmwareVersion),
            0x05 => Some(Self::UnitNumber),
            0x06 => Some(Self::ApplicationEntryAddr),
            0x07 => Some(Self::LastUpdate),
            0x08 => Some(Self::StoredCrc),
            0x09 => Some(Self::ApplicationSize),
            0x0A => Some(Self::CalculatedCrc),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Self::SecurityKey => 0x01,
            Self::BootloaderVersion => 0x02,
            Self::HardwareVersion => 0x03,
            Self::FirmwareVersion => 0x04,
            Self::UnitNumber => 0x05,
            Self::ApplicationEntryAddr => 0x06,
            Self::LastUpdate => 0x07,
            Self::StoredCrc => 0x08,
            Self::ApplicationSize => 0x09,
            Self::CalculatedCrc => 0x0A,
        }
    }

    /// Label used when reporting the record to the bridge
    pub fn label(self) -> &'static str {
        match self {
            Self::SecurityKey => "Security_key",
            Self::BootloaderVersion => "Bootloader_version",
            Self::HardwareVersion => "Hardware_version",
            Self::FirmwareVersion => "Firmware_version",
            Self::UnitNumber => "Unit_number",
            Self::ApplicationEntryAddr => "Application_entry_addr",
            Self::LastUpdate => "Last_Update",
            Self::StoredCrc => "CRC_value",
            Self::ApplicationSize => "Application_Size",
            Self::CalculatedCrc => "Calculated_CRC",
        }
    }

    /// Width of the little-endian value in bytes
    pub fn value_width(self) -> usize {
        match self {
            Self::ApplicationEntryAddr | Self::LastUpdate => 4,
            _ => 2,
        }
    }
}

/// One decoded metadata frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    /// Tag byte as received
    pub tag: u8,
    /// Decoded value (16 or 32 bits depending on the tag)
    pub value: u32,
    /// Frame payload as received
    pub raw: Vec<u8>,
}

impl MetadataRecord {
    pub fn kind(&self) -> Option<MetadataTag> {
        MetadataTag::from_u8(self.tag)
    }

    /// Tag label; unrecognized tags render as `Unknown_<hex>`
    pub fn label(&self) -> String {
        match self.kind() {
            Some(kind) => kind.label().to_string(),
            None => format!("Unknown_{:02X}", self.tag),
        }
    }

    pub fn raw_hex(&self) -> String {
        hex::encode(&self.raw)
    }
}

/// What the session knows about the unit on the bus
///
/// Starts with the scanned unit id and the key fetched from the bridge;
/// metadata records are folded in as they arrive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub unit_id: u16,
    pub security_key: Vec<u8>,
    pub reported_key: Option<u16>,
    pub bootloader_version: u16,
    pub hardware_version: u16,
    pub firmware_version: u16,
    pub unit_number: u16,
    pub application_entry_addr: u32,
    pub last_update: u32,
    pub stored_crc: u16,
    pub application_size: u16,
    pub calculated_crc: Option<u16>,
}

impl DeviceIdentity {
    pub fn new(unit_id: u16) -> Self {
        Self {
            unit_id,
            ..Default::default()
        }
    }

    /// Fold one metadata record into the identity. Unknown tags are ignored.
    pub fn apply(&mut self, record: &MetadataRecord) {
        let Some(kind) = record.kind() else {
            return;
        };

        let short = record.value as u16;
        match kind {
            MetadataTag::SecurityKey => self.reported_key = Some(short),
            MetadataTag::BootloaderVersion => self.bootloader_version = short,
            MetadataTag::HardwareVersion => self.hardware_version = short,
            MetadataTag::FirmwareVersion => self.firmware_version = short,
            MetadataTag::UnitNumber => self.unit_number = short,
            MetadataTag::ApplicationEntryAddr => self.application_entry_addr = record.value,
            MetadataTag::LastUpdate => self.last_update = record.value,
            MetadataTag::StoredCrc => self.stored_crc = short,
            MetadataTag::ApplicationSize => self.application_size = short,
            MetadataTag::CalculatedCrc => self.calculated_crc = Some(short),
        }
    }
}
