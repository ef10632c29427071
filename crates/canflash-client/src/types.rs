//! Bridge wire types
//!
//! Request and response bodies as the bridge's REST endpoints exchange
//! them. Used by [`crate::BridgeClient`] and the in-process test bridge.

use canflash_core::{FlashProgress, MetadataRecord};
use serde::{Deserialize, Serialize};

/// `GET /next-command`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NextCommandResponse {
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub ping_active: bool,
}

/// `POST /status`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRequest {
    pub status: String,
    #[serde(default)]
    pub detail: String,
}

/// `POST /unit-id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitIdRequest {
    pub unit_id: u16,
}

/// `GET /security-key/{unit_id}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecurityKeyResponse {
    #[serde(default)]
    pub key: Option<Vec<u8>>,
}

/// One record in `POST /unit-metadata`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub tag: u8,
    pub tag_name: String,
    pub value: u32,
    /// Hex of the frame payload
    pub raw_bytes: String,
}

impl From<&MetadataRecord> for MetadataEntry {
    fn from(record: &MetadataRecord) -> Self {
        Self {
            tag: record.tag,
            tag_name: record.label(),
            value: record.value,
            raw_bytes: record.raw_hex(),
        }
    }
}

/// `POST /unit-metadata`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitMetadataRequest {
    pub unit_id: u16,
    pub metadata: Vec<MetadataEntry>,
}

/// `POST /flashing-progress`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlashProgressRequest {
    /// `flashing` or `completed`
    pub status: String,
    pub percentage: f64,
    pub frames: u32,
    pub total_frames: u32,
}

impl From<&FlashProgress> for FlashProgressRequest {
    fn from(progress: &FlashProgress) -> Self {
        Self {
            status: progress.phase.as_str().to_string(),
            percentage: progress.percentage,
            frames: progress.frames_sent,
            total_frames: progress.total_frames,
        }
    }
}

/// Error body returned by the bridge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use canflash_core::FlashPhase;

    #[test]
    fn test_next_command_tolerates_missing_fields() {
        let response: NextCommandResponse = serde_json::from_str("{}").unwrap();
        assert!(response.command.is_none());
        assert!(!response.ping_active);

        let response: NextCommandResponse =
            serde_json::from_str(r#"{"command":"scan_unit","ping_active":true}"#).unwrap();
        assert_eq!(response.command.as_deref(), Some("scan_unit"));
        assert!(response.ping_active);
    }

    #[test]
    fn test_metadata_entry_from_record() {
        let record = MetadataRecord {
            tag: 0x0A,
            value: 0xBEEF,
            raw: vec![0xEF, 0xBE, 0, 0, 0, 0, 0, 0x0A],
        };
        let entry = MetadataEntry::from(&record);
        assert_eq!(entry.tag_name, "Calculated_CRC");
        assert_eq!(entry.raw_bytes, "efbe00000000000a");
    }

    #[test]
    fn test_progress_body() {
        let body = FlashProgressRequest::from(&FlashProgress::new(FlashPhase::Completed, 4, 4));
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["status"], "completed");
        assert_eq!(json["frames"], 4);
        assert_eq!(json["percentage"], 100.0);
    }
}
