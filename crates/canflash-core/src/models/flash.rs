//! Flash progress models

use std::fmt;

use serde::{Deserialize, Serialize};

/// Phase carried by a progress report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashPhase {
    Flashing,
    Completed,
}

impl FlashPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Flashing => "flashing",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for FlashPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress of a firmware transfer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlashProgress {
    pub phase: FlashPhase,
    /// Percentage complete, rounded to two decimals
    pub percentage: f64,
    pub frames_sent: u32,
    pub total_frames: u32,
}

impl FlashProgress {
    pub fn new(phase: FlashPhase, frames_sent: u32, total_frames: u32) -> Self {
        Self {
            phase,
            percentage: percent_complete(frames_sent, total_frames),
            frames_sent,
            total_frames,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.total_frames > 0 && self.frames_sent == self.total_frames
    }
}

/// `frames_sent / total_frames * 100`, rounded to two decimals
///
/// Rounds on the exact ratio, ties to even (4524/4992 is 90.62).
pub fn percent_complete(frames_sent: u32, total_frames: u32) -> f64 {
    if total_frames == 0 {
        return 0.0;
    }
    let total = u64::from(total_frames);
    let scaled = u64::from(frames_sent) * 10_000;
    let mut hundredths = scaled / total;
    let rem = scaled % total;
    if rem * 2 > total || (rem * 2 == total && hundredths % 2 == 1) {
        hundredths += 1;
    }
    hundredths as f64 / 100.0
}
