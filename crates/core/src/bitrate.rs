//! Video bitrate allocation for a target output size.
//!
//! The whole budget is `target_kib`. Audio is encoded first, so its size is
//! known exactly; whatever remains is converted from KiB to kilobits and spread
//! over the encode length. The result is truncated so the output lands at or
//! slightly under the target.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// Lowest video bitrate that still produces a usable stream.
pub const MIN_VIDEO_BITRATE_KBPS: u64 = 1;

/// Errors from bitrate allocation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BitrateError {
    /// The audio artifact alone uses up the budget.
    #[error("bitrate would be negative: audio ({audio_kib} KiB) already exceeds target size ({target_kib} KiB)")]
    AudioExceedsTarget { target_kib: u64, audio_kib: u64 },

    /// The remaining budget is too small for any video at all.
    #[error("bitrate would be {bitrate_kbps} kbps, below the minimum of {minimum_kbps} kbps")]
    BelowMinimum {
        bitrate_kbps: u64,
        minimum_kbps: u64,
    },

    /// The encode length cannot be divided by.
    #[error("invalid encode length: {length_secs}s")]
    InvalidLength { length_secs: f64 },
}

/// Inputs and result of a bitrate allocation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BitratePlan {
    pub target_kib: u64,
    pub audio_kib: u64,
    pub length_secs: f64,
    pub video_bitrate_kbps: u64,
}

impl BitratePlan {
    /// Computes the plan, failing instead of clamping when the budget is exhausted.
    pub fn compute(target_kib: u64, audio_kib: u64, length_secs: f64) -> Result<Self, BitrateError> {
        let video_bitrate_kbps = compute_video_bitrate(target_kib, audio_kib, length_secs)?;
        let plan = Self {
            target_kib,
            audio_kib,
            length_secs,
            video_bitrate_kbps,
        };
        info!(
            "Target video bitrate: {} kbps ({} KiB budget, {} KiB audio, {:.3}s)",
            video_bitrate_kbps, target_kib, audio_kib, length_secs
        );
        Ok(plan)
    }

    /// Bitrate in the form the encoder expects (`219k`).
    pub fn video_bitrate_arg(&self) -> String {
        format!("{}k", self.video_bitrate_kbps)
    }
}

/// `floor((target - audio) * 8 / length)` in kbps.
pub fn compute_video_bitrate(
    target_kib: u64,
    audio_kib: u64,
    length_secs: f64,
) -> Result<u64, BitrateError> {
    if audio_kib >= target_kib {
        return Err(BitrateError::AudioExceedsTarget {
            target_kib,
            audio_kib,
        });
    }
    if !length_secs.is_finite() || length_secs <= 0.0 {
        return Err(BitrateError::InvalidLength { length_secs });
    }

    let budget_kbit = (target_kib - audio_kib) as f64 * 8.0;
    let bitrate_kbps = (budget_kbit / length_secs).floor() as u64;

    if bitrate_kbps < MIN_VIDEO_BITRATE_KBPS {
        return Err(BitrateError::BelowMinimum {
            bitrate_kbps,
            minimum_kbps: MIN_VIDEO_BITRATE_KBPS,
        });
    }

    Ok(bitrate_kbps)
}
