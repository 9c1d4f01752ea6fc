//! The live-scan orchestrator: a periodic capture → recognize → clean →
//! store → narrate cycle with change detection and failure backoff.

pub mod controller;
pub mod loop_worker;

pub use controller::ScanController;
pub use loop_worker::ScanContext;

use anyhow::Result;

use crate::imaging::EncodedImage;
use crate::models::ScanRecord;

/// Frame acquisition capability (camera, screen, file picker). Blocking;
/// the loop runs it on a blocking task.
pub trait FrameSource: Send + Sync {
    fn capture(&self) -> Result<EncodedImage>;
}

/// What the loop reports to its observer. Events are additive: a failure
/// never retracts a previously delivered result.
#[derive(Debug, Clone)]
pub enum ScanEvent {
    /// Successful non-empty recognition, already persisted to history.
    Result(ScanRecord),
    /// Recognition succeeded but the frame holds no text.
    NoText,
    /// A cycle failed. `category` is stable ("rate_limited",
    /// "invalid_image", "unavailable"); `message` is user-presentable.
    Failed {
        category: &'static str,
        message: String,
    },
    /// Fractional recognition progress in [0, 1] (local backend).
    Progress(f32),
}
