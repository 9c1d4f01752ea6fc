//! Recognition backends. Two interchangeable variants produce raw text from
//! a captured frame: a cloud multimodal model reached through a transport
//! capability, and a local offline engine wrapped with this crate's pre- and
//! post-processing. The orchestrator selects one by [`BackendKind`].

pub mod cloud;
pub mod local;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::RecognitionError;
use crate::imaging::EncodedImage;

/// Which recognizer the scan loop drives. Stored in settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum BackendKind {
    Cloud,
    Local,
}

impl Default for BackendKind {
    fn default() -> Self {
        BackendKind::Cloud
    }
}

/// A recognizer: image in, raw text out. Completion may take from
/// sub-second to several seconds; implementations that can estimate their
/// own progress report fractions in [0, 1] through the optional channel.
#[async_trait]
pub trait RecognitionBackend: Send + Sync {
    async fn recognize(
        &self,
        image: &EncodedImage,
        progress: Option<watch::Sender<f32>>,
    ) -> Result<String, RecognitionError>;
}
