//! Cloud recognition variant: one multimodal request carrying the frame and
//! a fixed Traditional-Chinese instruction. The network client itself lives
//! outside this crate behind [`VisionTransport`]; this layer owns the
//! instruction, response trimming, the no-text sentinel, and the mapping of
//! transport failures onto the user-presentable error categories.

use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::RecognitionError;
use crate::imaging::EncodedImage;
use crate::recognize::RecognitionBackend;
use crate::text::NO_TEXT_SENTINEL;

/// Fixed instruction sent with every frame. Asks for plain Traditional
/// Chinese text only and pins the sentinel for the no-text case.
pub const RECOGNITION_INSTRUCTION: &str =
    "請辨識圖片中的繁體中文文字，只輸出辨識到的純文字內容，不要加任何說明。\
     如果圖片中沒有文字，請回覆「未偵測到文字」。";

/// Failures a transport can report. The backend maps these 1:1 onto
/// [`RecognitionError`]; keeping the classification at the transport edge
/// means HTTP status codes never leak past it.
#[derive(Debug)]
pub enum TransportError {
    /// Quota or rate-limit rejection.
    RateLimited(String),
    /// The service refused the image payload as malformed or unsupported.
    BadImage(String),
    /// Anything else, with the underlying message when available.
    Failed(String),
}

/// The multimodal request capability: one image part plus one instruction
/// part, plain-text response.
#[async_trait]
pub trait VisionTransport: Send + Sync {
    async fn request_text(
        &self,
        image: &EncodedImage,
        instruction: &str,
    ) -> Result<String, TransportError>;
}

pub struct CloudBackend<T> {
    transport: T,
}

impl<T: VisionTransport> CloudBackend<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl<T: VisionTransport> RecognitionBackend for CloudBackend<T> {
    async fn recognize(
        &self,
        image: &EncodedImage,
        _progress: Option<watch::Sender<f32>>,
    ) -> Result<String, RecognitionError> {
        let response = self
            .transport
            .request_text(image, RECOGNITION_INSTRUCTION)
            .await
            .map_err(|err| match err {
                TransportError::RateLimited(msg) => RecognitionError::RateLimited(msg),
                TransportError::BadImage(msg) => RecognitionError::InvalidImage(msg),
                TransportError::Failed(msg) => RecognitionError::Unavailable(msg),
            })?;

        let text = response.trim();
        if text.is_empty() {
            Ok(NO_TEXT_SENTINEL.to_string())
        } else {
            Ok(text.to_string())
        }
    }
}
