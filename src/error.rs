use thiserror::Error;

/// Failure categories a recognition backend may surface.
///
/// The three variants are a contract the embedding UI depends on for
/// messaging: rate limiting lengthens the retry cadence, an invalid image
/// prompts a re-capture, anything else is shown as-is.
#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("recognition service is rate limited: {0}")]
    RateLimited(String),
    #[error("image was rejected by the recognizer: {0}")]
    InvalidImage(String),
    #[error("recognition failed: {0}")]
    Unavailable(String),
}

impl RecognitionError {
    /// Stable category name for logging and event payloads.
    pub fn category(&self) -> &'static str {
        match self {
            RecognitionError::RateLimited(_) => "rate_limited",
            RecognitionError::InvalidImage(_) => "invalid_image",
            RecognitionError::Unavailable(_) => "unavailable",
        }
    }
}

/// Speech playback failures. These reset the playback state and are logged
/// by the scan loop; they never tear the loop down.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("speech synthesis failed: {0}")]
    Synthesis(String),
    #[error("audio output failed: {0}")]
    Output(String),
}
