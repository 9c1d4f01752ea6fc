//! langdu: core of a camera-driven reading assistant for Traditional
//! Chinese. Captured frames are normalized, run through a recognition
//! backend (cloud multimodal model or local offline engine), de-noised, and
//! narrated aloud, with a similarity gate keeping the continuous scan loop
//! from re-reading the same text over and over.
//!
//! Camera access, the network client behind the cloud backend, the offline
//! engine itself, and all UI belong to the embedding application; they plug
//! in through the [`scan::FrameSource`], [`recognize::cloud::VisionTransport`],
//! [`recognize::local::LocalEngine`], and [`speech::Synthesizer`] traits.

pub mod db;
pub mod error;
pub mod imaging;
pub mod models;
pub mod recognize;
pub mod scan;
pub mod settings;
pub mod speech;
pub mod text;
pub mod utils;

pub use db::{Database, HISTORY_CAP};
pub use error::{PlaybackError, RecognitionError};
pub use imaging::EncodedImage;
pub use models::ScanRecord;
pub use recognize::{BackendKind, RecognitionBackend};
pub use scan::{ScanController, ScanEvent};
pub use settings::{ScanSettings, SettingsStore};
pub use speech::{SpeechController, SpeechState};
