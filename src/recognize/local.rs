//! Local recognition variant: an offline engine wrapped with this crate's
//! pre- and post-processing. The engine itself (worker threads, model files)
//! is a black box behind [`LocalEngine`]; this layer normalizes the frame
//! before handing it over, forwards recognition progress, and cleans the raw
//! output before returning it.

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::RecognitionError;
use crate::imaging::normalize::{normalize_with, NormalizeConfig};
use crate::imaging::EncodedImage;
use crate::recognize::RecognitionBackend;
use crate::text::cleaner::{clean_with, CleanConfig};

/// Combined Traditional-Chinese + Latin recognition pack.
pub const LOCAL_LANGUAGE_PACK: &str = "chi_tra+eng";

/// The offline recognition engine. Reports fractional progress in [0, 1]
/// through the channel while recognizing.
#[async_trait]
pub trait LocalEngine: Send + Sync {
    async fn recognize(
        &self,
        image: &EncodedImage,
        languages: &str,
        progress: Option<watch::Sender<f32>>,
    ) -> Result<String>;
}

pub struct LocalBackend<E> {
    engine: E,
    normalize_config: NormalizeConfig,
    clean_config: CleanConfig,
}

impl<E: LocalEngine> LocalBackend<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            normalize_config: NormalizeConfig::default(),
            clean_config: CleanConfig::default(),
        }
    }

    pub fn with_configs(
        engine: E,
        normalize_config: NormalizeConfig,
        clean_config: CleanConfig,
    ) -> Self {
        Self {
            engine,
            normalize_config,
            clean_config,
        }
    }
}

#[async_trait]
impl<E: LocalEngine> RecognitionBackend for LocalBackend<E> {
    async fn recognize(
        &self,
        image: &EncodedImage,
        progress: Option<watch::Sender<f32>>,
    ) -> Result<String, RecognitionError> {
        let normalized = normalize_with(image, &self.normalize_config);
        let raw = self
            .engine
            .recognize(&normalized, LOCAL_LANGUAGE_PACK, progress)
            .await
            .map_err(|err| RecognitionError::Unavailable(err.to_string()))?;

        Ok(clean_with(&raw, &self.clean_config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use image::{DynamicImage, Rgba, RgbaImage};
    use std::io::Cursor;
    use std::sync::Mutex;

    struct FakeEngine {
        output: Mutex<Option<Result<String>>>,
        seen: Mutex<Option<(String, String)>>,
        report_progress: bool,
    }

    impl FakeEngine {
        fn new(output: Result<String>) -> Self {
            Self {
                output: Mutex::new(Some(output)),
                seen: Mutex::new(None),
                report_progress: false,
            }
        }
    }

    #[async_trait]
    impl LocalEngine for FakeEngine {
        async fn recognize(
            &self,
            image: &EncodedImage,
            languages: &str,
            progress: Option<watch::Sender<f32>>,
        ) -> Result<String> {
            *self.seen.lock().unwrap() = Some((image.mime.clone(), languages.to_string()));
            if self.report_progress {
                if let Some(tx) = progress {
                    let _ = tx.send(0.5);
                    let _ = tx.send(1.0);
                }
            }
            self.output.lock().unwrap().take().unwrap()
        }
    }

    fn frame() -> EncodedImage {
        let img = RgbaImage::from_pixel(64, 64, Rgba([128, 128, 128, 255]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        EncodedImage::png(bytes)
    }

    #[tokio::test]
    async fn engine_receives_a_normalized_jpeg_and_the_language_pack() {
        let backend = LocalBackend::new(FakeEngine::new(Ok("文字".to_string())));
        backend.recognize(&frame(), None).await.unwrap();
        let seen = backend.engine.seen.lock().unwrap().clone().unwrap();
        assert_eq!(seen.0, "image/jpeg");
        assert_eq!(seen.1, LOCAL_LANGUAGE_PACK);
    }

    #[tokio::test]
    async fn raw_engine_output_is_cleaned() {
        let backend = LocalBackend::new(FakeEngine::new(Ok("今 | 天_天 ^ 氣 真 好!!!".to_string())));
        let text = backend.recognize(&frame(), None).await.unwrap();
        assert_eq!(text, "今天天氣真好!");
    }

    #[tokio::test]
    async fn progress_is_forwarded_to_the_caller() {
        let mut engine = FakeEngine::new(Ok("文".to_string()));
        engine.report_progress = true;
        let backend = LocalBackend::new(engine);

        let (tx, rx) = watch::channel(0.0f32);
        backend.recognize(&frame(), Some(tx)).await.unwrap();
        assert_eq!(*rx.borrow(), 1.0);
    }

    #[tokio::test]
    async fn engine_failure_surfaces_as_unavailable() {
        let backend = LocalBackend::new(FakeEngine::new(Err(anyhow!("model missing"))));
        let err = backend.recognize(&frame(), None).await.unwrap_err();
        assert_eq!(err.category(), "unavailable");
        assert!(err.to_string().contains("model missing"));
    }
}
