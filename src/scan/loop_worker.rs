use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::db::Database;
use crate::imaging::phash::{compute_hamming_distance, compute_phash};
use crate::models::ScanRecord;
use crate::recognize::RecognitionBackend;
use crate::settings::ScanSettings;
use crate::speech::{SpeechController, Synthesizer};
use crate::text::cleaner::{clean_with, CleanConfig};
use crate::text::similarity::{should_speak, GateConfig};
use crate::text::NO_TEXT_SENTINEL;

use super::{FrameSource, ScanEvent};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

// Import the logging macros (exported at crate root)
use crate::{log_error, log_info, log_warn};

/// Hard cap on one capture+recognize+speak cycle.
const CYCLE_TIMEOUT_SECS: u64 = 30;
/// Extra delay added to the cadence after a failed or timed-out cycle.
const FAILURE_BACKOFF_SECS: u64 = 5;
/// Hamming distance at which a frame counts as changed.
const PHASH_CHANGE_THRESHOLD: u32 = 8;
/// A static frame is still re-recognized this often; the similarity gate
/// keeps the repeat from being narrated twice.
const STATIC_REFRESH_SECS: u64 = 20;

/// Everything one scan stream needs. Built by the controller; the loop owns
/// it for its lifetime, so switching backends means stopping this stream
/// and starting a fresh one (any in-flight result dies with the old loop).
pub struct ScanContext {
    pub frames: Arc<dyn FrameSource>,
    pub backend: Arc<dyn RecognitionBackend>,
    pub synthesizer: Arc<dyn Synthesizer>,
    pub speech: Arc<SpeechController>,
    pub db: Database,
    pub settings: ScanSettings,
    pub gate: GateConfig,
    pub clean_config: CleanConfig,
    pub events: mpsc::Sender<ScanEvent>,
}

enum CycleOutcome {
    /// Frame unchanged, recognition skipped.
    Skipped,
    /// Recognized but the frame holds no text.
    NoText,
    Spoken,
    /// Result stored; narration suppressed by the gate.
    Suppressed,
    /// Recognition failed; reported via events.
    Failed,
}

pub async fn scan_loop(
    ctx: ScanContext,
    cancel_token: CancellationToken,
    drain_rx: watch::Receiver<bool>,
) {
    let cadence = Duration::from_secs(ctx.settings.scan_interval_secs.max(1));
    let mut ticker = tokio::time::interval(cadence);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut last_recognized_phash: Option<String> = None;
    let mut last_recognition_time: Option<Instant> = None;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if *drain_rx.borrow() {
                    log_info!("scan loop draining, no new cycles");
                    break;
                }

                let cycle = perform_cycle(
                    &ctx,
                    &mut last_recognized_phash,
                    &mut last_recognition_time,
                );

                tokio::select! {
                    outcome = tokio::time::timeout(Duration::from_secs(CYCLE_TIMEOUT_SECS), cycle) => {
                        match outcome {
                            Ok(Ok(CycleOutcome::Failed)) => {
                                // Failures lengthen the retry cadence instead of
                                // retrying immediately.
                                ticker.reset_after(cadence + Duration::from_secs(FAILURE_BACKOFF_SECS));
                            }
                            Ok(Ok(_)) => {}
                            Ok(Err(err)) => {
                                log_error!("scan cycle failed: {err:?}");
                                ticker.reset_after(cadence + Duration::from_secs(FAILURE_BACKOFF_SECS));
                            }
                            Err(_) => {
                                log_warn!("scan cycle timeout (> {CYCLE_TIMEOUT_SECS}s)");
                                ticker.reset_after(cadence + Duration::from_secs(FAILURE_BACKOFF_SECS));
                            }
                        }
                    }
                    _ = cancel_token.cancelled() => {
                        log_info!("scan loop cancelled mid-cycle, discarding in-flight result");
                        break;
                    }
                }
            }
            _ = cancel_token.cancelled() => {
                log_info!("scan loop shutting down");
                break;
            }
        }
    }
}

async fn perform_cycle(
    ctx: &ScanContext,
    last_recognized_phash: &mut Option<String>,
    last_recognition_time: &mut Option<Instant>,
) -> Result<CycleOutcome> {
    let cycle_start = Instant::now();

    let frames = Arc::clone(&ctx.frames);
    let frame = tokio::task::spawn_blocking(move || frames.capture())
        .await
        .context("frame capture worker join failed")?
        .map_err(|err| anyhow!("frame capture failed: {err}"))?;
    let captured_at = Utc::now();
    let frame = Arc::new(frame);

    let phash = tokio::task::spawn_blocking({
        let frame = Arc::clone(&frame);
        move || compute_phash(&frame.bytes)
    })
    .await
    .context("phash worker join failed")??;

    if !should_recognize(
        &phash,
        last_recognized_phash.as_deref(),
        last_recognition_time.as_ref(),
    ) {
        log_info!("frame unchanged (phash {phash}), skipping recognition");
        return Ok(CycleOutcome::Skipped);
    }

    // Forward backend progress to the observer; the forwarder winds down
    // when the backend drops its sender.
    let (progress_tx, mut progress_rx) = watch::channel(0.0f32);
    let progress_events = ctx.events.clone();
    let forwarder = tokio::spawn(async move {
        while progress_rx.changed().await.is_ok() {
            let value = *progress_rx.borrow();
            let _ = progress_events.send(ScanEvent::Progress(value)).await;
        }
    });

    let recognized = ctx.backend.recognize(&frame, Some(progress_tx)).await;
    let _ = forwarder.await;

    let raw = match recognized {
        Ok(raw) => raw,
        Err(err) => {
            log_warn!(
                "recognition failed after {}ms ({}): {err}",
                cycle_start.elapsed().as_millis(),
                err.category()
            );
            let _ = ctx
                .events
                .send(ScanEvent::Failed {
                    category: err.category(),
                    message: err.to_string(),
                })
                .await;
            return Ok(CycleOutcome::Failed);
        }
    };

    *last_recognized_phash = Some(phash);
    *last_recognition_time = Some(Instant::now());

    // The local backend cleans its own output; cleaning is stable on
    // already-clean text, so applying it uniformly here costs nothing.
    let cleaned = clean_with(&raw, &ctx.clean_config);
    if cleaned.is_empty() || cleaned == NO_TEXT_SENTINEL {
        log_info!("no text in frame after {}ms", cycle_start.elapsed().as_millis());
        let _ = ctx.events.send(ScanEvent::NoText).await;
        return Ok(CycleOutcome::NoText);
    }

    let record = ScanRecord::new(captured_at, frame.to_data_url(), cleaned.clone());
    ctx.db
        .insert_scan(&record)
        .await
        .context("failed to persist scan")?;
    let _ = ctx.events.send(ScanEvent::Result(record)).await;

    let snapshot = ctx.speech.snapshot();
    let gate = effective_gate(&ctx.settings, &ctx.gate);
    if !should_speak(
        &cleaned,
        &snapshot.current_text,
        snapshot.is_speaking,
        false,
        &gate,
    ) {
        log_info!("narration suppressed, text too close to current utterance");
        return Ok(CycleOutcome::Suppressed);
    }

    let synthesizer = Arc::clone(&ctx.synthesizer);
    let text_for_synth = cleaned.clone();
    let synthesized = tokio::task::spawn_blocking(move || synthesizer.synthesize(&text_for_synth))
        .await
        .context("synthesis worker join failed")?;

    match synthesized {
        Ok(audio) => {
            if let Err(err) = ctx.speech.speak(&cleaned, audio) {
                log_warn!("playback failed: {err}");
            }
        }
        Err(err) => {
            // Synthesis failures are logged and dropped; the result is
            // already stored and displayed.
            log_warn!("speech synthesis failed: {err}");
        }
    }

    log_info!(
        "cycle completed in {}ms ({} chars)",
        cycle_start.elapsed().as_millis(),
        cleaned.chars().count()
    );
    Ok(CycleOutcome::Spoken)
}

/// The suppression toggle is a user setting and wins over whatever the
/// gate config carries; the config contributes the threshold and the
/// never-spoken list.
fn effective_gate(settings: &ScanSettings, gate: &GateConfig) -> GateConfig {
    GateConfig {
        smart_suppression: settings.smart_suppression,
        ..gate.clone()
    }
}

fn should_recognize(
    current_phash: &str,
    last_recognized_phash: Option<&str>,
    last_recognition_time: Option<&Instant>,
) -> bool {
    let Some(prev_phash) = last_recognized_phash else {
        return true;
    };

    if compute_hamming_distance(current_phash, prev_phash) >= PHASH_CHANGE_THRESHOLD {
        return true;
    }

    refresh_elapsed(last_recognition_time)
}

fn refresh_elapsed(last_recognition_time: Option<&Instant>) -> bool {
    last_recognition_time
        .map(|instant| instant.elapsed().as_secs() >= STATIC_REFRESH_SECS)
        .unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgba, RgbaImage};
    use std::io::Cursor;

    fn hash_of(color: [u8; 4]) -> String {
        let img = RgbaImage::from_pixel(32, 32, Rgba(color));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        compute_phash(&bytes).unwrap()
    }

    fn gradient_hash() -> String {
        let img = RgbaImage::from_fn(32, 32, |x, y| {
            Rgba([(x * 8) as u8, (y * 8) as u8, ((x + y) * 4) as u8, 255])
        });
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        compute_phash(&bytes).unwrap()
    }

    #[test]
    fn first_frame_is_always_recognized() {
        assert!(should_recognize(&hash_of([0, 0, 0, 255]), None, None));
    }

    #[test]
    fn unchanged_recent_frame_is_skipped() {
        let hash = hash_of([120, 120, 120, 255]);
        let just_now = Instant::now();
        assert!(!should_recognize(&hash, Some(&hash), Some(&just_now)));
    }

    #[test]
    fn changed_frame_is_recognized_even_within_the_refresh_window() {
        let flat = hash_of([120, 120, 120, 255]);
        let busy = gradient_hash();
        assert!(
            compute_hamming_distance(&flat, &busy) >= PHASH_CHANGE_THRESHOLD,
            "fixture frames must differ enough to trip the gate"
        );
        let just_now = Instant::now();
        assert!(should_recognize(&busy, Some(&flat), Some(&just_now)));
    }

    #[test]
    fn static_frame_is_refreshed_after_the_window() {
        let hash = hash_of([120, 120, 120, 255]);
        let Some(long_ago) =
            Instant::now().checked_sub(Duration::from_secs(STATIC_REFRESH_SECS + 1))
        else {
            return;
        };
        assert!(should_recognize(&hash, Some(&hash), Some(&long_ago)));
    }

    #[test]
    fn corrupt_stored_hash_never_suppresses() {
        let hash = hash_of([120, 120, 120, 255]);
        let just_now = Instant::now();
        assert!(should_recognize(&hash, Some("garbage!!"), Some(&just_now)));
    }

    #[test]
    fn settings_toggle_overrides_the_gate_config() {
        let settings = ScanSettings {
            smart_suppression: false,
            ..ScanSettings::default()
        };
        let gate = effective_gate(&settings, &GateConfig::default());
        assert!(!gate.smart_suppression);
        // With suppression off, a repeat of the active narration still speaks.
        assert!(should_speak("今天天氣很好", "今天天氣很好", true, false, &gate));

        let settings = ScanSettings::default();
        let gate = effective_gate(
            &settings,
            &GateConfig {
                smart_suppression: false,
                ..GateConfig::default()
            },
        );
        assert!(gate.smart_suppression);
    }
}
