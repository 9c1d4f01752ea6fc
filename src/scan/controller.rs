use anyhow::{bail, Context, Result};
use log::info;
use tokio::task::JoinHandle;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::loop_worker::{scan_loop, ScanContext};

/// Lifecycle owner for one scan stream. At most one loop runs per
/// controller; starting a second stream (for example after switching the
/// recognition backend) requires stopping the first, which discards any
/// in-flight result from it.
pub struct ScanController {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
    drain_tx: Option<watch::Sender<bool>>,
}

impl ScanController {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
            drain_tx: None,
        }
    }

    pub fn is_scanning(&self) -> bool {
        self.handle.is_some()
    }

    pub fn start_scanning(&mut self, ctx: ScanContext) -> Result<()> {
        if self.handle.is_some() {
            bail!("scanning already active");
        }

        let cancel_token = CancellationToken::new();
        let token_clone = cancel_token.clone();

        // Drain channel: false = normal operation, true = finish the current
        // cycle but start no new ones.
        let (drain_tx, drain_rx) = watch::channel(false);

        let handle = tokio::spawn(scan_loop(ctx, token_clone, drain_rx));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        self.drain_tx = Some(drain_tx);
        Ok(())
    }

    /// Signal the loop to drain: finish the current cycle, start no new ones.
    pub fn drain_scanning(&mut self) {
        if let Some(tx) = &self.drain_tx {
            let _ = tx.send(true);
            info!("Drain signal sent to scan loop");
        }
    }

    pub async fn stop_scanning(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
        self.drain_tx = None;

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("scan loop task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }
}

impl Default for ScanController {
    fn default() -> Self {
        Self::new()
    }
}
