// ============================================================
// Layer 6: Cancellation Token
// ============================================================
// A shared stop flag. The training loop checks it once at the
// top of every step, so a stop request never interrupts a step
// halfway: the model keeps whatever the last finished step
// produced.
//
// The CLI trips it from a Ctrl-C handler; tests trip it
// directly.

use anyhow::{Context, Result};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Trip this token on SIGINT (Ctrl-C). Can only be installed once per process.
    pub fn cancel_on_ctrlc(&self) -> Result<()> {
        let token = self.clone();
        ctrlc::set_handler(move || {
            tracing::warn!("Interrupt received, stopping after the current step");
            token.cancel();
        })
        .context("Cannot install Ctrl-C handler")
    }
}
