//! Cooperative cancellation.
//!
//! The flag is polled between stages and between changes. An atomic write
//! that has started always completes; nothing already applied is undone.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Set the flag on SIGINT/SIGTERM.
    pub fn install_signal_handler(&self) -> Result<(), ctrlc::Error> {
        let flag = self.clone();
        ctrlc::set_handler(move || {
            warn!("shutdown requested, finishing current change");
            flag.request();
        })
    }
}
