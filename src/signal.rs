//! Ctrl+C handling.
//!
//! A process can register only one Ctrl+C hook, so [`install_handler`]
//! registers it once and returns a shared [`ShutdownHandler`]. A scan
//! obtains its [`CancelToken`] from the handler; pressing Ctrl+C cancels
//! that token, which unblocks every pipeline stage.
//!
//! ```rust,no_run
//! use dupfu::pipeline::DuplicateFinder;
//! use dupfu::signal::install_handler;
//! use std::path::Path;
//!
//! let handler = install_handler().unwrap();
//! let finder = DuplicateFinder::with_defaults().with_cancel_token(handler.scan_token());
//! let _ = finder.scan(Path::new("."));
//! ```

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use crate::pipeline::CancelToken;

/// Exit code for SIGINT (Ctrl+C) interruption: 128 + SIGINT.
pub const EXIT_CODE_INTERRUPTED: i32 = 130;

/// Routes shutdown requests to the current scan.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandler {
    requested: Arc<AtomicBool>,
    current: Arc<Mutex<Option<CancelToken>>>,
}

impl ShutdownHandler {
    /// Create a handler with no shutdown requested.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether shutdown has been requested.
    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Request shutdown and cancel the watched token, if any.
    pub fn request_shutdown(&self) {
        self.requested.store(true, Ordering::SeqCst);
        if let Some(token) = self.slot().as_ref() {
            token.cancel();
        }
    }

    /// Watch `token`: a shutdown request cancels it.
    ///
    /// If shutdown was already requested, `token` is cancelled immediately.
    pub fn watch(&self, token: &CancelToken) {
        *self.slot() = Some(token.clone());
        if self.is_shutdown_requested() {
            token.cancel();
        }
    }

    /// A fresh token for one scan, already watched.
    #[must_use]
    pub fn scan_token(&self) -> CancelToken {
        let token = CancelToken::new();
        self.watch(&token);
        token
    }

    /// Clear the request flag and forget the watched token.
    pub fn reset(&self) {
        self.requested.store(false, Ordering::SeqCst);
        self.slot().take();
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<CancelToken>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Error type for signal handler installation.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    /// Failed to install the Ctrl+C handler.
    #[error("Failed to install signal handler: {0}")]
    InstallFailed(#[from] ctrlc::Error),
}

static GLOBAL_HANDLER: OnceLock<ShutdownHandler> = OnceLock::new();

/// Register the process-wide Ctrl+C hook (once) and return its handler.
///
/// Later calls return the same handler, reset.
///
/// # Errors
///
/// Returns [`SignalError::InstallFailed`] if some other code already owns
/// the Ctrl+C hook.
pub fn install_handler() -> Result<ShutdownHandler, SignalError> {
    if let Some(handler) = GLOBAL_HANDLER.get() {
        handler.reset();
        return Ok(handler.clone());
    }

    let handler = ShutdownHandler::new();
    let hooked = handler.clone();
    ctrlc::set_handler(move || {
        let _ = writeln!(std::io::stderr(), "\nInterrupted. Cleaning up...");
        let _ = std::io::stderr().flush();
        log::info!("Shutdown signal received");
        hooked.request_shutdown();
    })?;

    Ok(GLOBAL_HANDLER.get_or_init(|| handler).clone())
}
