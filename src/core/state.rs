//! Process-wide shutdown state.
//!
//! The only state shared across threads of one invocation: whether Ctrl+C
//! was received. Workers poll it between modules and abort before anything
//! is emitted, leaving the output directory in a state the next clean stage
//! can recover from.

use std::sync::atomic::{AtomicBool, Ordering};

/// Shutdown has been requested (Ctrl+C received)
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// Setup the global Ctrl+C handler. Call once at program start
pub fn setup_shutdown_handler() -> anyhow::Result<()> {
    ctrlc::set_handler(|| {
        if SHUTDOWN.swap(true, Ordering::SeqCst) {
            // Second Ctrl+C: stop waiting for workers
            std::process::exit(130);
        }
        crate::log!("build"; "interrupted, stopping...");
    })
    .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {}", e))
}

/// Check if shutdown has been requested
///
/// Relaxed: a worker may finish a few more modules before it sees the flag.
pub fn is_shutdown() -> bool {
    SHUTDOWN.load(Ordering::Relaxed)
}
