//! OS signal handling.
//!
//! # Responsibilities
//! - Wait for SIGTERM / SIGINT (ctrl-c elsewhere)
//! - Report which signal arrived so the caller can log it
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Reload is driven by the file watcher, not SIGHUP

/// Resolve when the process is asked to stop. Returns the signal name.
pub async fn wait_for_shutdown() -> std::io::Result<&'static str> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            interrupted = tokio::signal::ctrl_c() => {
                interrupted?;
                Ok("SIGINT")
            }
            _ = terminate.recv() => Ok("SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        Ok("ctrl-c")
    }
}
