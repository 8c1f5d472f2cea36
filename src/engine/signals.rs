// src/engine/signals.rs

//! Interrupt handling.
//!
//! The first Ctrl-C (or SIGTERM) cancels the run-wide token: workers stop
//! starting new members and the supervisor terminates running process
//! groups. A second interrupt while that drain is in progress SIGKILLs every
//! live task process group and exits.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::exec::process::kill_live_groups;

/// Arm `cancel` from OS interrupts.
pub fn spawn_interrupt_handler(cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        if !wait_for_interrupt().await {
            return;
        }
        warn!("interrupt received; cancelling running tasks");
        cancel.cancel();

        if !wait_for_interrupt().await {
            return;
        }
        error!("second interrupt received; exiting immediately");
        kill_live_groups();
        std::process::exit(1);
    })
}

/// Wait for Ctrl-C or SIGTERM. Returns false if no listener could be
/// installed.
async fn wait_for_interrupt() -> bool {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    res = tokio::signal::ctrl_c() => return log_listener(res),
                    _ = term.recv() => return true,
                }
            }
            Err(e) => warn!(error = %e, "failed to listen for SIGTERM"),
        }
    }

    log_listener(tokio::signal::ctrl_c().await)
}

fn log_listener(res: std::io::Result<()>) -> bool {
    match res {
        Ok(()) => true,
        Err(e) => {
            error!(error = %e, "failed to listen for Ctrl+C");
            false
        }
    }
}
