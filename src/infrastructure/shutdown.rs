//! Process shutdown signal
//!
//! A `watch` flag flipped once by Ctrl-C or SIGTERM and observed by the
//! session task.

use tokio::sync::watch;
use tracing::{info, warn};

/// Owner side, flips the flag
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

/// Observer side, cheap to clone
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

pub fn channel() -> (ShutdownTrigger, ShutdownSignal) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, ShutdownSignal { rx })
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }
}

impl ShutdownSignal {
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once shutdown was requested. Also resolves if the trigger is
    /// dropped, since nothing can request it any more.
    pub async fn wait(&mut self) {
        let _ = self.rx.wait_for(|stop| *stop).await;
    }
}

/// Trigger on Ctrl-C, or SIGTERM on Unix
pub async fn listen_for_os_signals(trigger: ShutdownTrigger) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("Interrupt received"),
                    _ = term.recv() => info!("Termination requested"),
                }
            }
            Err(e) => {
                warn!("Can't install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
                info!("Interrupt received");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Can't listen for Ctrl-C: {}", e);
            // Keep the trigger alive so waiters don't see a drop as a request
            std::future::pending::<()>().await;
        }
        info!("Interrupt received");
    }

    trigger.trigger();
}
