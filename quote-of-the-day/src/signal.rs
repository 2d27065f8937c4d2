//! Shutdown signalling.
//!
//! The quit flag is the only state shared between the signal listener and the
//! accept loop. Signal delivery only flips the flag and wakes any blocked
//! accept; everything else happens on the main flow.

use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use tokio::{sync::Notify, task::JoinHandle};
use tracing::info;

/// Shared "quit requested" flag.
#[derive(Debug, Clone, Default)]
pub struct QuitFlag {
    inner: Arc<QuitState>,
}

#[derive(Debug, Default)]
struct QuitState {
    requested: AtomicBool,
    notify: Notify,
}

impl QuitFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the flag and wakes every task waiting in [`QuitFlag::wait`].
    pub fn request(&self) {
        self.inner.requested.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_requested(&self) -> bool {
        self.inner.requested.load(Ordering::SeqCst)
    }

    /// Resolves once the flag is set. Returns immediately if it already is.
    pub async fn wait(&self) {
        // Register before checking so a request in between is not missed.
        let notified = self.inner.notify.notified();
        if self.is_requested() {
            return;
        }
        notified.await;
    }
}

/// Routes SIGINT and SIGTERM (ctrl-c off unix) to `quit`.
///
/// Must be called from within a Tokio runtime. The returned task runs for
/// the rest of the process.
pub fn install_signal_handlers(quit: QuitFlag) -> io::Result<JoinHandle<()>> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut interrupt = signal(SignalKind::interrupt())?;
        let mut terminate = signal(SignalKind::terminate())?;
        Ok(tokio::spawn(async move {
            loop {
                let name = tokio::select! {
                    _ = interrupt.recv() => "SIGINT",
                    _ = terminate.recv() => "SIGTERM",
                };
                quit.request();
                info!(signal = name, "received signal, closing connections");
            }
        }))
    }

    #[cfg(not(unix))]
    {
        Ok(tokio::spawn(async move {
            loop {
                if let Err(err) = tokio::signal::ctrl_c().await {
                    tracing::warn!(error = ?err, "failed to listen for ctrl-c");
                    return;
                }
                quit.request();
                info!("received ctrl-c, closing connections");
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;

    #[test]
    fn flag_starts_clear() {
        let quit = QuitFlag::new();
        assert!(!quit.is_requested());
    }

    #[tokio::test]
    async fn request_is_visible_through_clones() {
        let quit = QuitFlag::new();
        let observer = quit.clone();
        quit.request();
        assert!(observer.is_requested());
        timeout(Duration::from_millis(100), observer.wait())
            .await
            .expect("wait should return once requested");
    }

    #[tokio::test]
    async fn request_wakes_pending_waiter() {
        let quit = QuitFlag::new();
        let waiter = {
            let quit = quit.clone();
            tokio::spawn(async move { quit.wait().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        quit.request();

        timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .expect("waiter task");
    }
}
