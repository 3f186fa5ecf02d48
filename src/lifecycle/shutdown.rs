//! Shutdown fan-out.
//!
//! The HTTP server, the proxy cache sweeper and the config reload loop each
//! hold a receiver and stop on the first signal.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::broadcast;

pub struct Shutdown {
    tx: broadcast::Sender<()>,
    triggered: AtomicBool,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            triggered: AtomicBool::new(false),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Signal every subscriber. Only the first call has an effect.
    pub fn trigger(&self) {
        if self.triggered.swap(true, Ordering::SeqCst) {
            return;
        }
        let notified = self.tx.send(()).unwrap_or(0);
        tracing::info!(tasks = notified, "Shutdown triggered");
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trigger_reaches_server_and_background_tasks() {
        let shutdown = Shutdown::new();
        let mut server = shutdown.subscribe();
        let mut sweeper = server.resubscribe();

        shutdown.trigger();

        assert!(server.recv().await.is_ok());
        assert!(sweeper.recv().await.is_ok());
        assert!(shutdown.is_triggered());
    }

    #[test]
    fn test_second_trigger_is_ignored() {
        let shutdown = Shutdown::default();
        let mut rx = shutdown.subscribe();

        shutdown.trigger();
        shutdown.trigger();

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }
}
