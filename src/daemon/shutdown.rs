use std::sync::Arc;
use tokio::sync::watch;

/// Owner side of the daemon-wide stop signal.
///
/// Every long-lived loop holds a [`ShutdownHandle`] and selects on
/// [`ShutdownHandle::wait`] at each sleep or poll, so a stop request is
/// observed within one checkpoint.
pub struct ShutdownCoordinator {
    tx: Arc<watch::Sender<bool>>,
    _rx: watch::Receiver<bool>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            _rx,
        }
    }

    pub fn handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.tx.clone(),
        }
    }

    /// Resolve once shutdown has been requested.
    pub async fn wait(&self) {
        self.handle().wait().await;
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    /// Request shutdown. Idempotent.
    pub fn shutdown(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once shutdown has been requested.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn wait_resolves_after_shutdown() {
        let coordinator = ShutdownCoordinator::new();
        let handle = coordinator.handle();

        let waiter = tokio::spawn(async move { coordinator.wait().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        handle.shutdown();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("wait did not resolve")
            .unwrap();
    }

    #[tokio::test]
    async fn wait_resolves_immediately_when_already_down() {
        let coordinator = ShutdownCoordinator::new();
        let handle = coordinator.handle();
        handle.shutdown();
        assert!(handle.is_shutdown());

        tokio::time::timeout(Duration::from_millis(100), handle.wait())
            .await
            .expect("wait did not resolve");
    }
}
