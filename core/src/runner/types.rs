use tokio::sync::watch;

/// Cooperative cancellation observed by the runner between steps.
#[derive(Debug, Clone)]
pub struct Cancellation {
    rx: Option<watch::Receiver<bool>>,
}

impl Cancellation {
    pub fn new() -> (CancelHandle, Cancellation) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle { tx }, Cancellation { rx: Some(rx) })
    }

    /// A cancellation that never fires.
    pub fn never() -> Self {
        Self { rx: None }
    }

    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().map(|rx| *rx.borrow()).unwrap_or(false)
    }

    /// Resolves once cancellation fires. Pending forever for [`Cancellation::never`]
    /// or when the handle is dropped without cancelling.
    pub async fn cancelled(&self) {
        let Some(rx) = self.rx.as_ref() else {
            return std::future::pending().await;
        };
        let mut rx = rx.clone();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return std::future::pending().await;
            }
        }
    }
}

#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn subscribe(&self) -> Cancellation {
        Cancellation {
            rx: Some(self.tx.subscribe()),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_reaches_every_subscriber() {
        let (handle, first) = Cancellation::new();
        let second = handle.subscribe();
        assert!(!first.is_cancelled());

        handle.cancel();
        assert!(first.is_cancelled());
        assert!(second.is_cancelled());
        assert!(handle.is_cancelled());
        assert!(!Cancellation::never().is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_resolves_after_cancel() {
        let (handle, cancel) = Cancellation::new();
        let waiter = tokio::spawn(async move { cancel.cancelled().await });
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        handle.cancel();
        tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
