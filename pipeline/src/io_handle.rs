use std::future::Future;
use std::pin::Pin;
use std::sync::mpsc;
use std::task::{Context, Poll};

/// Handle to work running on a background runtime.
///
/// The work itself runs with real wakers; only result delivery goes
/// through a channel, so the single-threaded tick loop can check for
/// completion without blocking.
///
/// # Example
///
/// ```ignore
/// let (sender, handle) = IoHandle::channel();
/// runtime.spawn(async move {
///     let _ = sender.send(run_command(&command).await);
/// });
///
/// // Each tick:
/// if let Poll::Ready(result) = handle.check() { /* ... */ }
/// ```
pub struct IoHandle<T> {
    receiver: mpsc::Receiver<T>,
}

impl<T> IoHandle<T> {
    pub fn new(receiver: mpsc::Receiver<T>) -> Self {
        Self { receiver }
    }

    /// Create a connected sender and handle.
    pub fn channel() -> (mpsc::Sender<T>, Self) {
        let (sender, receiver) = mpsc::channel();
        (sender, Self::new(receiver))
    }

    /// Non-blocking check for completion.
    ///
    /// `Ready(Some(T))` once the result arrives, `Ready(None)` if the sender
    /// was dropped without sending, `Pending` while the work is running.
    /// The value is consumed; later calls report `Ready(None)`.
    pub fn check(&self) -> Poll<Option<T>> {
        match self.receiver.try_recv() {
            Ok(value) => Poll::Ready(Some(value)),
            Err(mpsc::TryRecvError::Empty) => Poll::Pending,
            Err(mpsc::TryRecvError::Disconnected) => Poll::Ready(None),
        }
    }

    /// Retrieve the result without blocking, if it is available.
    pub fn try_recv(&self) -> Option<T> {
        self.receiver.try_recv().ok()
    }

    /// Block until the work completes.
    ///
    /// Returns `None` if the sender was dropped without sending.
    pub fn recv(self) -> Option<T> {
        self.receiver.recv().ok()
    }
}

impl<T> Future for IoHandle<T> {
    type Output = Option<T>;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.check()
    }
}
