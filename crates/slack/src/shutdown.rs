use std::time::Duration;

use tracing::{info, warn};

use crate::transport::{FrameSink, TransportError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShutdownState {
    Armed,
    Triggered,
    Closing,
    Done,
}

/// Turns the operator's interrupt into a websocket close handshake.
///
/// The close send is attempted exactly once per trigger and is abandoned after
/// `close_timeout`, since it shares the socket with a writer that may be stuck.
/// Failure is logged and does not stop the coordinator from reaching `Done`.
pub struct ShutdownCoordinator {
    state: ShutdownState,
    close_timeout: Duration,
}

impl ShutdownCoordinator {
    pub fn new(close_timeout: Duration) -> Self {
        Self { state: ShutdownState::Armed, close_timeout }
    }

    pub fn state(&self) -> ShutdownState {
        self.state
    }

    /// Sends the close frame. Only the first call does anything.
    pub async fn close<W>(&mut self, sink: &W)
    where
        W: FrameSink + ?Sized,
    {
        if self.state != ShutdownState::Armed {
            return;
        }

        self.state = ShutdownState::Triggered;
        info!(event_name = "system.shutdown.triggered", "closing rtm connection");

        let result = match tokio::time::timeout(self.close_timeout, sink.send_close()).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Close(format!(
                "no progress after {}ms",
                self.close_timeout.as_millis()
            ))),
        };
        self.state = ShutdownState::Closing;
        match result {
            Ok(()) => info!(event_name = "system.shutdown.close_sent", "close frame sent"),
            Err(error) => warn!(
                event_name = "system.shutdown.close_failed",
                error = %error,
                "failed to send close frame; shutting down anyway"
            ),
        }

        self.state = ShutdownState::Done;
    }
}

/// Resolves on the first Ctrl-C. If the handler cannot be installed the
/// future never resolves, leaving the bot to run until its pumps end.
pub async fn interrupt_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(
            event_name = "system.shutdown.signal_unavailable",
            error = %error,
            "could not listen for ctrl-c"
        );
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::{ShutdownCoordinator, ShutdownState};
    use crate::transport::{FrameSink, TransportError};

    #[derive(Default)]
    struct CloseCounter {
        closes: AtomicUsize,
        fail: bool,
        hang: bool,
    }

    #[async_trait]
    impl FrameSink for CloseCounter {
        async fn send(&self, _frame: String) -> Result<(), TransportError> {
            Ok(())
        }

        async fn send_close(&self) -> Result<(), TransportError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            if self.hang {
                std::future::pending::<()>().await;
            }
            if self.fail {
                return Err(TransportError::Close("socket already gone".to_owned()));
            }
            Ok(())
        }
    }

    fn coordinator() -> ShutdownCoordinator {
        ShutdownCoordinator::new(Duration::from_secs(1))
    }

    #[tokio::test]
    async fn close_sends_exactly_one_close_frame() {
        let sink = CloseCounter::default();
        let mut coordinator = coordinator();
        assert_eq!(coordinator.state(), ShutdownState::Armed);

        coordinator.close(&sink).await;
        coordinator.close(&sink).await;

        assert_eq!(sink.closes.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.state(), ShutdownState::Done);
    }

    #[tokio::test]
    async fn close_failure_still_reaches_done() {
        let sink = CloseCounter { fail: true, ..CloseCounter::default() };
        let mut coordinator = coordinator();

        coordinator.close(&sink).await;

        assert_eq!(sink.closes.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.state(), ShutdownState::Done);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_close_is_abandoned_after_timeout() {
        let sink = CloseCounter { hang: true, ..CloseCounter::default() };
        let mut coordinator = coordinator();

        let finished = tokio::time::timeout(Duration::from_secs(5), coordinator.close(&sink)).await;

        assert!(finished.is_ok(), "close must give up on its own");
        assert_eq!(sink.closes.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.state(), ShutdownState::Done);
    }
}
