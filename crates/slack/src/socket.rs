use std::future::Future;
use std::time::Duration;

use rtmbot_core::BotIdentity;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tracing::{info, warn};

use crate::commands::{CommandEngine, CommandTable};
use crate::handoff::rendezvous;
use crate::pump::{run_dispatcher, run_reader, ReaderExit, WriteError, WriterPump};
use crate::shutdown::{ShutdownCoordinator, ShutdownState};
use crate::transport::{self, ConnectionState, FrameSink, FrameSource, TransportError};

/// Lower bound on how long the close frame may wait behind an in-flight write.
const MIN_CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// How the pumps ended by the time the runner returned. `None` means the
/// pump was still running when the drain window closed.
#[derive(Debug)]
pub struct RunReport {
    pub reader_exit: Option<ReaderExit>,
    pub dispatcher: Option<Result<u64, WriteError>>,
    pub shutdown: ShutdownState,
}

/// Owns one RTM connection for the lifetime of the process.
pub struct RtmRunner {
    identity: BotIdentity,
    commands: CommandTable,
    drain_timeout: Duration,
    state: watch::Sender<ConnectionState>,
}

impl RtmRunner {
    pub fn new(identity: BotIdentity, commands: CommandTable, drain_timeout: Duration) -> Self {
        let (state, _) = watch::channel(ConnectionState::Connecting);
        Self { identity, commands, drain_timeout, state }
    }

    pub fn identity(&self) -> &BotIdentity {
        &self.identity
    }

    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub async fn connect_and_run<F>(
        &self,
        socket_url: &str,
        interrupt: F,
    ) -> Result<RunReport, TransportError>
    where
        F: Future<Output = ()>,
    {
        let (source, sink) = match transport::open(socket_url).await {
            Ok(halves) => halves,
            Err(error) => {
                self.state.send_replace(ConnectionState::Closed);
                return Err(error);
            }
        };
        Ok(self.run(source, sink, interrupt).await)
    }

    /// Pumps the connection until `interrupt` resolves, then closes it.
    ///
    /// A pump that stops on its own does not end the run; only the interrupt
    /// does. The close attempt is bounded so a blocked writer cannot hold it
    /// up. After the close frame the runner waits up to the drain timeout
    /// for both pumps and abandons whatever is still running.
    pub async fn run<R, W, F>(&self, source: R, sink: W, interrupt: F) -> RunReport
    where
        R: FrameSource + 'static,
        W: FrameSink + Clone + 'static,
        F: Future<Output = ()>,
    {
        self.state.send_replace(ConnectionState::Open);
        info!(
            event_name = "system.rtm.started",
            bot_id = %self.identity,
            commands = self.commands.len(),
            "rtm pumps starting"
        );

        let engine = CommandEngine::new(&self.identity, self.commands.clone());
        let (events_tx, events_rx) = rendezvous();
        let mut pumps = PumpHandles::new(
            tokio::spawn(run_reader(source, events_tx)),
            tokio::spawn(run_dispatcher(engine, events_rx, WriterPump::new(sink.clone()))),
        );

        tokio::pin!(interrupt);
        loop {
            tokio::select! {
                () = &mut interrupt => break,
                () = pumps.wait_next(), if !pumps.finished() => {
                    if pumps.reader_done() {
                        self.state.send_replace(ConnectionState::Closed);
                    }
                    if pumps.finished() {
                        warn!(
                            event_name = "system.rtm.pumps_stopped",
                            "connection is gone; waiting for interrupt"
                        );
                    }
                }
            }
        }

        let close_timeout = self.drain_timeout.max(MIN_CLOSE_TIMEOUT);
        let mut coordinator = ShutdownCoordinator::new(close_timeout);
        coordinator.close(&sink).await;
        if !pumps.reader_done() {
            self.state.send_replace(ConnectionState::Closing);
        }

        if !self.drain_timeout.is_zero()
            && tokio::time::timeout(self.drain_timeout, pumps.join()).await.is_err()
        {
            warn!(
                event_name = "system.shutdown.drain_timeout",
                timeout_ms = self.drain_timeout.as_millis() as u64,
                "pumps did not stop in time"
            );
        }
        pumps.abort_remaining();
        self.state.send_replace(ConnectionState::Closed);

        let report = pumps.into_report(coordinator.state());
        info!(
            event_name = "system.rtm.stopped",
            reader_exit = ?report.reader_exit,
            replies_sent = report.dispatcher.as_ref().and_then(|result| result.as_ref().ok()).copied(),
            "rtm runner finished"
        );
        report
    }
}

struct PumpHandles {
    reader: JoinHandle<ReaderExit>,
    dispatcher: JoinHandle<Result<u64, WriteError>>,
    reader_exit: Option<Result<ReaderExit, JoinError>>,
    dispatcher_result: Option<Result<Result<u64, WriteError>, JoinError>>,
}

impl PumpHandles {
    fn new(
        reader: JoinHandle<ReaderExit>,
        dispatcher: JoinHandle<Result<u64, WriteError>>,
    ) -> Self {
        Self { reader, dispatcher, reader_exit: None, dispatcher_result: None }
    }

    fn reader_done(&self) -> bool {
        self.reader_exit.is_some()
    }

    fn finished(&self) -> bool {
        self.reader_exit.is_some() && self.dispatcher_result.is_some()
    }

    /// Records whichever pump finishes next. Must not be called once both are done.
    async fn wait_next(&mut self) {
        let reader_pending = self.reader_exit.is_none();
        let dispatcher_pending = self.dispatcher_result.is_none();
        tokio::select! {
            exit = &mut self.reader, if reader_pending => {
                self.reader_exit = Some(exit);
            }
            result = &mut self.dispatcher, if dispatcher_pending => {
                self.dispatcher_result = Some(result);
            }
        }
    }

    async fn join(&mut self) {
        while !self.finished() {
            self.wait_next().await;
        }
    }

    fn abort_remaining(&self) {
        if self.reader_exit.is_none() {
            self.reader.abort();
        }
        if self.dispatcher_result.is_none() {
            self.dispatcher.abort();
        }
    }

    fn into_report(self, shutdown: ShutdownState) -> RunReport {
        let reader_exit = self.reader_exit.and_then(|exit| match exit {
            Ok(exit) => Some(exit),
            Err(error) => {
                warn!(event_name = "system.rtm.reader_panicked", error = %error, "reader task failed");
                None
            }
        });
        let dispatcher = self.dispatcher_result.and_then(|result| match result {
            Ok(result) => Some(result),
            Err(error) => {
                warn!(
                    event_name = "system.rtm.dispatcher_panicked",
                    error = %error,
                    "dispatcher task failed"
                );
                None
            }
        });
        RunReport { reader_exit, dispatcher, shutdown }
    }
}
