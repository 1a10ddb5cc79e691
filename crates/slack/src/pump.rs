use thiserror::Error;
use tracing::{debug, info, warn};

use crate::commands::CommandEngine;
use crate::events::{decode_frame, encode_message, InboundEvent, OutboundMessage, Reply};
use crate::handoff::{HandoffReceiver, HandoffSender};
use crate::transport::{FrameSink, FrameSource, TransportError};

/// Why the reader pump stopped. Both cases are terminal; neither is retried.
#[derive(Debug, PartialEq, Eq)]
pub enum ReaderExit {
    Transport(TransportError),
    DispatcherGone,
}

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("reply could not be serialized: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Reads frames until the transport fails, forwarding `message` events in
/// arrival order. Undecodable frames are logged and skipped.
pub async fn run_reader<R>(mut source: R, events: HandoffSender<InboundEvent>) -> ReaderExit
where
    R: FrameSource,
{
    loop {
        let frame = match source.receive().await {
            Ok(frame) => frame,
            Err(error) => {
                warn!(
                    event_name = "ingress.rtm.read_failed",
                    error = %error,
                    "reader pump stopping"
                );
                return ReaderExit::Transport(error);
            }
        };

        let event = match decode_frame(&frame) {
            Ok(event) => event,
            Err(error) => {
                warn!(
                    event_name = "ingress.rtm.decode_failed",
                    frame = ?frame,
                    error = %error,
                    "skipping undecodable frame"
                );
                continue;
            }
        };

        if !event.is_message() {
            debug!(event_name = "ingress.rtm.frame_skipped", kind = %event.kind, "non-message frame");
            continue;
        }

        debug!(
            event_name = "ingress.rtm.message_received",
            channel = %event.channel,
            "forwarding message event"
        );
        if events.send(event).await.is_err() {
            info!(event_name = "ingress.rtm.dispatcher_gone", "reader pump stopping");
            return ReaderExit::DispatcherGone;
        }
    }
}

/// Serializes replies onto the transport, numbering them from zero.
pub struct WriterPump<W> {
    sink: W,
    next_id: u64,
}

impl<W> WriterPump<W>
where
    W: FrameSink,
{
    pub fn new(sink: W) -> Self {
        Self { sink, next_id: 0 }
    }

    pub async fn write(&mut self, reply: Reply) -> Result<OutboundMessage, WriteError> {
        let message = OutboundMessage::new(self.next_id, reply);
        self.next_id += 1;

        let frame = encode_message(&message)?;
        self.sink.send(frame).await?;
        info!(
            event_name = "egress.rtm.reply_sent",
            id = message.id,
            channel = %message.channel,
            "reply sent"
        );
        Ok(message)
    }
}

/// Dispatcher and writer pump, run together in one task.
///
/// Returns `Ok` with the number of replies sent once the reader side hangs
/// up, or the first write error. A failed reply is not retried.
pub async fn run_dispatcher<W>(
    engine: CommandEngine,
    mut events: HandoffReceiver<InboundEvent>,
    mut writer: WriterPump<W>,
) -> Result<u64, WriteError>
where
    W: FrameSink,
{
    let mut sent = 0;
    while let Some(event) = events.recv().await {
        let Some(reply) = engine.reply_for(&event) else {
            continue;
        };

        if let Err(error) = writer.write(reply).await {
            warn!(
                event_name = "egress.rtm.write_failed",
                error = %error,
                "writer pump stopping"
            );
            return Err(error);
        }
        sent += 1;
    }

    info!(event_name = "egress.rtm.events_closed", sent, "dispatcher drained");
    Ok(sent)
}
