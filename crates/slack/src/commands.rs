use std::collections::HashMap;
use std::sync::Arc;

use rtmbot_core::BotIdentity;
use thiserror::Error;
use tracing::{trace, warn};

use crate::events::{InboundEvent, Reply};

pub const MENTION_SEPARATOR: char = ':';

/// A parsed bot command: `<@BOT>: name [arg]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    pub arg: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("empty command body")]
    Empty,
    #[error("expected at most 2 tokens, got {count}")]
    TooManyTokens { count: usize },
    #[error("unrecognized command `{0}`")]
    Unrecognized(String),
}

/// Strips the mention prefix and separator from `text`.
///
/// Returns `None` when the text is not addressed to the bot, which is not an
/// error: most channel traffic is for other people.
pub fn addressed_body<'a>(text: &'a str, mention: &str) -> Option<&'a str> {
    text.strip_prefix(mention)?.strip_prefix(MENTION_SEPARATOR).map(str::trim)
}

pub fn parse_command(body: &str) -> Result<Command, CommandParseError> {
    let tokens = body.split_whitespace().collect::<Vec<_>>();
    match tokens.as_slice() {
        [] => Err(CommandParseError::Empty),
        [name] => Ok(Command { name: (*name).to_owned(), arg: None }),
        [name, arg] => Ok(Command { name: (*name).to_owned(), arg: Some((*arg).to_owned()) }),
        _ => Err(CommandParseError::TooManyTokens { count: tokens.len() }),
    }
}

pub trait CommandHandler: Send + Sync {
    /// Produces the reply text for `command`.
    fn handle(&self, command: &Command) -> String;
}

/// Answers every invocation with the same text.
pub struct StaticReply(pub &'static str);

impl CommandHandler for StaticReply {
    fn handle(&self, _command: &Command) -> String {
        self.0.to_owned()
    }
}

#[derive(Clone, Default)]
pub struct CommandTable {
    handlers: HashMap<String, Arc<dyn CommandHandler>>,
}

impl CommandTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under `name`, replacing any earlier entry.
    pub fn register<H>(&mut self, name: impl Into<String>, handler: H) -> &mut Self
    where
        H: CommandHandler + 'static,
    {
        self.handlers.insert(name.into(), Arc::new(handler));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn CommandHandler>> {
        self.handlers.get(name)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

pub fn default_commands() -> CommandTable {
    let mut table = CommandTable::new();
    table.register("hello", StaticReply("Hello!")).register("bye", StaticReply("Bye!"));
    table
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    Responded(Reply),
    Ignored,
}

/// Turns inbound message events into replies.
pub struct CommandEngine {
    mention: String,
    commands: CommandTable,
}

impl CommandEngine {
    pub fn new(identity: &BotIdentity, commands: CommandTable) -> Self {
        Self { mention: identity.mention(), commands }
    }

    pub fn dispatch(&self, event: &InboundEvent) -> Result<DispatchOutcome, CommandParseError> {
        let Some(body) = addressed_body(&event.text, &self.mention) else {
            trace!(channel = %event.channel, "message not addressed to bot");
            return Ok(DispatchOutcome::Ignored);
        };

        let command = parse_command(body)?;
        let Some(handler) = self.commands.get(&command.name) else {
            return Err(CommandParseError::Unrecognized(command.name));
        };

        Ok(DispatchOutcome::Responded(Reply {
            channel: event.channel.clone(),
            text: handler.handle(&command),
        }))
    }

    /// Like [`dispatch`](Self::dispatch), but logs failures and folds them into `None`.
    pub fn reply_for(&self, event: &InboundEvent) -> Option<Reply> {
        match self.dispatch(event) {
            Ok(DispatchOutcome::Responded(reply)) => Some(reply),
            Ok(DispatchOutcome::Ignored) => None,
            Err(error) => {
                warn!(
                    event_name = "dispatch.command.rejected",
                    channel = %event.channel,
                    text = %event.text,
                    error = %error,
                    "dropping bot command"
                );
                None
            }
        }
    }
}
