//! Slack RTM command bot
//!
//! This crate holds the realtime side of the bot:
//! - **Transport** (`transport`) - websocket halves behind `FrameSource` / `FrameSink`
//! - **Handoff** (`handoff`) - rendezvous channel between reader and dispatcher
//! - **Events** (`events`) - RTM wire frames
//! - **Commands** (`commands`) - mention parsing and the command table
//! - **Pumps** (`pump`) - reader loop, dispatcher loop, writer
//! - **Shutdown** (`shutdown`) - interrupt to close-frame coordination
//! - **Runner** (`socket`) - wires the above to one connection
//!
//! Session negotiation (`session`) and the incoming webhook (`webhook`) are
//! plain HTTP calls made outside the pumps.
//!
//! # Architecture
//!
//! ```text
//! rtm.start → websocket → reader pump → rendezvous → dispatcher → writer pump → websocket
//!                                                                      ↑
//!                                   ctrl-c → shutdown coordinator → close frame
//! ```

pub mod commands;
pub mod events;
pub mod handoff;
pub mod pump;
pub mod session;
pub mod shutdown;
pub mod socket;
pub mod transport;
pub mod webhook;
