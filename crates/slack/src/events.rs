use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::transport::Frame;

pub const MESSAGE_KIND: &str = "message";

/// An RTM event as it arrives on the socket.
///
/// Every field is optional on the wire: `hello`, presence changes and the
/// `reply_to` acknowledgements for our own sends all omit some of them.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct InboundEvent {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub text: String,
}

impl InboundEvent {
    pub fn is_message(&self) -> bool {
        self.kind == MESSAGE_KIND
    }
}

/// A reply produced by the command engine, before the writer assigns it an id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reply {
    pub channel: String,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: String,
    pub channel: String,
    pub text: String,
}

impl OutboundMessage {
    pub fn new(id: u64, reply: Reply) -> Self {
        Self { id, kind: MESSAGE_KIND.to_owned(), channel: reply.channel, text: reply.text }
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("frame is not valid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("binary frame is not valid utf-8")]
    NotUtf8,
}

pub fn decode_frame(frame: &Frame) -> Result<InboundEvent, DecodeError> {
    let text = match frame {
        Frame::Text(text) => text.as_str(),
        Frame::Binary(data) => std::str::from_utf8(data).map_err(|_| DecodeError::NotUtf8)?,
    };
    Ok(serde_json::from_str(text)?)
}

pub fn encode_message(message: &OutboundMessage) -> Result<String, serde_json::Error> {
    serde_json::to_string(message)
}

#[cfg(test)]
mod tests {
    use super::{decode_frame, encode_message, DecodeError, OutboundMessage, Reply};
    use crate::transport::Frame;

    #[test]
    fn decodes_message_event_and_ignores_extra_fields() {
        let frame = Frame::Text(
            r#"{"type":"message","channel":"C2147483705","user":"U2147483697","text":"hi","ts":"1355517523.000005"}"#
                .to_owned(),
        );
        let event = decode_frame(&frame).expect("valid frame");
        assert!(event.is_message());
        assert_eq!(event.channel, "C2147483705");
        assert_eq!(event.text, "hi");
    }

    #[test]
    fn frames_without_type_decode_as_non_messages() {
        let frame = Frame::Text(r#"{"ok":true,"reply_to":1,"ts":"1355517523.000005"}"#.to_owned());
        let event = decode_frame(&frame).expect("ack frame should decode");
        assert!(!event.is_message());
    }

    #[test]
    fn malformed_frames_are_decode_errors() {
        let error = decode_frame(&Frame::Text("{not json".to_owned())).expect_err("bad json");
        assert!(matches!(error, DecodeError::Json(_)));

        let error = decode_frame(&Frame::Binary(vec![0xff, 0xfe])).expect_err("bad utf-8");
        assert!(matches!(error, DecodeError::NotUtf8));
    }

    #[test]
    fn outbound_message_uses_rtm_wire_shape() {
        let message = OutboundMessage::new(
            3,
            Reply { channel: "C024BE91L".to_owned(), text: "Hello!".to_owned() },
        );
        let encoded = encode_message(&message).expect("serializable");
        let value: serde_json::Value = serde_json::from_str(&encoded).expect("json");
        assert_eq!(
            value,
            serde_json::json!({"id": 3, "type": "message", "channel": "C024BE91L", "text": "Hello!"})
        );
    }
}
