use std::fmt;

use serde::{Deserialize, Serialize};

/// The bot's own user id in the chat workspace.
///
/// Obtained once from session negotiation and never mutated afterwards; the
/// runner hands out clones or borrows, there is no shared mutable copy.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BotIdentity(pub String);

impl BotIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The literal `<@ID>` form the chat backend uses when a user mentions the bot.
    pub fn mention(&self) -> String {
        format!("<@{}>", self.0)
    }
}

impl fmt::Display for BotIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of session negotiation: where to connect and who we are.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionInfo {
    pub socket_url: String,
    pub identity: BotIdentity,
}

#[cfg(test)]
mod tests {
    use super::BotIdentity;

    #[test]
    fn mention_wraps_id_in_angle_brackets() {
        let identity = BotIdentity::new("U024BE7LH");
        assert_eq!(identity.mention(), "<@U024BE7LH>");
        assert_eq!(identity.to_string(), "U024BE7LH");
    }
}
