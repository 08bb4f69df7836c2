//! Shared types used across modules
//!
//! This module contains types that are used by multiple modules
//! to avoid circular dependencies.

use serde::{Deserialize, Serialize};

/// Free-form key/value detail attached to an observation
pub type ObservationContext = serde_json::Map<String, serde_json::Value>;

/// Who produced the text a signal was found in
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Lowercase name stored in observation context
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One conversation turn handed to the learning engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// What the user said
    pub user_message: String,
    /// What the assistant replied, if a reply was produced
    pub assistant_reply: Option<String>,
}

impl Turn {
    pub fn new(user_message: impl Into<String>, assistant_reply: Option<String>) -> Self {
        Self {
            user_message: user_message.into(),
            assistant_reply,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_names() {
        assert_eq!(Role::User.as_str(), "user");
        assert_eq!(Role::Assistant.as_str(), "assistant");
    }
}
