//! Wire events exchanged with a connected client

use serde::{Deserialize, Serialize};

/// Events sent to the client over the session socket
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerEvent {
    Start,
    Token { text: String },
    Image,
    End { aborted: bool },
    Error { message: String },
}

impl ServerEvent {
    pub fn token(text: impl Into<String>) -> Self {
        Self::Token { text: text.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error { message: message.into() }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Token { .. } => "token",
            Self::Image => "image",
            Self::End { .. } => "end",
            Self::Error { .. } => "error",
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Requests received from the client
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientEvent {
    Ask {
        #[serde(default)]
        question: String,
        #[serde(default)]
        image: Option<String>,
    },
    Abort,
    Reset,
}
