//! Conversation turns as seen by the generation engine

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Content {
    Text { text: String },
    Image { url: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: Vec<Content>,
}

impl Turn {
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, vec![Content::Text { text: text.into() }])
    }

    /// User turn; the image reference, when present, precedes the text.
    pub fn user(text: impl Into<String>, image: Option<String>) -> Self {
        let mut content = Vec::with_capacity(2);
        if let Some(url) = image {
            content.push(Content::Image { url });
        }
        content.push(Content::Text { text: text.into() });
        Self::new(Role::User, content)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, vec![Content::Text { text: text.into() }])
    }

    fn new(role: Role, content: Vec<Content>) -> Self {
        Self { role, content }
    }

    /// Concatenated text parts of this turn
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| match c {
                Content::Text { text } => Some(text.as_str()),
                Content::Image { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    pub fn image(&self) -> Option<&str> {
        self.content.iter().find_map(|c| match c {
            Content::Image { url } => Some(url.as_str()),
            Content::Text { .. } => None,
        })
    }
}
