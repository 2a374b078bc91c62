//! Shared agent and routing types.

use benebot_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Agent tag for the benefits-document source.
pub const AGENT_PDF: &str = "pdf";

/// Agent tag for the claims-history source.
pub const AGENT_CLAIMS: &str = "claims";

/// Reserved agent tag for canned guardrail/greeting replies.
pub const AGENT_GUARDRAIL: &str = "guardrail";

/// Which knowledge sources a query should be answered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteDecision {
    Pdf,
    Claims,
    Both,
}

impl RouteDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteDecision::Pdf => "pdf",
            RouteDecision::Claims => "claims",
            RouteDecision::Both => "both",
        }
    }

    /// Parse a classifier reply. Input is trimmed and lower-cased first.
    pub fn parse(text: &str) -> AppResult<Self> {
        match text.trim().to_lowercase().as_str() {
            "pdf" => Ok(RouteDecision::Pdf),
            "claims" => Ok(RouteDecision::Claims),
            "both" => Ok(RouteDecision::Both),
            other => Err(AppError::Intent(format!(
                "Unrecognized route token: '{}'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for RouteDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Intent classification outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentLabel {
    InScope,
    Medical,
    OffTopic,
}

impl IntentLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentLabel::InScope => "in_scope",
            IntentLabel::Medical => "medical",
            IntentLabel::OffTopic => "off_topic",
        }
    }
}

/// Per-class similarity scores from the intent gate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntentScores {
    pub in_scope: f32,
    pub medical: f32,
    pub off_topic: f32,
}

/// A reference to a retrieved passage backing part of an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub source: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

/// Conversation message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

/// One message in a conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}
