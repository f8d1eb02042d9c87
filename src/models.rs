use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConditionEntry {
    pub name: String,
    pub description: String,
    pub symptoms: Vec<String>,
    pub questions: Vec<String>,
    #[serde(default)]
    pub precautions: Vec<String>,
}

impl ConditionEntry {
    /// Name as shown to users and used for name matching: underscores become spaces.
    pub fn display_name(&self) -> String {
        self.name.replace('_', " ")
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationMessage {
    #[serde(default = "new_message_id")]
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub is_offline: bool,
}

impl ConversationMessage {
    pub fn new(role: Role, content: impl Into<String>, is_offline: bool) -> Self {
        Self {
            id: new_message_id(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            is_offline,
        }
    }

    pub fn user(content: impl Into<String>, is_offline: bool) -> Self {
        Self::new(Role::User, content, is_offline)
    }

    pub fn assistant(content: impl Into<String>, is_offline: bool) -> Self {
        Self::new(Role::Assistant, content, is_offline)
    }
}

fn new_message_id() -> String {
    Uuid::new_v4().to_string()
}

/// Mode picked by the user in the UI.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChatMode {
    Online,
    Offline,
    #[default]
    Auto,
}

impl ChatMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "online" => Some(ChatMode::Online),
            "offline" => Some(ChatMode::Offline),
            "auto" => Some(ChatMode::Auto),
            _ => None,
        }
    }
}

/// Routing decision after connectivity has been applied to a [`ChatMode`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EffectiveMode {
    Online,
    Offline,
}

impl EffectiveMode {
    pub fn is_offline(self) -> bool {
        matches!(self, EffectiveMode::Offline)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ConfidenceLevel {
    #[serde(rename = "low")]
    Low,
    #[serde(rename = "medium-high")]
    MediumHigh,
}

impl ConfidenceLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            ConfidenceLevel::Low => "low",
            ConfidenceLevel::MediumHigh => "medium-high",
        }
    }
}

/// One ranked condition as presented to the caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchSummary {
    pub name: String,
    pub score: u32,
    pub description: String,
    pub symptoms: Vec<String>,
    pub question: Option<String>,
    pub summary: String,
    pub precautions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResolutionResult {
    #[serde(rename = "text")]
    PlainText { content: String, disclaimer: String },
    #[serde(rename = "expert")]
    ExpertMatches {
        matches: Vec<MatchSummary>,
        confidence: ConfidenceLevel,
        disclaimer: String,
    },
    AiFallback {
        matches: Vec<MatchSummary>,
        ai_summary: String,
        disclaimer: String,
    },
    AiOnly { content: String },
}

impl ResolutionResult {
    pub fn kind(&self) -> &'static str {
        match self {
            ResolutionResult::PlainText { .. } => "text",
            ResolutionResult::ExpertMatches { .. } => "expert",
            ResolutionResult::AiFallback { .. } => "ai_fallback",
            ResolutionResult::AiOnly { .. } => "ai_only",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveRequest {
    pub query: String,
    #[serde(default)]
    pub history: Vec<ConversationMessage>,
    #[serde(default)]
    pub mode: ChatMode,
    #[serde(default = "default_true")]
    pub is_connected: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveResponse {
    pub effective_mode: EffectiveMode,
    pub result: ResolutionResult,
    pub rendered: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeRequest {
    pub mode: ChatMode,
    #[serde(default = "default_true")]
    pub is_connected: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeResponse {
    pub effective_mode: EffectiveMode,
}

fn default_true() -> bool {
    true
}
