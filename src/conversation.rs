use anyhow::Result;

use crate::engine::Resolver;
use crate::mode::effective_mode;
use crate::models::{ChatMode, ConversationMessage, EffectiveMode, ResolutionResult};
use crate::render::render_markdown;

pub const FAILED_TURN_MESSAGE: &str = "Sorry, I encountered an error. Please try again.";

/// Append-only turn history owned by the caller. Only [`ConversationLog::clear`] removes turns.
#[derive(Debug, Clone, Default)]
pub struct ConversationLog {
    messages: Vec<ConversationMessage>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: ConversationMessage) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    pub fn last(&self) -> Option<&ConversationMessage> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages = Vec::new();
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TurnReply {
    Resolved(ResolutionResult),
    /// The primary online call failed; the apology text was recorded instead.
    Failed { error: String },
}

#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub effective_mode: EffectiveMode,
    pub reply: TurnReply,
    pub assistant_message: ConversationMessage,
}

/// One user's chat: selected mode, history, and the resolver that answers each turn.
pub struct ChatSession {
    resolver: Resolver,
    mode: ChatMode,
    log: ConversationLog,
}

impl ChatSession {
    pub fn new(resolver: Resolver, mode: ChatMode) -> Self {
        Self {
            resolver,
            mode,
            log: ConversationLog::new(),
        }
    }

    pub fn mode(&self) -> ChatMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: ChatMode) {
        self.mode = mode;
    }

    pub fn history(&self) -> &ConversationLog {
        &self.log
    }

    pub fn clear(&mut self) {
        self.log.clear();
    }

    /// Records the user turn, resolves it against the prior history, and records the reply.
    ///
    /// Connectivity is sampled once, here. A failed resolution is still recorded as an
    /// assistant turn carrying [`FAILED_TURN_MESSAGE`].
    pub async fn submit(&mut self, query: &str, is_connected: bool) -> Result<TurnOutcome> {
        if query.trim().is_empty() {
            anyhow::bail!("query must not be blank");
        }

        let effective = effective_mode(self.mode, is_connected);
        let offline = effective.is_offline();
        let prior = self.log.messages().to_vec();
        self.log.push(ConversationMessage::user(query, offline));

        let (reply, content) = match self.resolver.resolve(query, &prior, effective).await {
            Ok(result) => {
                let content = render_markdown(&result);
                (TurnReply::Resolved(result), content)
            }
            Err(err) => {
                tracing::error!("failed to resolve query: {err}");
                (
                    TurnReply::Failed {
                        error: err.to_string(),
                    },
                    FAILED_TURN_MESSAGE.to_string(),
                )
            }
        };

        let assistant_message = ConversationMessage::assistant(content, offline);
        self.log.push(assistant_message.clone());

        Ok(TurnOutcome {
            effective_mode: effective,
            reply,
            assistant_message,
        })
    }
}
