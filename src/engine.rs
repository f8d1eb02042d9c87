use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::knowledge::KnowledgeBase;
use crate::models::{
    ConfidenceLevel, ConversationMessage, EffectiveMode, MatchSummary, ResolutionResult,
};
use crate::scoring::{classify, rank, top_matches};
use crate::together::{ChatCompletion, CompletionRequest, RemoteError};
use crate::tokenizer::tokenize;

pub const CLARIFY_MESSAGE: &str = "I understand you're not feeling well. Could you mention specific symptoms like fever, cough, headache, or diarrhoea?";
pub const TEXT_DISCLAIMER: &str =
    "⚠️ This is not medical advice. Please consult a qualified healthcare professional.";
pub const EXPERT_DISCLAIMER: &str = "⚠️ This system provides general health information and is not a substitute for professional medical advice.";
pub const FALLBACK_DISCLAIMER: &str = "⚠️ This is informational only, not a medical diagnosis. Always consult a qualified healthcare professional.";

const CHAT_SYSTEM_PROMPT: &str = "You are a helpful medical assistant. Provide accurate health information but always remind users to consult with healthcare professionals for medical advice. Be empathetic, clear, and concise.";
const FALLBACK_SYSTEM_PROMPT: &str =
    "You are a medical information assistant. Provide safe, factual, non-diagnostic advice.";

/// How an online query is routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnlineRouting {
    /// Rule match first, remote enrichment only on low confidence.
    Cascade,
    /// Conversational model only, rule engine bypassed.
    Direct,
}

impl OnlineRouting {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cascade" => Some(OnlineRouting::Cascade),
            "direct" => Some(OnlineRouting::Direct),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolverOptions {
    pub online_routing: OnlineRouting,
    /// When false, a failed fallback call is returned as an error instead of the rule result.
    pub degrade_on_fallback_failure: bool,
    pub chat_model: String,
    pub chat_max_tokens: u32,
    pub chat_temperature: f32,
    pub fallback_model: String,
    pub fallback_max_tokens: u32,
    pub fallback_temperature: f32,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            online_routing: OnlineRouting::Cascade,
            degrade_on_fallback_failure: true,
            chat_model: "meta-llama/Llama-3-70b-chat-hf".to_string(),
            chat_max_tokens: 1_000,
            chat_temperature: 0.7,
            fallback_model: "mistral-7b-instruct".to_string(),
            fallback_max_tokens: 200,
            fallback_temperature: 0.7,
        }
    }
}

/// Outcome of the rule stage, before any remote call.
enum RuleOutcome {
    NoMatch,
    Classified {
        matches: Vec<MatchSummary>,
        confidence: ConfidenceLevel,
    },
}

#[derive(Clone)]
pub struct Resolver {
    kb: Arc<KnowledgeBase>,
    backend: Arc<dyn ChatCompletion>,
    options: ResolverOptions,
}

impl Resolver {
    pub fn new(
        kb: Arc<KnowledgeBase>,
        backend: Arc<dyn ChatCompletion>,
        options: ResolverOptions,
    ) -> Self {
        Self {
            kb,
            backend,
            options,
        }
    }

    pub fn knowledge_base(&self) -> &KnowledgeBase {
        &self.kb
    }

    /// Resolves one query. `history` is read for context only.
    ///
    /// Errors only come from the direct online path, or from a failed fallback when
    /// degradation is disabled.
    pub async fn resolve(
        &self,
        query: &str,
        history: &[ConversationMessage],
        mode: EffectiveMode,
    ) -> Result<ResolutionResult, RemoteError> {
        match (mode, self.options.online_routing) {
            (EffectiveMode::Offline, _) => Ok(self.resolve_rules_only(query)),
            (EffectiveMode::Online, OnlineRouting::Direct) => {
                self.resolve_direct(query, history).await
            }
            (EffectiveMode::Online, OnlineRouting::Cascade) => self.resolve_cascade(query).await,
        }
    }

    /// Rule engine without any remote call; low confidence still yields expert matches.
    pub fn resolve_rules_only(&self, query: &str) -> ResolutionResult {
        match self.match_rules(query) {
            RuleOutcome::NoMatch => no_match(),
            RuleOutcome::Classified {
                matches,
                confidence,
            } => expert(matches, confidence),
        }
    }

    async fn resolve_cascade(&self, query: &str) -> Result<ResolutionResult, RemoteError> {
        let (matches, confidence) = match self.match_rules(query) {
            RuleOutcome::NoMatch => return Ok(no_match()),
            RuleOutcome::Classified {
                matches,
                confidence,
            } => (matches, confidence),
        };

        if confidence == ConfidenceLevel::MediumHigh {
            return Ok(expert(matches, confidence));
        }

        match self.fallback_summary(query).await {
            Ok(ai_summary) => Ok(ResolutionResult::AiFallback {
                matches,
                ai_summary,
                disclaimer: FALLBACK_DISCLAIMER.to_string(),
            }),
            Err(err) if self.options.degrade_on_fallback_failure => {
                tracing::warn!("fallback completion failed, using rule matches: {err}");
                Ok(expert(matches, confidence))
            }
            Err(err) => Err(err),
        }
    }

    async fn resolve_direct(
        &self,
        query: &str,
        history: &[ConversationMessage],
    ) -> Result<ResolutionResult, RemoteError> {
        let content = self
            .backend
            .complete(CompletionRequest {
                model: &self.options.chat_model,
                system_prompt: CHAT_SYSTEM_PROMPT,
                history,
                query,
                max_tokens: self.options.chat_max_tokens,
                temperature: self.options.chat_temperature,
            })
            .await?;

        if content.trim().is_empty() {
            return Err(RemoteError::MissingContent);
        }
        Ok(ResolutionResult::AiOnly { content })
    }

    fn match_rules(&self, query: &str) -> RuleOutcome {
        let tokens = tokenize(query);
        if tokens.is_empty() {
            tracing::debug!("query has no usable tokens");
            return RuleOutcome::NoMatch;
        }

        let ranked = rank(&self.kb, &tokens);
        let matches = top_matches(&ranked);
        let Some(confidence) = classify(&matches) else {
            tracing::debug!(tokens = tokens.len(), "no condition matched");
            return RuleOutcome::NoMatch;
        };

        tracing::debug!(
            top = %matches[0].name,
            score = matches[0].score,
            confidence = confidence.as_str(),
            "rule match"
        );
        RuleOutcome::Classified {
            matches,
            confidence,
        }
    }

    async fn fallback_summary(&self, query: &str) -> Result<String, RemoteError> {
        let prompt = fallback_prompt(query);
        let summary = self
            .backend
            .complete(CompletionRequest {
                model: &self.options.fallback_model,
                system_prompt: FALLBACK_SYSTEM_PROMPT,
                history: &[],
                query: &prompt,
                max_tokens: self.options.fallback_max_tokens,
                temperature: self.options.fallback_temperature,
            })
            .await?;

        if summary.trim().is_empty() {
            return Err(RemoteError::MissingContent);
        }
        Ok(summary)
    }
}

fn fallback_prompt(query: &str) -> String {
    format!(
        "Patient query: {query}. Symptoms detected: {}.",
        tokenize(query).join(", ")
    )
}

fn no_match() -> ResolutionResult {
    ResolutionResult::PlainText {
        content: CLARIFY_MESSAGE.to_string(),
        disclaimer: TEXT_DISCLAIMER.to_string(),
    }
}

fn expert(matches: Vec<MatchSummary>, confidence: ConfidenceLevel) -> ResolutionResult {
    ResolutionResult::ExpertMatches {
        matches,
        confidence,
        disclaimer: EXPERT_DISCLAIMER.to_string(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use reqwest::StatusCode;

    use super::*;
    use crate::models::ConditionEntry;

    #[derive(Debug, Clone)]
    pub(crate) struct SeenRequest {
        pub model: String,
        pub system_prompt: String,
        pub history_len: usize,
        pub query: String,
        pub max_tokens: u32,
    }

    /// Deterministic backend: answers with `reply`, or fails with a 503 when `reply` is `None`.
    pub(crate) struct StubBackend {
        reply: Option<String>,
        calls: AtomicUsize,
        seen: Mutex<Vec<SeenRequest>>,
    }

    impl StubBackend {
        pub(crate) fn replying(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Some(reply.to_string()),
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            })
        }

        pub(crate) fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: None,
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            })
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub(crate) fn seen(&self) -> Vec<SeenRequest> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatCompletion for StubBackend {
        async fn complete(&self, request: CompletionRequest<'_>) -> Result<String, RemoteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(SeenRequest {
                model: request.model.to_string(),
                system_prompt: request.system_prompt.to_string(),
                history_len: request.history.len(),
                query: request.query.to_string(),
                max_tokens: request.max_tokens,
            });
            match &self.reply {
                Some(reply) => Ok(reply.clone()),
                None => Err(RemoteError::Status {
                    status: StatusCode::SERVICE_UNAVAILABLE,
                    body: "unavailable".to_string(),
                }),
            }
        }
    }

    fn entry(name: &str, symptoms: &[&str]) -> ConditionEntry {
        ConditionEntry {
            name: name.to_string(),
            description: format!("{name} description"),
            symptoms: symptoms.iter().map(|s| s.to_string()).collect(),
            questions: vec![format!("How long have you had {name}?")],
            precautions: vec![],
        }
    }

    pub(crate) fn test_kb() -> Arc<KnowledgeBase> {
        Arc::new(
            KnowledgeBase::from_entries(vec![
                entry("flu", &["fever", "body aches", "chills", "cough"]),
                entry("migraine", &["throbbing headache", "nausea", "sensitivity to light"]),
                entry("stomach_bug", &["vomiting", "nausea", "diarrhoea"]),
            ])
            .unwrap(),
        )
    }

    pub(crate) fn resolver(backend: Arc<StubBackend>, options: ResolverOptions) -> Resolver {
        Resolver::new(test_kb(), backend, options)
    }

    #[tokio::test]
    async fn no_match_is_plain_text_without_remote_call() {
        let backend = StubBackend::replying("unused");
        let resolver = resolver(backend.clone(), ResolverOptions::default());

        for mode in [EffectiveMode::Offline, EffectiveMode::Online] {
            let result = resolver.resolve("xyz qqq", &[], mode).await.unwrap();
            assert_eq!(
                result,
                ResolutionResult::PlainText {
                    content: CLARIFY_MESSAGE.to_string(),
                    disclaimer: TEXT_DISCLAIMER.to_string(),
                }
            );
        }
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn punctuation_only_query_is_no_match() {
        let backend = StubBackend::replying("unused");
        let resolver = resolver(backend.clone(), ResolverOptions::default());
        let result = resolver.resolve("?!", &[], EffectiveMode::Online).await.unwrap();
        assert_eq!(result.kind(), "text");
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn two_symptoms_are_confident_without_remote_call() {
        let backend = StubBackend::replying("unused");
        let resolver = resolver(backend.clone(), ResolverOptions::default());

        let result = resolver
            .resolve("chills and aches", &[], EffectiveMode::Online)
            .await
            .unwrap();
        match result {
            ResolutionResult::ExpertMatches {
                matches,
                confidence,
                disclaimer,
            } => {
                assert_eq!(confidence, ConfidenceLevel::MediumHigh);
                assert_eq!(matches[0].name, "flu");
                assert_eq!(matches[0].score, 2);
                assert_eq!(disclaimer, EXPERT_DISCLAIMER);
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn low_confidence_online_uses_fallback() {
        let backend = StubBackend::replying("Chills can accompany many infections.");
        let resolver = resolver(backend.clone(), ResolverOptions::default());
        let history = vec![ConversationMessage::user("earlier turn", false)];

        let result = resolver
            .resolve("Chills!", &history, EffectiveMode::Online)
            .await
            .unwrap();
        match result {
            ResolutionResult::AiFallback {
                matches,
                ai_summary,
                disclaimer,
            } => {
                assert_eq!(matches.len(), 1);
                assert_eq!(matches[0].name, "flu");
                assert_eq!(matches[0].score, 1);
                assert_eq!(ai_summary, "Chills can accompany many infections.");
                assert_eq!(disclaimer, FALLBACK_DISCLAIMER);
            }
            other => panic!("unexpected result: {other:?}"),
        }

        let seen = backend.seen();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].model, "mistral-7b-instruct");
        assert_eq!(seen[0].system_prompt, FALLBACK_SYSTEM_PROMPT);
        assert_eq!(seen[0].history_len, 0);
        assert_eq!(seen[0].max_tokens, 200);
        assert_eq!(seen[0].query, "Patient query: Chills!. Symptoms detected: chills.");
    }

    #[tokio::test]
    async fn failed_fallback_degrades_to_expert_matches() {
        let backend = StubBackend::failing();
        let resolver = resolver(backend.clone(), ResolverOptions::default());

        let result = resolver
            .resolve("chills", &[], EffectiveMode::Online)
            .await
            .unwrap();
        match result {
            ResolutionResult::ExpertMatches {
                matches,
                confidence,
                ..
            } => {
                assert_eq!(confidence, ConfidenceLevel::Low);
                assert_eq!(matches[0].name, "flu");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn blank_fallback_text_degrades() {
        let backend = StubBackend::replying("   ");
        let resolver = resolver(backend.clone(), ResolverOptions::default());
        let result = resolver
            .resolve("chills", &[], EffectiveMode::Online)
            .await
            .unwrap();
        assert_eq!(result.kind(), "expert");
    }

    #[tokio::test]
    async fn failed_fallback_surfaces_when_degradation_disabled() {
        let backend = StubBackend::failing();
        let options = ResolverOptions {
            degrade_on_fallback_failure: false,
            ..ResolverOptions::default()
        };
        let resolver = resolver(backend, options);

        let err = resolver
            .resolve("chills", &[], EffectiveMode::Online)
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Status { .. }));
    }

    #[tokio::test]
    async fn offline_never_calls_remote_even_on_low_confidence() {
        let backend = StubBackend::replying("unused");
        let resolver = resolver(backend.clone(), ResolverOptions::default());

        let result = resolver
            .resolve("chills", &[], EffectiveMode::Offline)
            .await
            .unwrap();
        match result {
            ResolutionResult::ExpertMatches { confidence, .. } => {
                assert_eq!(confidence, ConfidenceLevel::Low)
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn direct_routing_sends_history_and_skips_rules() {
        let backend = StubBackend::replying("Please describe your symptoms.");
        let options = ResolverOptions {
            online_routing: OnlineRouting::Direct,
            ..ResolverOptions::default()
        };
        let resolver = resolver(backend.clone(), options);
        let history = vec![
            ConversationMessage::user("hello", false),
            ConversationMessage::assistant("Hi, how can I help?", false),
        ];

        let result = resolver
            .resolve("I have chills and aches", &history, EffectiveMode::Online)
            .await
            .unwrap();
        assert_eq!(
            result,
            ResolutionResult::AiOnly {
                content: "Please describe your symptoms.".to_string()
            }
        );

        let seen = backend.seen();
        assert_eq!(seen[0].model, "meta-llama/Llama-3-70b-chat-hf");
        assert_eq!(seen[0].system_prompt, CHAT_SYSTEM_PROMPT);
        assert_eq!(seen[0].history_len, 2);
        assert_eq!(seen[0].query, "I have chills and aches");
        assert_eq!(seen[0].max_tokens, 1000);
    }

    #[tokio::test]
    async fn direct_routing_failure_is_surfaced() {
        let options = ResolverOptions {
            online_routing: OnlineRouting::Direct,
            ..ResolverOptions::default()
        };
        let resolver = resolver(StubBackend::failing(), options);
        assert!(resolver
            .resolve("hello", &[], EffectiveMode::Online)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn direct_routing_is_ignored_offline() {
        let backend = StubBackend::replying("unused");
        let options = ResolverOptions {
            online_routing: OnlineRouting::Direct,
            ..ResolverOptions::default()
        };
        let resolver = resolver(backend.clone(), options);
        let result = resolver
            .resolve("nausea", &[], EffectiveMode::Offline)
            .await
            .unwrap();
        assert_eq!(result.kind(), "expert");
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn identical_inputs_give_identical_results() {
        let backend = StubBackend::replying("Same text every time.");
        let resolver = resolver(backend, ResolverOptions::default());
        let history = vec![ConversationMessage::user("hi", false)];

        for query in ["chills", "chills aches", "migraine", "nothing here"] {
            let first = resolver
                .resolve(query, &history, EffectiveMode::Online)
                .await
                .unwrap();
            let second = resolver
                .resolve(query, &history, EffectiveMode::Online)
                .await
                .unwrap();
            assert_eq!(first, second);
        }
    }

    #[tokio::test]
    async fn builtin_table_names_migraine() {
        let backend = StubBackend::replying("unused");
        let resolver = Resolver::new(
            Arc::new(KnowledgeBase::builtin()),
            backend.clone(),
            ResolverOptions::default(),
        );

        let result = resolver
            .resolve("Migraine", &[], EffectiveMode::Online)
            .await
            .unwrap();
        match result {
            ResolutionResult::ExpertMatches {
                matches,
                confidence,
                ..
            } => {
                assert_eq!(matches[0].name, "migraine");
                assert_eq!(matches[0].score, 5);
                assert_eq!(confidence, ConfidenceLevel::MediumHigh);
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(backend.calls(), 0);
    }

    #[test]
    fn routing_names_parse() {
        assert_eq!(OnlineRouting::parse("Direct"), Some(OnlineRouting::Direct));
        assert_eq!(OnlineRouting::parse("cascade"), Some(OnlineRouting::Cascade));
        assert_eq!(OnlineRouting::parse("other"), None);
    }
}
