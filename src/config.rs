use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::engine::{OnlineRouting, ResolverOptions};

#[derive(Clone, Debug)]
pub struct ModelConfig {
    pub chat_model: String,
    pub fallback_model: String,
}

#[derive(Clone, Debug)]
pub struct GenerationConfig {
    pub chat_max_tokens: u32,
    pub chat_temperature: f32,
    pub fallback_max_tokens: u32,
    pub fallback_temperature: f32,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bind_addr: String,
    pub together_api_url: String,
    pub together_api_key: Option<String>,
    pub http_timeout: Option<Duration>,
    pub knowledge_base_path: Option<PathBuf>,
    pub online_routing: OnlineRouting,
    pub degrade_on_fallback_failure: bool,
    pub models: ModelConfig,
    pub generation: GenerationConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            bind_addr: env::var("HEALTHBOT_BIND").unwrap_or_else(|_| "127.0.0.1:8080".to_string()),
            together_api_url: env::var("TOGETHER_API_URL")
                .unwrap_or_else(|_| "https://api.together.xyz/v1/chat/completions".to_string()),
            together_api_key: env::var("TOGETHER_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
            http_timeout: parse_env::<u64>("HTTP_TIMEOUT_SECS").map(Duration::from_secs),
            knowledge_base_path: env::var("KNOWLEDGE_BASE_PATH").ok().map(PathBuf::from),
            online_routing: env::var("ONLINE_ROUTING")
                .ok()
                .and_then(|v| OnlineRouting::parse(&v))
                .unwrap_or(OnlineRouting::Cascade),
            degrade_on_fallback_failure: env::var("DEGRADE_ON_FALLBACK_FAILURE")
                .ok()
                .and_then(|v| parse_bool(&v))
                .unwrap_or(true),
            models: ModelConfig {
                chat_model: env::var("CHAT_MODEL")
                    .unwrap_or_else(|_| "meta-llama/Llama-3-70b-chat-hf".to_string()),
                fallback_model: env::var("FALLBACK_MODEL")
                    .unwrap_or_else(|_| "mistral-7b-instruct".to_string()),
            },
            generation: GenerationConfig {
                chat_max_tokens: parse_env("CHAT_MAX_TOKENS").unwrap_or(1_000),
                chat_temperature: parse_env("CHAT_TEMPERATURE").unwrap_or(0.7),
                fallback_max_tokens: parse_env("FALLBACK_MAX_TOKENS").unwrap_or(200),
                fallback_temperature: parse_env("FALLBACK_TEMPERATURE").unwrap_or(0.7),
            },
        }
    }

    pub fn resolver_options(&self) -> ResolverOptions {
        ResolverOptions {
            online_routing: self.online_routing,
            degrade_on_fallback_failure: self.degrade_on_fallback_failure,
            chat_model: self.models.chat_model.clone(),
            chat_max_tokens: self.generation.chat_max_tokens,
            chat_temperature: self.generation.chat_temperature,
            fallback_model: self.models.fallback_model.clone(),
            fallback_max_tokens: self.generation.fallback_max_tokens,
            fallback_temperature: self.generation.fallback_temperature,
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
