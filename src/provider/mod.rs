//! Provider abstraction for the chat proxy
//!
//! Each supported LLM vendor is a `ChatProvider` binding constructed from a
//! registry keyed by provider id, so dispatch never changes when a provider
//! is added. Bindings expose one capability: submit a chat turn, receive a
//! channel of stream events. The SiliconFlow binding is an adapter over a
//! single blocking call that synthesizes a two-event stream of the same
//! shape.

mod google;
mod openai;
mod siliconflow;

pub use google::GoogleProvider;
pub use openai::OpenAiCompatProvider;
pub use siliconflow::SiliconFlowProvider;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::chat::ChatMessage;
use crate::config::DrawbridgeConfig;

/// Known provider identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    OpenAi,
    OpenRouter,
    Google,
    SiliconFlow,
}

impl ProviderId {
    pub const ALL: [ProviderId; 4] = [
        ProviderId::OpenAi,
        ProviderId::OpenRouter,
        ProviderId::Google,
        ProviderId::SiliconFlow,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "openai" => Some(ProviderId::OpenAi),
            "openrouter" => Some(ProviderId::OpenRouter),
            "google" => Some(ProviderId::Google),
            "siliconflow" => Some(ProviderId::SiliconFlow),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenAi => "openai",
            ProviderId::OpenRouter => "openrouter",
            ProviderId::Google => "google",
            ProviderId::SiliconFlow => "siliconflow",
        }
    }

    /// Model used when the client configuration names none.
    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderId::OpenAi => "gpt-4",
            ProviderId::OpenRouter => "openai/gpt-4o",
            ProviderId::Google => "gemini-1.5-pro",
            ProviderId::SiliconFlow => "Qwen/Qwen2.5-72B-Instruct",
        }
    }
}

/// Shared HTTP client plus per-provider endpoints. Base URLs come from the
/// service config so tests and self-hosted gateways can redirect them.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub http: reqwest::Client,
    pub openai_base_url: String,
    pub openrouter_base_url: String,
    pub google_base_url: String,
    pub siliconflow_base_url: String,
    pub request_timeout: Duration,
}

impl ProviderSettings {
    pub fn from_config(config: &DrawbridgeConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            openai_base_url: config.openai_base_url.clone(),
            openrouter_base_url: config.openrouter_base_url.clone(),
            google_base_url: config.google_base_url.clone(),
            siliconflow_base_url: config.siliconflow_base_url.clone(),
            request_timeout: Duration::from_secs(config.request_timeout),
        }
    }

    pub fn base_url(&self, id: ProviderId) -> &str {
        match id {
            ProviderId::OpenAi => &self.openai_base_url,
            ProviderId::OpenRouter => &self.openrouter_base_url,
            ProviderId::Google => &self.google_base_url,
            ProviderId::SiliconFlow => &self.siliconflow_base_url,
        }
    }
}

/// A tool declaration passed through to the model.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

/// One chat turn submitted to a provider.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub model: String,
    pub system: String,
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolDefinition>,
    pub temperature: f32,
}

/// Events flowing back from a provider stream.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// Incremental assistant text.
    TextDelta(String),
    /// A complete text payload, optionally tagged with the tool it stands in
    /// for. Only the divergent SiliconFlow path emits this.
    Text {
        text: String,
        tool: Option<&'static str>,
    },
    ToolCallStart {
        call_id: String,
        name: String,
    },
    ToolCallDelta {
        call_id: String,
        arguments_delta: String,
    },
    ToolCallEnd {
        call_id: String,
    },
    Error(String),
    Done,
}

/// Provider failure taxonomy.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("unsupported provider: {0}")]
    Unsupported(String),

    #[error("{provider} API error {status}: {message}")]
    Upstream {
        provider: &'static str,
        status: u16,
        message: String,
    },

    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

/// Uniform provider interface: one chat turn in, a stream of events out.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &'static str;

    /// Submit a chat turn. Events arrive on the returned channel; upstream
    /// failures after this call resolves are reported as `StreamEvent::Error`
    /// followed by `StreamEvent::Done`.
    async fn stream_chat(
        &self,
        request: ProviderRequest,
    ) -> Result<mpsc::Receiver<StreamEvent>, ProviderError>;
}

type ProviderFactory = fn(&ProviderSettings, &str) -> Box<dyn ChatProvider>;

static REGISTRY: Lazy<HashMap<ProviderId, ProviderFactory>> = Lazy::new(|| {
    let mut map: HashMap<ProviderId, ProviderFactory> = HashMap::new();
    map.insert(ProviderId::OpenAi, |s, key| {
        Box::new(OpenAiCompatProvider::openai(s, key))
    });
    map.insert(ProviderId::OpenRouter, |s, key| {
        Box::new(OpenAiCompatProvider::openrouter(s, key))
    });
    map.insert(ProviderId::Google, |s, key| {
        Box::new(GoogleProvider::new(s, key))
    });
    map.insert(ProviderId::SiliconFlow, |s, key| {
        Box::new(SiliconFlowProvider::new(s, key))
    });
    map
});

/// Construct the binding for a provider id string.
pub fn bind(
    settings: &ProviderSettings,
    provider: &str,
    api_key: &str,
) -> Result<Box<dyn ChatProvider>, ProviderError> {
    let id = ProviderId::parse(provider)
        .ok_or_else(|| ProviderError::Unsupported(provider.to_string()))?;
    let factory = REGISTRY
        .get(&id)
        .ok_or_else(|| ProviderError::Unsupported(provider.to_string()))?;
    Ok(factory(settings, api_key))
}

/// Best-effort extraction of a human-readable message from a vendor error
/// body. Falls back to the HTTP status text.
pub(crate) fn upstream_error_message(status: reqwest::StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if let Some(msg) = value.pointer("/error/message").and_then(Value::as_str) {
            return msg.to_string();
        }
        if let Some(msg) = value.get("error").and_then(Value::as_str) {
            return msg.to_string();
        }
        if let Some(msg) = value.get("message").and_then(Value::as_str) {
            return msg.to_string();
        }
    }
    status
        .canonical_reason()
        .unwrap_or("unknown error")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> ProviderSettings {
        ProviderSettings {
            http: reqwest::Client::new(),
            openai_base_url: "http://localhost:1/v1".into(),
            openrouter_base_url: "http://localhost:2/v1".into(),
            google_base_url: "http://localhost:3/v1beta".into(),
            siliconflow_base_url: "http://localhost:4/v1".into(),
            request_timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_registry_covers_all_providers() {
        for id in ProviderId::ALL {
            let bound = bind(&settings(), id.as_str(), "sk-test");
            assert!(bound.is_ok(), "provider {} should bind", id.as_str());
            assert_eq!(bound.unwrap().name(), id.as_str());
        }
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let Err(err) = bind(&settings(), "anthropic", "sk-test") else {
            panic!("unknown provider must not bind");
        };
        assert!(matches!(err, ProviderError::Unsupported(_)));
        assert!(err.to_string().contains("anthropic"));
    }

    #[test]
    fn test_default_models() {
        assert_eq!(ProviderId::OpenAi.default_model(), "gpt-4");
        assert_eq!(ProviderId::OpenRouter.default_model(), "openai/gpt-4o");
        assert_eq!(ProviderId::Google.default_model(), "gemini-1.5-pro");
    }

    #[test]
    fn test_error_message_extraction() {
        let status = reqwest::StatusCode::UNAUTHORIZED;
        assert_eq!(
            upstream_error_message(status, r#"{"error":{"message":"bad key"}}"#),
            "bad key"
        );
        assert_eq!(
            upstream_error_message(status, r#"{"error":"expired"}"#),
            "expired"
        );
        assert_eq!(
            upstream_error_message(status, r#"{"message":"nope"}"#),
            "nope"
        );
        assert_eq!(upstream_error_message(status, "<html>"), "Unauthorized");
    }
}
