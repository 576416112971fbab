//! Configuration store: the persisted provider credential blob, plus model
//! listing and filtering.
//!
//! The config is a single JSON file. `load` never fails - missing or
//! malformed data is logged and replaced by the default - and a
//! configuration persisted without a model is backfilled with the
//! provider's declared default on the way out.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::provider::{ProviderError, ProviderId, ProviderSettings, upstream_error_message};

/// Client-owned provider configuration. Travels with every proxy request;
/// the proxy path never persists it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            provider: ProviderId::OpenAi.as_str().into(),
            api_key: String::new(),
            model: Some(ProviderId::OpenAi.default_model().into()),
        }
    }
}

impl ApiConfig {
    /// Model to use: the configured one, else the provider default.
    pub fn resolved_model(&self) -> Option<String> {
        match self.model.as_deref() {
            Some(m) if !m.is_empty() => Some(m.to_string()),
            _ => ProviderId::parse(&self.provider).map(|id| id.default_model().to_string()),
        }
    }
}

/// Transient model metadata, fetched per provider and never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pricing: Option<ModelPricing>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelPricing {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion: Option<String>,
}

/// File-backed store for the serialized `ApiConfig`.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default location under the platform config directory.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("drawbridge")
            .join("config.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted config. Absent or malformed data yields the
    /// default; a stored config without a model gets the provider default.
    pub fn load(&self) -> ApiConfig {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(_) => return ApiConfig::default(),
        };

        let mut config: ApiConfig = match serde_json::from_str(&raw) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    "discarding malformed persisted config: {}", e
                );
                return ApiConfig::default();
            }
        };

        if config.model.as_deref().is_none_or(str::is_empty) {
            config.model = ProviderId::parse(&config.provider)
                .map(|id| id.default_model().to_string())
                .or(config.model);
        }
        config
    }

    /// Persist the config verbatim. The consuming page reloads itself after
    /// a save; that side effect lives on the client.
    pub fn save(&self, config: &ApiConfig) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(config)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("writing {}", self.path.display()))?;
        Ok(())
    }
}

/// Fetch the provider's model list with the supplied credentials.
pub async fn fetch_models(
    settings: &ProviderSettings,
    config: &ApiConfig,
) -> Result<Vec<ModelInfo>, ProviderError> {
    let id = ProviderId::parse(&config.provider)
        .ok_or_else(|| ProviderError::Unsupported(config.provider.clone()))?;
    let base = settings.base_url(id);

    let request = match id {
        ProviderId::Google => settings
            .http
            .get(format!("{base}/models"))
            .query(&[("key", config.api_key.as_str())]),
        _ => settings
            .http
            .get(format!("{base}/models"))
            .header("Authorization", format!("Bearer {}", config.api_key)),
    };

    let response = request.timeout(settings.request_timeout).send().await?;
    if !response.status().is_success() {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        return Err(ProviderError::Upstream {
            provider: id.as_str(),
            status: status.as_u16(),
            message: upstream_error_message(status, &text),
        });
    }

    let models = match id {
        ProviderId::OpenRouter => {
            let list: OpenRouterModelList = response.json().await?;
            list.data
                .into_iter()
                .map(|m| ModelInfo {
                    name: m.name.unwrap_or_else(|| m.id.clone()),
                    id: m.id,
                    description: m.description,
                    context_length: m.context_length,
                    pricing: m.pricing.map(|p| ModelPricing {
                        prompt: p.prompt,
                        completion: p.completion,
                    }),
                })
                .collect()
        }
        ProviderId::Google => {
            let list: GoogleModelList = response.json().await?;
            list.models
                .into_iter()
                .map(|m| ModelInfo {
                    id: m.name.strip_prefix("models/").unwrap_or(&m.name).to_string(),
                    name: m.display_name.unwrap_or_else(|| m.name.clone()),
                    description: m.description,
                    context_length: m.input_token_limit,
                    pricing: None,
                })
                .collect()
        }
        // OpenAI and SiliconFlow share the flat {"data":[{"id"}]} shape.
        _ => {
            let list: OpenAiModelList = response.json().await?;
            list.data
                .into_iter()
                .map(|m| ModelInfo {
                    name: m.id.clone(),
                    id: m.id,
                    description: None,
                    context_length: None,
                    pricing: None,
                })
                .collect()
        }
    };

    Ok(models)
}

/// Case-insensitive substring match over name and description.
pub fn filter_models(models: &[ModelInfo], query: &str) -> Vec<ModelInfo> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return models.to_vec();
    }
    models
        .iter()
        .filter(|m| {
            m.name.to_lowercase().contains(&query)
                || m.description
                    .as_deref()
                    .is_some_and(|d| d.to_lowercase().contains(&query))
        })
        .cloned()
        .collect()
}

// ============================================================================
// Model-list wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct OpenAiModelList {
    #[serde(default)]
    data: Vec<OpenAiModel>,
}

#[derive(Debug, Deserialize)]
struct OpenAiModel {
    id: String,
}

#[derive(Debug, Deserialize)]
struct OpenRouterModelList {
    #[serde(default)]
    data: Vec<OpenRouterModel>,
}

#[derive(Debug, Deserialize)]
struct OpenRouterModel {
    id: String,
    name: Option<String>,
    description: Option<String>,
    context_length: Option<u64>,
    pricing: Option<OpenRouterPricing>,
}

#[derive(Debug, Deserialize)]
struct OpenRouterPricing {
    prompt: Option<String>,
    completion: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleModelList {
    #[serde(default)]
    models: Vec<GoogleModel>,
}

#[derive(Debug, Deserialize)]
struct GoogleModel {
    name: String,
    #[serde(rename = "displayName")]
    display_name: Option<String>,
    description: Option<String>,
    #[serde(rename = "inputTokenLimit")]
    input_token_limit: Option<u64>,
}
