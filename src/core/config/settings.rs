//! Typed process-wide settings.
//!
//! Built once at startup by [`ConfigService::load_settings`](super::ConfigService::load_settings)
//! and shared read-only afterwards. Every field has a serde default so a
//! missing `config.yml` still yields a runnable (mock mode) service.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub app: AppSettings,
    pub server: ServerSettings,
    pub llm: LlmSettings,
    pub embedding: EmbeddingSettings,
    pub vector_store: VectorStoreSettings,
    pub wikipedia: WikipediaSettings,
    pub workflow: WorkflowSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub name: String,
    pub version: String,
    pub environment: String,
    pub max_query_length: usize,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: "IMSKOS API".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            environment: "development".to_string(),
            max_query_length: 2000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            cors_allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:8501".to_string(),
                "http://127.0.0.1:3000".to_string(),
                "http://127.0.0.1:8501".to_string(),
            ],
        }
    }
}

/// OpenAI-compatible chat completion endpoint (Groq by default).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub base_url: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: Option<u32>,
    pub api_key: Option<String>,
}

impl LlmSettings {
    /// The API key, when one is actually set.
    pub fn configured_key(&self) -> Option<&str> {
        present(&self.api_key)
    }
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai/v1".to_string(),
            model: "llama-3.1-8b-instant".to_string(),
            temperature: 0.0,
            max_tokens: None,
            api_key: None,
        }
    }
}

/// OpenAI-compatible embeddings endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    /// Dimension of the mock embedder; remote models report their own.
    pub dimension: usize,
}

impl EmbeddingSettings {
    pub fn configured_key(&self) -> Option<&str> {
        present(&self.api_key)
    }
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api-inference.huggingface.co/v1".to_string(),
            model: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            api_key: None,
            dimension: 384,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VectorStoreBackend {
    #[default]
    Sqlite,
    Astra,
}

impl VectorStoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            VectorStoreBackend::Sqlite => "sqlite",
            VectorStoreBackend::Astra => "astra",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreSettings {
    pub backend: VectorStoreBackend,
    pub table_name: String,
    pub astra: AstraSettings,
}

impl Default for VectorStoreSettings {
    fn default() -> Self {
        Self {
            backend: VectorStoreBackend::Sqlite,
            table_name: "intelligent_knowledge_base".to_string(),
            astra: AstraSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AstraSettings {
    pub application_token: Option<String>,
    pub database_id: Option<String>,
    pub region: Option<String>,
    pub keyspace: String,
    /// Overrides the endpoint derived from `database_id` and `region`.
    pub api_endpoint: Option<String>,
}

impl Default for AstraSettings {
    fn default() -> Self {
        Self {
            application_token: None,
            database_id: None,
            region: None,
            keyspace: "default_keyspace".to_string(),
            api_endpoint: None,
        }
    }
}

impl AstraSettings {
    pub fn has_credentials(&self) -> bool {
        is_present(&self.application_token) && is_present(&self.database_id)
    }

    pub fn endpoint(&self) -> Option<String> {
        if let Some(endpoint) = self.api_endpoint.as_deref().filter(|e| !e.trim().is_empty()) {
            return Some(endpoint.trim_end_matches('/').to_string());
        }
        let id = self.database_id.as_deref().filter(|v| !v.is_empty())?;
        let region = self.region.as_deref().unwrap_or("us-east1");
        Some(format!("https://{}-{}.apps.astra.datastax.com", id, region))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WikipediaSettings {
    pub api_url: String,
    pub lang: String,
    pub top_k_results: usize,
    pub doc_content_chars_max: usize,
}

impl Default for WikipediaSettings {
    fn default() -> Self {
        Self {
            api_url: "https://{lang}.wikipedia.org/w/api.php".to_string(),
            lang: "en".to_string(),
            top_k_results: 2,
            doc_content_chars_max: 1000,
        }
    }
}

impl WikipediaSettings {
    pub fn resolved_api_url(&self) -> String {
        self.api_url.replace("{lang}", &self.lang)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowSettings {
    pub top_k: usize,
    pub max_context_documents: usize,
    pub provider_timeout_secs: u64,
    pub max_steps: usize,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            top_k: 4,
            max_context_documents: 5,
            provider_timeout_secs: 30,
            max_steps: 10,
        }
    }
}

impl Settings {
    /// Which external services will be served by mock adapters.
    pub fn mock_status(&self) -> BTreeMap<String, bool> {
        let mut status = BTreeMap::new();
        status.insert("groq".to_string(), !is_present(&self.llm.api_key));
        status.insert("embedding".to_string(), !is_present(&self.embedding.api_key));
        status.insert(
            "astra_db".to_string(),
            self.vector_store.backend == VectorStoreBackend::Astra
                && !self.vector_store.astra.has_credentials(),
        );
        status
    }

    pub fn mock_mode_warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if !is_present(&self.llm.api_key) {
            warnings.push("MOCK MODE: missing GROQ_API_KEY".to_string());
        }
        if !is_present(&self.embedding.api_key) {
            warnings.push("MOCK MODE: missing EMBEDDING_API_KEY".to_string());
        }
        if self.vector_store.backend == VectorStoreBackend::Astra {
            if !is_present(&self.vector_store.astra.application_token) {
                warnings.push("MOCK MODE: missing ASTRA_DB_APPLICATION_TOKEN".to_string());
            }
            if !is_present(&self.vector_store.astra.database_id) {
                warnings.push("MOCK MODE: missing ASTRA_DB_ID".to_string());
            }
        }
        warnings
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

fn is_present(value: &Option<String>) -> bool {
    present(value).is_some()
}
