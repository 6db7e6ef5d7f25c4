use std::sync::Arc;

use crate::core::config::{AppPaths, ConfigService, Settings, VectorStoreBackend};
use crate::graph::{AdaptiveRagWorkflow, Providers};
use crate::llm::{GroqProvider, LlmProvider, MockLlmProvider};
use crate::rag::{
    AstraDbStore, EmbeddingProvider, HashEmbedder, HttpEmbedder, IndexingService, MockRetriever,
    RagStore, Retriever, SqliteRagStore, VectorStoreRetriever,
};
use crate::tools::{KnowledgeSource, WikipediaSource};

pub mod error;

use error::InitializationError;

/// Global application state shared across all routes.
///
/// Everything here is read-only after startup: settings are resolved once
/// and providers are chosen once (production adapters when credentials are
/// present, deterministic mocks otherwise).
#[derive(Clone)]
pub struct AppState {
    pub config: ConfigService,
    pub settings: Arc<Settings>,
    pub workflow: Arc<AdaptiveRagWorkflow>,
    /// Absent when the primary store is mocked.
    pub indexer: Option<Arc<IndexingService>>,
}

impl AppState {
    pub async fn initialize() -> Result<Arc<Self>, InitializationError> {
        Self::initialize_with_paths(Arc::new(AppPaths::new())).await
    }

    /// Initializes the application state.
    ///
    /// 1. Load and validate settings (files, then environment)
    /// 2. Pick the LLM, embedder and primary store adapters
    /// 3. Build the workflow graph
    pub async fn initialize_with_paths(
        paths: Arc<AppPaths>,
    ) -> Result<Arc<Self>, InitializationError> {
        let config = ConfigService::new(paths.clone());
        let settings = Arc::new(config.load_settings().map_err(InitializationError::Config)?);

        for warning in settings.mock_mode_warnings() {
            tracing::warn!("{}", warning);
        }

        let embedder: Arc<dyn EmbeddingProvider> = match settings.embedding.configured_key() {
            Some(key) => Arc::new(HttpEmbedder::from_settings(&settings.embedding, key.to_string())),
            None => Arc::new(HashEmbedder::new(settings.embedding.dimension)),
        };

        let store = open_store(&paths, &settings).await?;

        let retriever: Arc<dyn Retriever> = match &store {
            Some(store) => Arc::new(VectorStoreRetriever::new(embedder.clone(), store.clone())),
            None => Arc::new(MockRetriever::new()),
        };
        let indexer = store.map(|store| Arc::new(IndexingService::new(embedder, store)));

        let llm: Arc<dyn LlmProvider> = match settings.llm.configured_key() {
            Some(key) => Arc::new(GroqProvider::from_settings(&settings.llm, key.to_string())),
            None => Arc::new(MockLlmProvider::new()),
        };
        let knowledge: Arc<dyn KnowledgeSource> = Arc::new(WikipediaSource::new(&settings.wikipedia));

        tracing::info!(
            "Providers: llm={}, retriever={}, knowledge={}",
            llm.name(),
            retriever.name(),
            knowledge.name()
        );

        let providers = Providers {
            llm,
            retriever,
            knowledge,
        };
        let workflow = Arc::new(
            AdaptiveRagWorkflow::new(providers, settings.clone())
                .map_err(InitializationError::Graph)?,
        );

        Ok(Arc::new(AppState {
            config,
            settings,
            workflow,
            indexer,
        }))
    }
}

async fn open_store(
    paths: &AppPaths,
    settings: &Settings,
) -> Result<Option<Arc<dyn RagStore>>, InitializationError> {
    let table = &settings.vector_store.table_name;
    match settings.vector_store.backend {
        VectorStoreBackend::Sqlite => {
            let store = SqliteRagStore::with_path(paths.db_path.clone(), table)
                .await
                .map_err(InitializationError::Store)?;
            Ok(Some(Arc::new(store)))
        }
        VectorStoreBackend::Astra => {
            let astra = &settings.vector_store.astra;
            if !astra.has_credentials() {
                return Ok(None);
            }
            Ok(AstraDbStore::from_settings(astra, table)
                .map(|store| Arc::new(store) as Arc<dyn RagStore>))
        }
    }
}
