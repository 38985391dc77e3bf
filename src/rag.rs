//! Query coordinator.
//!
//! [`RagSystem`] owns the vector index, the tool registry, the answer
//! generator, and session memory, and runs the per-query flow:
//!
//! ```text
//! lock session → read history → generate (tools in a fresh ToolSession)
//!   → take sources → reset sources → append exchange → unlock
//! ```

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::info;

use course_rag_core::chunk::ChunkParams;
use course_rag_core::embedding::EmbeddingProvider;
use course_rag_core::index::VectorIndex;
use course_rag_core::models::Source;
use course_rag_core::store::VectorStore;

use crate::config::{Config, DocumentsConfig};
use crate::embedding::create_provider;
use crate::generator::{AnswerGenerator, GenerationSettings, SystemPrompt};
use crate::ingest::{self, CourseOutcome, IngestSummary};
use crate::llm::{create_chat_model, ChatModel, DisabledChatModel};
use crate::memory::SessionManager;
use crate::sqlite_store::SqliteStore;
use crate::tools::ToolRegistry;

/// An answer plus the sources the last search drew on.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryAnswer {
    pub answer: String,
    pub sources: Vec<Source>,
}

/// Catalog analytics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CourseStats {
    pub total_courses: usize,
    pub course_titles: Vec<String>,
}

pub struct RagSystem {
    index: Arc<VectorIndex>,
    tools: ToolRegistry,
    generator: AnswerGenerator,
    sessions: SessionManager,
    chunk_params: ChunkParams,
    documents: DocumentsConfig,
    /// Serializes writes to the index.
    ingest_lock: Mutex<()>,
}

impl RagSystem {
    /// Build from configuration: SQLite store, configured embedder and model.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let model = create_chat_model(&config.llm)?;
        Self::open(config, model, false).await
    }

    /// Like [`from_config`](Self::from_config) but without a chat model,
    /// for commands that only read or write the index.
    pub async fn for_indexing(config: &Config) -> Result<Self> {
        Self::open(config, Arc::new(DisabledChatModel), false).await
    }

    /// Clear the index, then open it for indexing with the configured
    /// embedding model recorded as the new one.
    ///
    /// This is the only way past the embedding-model guard once an index
    /// built with a different model exists.
    pub async fn for_rebuild(config: &Config) -> Result<Self> {
        Self::open(config, Arc::new(DisabledChatModel), true).await
    }

    async fn open(config: &Config, model: Arc<dyn ChatModel>, rebuild: bool) -> Result<Self> {
        let embedder = create_provider(&config.embedding)?;
        let store = SqliteStore::open(&config.db).await?;
        if rebuild {
            info!("clearing existing index");
            store.clear().await?;
        }
        if config.embedding.is_enabled() {
            store
                .check_embedding_model(embedder.model_name(), embedder.dims())
                .await?;
        }
        Self::with_components(config, Arc::new(store), embedder, model)
    }

    /// Assemble from explicit parts.
    pub fn with_components(
        config: &Config,
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        model: Arc<dyn ChatModel>,
    ) -> Result<Self> {
        let index = Arc::new(VectorIndex::new(
            store,
            embedder,
            config.retrieval.max_results,
        ));
        let tools = ToolRegistry::with_course_tools(index.clone(), &config.tools);
        let prompt = SystemPrompt::from_config(&config.llm, &tools.get_schemas())?;
        let generator = AnswerGenerator::new(model, GenerationSettings::from(&config.llm), prompt);

        Ok(Self {
            index,
            tools,
            generator,
            sessions: SessionManager::new(config.memory.max_history),
            chunk_params: config.chunking.params(),
            documents: config.documents.clone(),
            ingest_lock: Mutex::new(()),
        })
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn create_session(&self) -> String {
        self.sessions.create_session()
    }

    /// Answer a question, using and extending the session's history.
    ///
    /// Model faults propagate; the session is left unchanged on error.
    pub async fn query(&self, query: &str, session_id: Option<&str>) -> Result<QueryAnswer> {
        let _guard = match session_id {
            Some(id) => Some(self.sessions.lock(id).await),
            None => None,
        };

        let history = session_id.and_then(|id| self.sessions.get_history(id));
        let prompt = format!("Answer this question about course materials: {}", query);

        let schemas = self.tools.get_schemas();
        let mut tool_session = self.tools.session();
        let answer = self
            .generator
            .generate_response(&prompt, history.as_deref(), &schemas, Some(&mut tool_session))
            .await?;

        let sources = tool_session.get_last_sources();
        tool_session.reset_sources();

        if let Some(id) = session_id {
            self.sessions.add_exchange(id, query, &answer);
        }

        info!(
            session = session_id.unwrap_or("-"),
            sources = sources.len(),
            "answered query"
        );
        Ok(QueryAnswer { answer, sources })
    }

    /// Parse and index one course document.
    ///
    /// Returns `None` when a course with the same title is already indexed.
    pub async fn add_course_document(&self, path: &Path) -> Result<Option<(String, usize)>> {
        let _guard = self.ingest_lock.lock().await;
        let parsed = ingest::load_course(path, &self.chunk_params)?;
        match ingest::index_course(&self.index, &parsed).await? {
            CourseOutcome::Added { title, chunks } => Ok(Some((title, chunks))),
            CourseOutcome::AlreadyIndexed { .. } => Ok(None),
        }
    }

    /// Index every course document under `folder`, optionally clearing first.
    pub async fn add_course_folder(&self, folder: &Path, clear_existing: bool) -> Result<IngestSummary> {
        ingest::check_folder(folder)?;
        let _guard = self.ingest_lock.lock().await;

        if clear_existing {
            info!("clearing existing index");
            self.index.clear().await?;
        }

        let paths = ingest::scan_documents(folder, &self.documents)?;
        let summary = ingest::ingest_files(&self.index, &self.chunk_params, &paths).await?;
        info!(
            folder = %folder.display(),
            courses = summary.courses_added,
            chunks = summary.chunks_added,
            skipped = summary.skipped.len(),
            failed = summary.failed.len(),
            "ingest complete"
        );
        Ok(summary)
    }

    pub async fn course_stats(&self) -> Result<CourseStats> {
        let course_titles = self.index.existing_course_titles().await?;
        Ok(CourseStats {
            total_courses: course_titles.len(),
            course_titles,
        })
    }
}

/// `crag ask`: answer one question and print the answer with its sources.
pub async fn run_ask(config: &Config, question: &str, session: Option<String>) -> Result<()> {
    let rag = RagSystem::from_config(config).await?;
    let session_id = session.unwrap_or_else(|| rag.create_session());
    let result = rag.query(question, Some(&session_id)).await?;

    println!("{}", result.answer);
    print_sources(&result.sources);
    println!();
    println!("Session: {}", session_id);
    Ok(())
}

pub(crate) fn print_sources(sources: &[Source]) {
    if sources.is_empty() {
        return;
    }
    println!();
    println!("Sources:");
    for source in sources {
        match &source.link {
            Some(link) => println!("  - {} ({})", source.label, link),
            None => println!("  - {}", source.label),
        }
    }
}
