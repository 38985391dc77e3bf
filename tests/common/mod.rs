//! Shared fixtures: a deterministic embedder, a scripted chat model, and
//! sample course documents.

#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tempfile::TempDir;

use course_rag::config::Config;
use course_rag::llm::{
    ChatModel, ChatRequest, ChatResponse, ContentBlock, LlmError, StopReason,
};
use course_rag::rag::RagSystem;
use course_rag::sqlite_store::SqliteStore;
use course_rag_core::embedding::EmbeddingProvider;

pub const RUST_COURSE: &str = "Course Title: Introduction to Rust Programming
Course Link: https://example.com/rust
Course Instructor: Ferris Crab

Lesson 1: Ownership
Lesson Link: https://example.com/rust/lesson-1
Ownership rules govern memory. Each value has a single owner. When the owner goes out of scope the value is dropped.

Lesson 2: Borrowing
Lesson Link: https://example.com/rust/lesson-2
References borrow values without taking ownership. Mutable references are exclusive.
";

pub const PYTHON_COURSE: &str = "Course Title: Advanced Python Data Science
Course Link: https://example.com/python
Course Instructor: Ada Lovelace

Lesson 1: Pandas
Lesson Link: https://example.com/python/lesson-1
Pandas dataframes hold tabular data. Pandas makes grouping and joining fast.

Lesson 2: NumPy
NumPy arrays store numbers in contiguous memory. Vectorized operations avoid loops.
";

/// Bag-of-words hashing embedder: texts sharing words land close together.
pub struct WordHashEmbedder;

#[async_trait]
impl EmbeddingProvider for WordHashEmbedder {
    fn model_name(&self) -> &str {
        "word-hash"
    }

    fn dims(&self) -> usize {
        256
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                let mut v = vec![0.0f32; 256];
                for w in t.to_lowercase().split(|c: char| !c.is_alphanumeric()) {
                    if w.is_empty() {
                        continue;
                    }
                    let h = w
                        .bytes()
                        .fold(7u64, |h, b| h.wrapping_mul(31).wrapping_add(b as u64));
                    v[(h % 256) as usize] += 1.0;
                }
                v
            })
            .collect())
    }
}

/// Chat model that searches with a fixed input, then answers from the
/// first line of the tool result. Records every request.
pub struct ScriptedChatModel {
    search_input: Option<Value>,
    /// When set, only questions containing this text trigger the search.
    trigger: Option<String>,
    fail: bool,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedChatModel {
    /// Always calls `search_course_content` with `input` first.
    pub fn searching(input: Value) -> Arc<Self> {
        Arc::new(Self {
            search_input: Some(input),
            trigger: None,
            fail: false,
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Searches with `input` only for questions containing `trigger`;
    /// everything else gets a direct answer.
    pub fn searching_when(trigger: &str, input: Value) -> Arc<Self> {
        Arc::new(Self {
            search_input: Some(input),
            trigger: Some(trigger.to_string()),
            fail: false,
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Answers directly without tools.
    pub fn direct() -> Arc<Self> {
        Arc::new(Self {
            search_input: None,
            trigger: None,
            fail: false,
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Every call fails like an unreachable service.
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            search_input: None,
            trigger: None,
            fail: true,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

fn text(t: String) -> ChatResponse {
    ChatResponse {
        content: vec![ContentBlock::Text { text: t }],
        stop_reason: StopReason::EndTurn,
    }
}

#[async_trait]
impl ChatModel for ScriptedChatModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse> {
        self.requests.lock().unwrap().push(request.clone());
        if self.fail {
            return Err(LlmError::Request("service unavailable".to_string()).into());
        }

        let tool_result = request
            .messages
            .last()
            .and_then(|m| m.content.first())
            .and_then(|b| match b {
                ContentBlock::ToolResult { content, .. } => Some(content.clone()),
                _ => None,
            });
        if let Some(content) = tool_result {
            let first = content.lines().next().unwrap_or_default().to_string();
            return Ok(text(format!("Answer from search: {}", first)));
        }

        let question = request
            .messages
            .first()
            .and_then(|m| m.content.first())
            .and_then(|b| match b {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .unwrap_or_default();
        let triggered = self
            .trigger
            .as_deref()
            .map_or(true, |t| question.contains(t));

        match (&self.search_input, &request.tools) {
            (Some(input), Some(_)) if triggered => Ok(ChatResponse {
                content: vec![ContentBlock::ToolUse {
                    id: "toolu_01".to_string(),
                    name: "search_course_content".to_string(),
                    input: input.clone(),
                }],
                stop_reason: StopReason::ToolUse,
            }),
            _ => Ok(text("General answer.".to_string())),
        }
    }
}

pub fn write_courses(dir: &Path) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join("rust.txt"), RUST_COURSE).unwrap();
    std::fs::write(dir.join("python.txt"), PYTHON_COURSE).unwrap();
}

pub fn test_config(tmp: &TempDir) -> Config {
    let content = format!(
        r#"
[db]
path = "{}"

[documents]
root = "{}"
"#,
        tmp.path().join("data").join("crag.sqlite").display(),
        tmp.path().join("docs").display()
    );
    let config: Config = toml::from_str(&content).unwrap();
    course_rag::config::validate(&config).unwrap();
    config
}

/// A `RagSystem` over a SQLite store in `tmp`, with the test embedder.
pub async fn rag_system(tmp: &TempDir, model: Arc<dyn ChatModel>) -> RagSystem {
    let config = test_config(tmp);
    let store = SqliteStore::open(&config.db).await.unwrap();
    RagSystem::with_components(&config, Arc::new(store), Arc::new(WordHashEmbedder), model)
        .unwrap()
}

/// Same as [`rag_system`] with both sample courses ingested.
pub async fn seeded_rag_system(tmp: &TempDir, model: Arc<dyn ChatModel>) -> RagSystem {
    let docs = tmp.path().join("docs");
    write_courses(&docs);
    let rag = rag_system(tmp, model).await;
    let summary = rag.add_course_folder(&docs, false).await.unwrap();
    assert_eq!(summary.courses_added, 2, "{:?}", summary);
    rag
}
