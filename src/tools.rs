//! Tools the chat model can call, and the registry that dispatches them.
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │              ToolRegistry                │
//! │  ┌──────────────────┐ ┌───────────────┐  │
//! │  │ search_course_   │ │ get_course_   │  │
//! │  │ content          │ │ outline       │  │
//! │  └──────────────────┘ └───────────────┘  │
//! └──────────────┬───────────────────────────┘
//!                ▼
//!     ToolSession (one per query): execute → ToolResult,
//!     holds the sources of the latest search
//! ```
//!
//! Tools return a [`ToolOutput`]: the text handed back to the model, plus
//! the sources that text was built from. A [`ToolSession`] keeps those
//! sources for the duration of a single query, so concurrent queries
//! never observe each other's sources.

use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use course_rag_core::index::VectorIndex;
use course_rag_core::models::{source_label, Source};

use crate::config::ToolsConfig;
use crate::llm::ToolDefinition;

/// What a tool produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    /// Text returned to the model.
    pub content: String,
    /// `Some` replaces the session's last sources; `None` leaves them alone.
    pub sources: Option<Vec<Source>>,
}

impl ToolOutput {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            sources: None,
        }
    }

    pub fn with_sources(content: impl Into<String>, sources: Vec<Source>) -> Self {
        Self {
            content: content.into(),
            sources: Some(sources),
        }
    }
}

/// Outcome of dispatching one tool call, ready to become a `tool_result`.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub content: String,
    pub is_error: bool,
}

/// A tool the model can invoke by name.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the model uses to call the tool (e.g. `"search_course_content"`).
    fn name(&self) -> &str;

    /// Description shown to the model; it decides when to call the tool from this.
    fn description(&self) -> &str;

    /// JSON Schema (`type: "object"`) for the tool input.
    fn parameters_schema(&self) -> Value;

    /// Run the tool. Errors are reported to the model as tool errors.
    async fn execute(&self, params: Value) -> Result<ToolOutput>;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.parameters_schema(),
        }
    }
}

/// Registered tools, in registration order.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Registry with the course tools enabled by `config`.
    pub fn with_course_tools(index: Arc<VectorIndex>, config: &ToolsConfig) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(CourseSearchTool::new(index.clone())));
        if config.course_outline {
            registry.register(Box::new(CourseOutlineTool::new(index)));
        }
        registry
    }

    /// Register a tool. A tool with the same name replaces the earlier one.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.retain(|t| t.name() != tool.name());
        self.tools.push(tool);
    }

    pub fn tools(&self) -> &[Box<dyn Tool>] {
        &self.tools
    }

    pub fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    /// Definitions of every registered tool, for the model request.
    pub fn get_schemas(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    /// Dispatch a call by name. Never fails: unknown tools, invalid input,
    /// and tool faults all come back as an error result.
    pub async fn execute(&self, name: &str, params: Value) -> (ToolResult, Option<Vec<Source>>) {
        let Some(tool) = self.find(name) else {
            warn!(tool = name, "model requested unknown tool");
            return (
                ToolResult {
                    content: format!("Tool '{}' not found", name),
                    is_error: true,
                },
                None,
            );
        };

        let outcome = match check_required(&tool.parameters_schema(), &params) {
            Ok(()) => tool.execute(params).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(output) => {
                debug!(tool = name, "tool executed");
                (
                    ToolResult {
                        content: output.content,
                        is_error: false,
                    },
                    output.sources,
                )
            }
            Err(e) => {
                warn!(tool = name, error = %e, "tool failed");
                (
                    ToolResult {
                        content: format!("Error executing tool: {}", e),
                        is_error: true,
                    },
                    None,
                )
            }
        }
    }

    /// Start a per-query session over this registry.
    pub fn session(&self) -> ToolSession<'_> {
        ToolSession {
            registry: self,
            last_sources: Vec::new(),
        }
    }
}

/// Reject input that is not an object or lacks a required property.
fn check_required(schema: &Value, params: &Value) -> Result<()> {
    let Some(obj) = params.as_object() else {
        bail!("tool input must be a JSON object");
    };
    let required = schema
        .get("required")
        .and_then(|r| r.as_array())
        .into_iter()
        .flatten()
        .filter_map(|v| v.as_str());
    for field in required {
        if obj.get(field).map_or(true, Value::is_null) {
            bail!("missing required parameter: {}", field);
        }
    }
    Ok(())
}

/// Tool execution scoped to one query.
///
/// Holds the sources produced by the most recent source-tracking tool
/// call; each such call overwrites them.
pub struct ToolSession<'a> {
    registry: &'a ToolRegistry,
    last_sources: Vec<Source>,
}

impl ToolSession<'_> {
    pub async fn execute(&mut self, name: &str, params: Value) -> ToolResult {
        let (result, sources) = self.registry.execute(name, params).await;
        if let Some(sources) = sources {
            self.last_sources = sources;
        }
        result
    }

    pub fn get_last_sources(&self) -> Vec<Source> {
        self.last_sources.clone()
    }

    pub fn reset_sources(&mut self) {
        self.last_sources.clear();
    }
}

// ═══════════════════════════════════════════════════════════════════════
// search_course_content
// ═══════════════════════════════════════════════════════════════════════

/// Semantic search over course content with optional course and lesson filters.
pub struct CourseSearchTool {
    index: Arc<VectorIndex>,
}

impl CourseSearchTool {
    pub fn new(index: Arc<VectorIndex>) -> Self {
        Self { index }
    }

    async fn lesson_link(&self, course_title: &str, lesson_number: Option<u32>) -> Option<String> {
        let n = lesson_number?;
        match self.index.get_lesson_link(course_title, n).await {
            Ok(link) => link,
            Err(e) => {
                warn!(course = course_title, lesson = n, error = %e, "lesson link lookup failed");
                None
            }
        }
    }
}

#[async_trait]
impl Tool for CourseSearchTool {
    fn name(&self) -> &str {
        "search_course_content"
    }

    fn description(&self) -> &str {
        "Search course materials with smart course name matching and lesson filtering"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "What to search for in the course content"
                },
                "course_name": {
                    "type": "string",
                    "description": "Course title (partial matches work, e.g. 'MCP', 'Introduction')"
                },
                "lesson_number": {
                    "type": "integer",
                    "description": "Specific lesson number to search within (e.g. 1, 2, 3)"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolOutput> {
        let query = match params.get("query").and_then(Value::as_str) {
            Some(q) => q,
            None => bail!("parameter 'query' must be a string"),
        };
        let course_name = params
            .get("course_name")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let lesson_number = lesson_number_param(params.get("lesson_number"))?;

        let results = self.index.search(query, course_name, lesson_number).await;

        if let Some(error) = results.error {
            return Ok(ToolOutput::with_sources(error, Vec::new()));
        }

        if results.is_empty() {
            let mut message = String::from("No relevant content found");
            if let Some(name) = course_name {
                message.push_str(&format!(" in course '{}'", name));
            }
            if let Some(n) = lesson_number {
                message.push_str(&format!(" in lesson {}", n));
            }
            message.push('.');
            return Ok(ToolOutput::with_sources(message, Vec::new()));
        }

        let mut blocks = Vec::with_capacity(results.len());
        let mut sources = Vec::with_capacity(results.len());
        for (document, metadata, _) in results.iter() {
            let label = source_label(&metadata.course_title, metadata.lesson_number);
            blocks.push(format!("[{}]\n{}", label, document));
            let link = self
                .lesson_link(&metadata.course_title, metadata.lesson_number)
                .await;
            sources.push(Source { label, link });
        }

        Ok(ToolOutput::with_sources(blocks.join("\n\n"), sources))
    }
}

/// Accept a lesson number given as an integer or a numeric string.
fn lesson_number_param(value: Option<&Value>) -> Result<Option<u32>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => match n.as_u64().and_then(|n| u32::try_from(n).ok()) {
            Some(n) => Ok(Some(n)),
            None => bail!("lesson_number must be a non-negative integer, got {}", n),
        },
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => match s.trim().parse::<u32>() {
            Ok(n) => Ok(Some(n)),
            Err(_) => bail!("lesson_number must be a non-negative integer, got '{}'", s),
        },
        Some(other) => bail!("lesson_number must be a non-negative integer, got {}", other),
    }
}

// ═══════════════════════════════════════════════════════════════════════
// get_course_outline
// ═══════════════════════════════════════════════════════════════════════

/// Course structure lookup: title, link, instructor, and lesson list.
pub struct CourseOutlineTool {
    index: Arc<VectorIndex>,
}

impl CourseOutlineTool {
    pub fn new(index: Arc<VectorIndex>) -> Self {
        Self { index }
    }
}

#[async_trait]
impl Tool for CourseOutlineTool {
    fn name(&self) -> &str {
        "get_course_outline"
    }

    fn description(&self) -> &str {
        "Get a course outline: course title, course link, and the complete lesson list. \
         Use for questions about course structure or what lessons a course contains"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "course_title": {
                    "type": "string",
                    "description": "Course title (partial matches work, e.g. 'MCP', 'Introduction')"
                }
            },
            "required": ["course_title"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolOutput> {
        let name = match params.get("course_title").and_then(Value::as_str) {
            Some(n) => n,
            None => bail!("parameter 'course_title' must be a string"),
        };

        let Some(title) = self.index.resolve_course_name(name).await? else {
            return Ok(ToolOutput::text(format!("No course found matching '{}'", name)));
        };
        let Some(entry) = self.index.get_course(&title).await? else {
            return Ok(ToolOutput::text(format!("No course found matching '{}'", name)));
        };

        let mut lines = vec![format!("Course Title: {}", entry.title)];
        if let Some(link) = &entry.course_link {
            lines.push(format!("Course Link: {}", link));
        }
        if let Some(instructor) = &entry.instructor {
            lines.push(format!("Course Instructor: {}", instructor));
        }
        lines.push(format!("Lessons ({} total):", entry.lessons.len()));
        for lesson in &entry.lessons {
            lines.push(format!("Lesson {}: {}", lesson.lesson_number, lesson.title));
        }

        Ok(ToolOutput::text(lines.join("\n")))
    }
}
