//! Answer generation with tool calling.
//!
//! [`AnswerGenerator::generate_response`] drives the model through at most
//! `max_tool_rounds` tool rounds:
//!
//! ```text
//! call 1: [user]                              tools offered
//!    │ stop_reason == tool_use
//!    ▼
//! execute every tool_use block (in order)
//!    │
//!    ▼
//! call 2: [user, assistant(tool_use…), user(tool_result…)]
//!         tools offered only while rounds remain
//!    │
//!    ▼
//! first text block ─► answer
//! ```
//!
//! Tool faults are reported back to the model as error results; model
//! faults propagate to the caller.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use crate::config::LlmConfig;
use crate::llm::{ChatModel, ChatRequest, ContentBlock, Message, StopReason, ToolDefinition};
use crate::tools::ToolSession;

/// Returned when the model produces no text at all.
pub const NO_RESPONSE_TEXT: &str = "Unable to generate response.";

const BASE_PROMPT: &str = "\
You are an AI assistant specialized in course materials and educational content, \
with tools for looking up course information.";

const RESPONSE_PROTOCOL: &str = "\
Response protocol:
- General knowledge questions: answer from existing knowledge without using tools
- Course-specific questions: use a tool first, then answer
- If a tool yields no results, say so plainly without offering alternatives
- No meta-commentary: do not mention searches, tools, or how you classified the question

Every response must be:
1. Brief and focused on what was asked
2. Educational
3. Clear
4. Supported by an example when one aids understanding

Provide only the direct answer to what was asked.";

/// The system prompt, rendered once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemPrompt(String);

impl SystemPrompt {
    /// Build the built-in prompt for the given tools and round limit.
    pub fn render(tools: &[ToolDefinition], max_tool_rounds: usize) -> Self {
        let mut prompt = String::from(BASE_PROMPT);
        prompt.push_str("\n\n");

        if !tools.is_empty() {
            prompt.push_str("Available tools:\n");
            for tool in tools {
                prompt.push_str(&format!("- {}: {}\n", tool.name, tool.description));
            }
            prompt.push_str("\nTool usage:\n");
            prompt.push_str(
                "- Use the content search tool only for questions about specific course content\n",
            );
            if tools.iter().any(|t| t.name == "get_course_outline") {
                prompt.push_str(
                    "- For outline or structure questions, use the outline tool and answer with \
                     the course title, course link, and every lesson's number and title\n",
                );
            }
            if max_tool_rounds <= 1 {
                prompt.push_str("- One tool call per query at most\n");
            } else {
                prompt.push_str(&format!(
                    "- Up to {} sequential tool calls per query; use a later call only when \
                     earlier results are insufficient\n",
                    max_tool_rounds
                ));
            }
            prompt.push_str("- Synthesize tool results into accurate, fact-based answers\n\n");
        }

        prompt.push_str(RESPONSE_PROTOCOL);
        Self(prompt)
    }

    /// Built-in prompt, or the contents of `llm.system_prompt_file` when set.
    pub fn from_config(config: &LlmConfig, tools: &[ToolDefinition]) -> Result<Self> {
        match &config.system_prompt_file {
            Some(path) => {
                let text = std::fs::read_to_string(path).with_context(|| {
                    format!("Failed to read system prompt file: {}", path.display())
                })?;
                Ok(Self(text.trim_end().to_string()))
            }
            None => Ok(Self::render(tools, config.max_tool_rounds)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The prompt with the conversation history appended, if any.
    pub fn with_history(&self, history: Option<&str>) -> String {
        match history {
            Some(h) if !h.is_empty() => format!("{}\n\nPrevious conversation:\n{}", self.0, h),
            _ => self.0.clone(),
        }
    }
}

/// Fixed per-request model parameters.
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub max_tool_rounds: usize,
}

impl From<&LlmConfig> for GenerationSettings {
    fn from(config: &LlmConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_tool_rounds: config.max_tool_rounds.max(1),
        }
    }
}

pub struct AnswerGenerator {
    model: Arc<dyn ChatModel>,
    settings: GenerationSettings,
    prompt: SystemPrompt,
}

impl AnswerGenerator {
    pub fn new(model: Arc<dyn ChatModel>, settings: GenerationSettings, prompt: SystemPrompt) -> Self {
        Self {
            model,
            settings,
            prompt,
        }
    }

    pub fn system_prompt(&self) -> &SystemPrompt {
        &self.prompt
    }

    /// Produce an answer for `query`.
    ///
    /// Tools are offered only when `tools` is non-empty and a session is
    /// given to execute them in.
    pub async fn generate_response(
        &self,
        query: &str,
        history: Option<&str>,
        tools: &[ToolDefinition],
        mut session: Option<&mut ToolSession<'_>>,
    ) -> Result<String> {
        let system = self.prompt.with_history(history);
        let offered = if tools.is_empty() || session.is_none() {
            None
        } else {
            Some(tools.to_vec())
        };

        let mut messages = vec![Message::user_text(query)];
        let mut response = self
            .model
            .complete(&self.request(&system, &messages, offered.clone()))
            .await?;

        let mut round = 0;
        while response.stop_reason == StopReason::ToolUse && round < self.settings.max_tool_rounds
        {
            let Some(session) = session.as_deref_mut() else {
                break;
            };
            round += 1;

            let calls: Vec<(String, String, serde_json::Value)> = response
                .tool_uses()
                .map(|(id, name, input)| (id.to_string(), name.to_string(), input.clone()))
                .collect();
            if calls.is_empty() {
                break;
            }

            let mut results = Vec::with_capacity(calls.len());
            for (id, name, input) in calls {
                debug!(tool = %name, round, "executing tool call");
                let result = session.execute(&name, input).await;
                results.push(ContentBlock::ToolResult {
                    tool_use_id: id,
                    content: result.content,
                    is_error: result.is_error,
                });
            }

            let assistant: Vec<ContentBlock> = response
                .content
                .into_iter()
                .filter(|b| !matches!(b, ContentBlock::Unsupported))
                .collect();
            messages.push(Message::assistant(assistant));
            messages.push(Message::tool_results(results));

            // Tools stay available only while another round is allowed.
            let follow_up_tools = if round < self.settings.max_tool_rounds {
                offered.clone()
            } else {
                None
            };
            response = self
                .model
                .complete(&self.request(&system, &messages, follow_up_tools))
                .await?;
        }

        Ok(response
            .text()
            .map(str::to_string)
            .unwrap_or_else(|| NO_RESPONSE_TEXT.to_string()))
    }

    fn request(
        &self,
        system: &str,
        messages: &[Message],
        tools: Option<Vec<ToolDefinition>>,
    ) -> ChatRequest {
        ChatRequest {
            model: self.settings.model.clone(),
            system: system.to_string(),
            messages: messages.to_vec(),
            tools,
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatResponse, LlmError, Role};
    use crate::tools::{Tool, ToolOutput, ToolRegistry};
    use async_trait::async_trait;
    use course_rag_core::models::Source;
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned responses and records every request.
    struct ScriptedModel {
        responses: Mutex<VecDeque<Result<ChatResponse>>>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedModel {
        fn new(responses: Vec<Result<ChatResponse>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<ChatRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse> {
            self.requests.lock().unwrap().push(request.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(anyhow::anyhow!("script exhausted")))
        }
    }

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echo the query"
        }
        fn parameters_schema(&self) -> Value {
            json!({ "type": "object", "properties": { "query": { "type": "string" } }, "required": ["query"] })
        }
        async fn execute(&self, params: Value) -> Result<ToolOutput> {
            let q = params["query"].as_str().unwrap_or_default().to_string();
            Ok(ToolOutput::with_sources(
                format!("echo: {}", q),
                vec![Source {
                    label: q,
                    link: None,
                }],
            ))
        }
    }

    fn text(t: &str) -> Result<ChatResponse> {
        Ok(ChatResponse {
            content: vec![ContentBlock::Text {
                text: t.to_string(),
            }],
            stop_reason: StopReason::EndTurn,
        })
    }

    fn tool_use(calls: &[(&str, &str, Value)]) -> Result<ChatResponse> {
        Ok(ChatResponse {
            content: calls
                .iter()
                .map(|(id, name, input)| ContentBlock::ToolUse {
                    id: id.to_string(),
                    name: name.to_string(),
                    input: input.clone(),
                })
                .collect(),
            stop_reason: StopReason::ToolUse,
        })
    }

    fn settings(rounds: usize) -> GenerationSettings {
        GenerationSettings {
            model: "test-model".to_string(),
            temperature: 0.0,
            max_tokens: 800,
            max_tool_rounds: rounds,
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        registry
    }

    fn generator(model: Arc<ScriptedModel>, rounds: usize, tools: &[ToolDefinition]) -> AnswerGenerator {
        AnswerGenerator::new(model, settings(rounds), SystemPrompt::render(tools, rounds))
    }

    #[tokio::test]
    async fn test_direct_answer_makes_one_call() {
        let model = ScriptedModel::new(vec![text("Paris")]);
        let registry = registry();
        let schemas = registry.get_schemas();
        let answerer = generator(model.clone(), 1, &schemas);
        let mut session = registry.session();

        let answer = answerer
            .generate_response("capital of France?", None, &schemas, Some(&mut session))
            .await
            .unwrap();

        assert_eq!(answer, "Paris");
        let requests = model.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].temperature, 0.0);
        assert_eq!(requests[0].max_tokens, 800);
        assert_eq!(requests[0].tools.as_ref().map(Vec::len), Some(1));
        assert!(session.get_last_sources().is_empty());
    }

    #[tokio::test]
    async fn test_tool_round_then_answer_without_tools() {
        let model = ScriptedModel::new(vec![
            tool_use(&[
                ("tu_1", "echo", json!({ "query": "a" })),
                ("tu_2", "missing", json!({})),
            ]),
            text("final"),
        ]);
        let registry = registry();
        let schemas = registry.get_schemas();
        let answerer = generator(model.clone(), 1, &schemas);
        let mut session = registry.session();

        let answer = answerer
            .generate_response("q", None, &schemas, Some(&mut session))
            .await
            .unwrap();
        assert_eq!(answer, "final");

        let requests = model.requests();
        assert_eq!(requests.len(), 2);
        let second = &requests[1];
        assert!(second.tools.is_none());
        assert_eq!(second.messages.len(), 3);
        assert_eq!(second.messages[1].role, Role::Assistant);
        assert_eq!(second.messages[2].role, Role::User);
        assert_eq!(
            second.messages[2].content,
            vec![
                ContentBlock::ToolResult {
                    tool_use_id: "tu_1".to_string(),
                    content: "echo: a".to_string(),
                    is_error: false,
                },
                ContentBlock::ToolResult {
                    tool_use_id: "tu_2".to_string(),
                    content: "Tool 'missing' not found".to_string(),
                    is_error: true,
                },
            ]
        );
        assert_eq!(session.get_last_sources()[0].label, "a");
    }

    #[tokio::test]
    async fn test_round_limit_stops_tool_loop() {
        // The model keeps asking for tools; with two rounds the third call
        // must be tool-less and its (missing) text yields the fallback.
        let model = ScriptedModel::new(vec![
            tool_use(&[("t1", "echo", json!({ "query": "1" }))]),
            tool_use(&[("t2", "echo", json!({ "query": "2" }))]),
            tool_use(&[("t3", "echo", json!({ "query": "3" }))]),
        ]);
        let registry = registry();
        let schemas = registry.get_schemas();
        let answerer = generator(model.clone(), 2, &schemas);
        let mut session = registry.session();

        let answer = answerer
            .generate_response("q", None, &schemas, Some(&mut session))
            .await
            .unwrap();
        assert_eq!(answer, NO_RESPONSE_TEXT);

        let requests = model.requests();
        assert_eq!(requests.len(), 3);
        assert!(requests[1].tools.is_some());
        assert!(requests[2].tools.is_none());
        assert_eq!(requests[2].messages.len(), 5);
        assert_eq!(session.get_last_sources()[0].label, "2");
    }

    #[tokio::test]
    async fn test_no_tools_means_no_tool_field() {
        let model = ScriptedModel::new(vec![text("hi")]);
        let answerer = generator(model.clone(), 1, &[]);
        answerer.generate_response("q", None, &[], None).await.unwrap();
        assert!(model.requests()[0].tools.is_none());
    }

    #[tokio::test]
    async fn test_history_appended_to_system_prompt() {
        let model = ScriptedModel::new(vec![text("ok")]);
        let answerer = generator(model.clone(), 1, &[]);
        answerer.generate_response("q", Some("User: a\nAssistant: b"), &[], None)
            .await
            .unwrap();

        let system = &model.requests()[0].system;
        assert!(system.starts_with(answerer.system_prompt().as_str()));
        assert!(system.ends_with("\n\nPrevious conversation:\nUser: a\nAssistant: b"));
    }

    #[tokio::test]
    async fn test_model_errors_propagate() {
        let model = ScriptedModel::new(vec![Err(LlmError::Request("503".to_string()).into())]);
        let answerer = generator(model, 1, &[]);
        let err = answerer.generate_response("q", None, &[], None).await.unwrap_err();
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn test_prompt_mentions_tools_and_rounds() {
        let defs = vec![ToolDefinition {
            name: "get_course_outline".to_string(),
            description: "Outline".to_string(),
            input_schema: json!({}),
        }];
        let one = SystemPrompt::render(&defs, 1);
        assert!(one.as_str().contains("- get_course_outline: Outline"));
        assert!(one.as_str().contains("One tool call per query at most"));

        let three = SystemPrompt::render(&defs, 3);
        assert!(three.as_str().contains("Up to 3 sequential tool calls"));

        let none = SystemPrompt::render(&[], 1);
        assert!(!none.as_str().contains("Available tools"));
        assert!(none.as_str().contains("No meta-commentary"));
    }

    #[test]
    fn test_prompt_file_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompt.txt");
        std::fs::write(&path, "Custom prompt.\n").unwrap();
        let config = LlmConfig {
            system_prompt_file: Some(path),
            ..LlmConfig::default()
        };
        let prompt = SystemPrompt::from_config(&config, &[]).unwrap();
        assert_eq!(prompt.as_str(), "Custom prompt.");

        let missing = LlmConfig {
            system_prompt_file: Some(dir.path().join("nope.txt")),
            ..LlmConfig::default()
        };
        assert!(SystemPrompt::from_config(&missing, &[]).is_err());
    }
}
