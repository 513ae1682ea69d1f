//! Chat model backends for the tool router.
//!
//! Each backend converts the router's [`ChatMessage`] conversation into
//! its provider's wire format, sends one request, and maps the reply to a
//! [`ModelTurn`]: plain text becomes [`ModelTurn::Answer`], any tool-use
//! content becomes [`ModelTurn::ToolCalls`].

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use repo_harness_core::agent::{ChatMessage, ChatModel, ModelTurn, ToolCall, ToolSpec};

use crate::config::LlmConfig;

const ANTHROPIC_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

pub fn create_chat_model(config: &LlmConfig) -> Result<Arc<dyn ChatModel>> {
    match config.provider.as_str() {
        "anthropic" => Ok(Arc::new(AnthropicModel::new(config)?)),
        "openai" => Ok(Arc::new(OpenAiChatModel::new(config)?)),
        "disabled" => Ok(Arc::new(DisabledModel)),
        other => bail!("Unknown llm provider: {}", other),
    }
}

fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

async fn read_json(response: reqwest::Response, provider: &str) -> Result<String> {
    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        bail!("{} API error {}: {}", provider, status, text);
    }
    debug!(provider, raw_response = %text, "chat response");
    Ok(text)
}

// ============ Disabled ============

/// Fails every call. Lets the HTTP server start without LLM credentials;
/// `/ask` then reports an upstream error.
pub struct DisabledModel;

#[async_trait]
impl ChatModel for DisabledModel {
    fn name(&self) -> &str {
        "disabled"
    }
    async fn complete(&self, _conversation: &[ChatMessage], _tools: &[ToolSpec]) -> Result<ModelTurn> {
        bail!("LLM provider is disabled")
    }
}

// ============ Anthropic ============

pub struct AnthropicModel {
    client: reqwest::Client,
    api_key: String,
    url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl AnthropicModel {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| anyhow::anyhow!("ANTHROPIC_API_KEY environment variable not set"))?;
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            api_key,
            url: config.url.clone().unwrap_or_else(|| ANTHROPIC_URL.to_string()),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }
}

#[derive(Serialize)]
struct AnthropicTool<'a> {
    name: &'a str,
    description: &'a str,
    input_schema: &'a serde_json::Value,
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
    tools: Vec<AnthropicTool<'a>>,
}

#[derive(Serialize, Debug)]
struct AnthropicMessage {
    role: &'static str,
    content: Vec<AnthropicBlock>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicBlock>,
}

/// System prompts go to the top-level `system` field; consecutive tool
/// results merge into one user message.
fn anthropic_messages(conversation: &[ChatMessage]) -> (Option<String>, Vec<AnthropicMessage>) {
    let mut system = Vec::new();
    let mut messages: Vec<AnthropicMessage> = Vec::new();

    for message in conversation {
        match message {
            ChatMessage::System(text) => system.push(text.clone()),
            ChatMessage::User(text) => messages.push(AnthropicMessage {
                role: "user",
                content: vec![AnthropicBlock::Text { text: text.clone() }],
            }),
            ChatMessage::Assistant { text, tool_calls } => {
                let mut content = Vec::new();
                if let Some(text) = text.as_ref().filter(|t| !t.is_empty()) {
                    content.push(AnthropicBlock::Text { text: text.clone() });
                }
                content.extend(tool_calls.iter().map(|call| AnthropicBlock::ToolUse {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    input: call.input.clone(),
                }));
                messages.push(AnthropicMessage {
                    role: "assistant",
                    content,
                });
            }
            ChatMessage::ToolResult {
                call_id,
                content,
                is_error,
            } => {
                let block = AnthropicBlock::ToolResult {
                    tool_use_id: call_id.clone(),
                    content: content.clone(),
                    is_error: *is_error,
                };
                match messages.last_mut() {
                    Some(last)
                        if last.role == "user"
                            && matches!(last.content.first(), Some(AnthropicBlock::ToolResult { .. })) =>
                    {
                        last.content.push(block)
                    }
                    _ => messages.push(AnthropicMessage {
                        role: "user",
                        content: vec![block],
                    }),
                }
            }
        }
    }

    let system = if system.is_empty() {
        None
    } else {
        Some(system.join("\n\n"))
    };
    (system, messages)
}

fn parse_anthropic_turn(response: AnthropicResponse) -> ModelTurn {
    let mut text_parts = Vec::new();
    let mut calls = Vec::new();

    for block in response.content {
        match block {
            AnthropicBlock::Text { text } => text_parts.push(text),
            AnthropicBlock::ToolUse { id, name, input } => calls.push(ToolCall { id, name, input }),
            AnthropicBlock::ToolResult { .. } => {}
        }
    }

    if calls.is_empty() {
        ModelTurn::Answer(text_parts.join(""))
    } else {
        let text = if text_parts.is_empty() {
            None
        } else {
            Some(text_parts.join(""))
        };
        ModelTurn::ToolCalls { text, calls }
    }
}

#[async_trait]
impl ChatModel for AnthropicModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, conversation: &[ChatMessage], tools: &[ToolSpec]) -> Result<ModelTurn> {
        let (system, messages) = anthropic_messages(conversation);
        let body = AnthropicRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            system,
            messages,
            tools: tools
                .iter()
                .map(|t| AnthropicTool {
                    name: &t.name,
                    description: &t.description,
                    input_schema: &t.input_schema,
                })
                .collect(),
        };

        let response = self
            .client
            .post(&self.url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .context("Anthropic request failed")?;
        let text = read_json(response, "Anthropic").await?;
        let parsed: AnthropicResponse =
            serde_json::from_str(&text).context("Invalid Anthropic response")?;
        Ok(parse_anthropic_turn(parsed))
    }
}

// ============ OpenAI ============

pub struct OpenAiChatModel {
    client: reqwest::Client,
    api_key: String,
    url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiChatModel {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            api_key,
            url: config.url.clone().unwrap_or_else(|| OPENAI_CHAT_URL.to_string()),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }
}

#[derive(Serialize)]
struct OpenAiTool<'a> {
    r#type: &'static str,
    function: OpenAiFunction<'a>,
}

#[derive(Serialize)]
struct OpenAiFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a serde_json::Value,
}

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiMessage>,
    max_tokens: u32,
    temperature: f32,
    tools: Vec<OpenAiTool<'a>>,
}

#[derive(Serialize, Debug)]
struct OpenAiMessage {
    role: &'static str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAiToolCallOut>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl OpenAiMessage {
    fn plain(role: &'static str, content: &str) -> Self {
        Self {
            role,
            content: content.to_string(),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

#[derive(Serialize, Debug)]
struct OpenAiToolCallOut {
    id: String,
    r#type: &'static str,
    function: OpenAiFunctionCall,
}

#[derive(Serialize, Deserialize, Debug)]
struct OpenAiFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiReply,
}

#[derive(Deserialize)]
struct OpenAiReply {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<OpenAiToolCall>>,
}

#[derive(Deserialize)]
struct OpenAiToolCall {
    id: String,
    function: OpenAiFunctionCall,
}

fn openai_messages(conversation: &[ChatMessage]) -> Vec<OpenAiMessage> {
    conversation
        .iter()
        .map(|message| match message {
            ChatMessage::System(text) => OpenAiMessage::plain("system", text),
            ChatMessage::User(text) => OpenAiMessage::plain("user", text),
            ChatMessage::Assistant { text, tool_calls } => OpenAiMessage {
                role: "assistant",
                content: text.clone().unwrap_or_default(),
                tool_calls: if tool_calls.is_empty() {
                    None
                } else {
                    Some(
                        tool_calls
                            .iter()
                            .map(|call| OpenAiToolCallOut {
                                id: call.id.clone(),
                                r#type: "function",
                                function: OpenAiFunctionCall {
                                    name: call.name.clone(),
                                    arguments: call.input.to_string(),
                                },
                            })
                            .collect(),
                    )
                },
                tool_call_id: None,
            },
            ChatMessage::ToolResult {
                call_id, content, ..
            } => OpenAiMessage {
                role: "tool",
                content: content.clone(),
                tool_calls: None,
                tool_call_id: Some(call_id.clone()),
            },
        })
        .collect()
}

fn parse_openai_turn(response: OpenAiResponse) -> Result<ModelTurn> {
    let reply = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: no choices"))?
        .message;

    match reply.tool_calls {
        Some(tool_calls) if !tool_calls.is_empty() => {
            let calls = tool_calls
                .into_iter()
                .map(|tc| {
                    // Unparseable arguments surface as a missing query.
                    let input = serde_json::from_str(&tc.function.arguments)
                        .unwrap_or(serde_json::Value::Null);
                    ToolCall {
                        id: tc.id,
                        name: tc.function.name,
                        input,
                    }
                })
                .collect();
            Ok(ModelTurn::ToolCalls {
                text: reply.content.filter(|t| !t.is_empty()),
                calls,
            })
        }
        _ => Ok(ModelTurn::Answer(reply.content.unwrap_or_default())),
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, conversation: &[ChatMessage], tools: &[ToolSpec]) -> Result<ModelTurn> {
        let body = OpenAiRequest {
            model: &self.model,
            messages: openai_messages(conversation),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            tools: tools
                .iter()
                .map(|t| OpenAiTool {
                    r#type: "function",
                    function: OpenAiFunction {
                        name: &t.name,
                        description: &t.description,
                        parameters: &t.input_schema,
                    },
                })
                .collect(),
        };

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("OpenAI request failed")?;
        let text = read_json(response, "OpenAI").await?;
        let parsed: OpenAiResponse = serde_json::from_str(&text).context("Invalid OpenAI response")?;
        parse_openai_turn(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn conversation() -> Vec<ChatMessage> {
        vec![
            ChatMessage::System("be brief".into()),
            ChatMessage::User("where is main?".into()),
            ChatMessage::Assistant {
                text: None,
                tool_calls: vec![
                    ToolCall {
                        id: "c1".into(),
                        name: "search_repo".into(),
                        input: json!({"query": "main"}),
                    },
                    ToolCall {
                        id: "c2".into(),
                        name: "search_docs".into(),
                        input: json!({"query": "main"}),
                    },
                ],
            },
            ChatMessage::ToolResult {
                call_id: "c1".into(),
                content: "fn main() {}".into(),
                is_error: false,
            },
            ChatMessage::ToolResult {
                call_id: "c2".into(),
                content: "No results found.".into(),
                is_error: true,
            },
        ]
    }

    #[test]
    fn anthropic_merges_tool_results_and_lifts_system() {
        let (system, messages) = anthropic_messages(&conversation());
        assert_eq!(system.as_deref(), Some("be brief"));
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].role, "assistant");
        assert_eq!(messages[1].content.len(), 2);
        assert_eq!(messages[2].role, "user");
        assert_eq!(messages[2].content.len(), 2);

        let json = serde_json::to_value(&messages[2]).unwrap();
        assert_eq!(json["content"][0]["type"], "tool_result");
        assert!(json["content"][0].get("is_error").is_none());
        assert_eq!(json["content"][1]["is_error"], true);
    }

    #[test]
    fn anthropic_tool_use_response() {
        let response: AnthropicResponse = serde_json::from_value(json!({
            "content": [
                {"type": "text", "text": "Let me look."},
                {"type": "tool_use", "id": "t1", "name": "search_repo", "input": {"query": "db"}}
            ]
        }))
        .unwrap();
        match parse_anthropic_turn(response) {
            ModelTurn::ToolCalls { text, calls } => {
                assert_eq!(text.as_deref(), Some("Let me look."));
                assert_eq!(calls[0].name, "search_repo");
                assert_eq!(calls[0].input["query"], "db");
            }
            other => panic!("expected tool calls, got {:?}", other),
        }
    }

    #[test]
    fn anthropic_text_response_is_answer() {
        let response: AnthropicResponse = serde_json::from_value(json!({
            "content": [{"type": "text", "text": "It is in src/main.rs."}]
        }))
        .unwrap();
        assert_eq!(
            parse_anthropic_turn(response),
            ModelTurn::Answer("It is in src/main.rs.".into())
        );
    }

    #[test]
    fn openai_converts_tool_roles() {
        let messages = openai_messages(&conversation());
        assert_eq!(messages.len(), 5);
        assert_eq!(messages[0].role, "system");
        let calls = messages[2].tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].function.arguments, r#"{"query":"main"}"#);
        assert_eq!(messages[3].role, "tool");
        assert_eq!(messages[3].tool_call_id.as_deref(), Some("c1"));
    }

    #[test]
    fn openai_tool_call_response() {
        let response: OpenAiResponse = serde_json::from_value(json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "search_docs", "arguments": "{\"query\":\"install\"}"}
                    }]
                }
            }]
        }))
        .unwrap();
        match parse_openai_turn(response).unwrap() {
            ModelTurn::ToolCalls { text, calls } => {
                assert!(text.is_none());
                assert_eq!(calls[0].id, "call_1");
                assert_eq!(calls[0].input["query"], "install");
            }
            other => panic!("expected tool calls, got {:?}", other),
        }
    }

    #[test]
    fn openai_empty_choices_is_error() {
        let response: OpenAiResponse = serde_json::from_value(json!({"choices": []})).unwrap();
        assert!(parse_openai_turn(response).is_err());
    }

    #[tokio::test]
    async fn disabled_model_fails() {
        let model = create_chat_model(&LlmConfig {
            provider: "disabled".into(),
            ..LlmConfig::default()
        })
        .unwrap();
        assert!(model.complete(&[], &[]).await.is_err());
    }
}
