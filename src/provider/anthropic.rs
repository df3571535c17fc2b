//! Anthropic `/v1/messages` wire shapes and the bidirectional conversion
//! to/from the OpenAI chat-completions shape (§4.2, §4.5).

use super::openai::{
    OpenAiChatRequest, OpenAiChatResponse, OpenAiChoice, OpenAiFunctionCall, OpenAiFunctionDef,
    OpenAiMessage, OpenAiTool, OpenAiToolCall, OpenAiToolChoice, OpenAiToolChoiceFunction,
    OpenAiUsage,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicImageSource {
    #[serde(rename = "type")]
    pub kind: String,
    pub media_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicContentBlock {
    Text {
        text: String,
    },
    Image {
        source: AnthropicImageSource,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
    },
}

/// Anthropic allows `content` to be a plain string or an array of typed
/// blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnthropicContent {
    Text(String),
    Blocks(Vec<AnthropicContentBlock>),
}

impl AnthropicContent {
    fn into_blocks(self) -> Vec<AnthropicContentBlock> {
        match self {
            AnthropicContent::Text(text) => vec![AnthropicContentBlock::Text { text }],
            AnthropicContent::Blocks(blocks) => blocks,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicMessage {
    pub role: String,
    pub content: AnthropicContent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicTool {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub input_schema: serde_json::Value,
}

/// `"auto" | "any" | {"type":"tool","name":...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnthropicToolChoice {
    Mode(String),
    Specific {
        #[serde(rename = "type")]
        kind: String,
        name: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicMessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    pub messages: Vec<AnthropicMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<AnthropicTool>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<AnthropicToolChoice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicMessagesResponse {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub role: String,
    #[serde(default)]
    pub model: String,
    pub content: Vec<AnthropicContentBlock>,
    #[serde(default)]
    pub stop_reason: Option<String>,
    pub usage: AnthropicUsage,
}

impl AnthropicMessagesResponse {
    pub fn is_valid_shape(&self) -> bool {
        self.kind == "message" && self.role == "assistant"
    }
}

impl AnthropicMessagesRequest {
    /// The inter-layer shape invariant (§3.2) for an Anthropic-shaped
    /// target: non-empty `model` + `messages[]` + positive `max_tokens`.
    pub fn is_valid_target_shape(&self) -> bool {
        !self.model.is_empty() && !self.messages.is_empty() && self.max_tokens > 0
    }
}

fn finish_reason_to_stop_reason(reason: Option<&str>) -> Option<String> {
    reason.map(|r| match r {
        "stop" => "end_turn",
        "length" => "max_tokens",
        "tool_calls" => "tool_use",
        "content_filter" => "end_turn",
        other => other,
    })
    .map(|s| s.to_string())
}

fn stop_reason_to_finish_reason(reason: Option<&str>) -> Option<String> {
    reason.map(|r| match r {
        "end_turn" => "stop",
        "max_tokens" => "length",
        "tool_use" => "tool_calls",
        other => other,
    })
    .map(|s| s.to_string())
}

fn anthropic_tool_choice_to_openai(choice: &AnthropicToolChoice) -> OpenAiToolChoice {
    match choice {
        AnthropicToolChoice::Mode(mode) if mode == "any" => {
            OpenAiToolChoice::Mode("required".to_string())
        }
        AnthropicToolChoice::Mode(mode) => OpenAiToolChoice::Mode(mode.clone()),
        AnthropicToolChoice::Specific { name, .. } => OpenAiToolChoice::Specific {
            kind: "function".to_string(),
            function: OpenAiToolChoiceFunction { name: name.clone() },
        },
    }
}

fn openai_tool_choice_to_anthropic(choice: &OpenAiToolChoice) -> AnthropicToolChoice {
    match choice {
        OpenAiToolChoice::Mode(mode) if mode == "required" => {
            AnthropicToolChoice::Mode("any".to_string())
        }
        OpenAiToolChoice::Mode(mode) => AnthropicToolChoice::Mode(mode.clone()),
        OpenAiToolChoice::Specific { function, .. } => AnthropicToolChoice::Specific {
            kind: "tool".to_string(),
            name: function.name.clone(),
        },
    }
}

/// Transformer layer, request direction: Anthropic -> OpenAI.
///
/// `target_model` is the RoutingDecision's selected model (rule-mapped),
/// which replaces whatever model the caller asked for.
pub fn anthropic_request_to_openai(
    req: &AnthropicMessagesRequest,
    target_model: &str,
) -> OpenAiChatRequest {
    let mut messages = Vec::new();

    if let Some(system) = &req.system {
        messages.push(OpenAiMessage {
            role: "system".to_string(),
            content: Some(system.clone()),
            tool_calls: None,
            tool_call_id: None,
            name: None,
        });
    }

    for message in &req.messages {
        let mut text_parts: Vec<String> = Vec::new();
        let mut tool_calls: Vec<OpenAiToolCall> = Vec::new();
        let mut pending_tool_results: Vec<(String, Option<String>)> = Vec::new();

        for block in message.content.clone().into_blocks() {
            match block {
                AnthropicContentBlock::Text { text } => text_parts.push(text),
                AnthropicContentBlock::Image { .. } => {
                    // Image blocks have no OpenAI chat-completions analogue
                    // in this minimal wire format; dropped rather than
                    // fabricating an unsupported field.
                }
                AnthropicContentBlock::ToolUse { id, name, input } => {
                    tool_calls.push(OpenAiToolCall {
                        id,
                        kind: "function".to_string(),
                        function: OpenAiFunctionCall {
                            name,
                            arguments: input.to_string(),
                        },
                    });
                }
                AnthropicContentBlock::ToolResult {
                    tool_use_id,
                    content,
                } => pending_tool_results.push((tool_use_id, content)),
            }
        }

        if !text_parts.is_empty() || !tool_calls.is_empty() {
            messages.push(OpenAiMessage {
                role: message.role.clone(),
                content: if text_parts.is_empty() {
                    None
                } else {
                    Some(text_parts.join("\n"))
                },
                tool_calls: if tool_calls.is_empty() {
                    None
                } else {
                    Some(tool_calls)
                },
                tool_call_id: None,
                name: None,
            });
        }

        for (tool_use_id, content) in pending_tool_results {
            messages.push(OpenAiMessage {
                role: "tool".to_string(),
                content: Some(content.unwrap_or_default()),
                tool_calls: None,
                tool_call_id: Some(tool_use_id),
                name: None,
            });
        }
    }

    OpenAiChatRequest {
        model: target_model.to_string(),
        messages,
        max_tokens: Some(req.max_tokens),
        temperature: req.temperature,
        top_p: req.top_p,
        stop: req.stop_sequences.clone(),
        tools: req.tools.as_ref().map(|tools| {
            tools
                .iter()
                .map(|t| OpenAiTool {
                    kind: "function".to_string(),
                    function: OpenAiFunctionDef {
                        name: t.name.clone(),
                        description: t.description.clone(),
                        parameters: t.input_schema.clone(),
                    },
                })
                .collect()
        }),
        tool_choice: req.tool_choice.as_ref().map(anthropic_tool_choice_to_openai),
        stream: false,
    }
}

/// ResponseTransformer layer, response direction: OpenAI -> Anthropic.
pub fn openai_response_to_anthropic(
    resp: &OpenAiChatResponse,
    request_id: &str,
) -> AnthropicMessagesResponse {
    let choice = resp.choices.first();
    let mut content = Vec::new();

    if let Some(choice) = choice {
        if let Some(text) = &choice.message.content {
            if !text.is_empty() {
                content.push(AnthropicContentBlock::Text { text: text.clone() });
            }
        }
        if let Some(tool_calls) = &choice.message.tool_calls {
            for call in tool_calls {
                let input = serde_json::from_str(&call.function.arguments)
                    .unwrap_or_else(|_| serde_json::Value::String(call.function.arguments.clone()));
                content.push(AnthropicContentBlock::ToolUse {
                    id: call.id.clone(),
                    name: call.function.name.clone(),
                    input,
                });
            }
        }
    }

    let stop_reason = choice.and_then(|c| finish_reason_to_stop_reason(c.finish_reason.as_deref()));

    let usage = resp
        .usage
        .as_ref()
        .map(|u| AnthropicUsage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        })
        .unwrap_or(AnthropicUsage {
            input_tokens: 0,
            output_tokens: 0,
        });

    AnthropicMessagesResponse {
        id: format!("msg_{request_id}"),
        kind: "message".to_string(),
        role: "assistant".to_string(),
        model: resp.model.clone(),
        content,
        stop_reason,
        usage,
    }
}

/// Symmetric request direction for an OpenAI-shaped inbound request routed
/// to an anthropic-native provider (§8 scenario 8).
pub fn openai_request_to_anthropic(
    req: &OpenAiChatRequest,
    target_model: &str,
) -> AnthropicMessagesRequest {
    let mut system = None;
    let mut messages = Vec::new();
    let mut pending_tool_calls: std::collections::HashMap<String, (String, String)> =
        std::collections::HashMap::new();

    for message in &req.messages {
        match message.role.as_str() {
            "system" => {
                system = message.content.clone();
            }
            "tool" => {
                let tool_use_id = message.tool_call_id.clone().unwrap_or_default();
                messages.push(AnthropicMessage {
                    role: "user".to_string(),
                    content: AnthropicContent::Blocks(vec![AnthropicContentBlock::ToolResult {
                        tool_use_id,
                        content: message.content.clone(),
                    }]),
                });
            }
            _ => {
                let mut blocks = Vec::new();
                if let Some(text) = &message.content {
                    if !text.is_empty() {
                        blocks.push(AnthropicContentBlock::Text { text: text.clone() });
                    }
                }
                if let Some(tool_calls) = &message.tool_calls {
                    for call in tool_calls {
                        let input = serde_json::from_str(&call.function.arguments)
                            .unwrap_or_else(|_| serde_json::Value::Null);
                        blocks.push(AnthropicContentBlock::ToolUse {
                            id: call.id.clone(),
                            name: call.function.name.clone(),
                            input,
                        });
                        pending_tool_calls
                            .insert(call.id.clone(), (call.function.name.clone(), String::new()));
                    }
                }
                if !blocks.is_empty() {
                    messages.push(AnthropicMessage {
                        role: message.role.clone(),
                        content: AnthropicContent::Blocks(blocks),
                    });
                }
            }
        }
    }

    AnthropicMessagesRequest {
        model: target_model.to_string(),
        max_tokens: req.max_tokens.unwrap_or(4096),
        messages,
        system,
        temperature: req.temperature,
        top_p: req.top_p,
        stop_sequences: req.stop.clone(),
        tools: req.tools.as_ref().map(|tools| {
            tools
                .iter()
                .map(|t| AnthropicTool {
                    name: t.function.name.clone(),
                    description: t.function.description.clone(),
                    input_schema: t.function.parameters.clone(),
                })
                .collect()
        }),
        tool_choice: req.tool_choice.as_ref().map(openai_tool_choice_to_anthropic),
    }
}

/// Symmetric response direction: an anthropic-native provider's response
/// shaped back into OpenAI `choices[]` form (§8 scenario 8).
pub fn anthropic_response_to_openai(resp: &AnthropicMessagesResponse) -> OpenAiChatResponse {
    let mut text_parts = Vec::new();
    let mut tool_calls = Vec::new();

    for block in &resp.content {
        match block {
            AnthropicContentBlock::Text { text } => text_parts.push(text.clone()),
            AnthropicContentBlock::ToolUse { id, name, input } => {
                tool_calls.push(OpenAiToolCall {
                    id: id.clone(),
                    kind: "function".to_string(),
                    function: OpenAiFunctionCall {
                        name: name.clone(),
                        arguments: input.to_string(),
                    },
                })
            }
            _ => {}
        }
    }

    let finish_reason = stop_reason_to_finish_reason(resp.stop_reason.as_deref());

    OpenAiChatResponse {
        id: resp.id.clone(),
        object: "chat.completion".to_string(),
        created: 0,
        model: resp.model.clone(),
        choices: vec![OpenAiChoice {
            index: 0,
            message: OpenAiMessage {
                role: "assistant".to_string(),
                content: if text_parts.is_empty() {
                    None
                } else {
                    Some(text_parts.join("\n"))
                },
                tool_calls: if tool_calls.is_empty() {
                    None
                } else {
                    Some(tool_calls)
                },
                tool_call_id: None,
                name: None,
            },
            finish_reason,
        }],
        usage: Some(OpenAiUsage {
            prompt_tokens: resp.usage.input_tokens,
            completion_tokens: resp.usage.output_tokens,
            total_tokens: resp.usage.input_tokens + resp.usage.output_tokens,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_text_request_converts() {
        let req = AnthropicMessagesRequest {
            model: "claude-3-5-sonnet".to_string(),
            max_tokens: 128,
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: AnthropicContent::Text("hi".to_string()),
            }],
            system: None,
            temperature: None,
            top_p: None,
            stop_sequences: None,
            tools: None,
            tool_choice: None,
        };
        let openai = anthropic_request_to_openai(&req, "claude-3-5-sonnet");
        assert_eq!(openai.model, "claude-3-5-sonnet");
        assert_eq!(openai.messages.len(), 1);
        assert_eq!(openai.messages[0].content.as_deref(), Some("hi"));
        assert!(openai.is_valid_target_shape());
    }

    #[test]
    fn system_prompt_becomes_leading_message() {
        let req = AnthropicMessagesRequest {
            model: "m".to_string(),
            max_tokens: 10,
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: AnthropicContent::Text("hi".to_string()),
            }],
            system: Some("be nice".to_string()),
            temperature: None,
            top_p: None,
            stop_sequences: None,
            tools: None,
            tool_choice: None,
        };
        let openai = anthropic_request_to_openai(&req, "m");
        assert_eq!(openai.messages[0].role, "system");
        assert_eq!(openai.messages[0].content.as_deref(), Some("be nice"));
    }

    #[test]
    fn tool_use_and_tool_result_round_trip() {
        let req = AnthropicMessagesRequest {
            model: "m".to_string(),
            max_tokens: 10,
            messages: vec![
                AnthropicMessage {
                    role: "assistant".to_string(),
                    content: AnthropicContent::Blocks(vec![AnthropicContentBlock::ToolUse {
                        id: "tc_1".to_string(),
                        name: "get_weather".to_string(),
                        input: serde_json::json!({"city": "NYC"}),
                    }]),
                },
                AnthropicMessage {
                    role: "user".to_string(),
                    content: AnthropicContent::Blocks(vec![AnthropicContentBlock::ToolResult {
                        tool_use_id: "tc_1".to_string(),
                        content: Some("72F".to_string()),
                    }]),
                },
            ],
            system: None,
            temperature: None,
            top_p: None,
            stop_sequences: None,
            tools: None,
            tool_choice: None,
        };
        let openai = anthropic_request_to_openai(&req, "m");
        assert_eq!(openai.messages.len(), 2);
        assert_eq!(openai.messages[0].role, "assistant");
        assert!(openai.messages[0].tool_calls.is_some());
        assert_eq!(openai.messages[1].role, "tool");
        assert_eq!(openai.messages[1].tool_call_id.as_deref(), Some("tc_1"));
    }

    #[test]
    fn tool_choice_any_maps_to_required() {
        let choice = AnthropicToolChoice::Mode("any".to_string());
        match anthropic_tool_choice_to_openai(&choice) {
            OpenAiToolChoice::Mode(m) => assert_eq!(m, "required"),
            _ => panic!("expected Mode"),
        }
    }

    #[test]
    fn finish_reason_maps_to_stop_reason() {
        assert_eq!(
            finish_reason_to_stop_reason(Some("stop")),
            Some("end_turn".to_string())
        );
        assert_eq!(
            finish_reason_to_stop_reason(Some("length")),
            Some("max_tokens".to_string())
        );
        assert_eq!(
            finish_reason_to_stop_reason(Some("tool_calls")),
            Some("tool_use".to_string())
        );
    }

    #[test]
    fn openai_response_converts_to_anthropic_message() {
        let resp = OpenAiChatResponse {
            id: "x".to_string(),
            object: "chat.completion".to_string(),
            created: 0,
            model: "claude-3-5-sonnet".to_string(),
            choices: vec![OpenAiChoice {
                index: 0,
                message: OpenAiMessage {
                    role: "assistant".to_string(),
                    content: Some("hello".to_string()),
                    tool_calls: None,
                    tool_call_id: None,
                    name: None,
                },
                finish_reason: Some("stop".to_string()),
            }],
            usage: Some(OpenAiUsage {
                prompt_tokens: 3,
                completion_tokens: 2,
                total_tokens: 5,
            }),
        };
        let anthropic = openai_response_to_anthropic(&resp, "req-1");
        assert!(anthropic.is_valid_shape());
        assert_eq!(anthropic.stop_reason.as_deref(), Some("end_turn"));
        assert_eq!(anthropic.usage.input_tokens, 3);
        assert_eq!(anthropic.usage.output_tokens, 2);
        match &anthropic.content[0] {
            AnthropicContentBlock::Text { text } => assert_eq!(text, "hello"),
            _ => panic!("expected text block"),
        }
    }

    #[test]
    fn tool_call_response_converts_to_tool_use_block() {
        let resp = OpenAiChatResponse {
            id: "x".to_string(),
            object: "chat.completion".to_string(),
            created: 0,
            model: "m".to_string(),
            choices: vec![OpenAiChoice {
                index: 0,
                message: OpenAiMessage {
                    role: "assistant".to_string(),
                    content: None,
                    tool_calls: Some(vec![OpenAiToolCall {
                        id: "tc_1".to_string(),
                        kind: "function".to_string(),
                        function: OpenAiFunctionCall {
                            name: "get_weather".to_string(),
                            arguments: "{\"city\":\"NYC\"}".to_string(),
                        },
                    }]),
                    tool_call_id: None,
                    name: None,
                },
                finish_reason: Some("tool_calls".to_string()),
            }],
            usage: None,
        };
        let anthropic = openai_response_to_anthropic(&resp, "req-1");
        assert_eq!(anthropic.stop_reason.as_deref(), Some("tool_use"));
        match &anthropic.content[0] {
            AnthropicContentBlock::ToolUse { id, name, input } => {
                assert_eq!(id, "tc_1");
                assert_eq!(name, "get_weather");
                assert_eq!(input["city"], "NYC");
            }
            _ => panic!("expected tool_use block"),
        }
    }

    #[test]
    fn openai_request_round_trips_to_anthropic() {
        let req = OpenAiChatRequest {
            model: "m".to_string(),
            messages: vec![OpenAiMessage {
                role: "user".to_string(),
                content: Some("hi".to_string()),
                tool_calls: None,
                tool_call_id: None,
                name: None,
            }],
            max_tokens: Some(50),
            temperature: None,
            top_p: None,
            stop: None,
            tools: None,
            tool_choice: None,
            stream: false,
        };
        let anthropic = openai_request_to_anthropic(&req, "claude-3-5-sonnet");
        assert_eq!(anthropic.model, "claude-3-5-sonnet");
        assert_eq!(anthropic.messages.len(), 1);
    }

    #[test]
    fn anthropic_response_converts_to_openai_choices() {
        let resp = AnthropicMessagesResponse {
            id: "msg_1".to_string(),
            kind: "message".to_string(),
            role: "assistant".to_string(),
            model: "m".to_string(),
            content: vec![AnthropicContentBlock::Text {
                text: "hello".to_string(),
            }],
            stop_reason: Some("end_turn".to_string()),
            usage: AnthropicUsage {
                input_tokens: 3,
                output_tokens: 2,
            },
        };
        let openai = anthropic_response_to_openai(&resp);
        assert_eq!(openai.choices.len(), 1);
        assert_eq!(openai.choices[0].finish_reason.as_deref(), Some("stop"));
        assert_eq!(openai.usage.unwrap().prompt_tokens, 3);
    }
}
