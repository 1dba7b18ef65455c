use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Options passed to a tool's execution function for one call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolExecutionOptions {
    /// Identifier of this call
    pub tool_call_id: String,
    /// Conversation history leading up to the call
    pub messages: Vec<Message>,
}

impl ToolExecutionOptions {
    /// Options for a direct call of `tool_name` outside any conversation.
    ///
    /// The call id is derived from the tool name and unique per call.
    pub fn for_tool(tool_name: &str) -> Self {
        Self {
            tool_call_id: format!("call_{}_{}", tool_name, Uuid::new_v4().simple()),
            messages: Vec::new(),
        }
    }
}

/// A message in the conversation that triggered a tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// The role of the message sender
    pub role: MessageRole,
    /// The content of the message
    pub content: Vec<MessageContent>,
}

/// The role of the message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

/// The content of a message, which can be text or a tool call/result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text {
        text: String,
    },
    ToolCall {
        id: String,
        name: String,
        arguments: Value,
    },
    ToolResult {
        tool_call_id: String,
        output: Value,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: vec![MessageContent::Text { text: text.into() }],
        }
    }

    pub fn assistant(content: Vec<MessageContent>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_options_for_tool() {
        let first = ToolExecutionOptions::for_tool("greet");
        let second = ToolExecutionOptions::for_tool("greet");

        assert!(first.tool_call_id.starts_with("call_greet_"));
        assert_ne!(first.tool_call_id, second.tool_call_id);
        assert!(first.messages.is_empty());
    }

    #[test]
    fn test_options_serialize_camel_case() {
        let options = ToolExecutionOptions {
            tool_call_id: "call_1".to_string(),
            messages: vec![Message::user("hi")],
        };
        let value = serde_json::to_value(&options).unwrap();

        assert_eq!(
            value,
            json!({
                "toolCallId": "call_1",
                "messages": [{"role": "user", "content": [{"type": "text", "text": "hi"}]}]
            })
        );
    }
}
