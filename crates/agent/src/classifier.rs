use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use crate::llm::{Completion, CompletionRequest, LlmClient};
use crate::operations::Operation;
use crate::prompt::SYSTEM_PROMPT;
use crate::tools::ToolSpec;
pub use crate::validation::RejectReason;

pub const UNCLASSIFIED_MESSAGE: &str = "Sorry, I could not determine which phonebook action you \
     want. Try adding, updating, renaming, deleting, looking up, or listing a contact.";

#[derive(Clone, Debug, PartialEq)]
pub enum Classification {
    Invoke { operation: Operation, arguments: Value },
    Rejected { reason: RejectReason, message: String },
}

impl Classification {
    pub fn unclassified() -> Self {
        Self::Rejected {
            reason: RejectReason::Unclassified,
            message: UNCLASSIFIED_MESSAGE.to_string(),
        }
    }
}

/// Maps one free-text command to at most one operation.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(&self, command: &str) -> Result<Classification>;
}

/// Lets a language model pick the tool. Transport failures are returned as
/// errors; anything the model says instead of calling a tool is passed back as
/// a clarification.
pub struct LlmClassifier<C> {
    client: C,
    tools: Vec<ToolSpec>,
}

impl<C> LlmClassifier<C>
where
    C: LlmClient,
{
    pub fn new(client: C, tools: Vec<ToolSpec>) -> Self {
        Self { client, tools }
    }
}

#[async_trait]
impl<C> IntentClassifier for LlmClassifier<C>
where
    C: LlmClient,
{
    async fn classify(&self, command: &str) -> Result<Classification> {
        let request = CompletionRequest {
            system: SYSTEM_PROMPT.to_string(),
            user: command.to_string(),
            tools: self.tools.clone(),
            temperature: 0.0,
        };

        let classification = match self.client.complete(&request).await? {
            Completion::ToolCall { name, arguments } => from_tool_call(&name, arguments),
            Completion::Text(text) if text.trim().is_empty() => Classification::unclassified(),
            Completion::Text(text) => Classification::Rejected {
                reason: RejectReason::Unclassified,
                message: text.trim().to_string(),
            },
        };

        debug!(event_name = "resolver.llm_classified", classification = ?classification);
        Ok(classification)
    }
}

fn from_tool_call(name: &str, arguments: Value) -> Classification {
    let Some(operation) = Operation::from_name(name) else {
        return Classification::unclassified();
    };

    let arguments = match arguments {
        Value::String(raw) if raw.trim().is_empty() => Value::Object(Map::new()),
        Value::String(raw) => match serde_json::from_str::<Value>(&raw) {
            Ok(parsed) => parsed,
            Err(_) => {
                return Classification::Rejected {
                    reason: RejectReason::MissingArguments,
                    message: operation.clarification().to_string(),
                }
            }
        },
        Value::Null => Value::Object(Map::new()),
        other => other,
    };

    Classification::Invoke { operation, arguments }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use serde_json::json;

    use super::{Classification, IntentClassifier, LlmClassifier, RejectReason};
    use crate::llm::{Completion, CompletionRequest, LlmClient};
    use crate::operations::Operation;

    struct ScriptedClient {
        reply: Result<Completion, String>,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedClient {
        fn replying(reply: Completion) -> Self {
            Self { reply: Ok(reply), seen: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedClient {
        async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
            self.seen.lock().expect("lock").push(request.clone());
            self.reply.clone().map_err(|error| anyhow!(error))
        }
    }

    fn tool_call(name: &str, arguments: serde_json::Value) -> Completion {
        Completion::ToolCall { name: name.to_string(), arguments }
    }

    #[tokio::test]
    async fn string_arguments_are_parsed() {
        let classifier = LlmClassifier::new(
            ScriptedClient::replying(tool_call(
                "create_contact",
                json!("{\"name\": \"Alice\", \"phone\": \"123456789\"}"),
            )),
            Vec::new(),
        );

        let classification = classifier.classify("add Alice").await.expect("classify");
        assert_eq!(
            classification,
            Classification::Invoke {
                operation: Operation::CreateContact,
                arguments: json!({"name": "Alice", "phone": "123456789"}),
            }
        );
    }

    #[tokio::test]
    async fn request_carries_prompt_tools_and_zero_temperature() {
        let client = ScriptedClient::replying(tool_call("list_contacts", json!({})));
        let classifier = LlmClassifier::new(client, Vec::new());

        classifier.classify("list all contacts").await.expect("classify");

        let seen = classifier.client.seen.lock().expect("lock");
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].user, "list all contacts");
        assert_eq!(seen[0].temperature, 0.0);
        assert!(seen[0].system.contains("never invent"));
    }

    #[tokio::test]
    async fn unknown_tool_is_unclassified() {
        let client = ScriptedClient::replying(tool_call("drop_table", json!({})));
        let classifier = LlmClassifier::new(client, Vec::new());

        let classification = classifier.classify("x").await.expect("classify");
        assert_eq!(classification, Classification::unclassified());
    }

    #[tokio::test]
    async fn unparseable_arguments_are_rejected() {
        let classifier = LlmClassifier::new(
            ScriptedClient::replying(tool_call("get_contact", json!("{name: Alice"))),
            Vec::new(),
        );

        let classification = classifier.classify("x").await.expect("classify");
        assert!(matches!(
            classification,
            Classification::Rejected { reason: RejectReason::MissingArguments, .. }
        ));
    }

    #[tokio::test]
    async fn text_reply_becomes_clarification() {
        let classifier = LlmClassifier::new(
            ScriptedClient::replying(Completion::Text("What is Alice's number?".to_string())),
            Vec::new(),
        );

        let classification = classifier.classify("add Alice").await.expect("classify");
        assert_eq!(
            classification,
            Classification::Rejected {
                reason: RejectReason::Unclassified,
                message: "What is Alice's number?".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn transport_errors_propagate() {
        let client = ScriptedClient {
            reply: Err("connection refused".to_string()),
            seen: Mutex::new(Vec::new()),
        };
        let classifier = LlmClassifier::new(client, Vec::new());

        let error = classifier.classify("list").await.expect_err("transport failure");
        assert!(error.to_string().contains("connection refused"));
    }
}
