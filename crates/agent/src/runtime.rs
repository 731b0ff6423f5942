use std::sync::Arc;

use anyhow::Result;
use phonebook_core::config::{LlmConfig, LlmProvider};
use phonebook_core::domain::result::StructuredResult;
use phonebook_db::repositories::ContactRepository;
use serde_json::Value;
use tracing::info;

use crate::classifier::{Classification, IntentClassifier, LlmClassifier, RejectReason};
use crate::conversation::RuleBasedClassifier;
use crate::llm::OpenAiCompatibleClient;
use crate::operations::Operation;
use crate::tools::ToolRegistry;
use crate::validation::validate_arguments;

#[derive(Clone, Debug, PartialEq)]
pub enum Resolution {
    Completed { operation: Operation, output: Value },
    Rejected { reason: RejectReason, message: String },
}

/// Turns one command into at most one operation call.
pub struct AgentRuntime {
    classifier: Box<dyn IntentClassifier>,
    tools: ToolRegistry,
}

impl AgentRuntime {
    pub fn new(classifier: Box<dyn IntentClassifier>, tools: ToolRegistry) -> Self {
        Self { classifier, tools }
    }

    pub fn with_rules(store: Arc<dyn ContactRepository>) -> Self {
        Self::new(Box::new(RuleBasedClassifier::new()), ToolRegistry::contact_tools(store))
    }

    /// Picks the classifier named by `llm.provider`.
    pub fn from_config(config: &LlmConfig, store: Arc<dyn ContactRepository>) -> Result<Self> {
        let tools = ToolRegistry::contact_tools(store);
        let classifier: Box<dyn IntentClassifier> = match config.provider {
            LlmProvider::Rules => Box::new(RuleBasedClassifier::new()),
            LlmProvider::OpenAi | LlmProvider::Ollama => Box::new(LlmClassifier::new(
                OpenAiCompatibleClient::from_config(config)?,
                tools.specs(),
            )),
        };

        Ok(Self::new(classifier, tools))
    }

    pub async fn resolve(&self, command: &str) -> Result<Resolution> {
        let (operation, arguments) = match self.classifier.classify(command).await? {
            Classification::Invoke { operation, arguments } => (operation, arguments),
            Classification::Rejected { reason, message } => {
                info!(
                    event_name = "resolver.rejected",
                    reason = reason.as_str(),
                    "command not classified"
                );
                return Ok(Resolution::Rejected { reason, message });
            }
        };

        let arguments = match validate_arguments(operation, &arguments) {
            Ok(arguments) => arguments,
            Err(rejection) => {
                info!(
                    event_name = "resolver.rejected",
                    operation = operation.name(),
                    reason = rejection.reason.as_str(),
                    "required arguments missing"
                );
                return Ok(Resolution::Rejected {
                    reason: rejection.reason,
                    message: rejection.message,
                });
            }
        };

        info!(
            event_name = "resolver.dispatch",
            operation = operation.name(),
            "dispatching operation"
        );
        let output = self.tools.execute(operation.name(), arguments).await?;

        Ok(Resolution::Completed { operation, output })
    }

    /// The operation's output as-is, or a clarification when nothing ran.
    pub async fn handle_command(&self, command: &str) -> Result<Value> {
        match self.resolve(command).await? {
            Resolution::Completed { output, .. } => Ok(output),
            Resolution::Rejected { message, .. } => {
                Ok(serde_json::to_value(StructuredResult::message_only(message))?)
            }
        }
    }
}
