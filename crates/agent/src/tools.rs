use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use phonebook_db::repositories::ContactRepository;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::operations::{self, Operation};

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn parameters(&self) -> Value;
    async fn execute(&self, input: Value) -> Result<Value>;

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// What a language model is told about one callable tool.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Deserialize)]
pub struct ContactInput {
    pub name: String,
    pub phone: String,
}

#[derive(Debug, Deserialize)]
pub struct NameInput {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct RenameContactInput {
    pub old_name: String,
    pub new_name: String,
}

/// One directory operation bound to a store. Its output is the operation's
/// result serialized as-is, which callers return to the user directly.
pub struct ContactTool {
    operation: Operation,
    store: Arc<dyn ContactRepository>,
}

impl ContactTool {
    pub fn new(operation: Operation, store: Arc<dyn ContactRepository>) -> Self {
        Self { operation, store }
    }
}

fn parse_input<T>(operation: Operation, input: Value) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    serde_json::from_value(input).with_context(|| format!("invalid input for {operation}"))
}

#[async_trait]
impl Tool for ContactTool {
    fn name(&self) -> &'static str {
        self.operation.name()
    }

    fn description(&self) -> &'static str {
        self.operation.description()
    }

    fn parameters(&self) -> Value {
        self.operation.parameters()
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let store = self.store.as_ref();
        let result = match self.operation {
            Operation::CreateContact => {
                let input: ContactInput = parse_input(self.operation, input)?;
                operations::create_contact(store, &input.name, &input.phone).await?
            }
            Operation::DeleteContact => {
                let input: NameInput = parse_input(self.operation, input)?;
                operations::delete_contact(store, &input.name).await?
            }
            Operation::UpdateContact => {
                let input: ContactInput = parse_input(self.operation, input)?;
                operations::update_contact(store, &input.name, &input.phone).await?
            }
            Operation::RenameContact => {
                let input: RenameContactInput = parse_input(self.operation, input)?;
                operations::rename_contact(store, &input.old_name, &input.new_name).await?
            }
            Operation::GetContact => {
                let input: NameInput = parse_input(self.operation, input)?;
                operations::get_contact(store, &input.name).await?
            }
            Operation::ListContacts => operations::list_contacts(store).await?,
        };

        Ok(serde_json::to_value(result)?)
    }
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    /// Registers every directory operation against `store`.
    pub fn contact_tools(store: Arc<dyn ContactRepository>) -> Self {
        let mut registry = Self::default();
        for operation in Operation::ALL {
            registry.register(ContactTool::new(operation, Arc::clone(&store)));
        }
        registry
    }

    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        self.tools.insert(tool.name().to_string(), Box::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(Box::as_ref)
    }

    pub async fn execute(&self, name: &str, input: Value) -> Result<Value> {
        let tool = self.get(name).ok_or_else(|| anyhow!("unknown tool `{name}`"))?;
        tool.execute(input).await
    }

    /// Tool specs ordered by name.
    pub fn specs(&self) -> Vec<ToolSpec> {
        let mut specs = self.tools.values().map(|tool| tool.spec()).collect::<Vec<_>>();
        specs.sort_by(|left, right| left.name.cmp(&right.name));
        specs
    }
}
