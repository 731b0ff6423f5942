//! Intent resolution for the phonebook.
//!
//! A command moves through a fixed pipeline:
//! 1. **Classification** (`conversation`, `classifier`) - free text becomes one
//!    operation plus its arguments, either by rules or by a language model
//! 2. **Validation** (`validation`) - required arguments must be present and
//!    non-blank, otherwise the user is asked to clarify
//! 3. **Execution** (`tools`, `operations`) - exactly one operation runs against
//!    the store and its structured result is returned unchanged
//!
//! # Safety Principle
//!
//! The language model is strictly a translator. It never produces contact data
//! itself; every name and number in a response comes from the store.

pub mod classifier;
pub mod conversation;
pub mod llm;
pub mod operations;
pub mod prompt;
pub mod runtime;
pub mod tools;
pub mod validation;

pub use classifier::{Classification, IntentClassifier, LlmClassifier, RejectReason};
pub use conversation::RuleBasedClassifier;
pub use operations::Operation;
pub use runtime::{AgentRuntime, Resolution};
pub use tools::{Tool, ToolRegistry, ToolSpec};
