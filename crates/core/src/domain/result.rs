use serde::{Deserialize, Serialize};

use crate::domain::contact::Contact;

/// The `{message, contacts}` payload every operation and the gateway return.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredResult {
    pub message: String,
    pub contacts: Vec<Contact>,
}

impl StructuredResult {
    pub fn new(message: impl Into<String>, contacts: Vec<Contact>) -> Self {
        Self { message: message.into(), contacts }
    }

    /// A result that carries only a message.
    pub fn message_only(message: impl Into<String>) -> Self {
        Self::new(message, Vec::new())
    }

    pub fn with_contact(message: impl Into<String>, contact: Contact) -> Self {
        Self::new(message, vec![contact])
    }
}
