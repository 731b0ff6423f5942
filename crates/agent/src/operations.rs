//! The six directory operations.
//!
//! Every operation looks the contact up first, branches on presence, and only
//! ever reports data that came back from the store. "Not found" is an ordinary
//! result with an empty contact list; only storage failures are errors.

use phonebook_core::domain::contact::Contact;
use phonebook_core::domain::result::StructuredResult;
use phonebook_db::repositories::{ContactRepository, RepositoryError};
use serde_json::{json, Value};
use tracing::info;

pub const EMPTY_PHONEBOOK_MESSAGE: &str = "Your phonebook is empty.";
pub const LIST_MESSAGE: &str = "Here are all your contacts.";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateContact,
    DeleteContact,
    UpdateContact,
    RenameContact,
    GetContact,
    ListContacts,
}

impl Operation {
    pub const ALL: [Operation; 6] = [
        Self::CreateContact,
        Self::DeleteContact,
        Self::UpdateContact,
        Self::GetContact,
        Self::ListContacts,
        Self::RenameContact,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateContact => "create_contact",
            Self::DeleteContact => "delete_contact",
            Self::UpdateContact => "update_contact",
            Self::RenameContact => "rename_contact",
            Self::GetContact => "get_contact",
            Self::ListContacts => "list_contacts",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|operation| operation.name() == name.trim())
    }

    pub fn required_args(&self) -> &'static [&'static str] {
        match self {
            Self::CreateContact | Self::UpdateContact => &["name", "phone"],
            Self::DeleteContact | Self::GetContact => &["name"],
            Self::RenameContact => &["old_name", "new_name"],
            Self::ListContacts => &[],
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::CreateContact => {
                "Add a new contact to the phonebook. Input must be a JSON object with both \
                 'name' (string) and 'phone' (string), e.g. {\"name\": \"Alice\", \"phone\": \"123456789\"}"
            }
            Self::DeleteContact => {
                "Delete a contact from the phonebook. Input must be a JSON object with 'name' \
                 (string), e.g. {\"name\": \"Alice\"}"
            }
            Self::UpdateContact => {
                "Update a contact's phone number. Input must be a JSON object with both 'name' \
                 (string) and 'phone' (string), e.g. {\"name\": \"Alice\", \"phone\": \"987654321\"}"
            }
            Self::RenameContact => {
                "Rename an existing contact. Input must be a JSON object with both 'old_name' and \
                 'new_name' (strings), e.g. {\"old_name\": \"Patrycja Evans\", \"new_name\": \"Patrycja Michelli\"}"
            }
            Self::GetContact => {
                "Retrieve a contact's phone number. Input must be a JSON object with 'name' \
                 (string), e.g. {\"name\": \"Alice\"}"
            }
            Self::ListContacts => {
                "List all contacts in the phonebook. Returns a JSON array of objects with 'name' \
                 and 'phone'."
            }
        }
    }

    /// JSON schema of the arguments, in function-calling form.
    pub fn parameters(&self) -> Value {
        let property = |description: &str| json!({"type": "string", "description": description});
        match self {
            Self::CreateContact | Self::UpdateContact => json!({
                "type": "object",
                "properties": {
                    "name": property("The contact's name"),
                    "phone": property("The contact's phone number"),
                },
                "required": ["name", "phone"],
            }),
            Self::DeleteContact | Self::GetContact => json!({
                "type": "object",
                "properties": { "name": property("The contact's name") },
                "required": ["name"],
            }),
            Self::RenameContact => json!({
                "type": "object",
                "properties": {
                    "old_name": property("The current name of the contact to rename"),
                    "new_name": property("The new name for the contact"),
                },
                "required": ["old_name", "new_name"],
            }),
            Self::ListContacts => json!({"type": "object", "properties": {}}),
        }
    }

    pub fn clarification(&self) -> &'static str {
        match self {
            Self::CreateContact => {
                "Please provide both a name and a phone number for the new contact."
            }
            Self::DeleteContact => "Please tell me the name of the contact to delete.",
            Self::UpdateContact => {
                "Please provide the contact's name and the new phone number to update."
            }
            Self::RenameContact => {
                "Please provide the contact's current name and the new name to rename it to."
            }
            Self::GetContact => "Please tell me which contact you want to look up.",
            Self::ListContacts => "Please ask to list your contacts.",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

fn not_found(name: &str) -> StructuredResult {
    StructuredResult::message_only(format!("Contact {name} not found."))
}

pub async fn create_contact(
    store: &dyn ContactRepository,
    name: &str,
    phone: &str,
) -> Result<StructuredResult, RepositoryError> {
    info!(
        event_name = "tool.create_contact",
        contact_name = %name,
        phone = %phone,
        "create_contact called"
    );
    store.insert(name, phone).await?;
    Ok(StructuredResult::with_contact(format!("Added contact {name}."), Contact::new(name, phone)))
}

pub async fn delete_contact(
    store: &dyn ContactRepository,
    name: &str,
) -> Result<StructuredResult, RepositoryError> {
    info!(event_name = "tool.delete_contact", contact_name = %name, "delete_contact called");
    match store.delete(name).await? {
        Some(removed) => Ok(StructuredResult::with_contact(
            format!("Deleted contact {name}."),
            Contact::new(name, removed.phone),
        )),
        None => Ok(not_found(name)),
    }
}

pub async fn update_contact(
    store: &dyn ContactRepository,
    name: &str,
    phone: &str,
) -> Result<StructuredResult, RepositoryError> {
    info!(
        event_name = "tool.update_contact",
        contact_name = %name,
        phone = %phone,
        "update_contact called"
    );
    let Some(existing) = store.find(name).await? else {
        return Ok(not_found(name));
    };
    if store.update(name, phone).await?.is_none() {
        return Ok(not_found(name));
    }

    Ok(StructuredResult::with_contact(
        format!("Updated contact {name} from {} to {phone}.", existing.phone),
        Contact::new(name, phone),
    ))
}

pub async fn rename_contact(
    store: &dyn ContactRepository,
    old_name: &str,
    new_name: &str,
) -> Result<StructuredResult, RepositoryError> {
    info!(
        event_name = "tool.rename_contact",
        old_name = %old_name,
        new_name = %new_name,
        "rename_contact called"
    );
    if store.find(old_name).await?.is_none() {
        return Ok(not_found(old_name));
    }

    match store.rename(old_name, new_name).await? {
        Some(renamed) => Ok(StructuredResult::with_contact(
            format!("Renamed contact '{old_name}' to '{new_name}'."),
            Contact::new(new_name, renamed.phone),
        )),
        None => Ok(not_found(old_name)),
    }
}

pub async fn get_contact(
    store: &dyn ContactRepository,
    name: &str,
) -> Result<StructuredResult, RepositoryError> {
    info!(event_name = "tool.get_contact", contact_name = %name, "get_contact called");
    match store.find(name).await? {
        Some(found) => Ok(StructuredResult::with_contact(
            format!("{}'s phone number is {}.", found.name, found.phone),
            found.into(),
        )),
        None => Ok(not_found(name)),
    }
}

pub async fn list_contacts(
    store: &dyn ContactRepository,
) -> Result<StructuredResult, RepositoryError> {
    info!(event_name = "tool.list_contacts", "list_contacts called");
    let contacts = store.list_all().await?.into_iter().map(Contact::from).collect::<Vec<_>>();
    let message = if contacts.is_empty() { EMPTY_PHONEBOOK_MESSAGE } else { LIST_MESSAGE };
    Ok(StructuredResult::new(message, contacts))
}
