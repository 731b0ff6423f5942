pub mod config;
pub mod domain;
pub mod errors;

pub use domain::contact::{Contact, ContactId, ContactRecord};
pub use domain::result::StructuredResult;
pub use errors::InterfaceError;
