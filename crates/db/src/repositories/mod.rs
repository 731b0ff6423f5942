use async_trait::async_trait;
use thiserror::Error;

use phonebook_core::domain::contact::ContactRecord;

pub mod contact;
pub mod memory;

pub use contact::SqlContactRepository;
pub use memory::InMemoryContactRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Name-keyed contact storage.
///
/// Lookups by name resolve to the first matching record in insertion order;
/// duplicate names are allowed. Every mutating call commits before it returns.
#[async_trait]
pub trait ContactRepository: Send + Sync {
    async fn find(&self, name: &str) -> Result<Option<ContactRecord>, RepositoryError>;

    async fn insert(&self, name: &str, phone: &str) -> Result<ContactRecord, RepositoryError>;

    /// Replaces the phone of the first match and returns the updated record.
    async fn update(
        &self,
        name: &str,
        phone: &str,
    ) -> Result<Option<ContactRecord>, RepositoryError>;

    /// Renames the first match and returns the renamed record.
    async fn rename(
        &self,
        old_name: &str,
        new_name: &str,
    ) -> Result<Option<ContactRecord>, RepositoryError>;

    /// Removes the first match and returns it as it was before removal.
    async fn delete(&self, name: &str) -> Result<Option<ContactRecord>, RepositoryError>;

    async fn list_all(&self) -> Result<Vec<ContactRecord>, RepositoryError>;
}
