use tokio::sync::RwLock;

use phonebook_core::domain::contact::{ContactId, ContactRecord};

use super::{ContactRepository, RepositoryError};

#[derive(Default)]
struct ContactTable {
    next_id: i64,
    rows: Vec<ContactRecord>,
}

impl ContactTable {
    fn position(&self, name: &str) -> Option<usize> {
        self.rows.iter().position(|record| record.name == name)
    }
}

/// Process-local contact storage with the same first-match semantics as the
/// SQL repository. Rows are kept in insertion order.
#[derive(Default)]
pub struct InMemoryContactRepository {
    table: RwLock<ContactTable>,
}

impl InMemoryContactRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ContactRepository for InMemoryContactRepository {
    async fn find(&self, name: &str) -> Result<Option<ContactRecord>, RepositoryError> {
        let table = self.table.read().await;
        Ok(table.position(name).map(|index| table.rows[index].clone()))
    }

    async fn insert(&self, name: &str, phone: &str) -> Result<ContactRecord, RepositoryError> {
        let mut table = self.table.write().await;
        table.next_id += 1;
        let record = ContactRecord {
            id: ContactId(table.next_id),
            name: name.to_string(),
            phone: phone.to_string(),
        };
        table.rows.push(record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        name: &str,
        phone: &str,
    ) -> Result<Option<ContactRecord>, RepositoryError> {
        let mut table = self.table.write().await;
        let Some(index) = table.position(name) else {
            return Ok(None);
        };
        let record = &mut table.rows[index];
        record.phone = phone.to_string();
        Ok(Some(record.clone()))
    }

    async fn rename(
        &self,
        old_name: &str,
        new_name: &str,
    ) -> Result<Option<ContactRecord>, RepositoryError> {
        let mut table = self.table.write().await;
        let Some(index) = table.position(old_name) else {
            return Ok(None);
        };
        let record = &mut table.rows[index];
        record.name = new_name.to_string();
        Ok(Some(record.clone()))
    }

    async fn delete(&self, name: &str) -> Result<Option<ContactRecord>, RepositoryError> {
        let mut table = self.table.write().await;
        Ok(table.position(name).map(|index| table.rows.remove(index)))
    }

    async fn list_all(&self) -> Result<Vec<ContactRecord>, RepositoryError> {
        let table = self.table.read().await;
        Ok(table.rows.clone())
    }
}
