use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use phonebook_core::domain::contact::{ContactId, ContactRecord};

use super::{ContactRepository, RepositoryError};
use crate::DbPool;

const SELECT_FIRST_BY_NAME: &str =
    "SELECT id, name, phone FROM contacts WHERE name = ? ORDER BY id ASC LIMIT 1";

#[derive(Clone)]
pub struct SqlContactRepository {
    pool: DbPool,
}

impl SqlContactRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContactRepository for SqlContactRepository {
    async fn find(&self, name: &str) -> Result<Option<ContactRecord>, RepositoryError> {
        let row = sqlx::query(SELECT_FIRST_BY_NAME).bind(name).fetch_optional(&self.pool).await?;
        row.as_ref().map(contact_from_row).transpose()
    }

    async fn insert(&self, name: &str, phone: &str) -> Result<ContactRecord, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("INSERT INTO contacts (name, phone) VALUES (?, ?)")
            .bind(name)
            .bind(phone)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(ContactRecord {
            id: ContactId(result.last_insert_rowid()),
            name: name.to_string(),
            phone: phone.to_string(),
        })
    }

    async fn update(
        &self,
        name: &str,
        phone: &str,
    ) -> Result<Option<ContactRecord>, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let Some(row) = sqlx::query(SELECT_FIRST_BY_NAME).bind(name).fetch_optional(&mut *tx).await?
        else {
            return Ok(None);
        };
        let mut record = contact_from_row(&row)?;

        sqlx::query("UPDATE contacts SET phone = ? WHERE id = ?")
            .bind(phone)
            .bind(record.id.0)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        record.phone = phone.to_string();
        Ok(Some(record))
    }

    async fn rename(
        &self,
        old_name: &str,
        new_name: &str,
    ) -> Result<Option<ContactRecord>, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let Some(row) =
            sqlx::query(SELECT_FIRST_BY_NAME).bind(old_name).fetch_optional(&mut *tx).await?
        else {
            return Ok(None);
        };
        let mut record = contact_from_row(&row)?;

        sqlx::query("UPDATE contacts SET name = ? WHERE id = ?")
            .bind(new_name)
            .bind(record.id.0)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        record.name = new_name.to_string();
        Ok(Some(record))
    }

    async fn delete(&self, name: &str) -> Result<Option<ContactRecord>, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let Some(row) = sqlx::query(SELECT_FIRST_BY_NAME).bind(name).fetch_optional(&mut *tx).await?
        else {
            return Ok(None);
        };
        let record = contact_from_row(&row)?;

        sqlx::query("DELETE FROM contacts WHERE id = ?").bind(record.id.0).execute(&mut *tx).await?;
        tx.commit().await?;

        Ok(Some(record))
    }

    async fn list_all(&self) -> Result<Vec<ContactRecord>, RepositoryError> {
        let rows = sqlx::query("SELECT id, name, phone FROM contacts ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(contact_from_row).collect()
    }
}

fn contact_from_row(row: &SqliteRow) -> Result<ContactRecord, RepositoryError> {
    let decode = |error: sqlx::Error| RepositoryError::Decode(error.to_string());
    Ok(ContactRecord {
        id: ContactId(row.try_get("id").map_err(decode)?),
        name: row.try_get("name").map_err(decode)?,
        phone: row.try_get("phone").map_err(decode)?,
    })
}

#[cfg(test)]
mod tests {
    use phonebook_core::domain::contact::ContactId;

    use super::SqlContactRepository;
    use crate::repositories::{ContactRepository, RepositoryError};
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup() -> (DbPool, SqlContactRepository) {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");
        (pool.clone(), SqlContactRepository::new(pool))
    }

    #[tokio::test]
    async fn insert_then_find_returns_stored_phone() {
        let (pool, repo) = setup().await;

        let inserted = repo.insert("Alice", "123456789").await.expect("insert");
        let found = repo.find("Alice").await.expect("find").expect("present");

        assert_eq!(found, inserted);
        assert_eq!(found.phone, "123456789");
        pool.close().await;
    }

    #[tokio::test]
    async fn find_missing_name_is_none() {
        let (pool, repo) = setup().await;

        assert!(repo.find("Nobody").await.expect("find").is_none());
        pool.close().await;
    }

    #[tokio::test]
    async fn duplicate_names_resolve_to_first_inserted() {
        let (pool, repo) = setup().await;

        let first = repo.insert("Alice", "111").await.expect("first insert");
        repo.insert("Alice", "222").await.expect("second insert");

        let found = repo.find("Alice").await.expect("find").expect("present");
        assert_eq!(found.id, first.id);
        assert_eq!(found.phone, "111");

        let updated = repo.update("Alice", "333").await.expect("update").expect("present");
        assert_eq!(updated.id, first.id);

        let all = repo.list_all().await.expect("list");
        let phones = all.iter().map(|record| record.phone.as_str()).collect::<Vec<_>>();
        assert_eq!(phones, vec!["333", "222"]);
        pool.close().await;
    }

    #[tokio::test]
    async fn update_replaces_phone_only_for_existing_contact() {
        let (pool, repo) = setup().await;
        repo.insert("Bob", "555-0100").await.expect("insert");

        let updated = repo.update("Bob", "555-0199").await.expect("update").expect("present");
        assert_eq!(updated.phone, "555-0199");
        assert_eq!(repo.find("Bob").await.expect("find").expect("present").phone, "555-0199");

        assert!(repo.update("Carol", "1").await.expect("update missing").is_none());
        pool.close().await;
    }

    #[tokio::test]
    async fn rename_moves_record_to_new_name() {
        let (pool, repo) = setup().await;
        let original = repo.insert("Patrycja Evans", "600700800").await.expect("insert");

        let renamed = repo
            .rename("Patrycja Evans", "Patrycja Michelli")
            .await
            .expect("rename")
            .expect("present");

        assert_eq!(renamed.id, original.id);
        assert_eq!(renamed.phone, "600700800");
        assert!(repo.find("Patrycja Evans").await.expect("find old").is_none());
        assert!(repo.find("Patrycja Michelli").await.expect("find new").is_some());
        pool.close().await;
    }

    #[tokio::test]
    async fn delete_returns_prior_state_and_is_idempotent() {
        let (pool, repo) = setup().await;
        repo.insert("Dave", "42").await.expect("insert");

        let deleted = repo.delete("Dave").await.expect("delete").expect("present");
        assert_eq!(deleted.phone, "42");
        assert!(repo.find("Dave").await.expect("find").is_none());
        assert!(repo.delete("Dave").await.expect("second delete").is_none());
        pool.close().await;
    }

    #[tokio::test]
    async fn list_all_is_in_insertion_order() {
        let (pool, repo) = setup().await;
        repo.insert("Zed", "3").await.expect("insert");
        repo.insert("Amy", "1").await.expect("insert");

        let names = repo
            .list_all()
            .await
            .expect("list")
            .into_iter()
            .map(|record| record.name)
            .collect::<Vec<_>>();

        assert_eq!(names, vec!["Zed", "Amy"]);
        assert!(names.iter().all(|name| !name.is_empty()));
        pool.close().await;
    }

    #[tokio::test]
    async fn surrogate_ids_increase() {
        let (pool, repo) = setup().await;
        let first = repo.insert("One", "1").await.expect("insert");
        let second = repo.insert("Two", "2").await.expect("insert");

        assert!(second.id > first.id);
        assert_ne!(first.id, ContactId(0));
        pool.close().await;
    }

    #[tokio::test]
    async fn closed_pool_surfaces_storage_error() {
        let (pool, repo) = setup().await;
        pool.close().await;

        let error = repo.list_all().await.expect_err("closed pool should fail");
        assert!(matches!(error, RepositoryError::Database(_)));
    }
}
