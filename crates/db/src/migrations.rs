use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

/// Reports whether the contacts schema has been applied to `pool`.
pub async fn contacts_table_exists(pool: &DbPool) -> Result<bool, sqlx::Error> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'contacts'",
    )
    .fetch_one(pool)
    .await?;
    Ok(count > 0)
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::{contacts_table_exists, run_pending};
    use crate::connect_with_settings;

    #[tokio::test]
    async fn migrations_create_contacts_table() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        let columns = sqlx::query("SELECT name FROM pragma_table_info('contacts') ORDER BY cid")
            .fetch_all(&pool)
            .await
            .expect("inspect contacts table")
            .into_iter()
            .map(|row| row.get::<String, _>("name"))
            .collect::<Vec<_>>();

        assert_eq!(columns, vec!["id", "name", "phone"]);
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("first run");
        run_pending(&pool).await.expect("second run");

        let table_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'contacts'",
        )
        .fetch_one(&pool)
        .await
        .expect("count tables");
        assert_eq!(table_count, 1);
    }

    #[tokio::test]
    async fn contacts_table_is_reported_only_after_migrating() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        assert!(!contacts_table_exists(&pool).await.expect("probe before"));

        run_pending(&pool).await.expect("run migrations");
        assert!(contacts_table_exists(&pool).await.expect("probe after"));
    }
}
