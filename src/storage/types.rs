use thiserror::Error;

/// Primary SQLite result codes for lock contention. Extended codes carry the
/// primary code in their low byte.
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

/// Failures opening or migrating the preference database.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another feedsync process holds the write lock.
    #[error("Another instance of feedsync appears to be running. Please close it and try again.")]
    InstanceLocked,

    #[error("Preference schema migration failed: {0}")]
    Migration(String),

    #[error("Preference database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        if is_lock_contention(&err) {
            DatabaseError::InstanceLocked
        } else {
            DatabaseError::Other(err)
        }
    }

    /// Classify a failed migration. Lock contention still means another
    /// instance; anything else is reported as a migration failure.
    pub(crate) fn from_migration(err: anyhow::Error) -> Self {
        match err.downcast::<sqlx::Error>() {
            Ok(e) if is_lock_contention(&e) => DatabaseError::InstanceLocked,
            Ok(e) => DatabaseError::Migration(e.to_string()),
            Err(e) => DatabaseError::Migration(format!("{:#}", e)),
        }
    }
}

fn is_lock_contention(err: &sqlx::Error) -> bool {
    let sqlx::Error::Database(db) = err else {
        return false;
    };
    db.code()
        .and_then(|code| code.parse::<i32>().ok())
        .is_some_and(|code| matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
    use sqlx::Connection;
    use std::time::Duration;

    async fn connect(path: &std::path::Path) -> SqliteConnection {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .busy_timeout(Duration::ZERO);
        SqliteConnection::connect_with(&options).await.unwrap()
    }

    #[tokio::test]
    async fn test_write_against_held_lock_is_instance_locked() {
        let dir = std::env::temp_dir().join("feedsync_types_test_lock");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("locked.db");
        std::fs::remove_file(&path).ok();

        let mut holder = connect(&path).await;
        sqlx::query("CREATE TABLE t (v INTEGER)")
            .execute(&mut holder)
            .await
            .unwrap();
        sqlx::query("BEGIN EXCLUSIVE")
            .execute(&mut holder)
            .await
            .unwrap();

        let mut other = connect(&path).await;
        let err = sqlx::query("INSERT INTO t VALUES (1)")
            .execute(&mut other)
            .await
            .unwrap_err();
        assert!(matches!(
            DatabaseError::from_sqlx(err),
            DatabaseError::InstanceLocked
        ));

        drop(other);
        drop(holder);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_other_errors_are_kept() {
        assert!(matches!(
            DatabaseError::from_sqlx(sqlx::Error::RowNotFound),
            DatabaseError::Other(sqlx::Error::RowNotFound)
        ));
        assert!(matches!(
            DatabaseError::from_sqlx(sqlx::Error::PoolClosed),
            DatabaseError::Other(_)
        ));
    }

    #[test]
    fn test_migration_errors_keep_their_message() {
        let err = DatabaseError::from_migration(anyhow::Error::new(sqlx::Error::RowNotFound));
        match err {
            DatabaseError::Migration(msg) => assert!(msg.contains("no rows"), "{}", msg),
            other => panic!("expected migration error, got {:?}", other),
        }

        let err = DatabaseError::from_migration(anyhow::anyhow!("bad statement"));
        assert!(matches!(err, DatabaseError::Migration(ref m) if m == "bad statement"));
    }
}
