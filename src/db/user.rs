use sqlx::sqlite::{SqliteConnection, SqlitePool};

/// Role given to accounts registered without one.
pub const DEFAULT_ROLE: &str = "user";

#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    /// PHC-format password digest. Never serialized.
    pub password_hash: String,
    pub role: String,
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

const USER_COLUMNS: &str =
    "id, username, password_hash, role, is_active, created_at, updated_at";

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new active user. Returns the user ID.
    pub async fn create(
        &self,
        username: &str,
        password_hash: &str,
        role: &str,
    ) -> Result<i64, sqlx::Error> {
        let result =
            sqlx::query("INSERT INTO users (username, password_hash, role) VALUES (?, ?, ?)")
                .bind(username)
                .bind(password_hash)
                .bind(role)
                .execute(&self.pool)
                .await?;
        Ok(result.last_insert_rowid())
    }

    /// Get a user by username.
    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = ?"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await
    }

    /// Get a user by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Get a user by ID inside an open transaction.
    pub async fn get_by_id_in(
        conn: &mut SqliteConnection,
        id: i64,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
    }

    /// Activate or deactivate a user.
    pub async fn set_active(&self, id: i64, active: bool) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE users SET is_active = ?, updated_at = unixepoch() WHERE id = ?")
                .bind(active)
                .bind(id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a user by ID. Their refresh tokens and addresses go with them.
    pub async fn delete(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use crate::db::{Database, is_unique_violation};

    #[tokio::test]
    async fn test_create_and_get_user() {
        let db = Database::open(":memory:").await.unwrap();

        let id = db.users().create("alice", "digest", "admin").await.unwrap();

        let user = db.users().get_by_username("alice").await.unwrap().unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.username, "alice");
        assert_eq!(user.password_hash, "digest");
        assert_eq!(user.role, "admin");
        assert!(user.is_active);

        let user = db.users().get_by_id(id).await.unwrap().unwrap();
        assert_eq!(user.id, id);
    }

    #[tokio::test]
    async fn test_duplicate_username_is_unique_violation() {
        let db = Database::open(":memory:").await.unwrap();

        db.users().create("alice", "a", "user").await.unwrap();
        let err = db.users().create("alice", "b", "user").await.unwrap_err();

        assert!(is_unique_violation(&err));
    }

    #[tokio::test]
    async fn test_set_active() {
        let db = Database::open(":memory:").await.unwrap();
        let id = db.users().create("alice", "digest", "user").await.unwrap();

        assert!(db.users().set_active(id, false).await.unwrap());
        assert!(!db.users().get_by_id(id).await.unwrap().unwrap().is_active);

        assert!(db.users().set_active(id, true).await.unwrap());
        assert!(db.users().get_by_id(id).await.unwrap().unwrap().is_active);

        assert!(!db.users().set_active(9999, true).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_user() {
        let db = Database::open(":memory:").await.unwrap();

        let id = db.users().create("alice", "digest", "user").await.unwrap();
        assert!(db.users().delete(id).await.unwrap());

        assert!(db.users().get_by_id(id).await.unwrap().is_none());
    }
}
