use sqlx::{FromRow, SqlitePool};
use time::OffsetDateTime;

use crate::error::ApiError;

/// User record in the database. The plaintext password is never stored.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub active: bool,
    pub created_at: OffsetDateTime,
}

/// Partial update applied to a user row. `None` leaves a column untouched.
/// Only identity fields and the password hash are writable; `active` and
/// `id` stay out of reach of callers.
#[derive(Debug, Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub username: Option<String>,
    pub password_hash: Option<String>,
}

impl User {
    /// Insert a new user. Duplicate email or username surfaces as Conflict
    /// through the UNIQUE constraints.
    pub async fn create(
        db: &SqlitePool,
        email: &str,
        username: &str,
        password_hash: &str,
    ) -> Result<User, ApiError> {
        let now = OffsetDateTime::now_utc();
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, username, password_hash, active, created_at)
            VALUES (?, ?, ?, 1, ?)
            RETURNING id, email, username, password_hash, active, created_at
            "#,
        )
        .bind(email)
        .bind(username)
        .bind(password_hash)
        .bind(now)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_email(db: &SqlitePool, email: &str) -> Result<Option<User>, ApiError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, username, password_hash, active, created_at
            FROM users
            WHERE email = ?
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_username(
        db: &SqlitePool,
        username: &str,
    ) -> Result<Option<User>, ApiError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, username, password_hash, active, created_at
            FROM users
            WHERE username = ?
            "#,
        )
        .bind(username)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_id(db: &SqlitePool, id: i64) -> Result<Option<User>, ApiError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, username, password_hash, active, created_at
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Apply a partial update in a single statement. Password re-hashing is
    /// the caller's job.
    pub async fn update(db: &SqlitePool, id: i64, changes: UserChanges) -> Result<User, ApiError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET email = COALESCE(?, email),
                username = COALESCE(?, username),
                password_hash = COALESCE(?, password_hash)
            WHERE id = ?
            RETURNING id, email, username, password_hash, active, created_at
            "#,
        )
        .bind(changes.email)
        .bind(changes.username)
        .bind(changes.password_hash)
        .bind(id)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    pub async fn delete(db: &SqlitePool, id: i64) -> Result<(), ApiError> {
        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }

    /// List users in id order, bounded by `limit`.
    pub async fn list(db: &SqlitePool, skip: i64, limit: i64) -> Result<Vec<User>, ApiError> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, username, password_hash, active, created_at
            FROM users
            ORDER BY id
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(limit)
        .bind(skip)
        .fetch_all(db)
        .await?;
        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory pool");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("migrations");
        pool
    }

    #[tokio::test]
    async fn create_and_find_roundtrip() {
        let pool = test_pool().await;
        let user = User::create(&pool, "a@x.com", "a", "hash-a").await.expect("create");
        assert!(user.id > 0);
        assert!(user.active);

        let by_name = User::find_by_username(&pool, "a")
            .await
            .expect("find_by_username")
            .expect("present");
        assert_eq!(by_name.id, user.id);
        assert_eq!(by_name.email, "a@x.com");

        let by_id = User::find_by_id(&pool, user.id)
            .await
            .expect("find_by_id")
            .expect("present");
        assert_eq!(by_id.username, "a");

        assert!(User::find_by_username(&pool, "missing")
            .await
            .expect("find")
            .is_none());
    }

    #[tokio::test]
    async fn duplicate_email_is_conflict() {
        let pool = test_pool().await;
        User::create(&pool, "a@x.com", "a", "h").await.expect("first");
        let err = User::create(&pool, "a@x.com", "b", "h").await.unwrap_err();
        assert_eq!(err.to_string(), "Email already registered");
    }

    #[tokio::test]
    async fn duplicate_username_is_conflict() {
        let pool = test_pool().await;
        User::create(&pool, "a@x.com", "a", "h").await.expect("first");
        let err = User::create(&pool, "b@x.com", "a", "h").await.unwrap_err();
        assert_eq!(err.to_string(), "Username already taken");
    }

    #[tokio::test]
    async fn update_touches_only_given_fields() {
        let pool = test_pool().await;
        let user = User::create(&pool, "a@x.com", "a", "h").await.expect("create");

        let updated = User::update(
            &pool,
            user.id,
            UserChanges {
                email: Some("new@x.com".into()),
                ..Default::default()
            },
        )
        .await
        .expect("update");

        assert_eq!(updated.email, "new@x.com");
        assert_eq!(updated.username, "a");
        assert_eq!(updated.password_hash, "h");
    }

    #[tokio::test]
    async fn update_to_taken_username_is_conflict() {
        let pool = test_pool().await;
        User::create(&pool, "a@x.com", "a", "h").await.expect("a");
        let b = User::create(&pool, "b@x.com", "b", "h").await.expect("b");

        let err = User::update(
            &pool,
            b.id,
            UserChanges {
                username: Some("a".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "Username already taken");
    }

    #[tokio::test]
    async fn delete_removes_user() {
        let pool = test_pool().await;
        let user = User::create(&pool, "a@x.com", "a", "h").await.expect("create");
        User::delete(&pool, user.id).await.expect("delete");
        assert!(User::find_by_id(&pool, user.id).await.expect("find").is_none());
    }

    #[tokio::test]
    async fn list_is_id_ordered_and_bounded() {
        let pool = test_pool().await;
        for (email, name) in [("a@x.com", "a"), ("b@x.com", "b"), ("c@x.com", "c")] {
            User::create(&pool, email, name, "h").await.expect("create");
        }

        let page = User::list(&pool, 1, 1).await.expect("list");
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].username, "b");

        let all = User::list(&pool, 0, 100).await.expect("list");
        let names: Vec<_> = all.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
    }
}
