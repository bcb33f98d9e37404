use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::repo_types::{NewUser, User};

const USER_COLUMNS: &str = "id, username, email, full_name, avatar, cover_image, \
                            password_hash, refresh_token, created_at, updated_at";

impl User {
    /// Find a user by username or email; either identifier suffices.
    pub async fn find_by_username_or_email(
        db: &PgPool,
        username: Option<&str>,
        email: Option<&str>,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE username = $1 OR email = $2
            "#,
        ))
        .bind(username)
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE id = $1
            "#,
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn create(db: &PgPool, new: NewUser<'_>) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, email, full_name, avatar, cover_image, password_hash)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#,
        ))
        .bind(new.username)
        .bind(new.email)
        .bind(new.full_name)
        .bind(new.avatar)
        .bind(new.cover_image)
        .bind(new.password_hash)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    /// Unconditional single-slot overwrite, used on login. Field-only
    /// update: nothing else on the row is touched or re-validated.
    pub async fn store_refresh_token(
        db: &PgPool,
        id: Uuid,
        token: &str,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET refresh_token = $2, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(token)
        .execute(db)
        .await?;
        Ok(())
    }

    /// Compare-and-swap rotation, used on refresh: the write lands only if
    /// the stored token still equals the one presented. Returns whether
    /// the swap happened; a miss means a concurrent rotation won.
    pub async fn swap_refresh_token(
        db: &PgPool,
        id: Uuid,
        presented: &str,
        next: &str,
    ) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET refresh_token = $3, updated_at = now()
            WHERE id = $1 AND refresh_token = $2
            "#,
        )
        .bind(id)
        .bind(presented)
        .bind(next)
        .execute(db)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn clear_refresh_token(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET refresh_token = NULL, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(db)
        .await?;
        Ok(())
    }

    pub async fn update_password(db: &PgPool, id: Uuid, hash: &str) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(hash)
        .execute(db)
        .await?;
        Ok(())
    }

    pub async fn update_profile(
        db: &PgPool,
        id: Uuid,
        full_name: &str,
        email: &str,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET full_name = $2, email = $3, updated_at = now()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#,
        ))
        .bind(id)
        .bind(full_name)
        .bind(email)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    pub async fn update_avatar(db: &PgPool, id: Uuid, url: &str) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET avatar = $2, updated_at = now()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#,
        ))
        .bind(id)
        .bind(url)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    pub async fn update_cover_image(db: &PgPool, id: Uuid, url: &str) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET cover_image = $2, updated_at = now()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#,
        ))
        .bind(id)
        .bind(url)
        .fetch_one(db)
        .await?;
        Ok(user)
    }
}
