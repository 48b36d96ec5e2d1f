use anyhow::Context;
use rand::{distributions::Alphanumeric, Rng};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::repo_types::User;

impl User {
    /// Find a user by username.
    pub async fn find_by_username(db: &PgPool, username: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, role, created_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(db)
        .await
        .context("find user by username")?;
        Ok(user)
    }

    /// Find a user by email.
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, role, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    /// Create a new user with hashed password. The role always starts as
    /// 'user'; the uniqueness of username and email is enforced by the
    /// database constraints.
    pub async fn create(
        db: &PgPool,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, username, email, password_hash, role, created_at
            "#,
        )
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    /// Delete a user and their dependent rows in one transaction. Sessions
    /// and resources are detached, uploads and reset tokens are removed.
    /// Returns false when the user does not exist.
    pub async fn delete_cascade(db: &PgPool, user_id: Uuid) -> anyhow::Result<bool> {
        let mut tx = db.begin().await.context("begin delete tx")?;

        sqlx::query("DELETE FROM password_resets WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .context("delete password resets")?;
        sqlx::query("UPDATE sessions SET user_id = NULL WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .context("detach sessions")?;
        sqlx::query("UPDATE resources SET user_id = NULL WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .context("detach resources")?;
        sqlx::query("DELETE FROM uploads WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .context("delete uploads")?;

        let deleted = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .context("delete user")?
            .rows_affected();

        tx.commit().await.context("commit delete tx")?;
        Ok(deleted > 0)
    }

    /// Set a user's role to admin. Returns false for an unknown user.
    pub async fn promote_to_admin(db: &PgPool, user_id: Uuid) -> anyhow::Result<bool> {
        let updated = sqlx::query("UPDATE users SET role = 'admin' WHERE id = $1")
            .bind(user_id)
            .execute(db)
            .await
            .context("promote user")?
            .rows_affected();
        Ok(updated > 0)
    }
}

fn generate_reset_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

/// Create a single-use reset token for the user behind `email`, valid for
/// 24 hours. Returns None when no such user exists.
pub async fn create_password_reset(db: &PgPool, email: &str) -> anyhow::Result<Option<String>> {
    let Some(user) = User::find_by_email(db, email).await? else {
        return Ok(None);
    };

    let token = generate_reset_token();
    sqlx::query(
        r#"
        INSERT INTO password_resets (user_id, token, expires_at)
        VALUES ($1, $2, now() + interval '24 hours')
        "#,
    )
    .bind(user.id)
    .bind(&token)
    .execute(db)
    .await
    .context("insert password reset")?;

    Ok(Some(token))
}

/// Consume a reset token and install the new password hash in one
/// transaction. The guarded UPDATE makes the token usable exactly once even
/// under concurrent attempts. Returns false for unknown, used or expired
/// tokens.
pub async fn consume_password_reset(
    db: &PgPool,
    token: &str,
    new_password_hash: &str,
) -> anyhow::Result<bool> {
    let mut tx = db.begin().await.context("begin reset tx")?;

    let user_id: Option<Uuid> = sqlx::query_scalar(
        r#"
        UPDATE password_resets
        SET used = TRUE
        WHERE token = $1 AND NOT used AND expires_at > now()
        RETURNING user_id
        "#,
    )
    .bind(token)
    .fetch_optional(&mut *tx)
    .await
    .context("consume reset token")?;

    let Some(user_id) = user_id else {
        return Ok(false);
    };

    sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
        .bind(user_id)
        .bind(new_password_hash)
        .execute(&mut *tx)
        .await
        .context("update password hash")?;

    tx.commit().await.context("commit reset tx")?;
    Ok(true)
}
