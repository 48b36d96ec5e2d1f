use anyhow::Context;
use rand::Rng;
use sqlx::PgPool;
use uuid::Uuid;

pub fn generate_session_id() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill(&mut bytes);
    hex::encode(bytes)
}

/// Insert a fresh session with a 24 hour expiry and return its id.
pub async fn create(db: &PgPool) -> anyhow::Result<String> {
    let id = generate_session_id();
    sqlx::query(
        r#"
        INSERT INTO sessions (id, expires_at)
        VALUES ($1, now() + interval '24 hours')
        "#,
    )
    .bind(&id)
    .execute(db)
    .await
    .context("insert session")?;
    Ok(id)
}

/// Slide the expiry window of a live session. Expired rows are deleted
/// lazily on the way out; returns false when the id is unknown or expired.
pub async fn validate_and_refresh(db: &PgPool, session_id: &str) -> anyhow::Result<bool> {
    let refreshed = sqlx::query(
        r#"
        UPDATE sessions
        SET expires_at = now() + interval '24 hours'
        WHERE id = $1 AND expires_at > now()
        "#,
    )
    .bind(session_id)
    .execute(db)
    .await
    .context("refresh session")?
    .rows_affected();

    if refreshed > 0 {
        return Ok(true);
    }

    sqlx::query("DELETE FROM sessions WHERE id = $1 AND expires_at <= now()")
        .bind(session_id)
        .execute(db)
        .await
        .context("delete expired session")?;
    Ok(false)
}

/// Associate an anonymous session with the user who just logged in.
pub async fn link_to_user(db: &PgPool, session_id: &str, user_id: Uuid) -> anyhow::Result<()> {
    sqlx::query("UPDATE sessions SET user_id = $2 WHERE id = $1")
        .bind(session_id)
        .bind(user_id)
        .execute(db)
        .await
        .context("link session to user")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ids_are_64_hex_chars() {
        let id = generate_session_id();
        assert_eq!(id.len(), 64);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn session_ids_are_unique() {
        assert_ne!(generate_session_id(), generate_session_id());
    }
}
