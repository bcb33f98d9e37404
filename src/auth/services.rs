use anyhow::Context;
use lazy_static::lazy_static;
use regex::Regex;
use sqlx::PgPool;
use tracing::warn;

use crate::{
    auth::{dto::TokenPair, jwt::JwtKeys, repo_types::User},
    error::{ApiError, ApiResult},
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Sign a fresh access/refresh pair and persist the refresh half in the
/// user's single token slot (plain overwrite). Used on login, where any
/// previously issued refresh token is superseded unconditionally.
pub async fn issue_token_pair(db: &PgPool, keys: &JwtKeys, user: &User) -> ApiResult<TokenPair> {
    let access_token = keys.sign_access(user).context("sign access token")?;
    let refresh_token = keys.sign_refresh(user.id).context("sign refresh token")?;

    User::store_refresh_token(db, user.id, &refresh_token)
        .await
        .context("persist refresh token")?;

    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

/// Rotate the pair for a presented refresh token. Only the most recently
/// issued refresh token is ever valid: the presented value must equal the
/// stored slot, and the new value lands via compare-and-swap so that of
/// two concurrent rotations exactly one wins.
pub async fn rotate_token_pair(
    db: &PgPool,
    keys: &JwtKeys,
    user: &User,
    presented: &str,
) -> ApiResult<TokenPair> {
    if user.refresh_token.as_deref() != Some(presented) {
        warn!(user_id = %user.id, "refresh token reuse detected");
        return Err(ApiError::Expired);
    }

    let access_token = keys.sign_access(user).context("sign access token")?;
    let refresh_token = keys.sign_refresh(user.id).context("sign refresh token")?;

    let swapped = User::swap_refresh_token(db, user.id, presented, &refresh_token)
        .await
        .context("rotate refresh token")?;
    if !swapped {
        // A concurrent refresh or logout replaced the slot between our
        // read and this write.
        warn!(user_id = %user.id, "refresh token rotated concurrently");
        return Err(ApiError::Expired);
    }

    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;
    use time::OffsetDateTime;
    use uuid::Uuid;

    #[test]
    fn valid_emails_pass() {
        assert!(is_valid_email("a@x.com"));
        assert!(is_valid_email("first.last@sub.domain.org"));
    }

    #[test]
    fn invalid_emails_fail() {
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("plainaddress"));
        assert!(!is_valid_email("a b@x.com"));
        assert!(!is_valid_email("a@nodot"));
    }

    fn user_with_stored_token(token: Option<&str>) -> User {
        User {
            id: Uuid::new_v4(),
            username: "alice".into(),
            email: "a@x.com".into(),
            full_name: "Alice Archer".into(),
            avatar: "https://fake.local/avatars/a.png".into(),
            cover_image: None,
            password_hash: "unused".into(),
            refresh_token: token.map(|t| t.to_string()),
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    // The reuse guard fires before any signing or store access, so these
    // run against the fake state's lazy pool without a database.

    #[tokio::test]
    async fn rotate_rejects_superseded_token() {
        let state = AppState::fake();
        let keys = JwtKeys::from_config(&state.config.jwt);
        let user = user_with_stored_token(Some("current-token"));
        let err = rotate_token_pair(&state.db, &keys, &user, "stale-token")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Expired));
        assert_eq!(err.status(), axum::http::StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn rotate_rejects_cleared_slot() {
        let state = AppState::fake();
        let keys = JwtKeys::from_config(&state.config.jwt);
        let user = user_with_stored_token(None);
        let err = rotate_token_pair(&state.db, &keys, &user, "anything")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Expired));
    }
}
