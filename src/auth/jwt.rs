use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::{
    auth::{
        claims::{AccessClaims, RefreshClaims},
        repo_types::User,
    },
    config::JwtConfig,
    state::AppState,
};

/// Signing/verification material for both token kinds. Access and refresh
/// tokens use independent secrets, so a token of one kind never verifies
/// as the other.
#[derive(Clone)]
pub struct JwtKeys {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        Self::from_config(&state.config.jwt)
    }
}

impl JwtKeys {
    pub fn from_config(cfg: &JwtConfig) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(cfg.access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(cfg.access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(cfg.refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(cfg.refresh_secret.as_bytes()),
            access_ttl: Duration::from_secs((cfg.access_ttl_minutes * 60).max(0) as u64),
            refresh_ttl: Duration::from_secs((cfg.refresh_ttl_minutes * 60).max(0) as u64),
        }
    }

    fn window(&self, ttl: Duration) -> (usize, usize) {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(ttl.as_secs() as i64);
        (now.unix_timestamp() as usize, exp.unix_timestamp() as usize)
    }

    pub fn sign_access(&self, user: &User) -> anyhow::Result<String> {
        let (iat, exp) = self.window(self.access_ttl);
        let claims = AccessClaims {
            sub: user.id,
            email: user.email.clone(),
            username: user.username.clone(),
            full_name: user.full_name.clone(),
            iat,
            exp,
        };
        let token = encode(&Header::default(), &claims, &self.access_encoding)?;
        debug!(user_id = %user.id, "access token signed");
        Ok(token)
    }

    pub fn sign_refresh(&self, user_id: Uuid) -> anyhow::Result<String> {
        let (iat, exp) = self.window(self.refresh_ttl);
        let claims = RefreshClaims {
            sub: user_id,
            iat,
            exp,
        };
        let token = encode(&Header::default(), &claims, &self.refresh_encoding)?;
        debug!(user_id = %user_id, "refresh token signed");
        Ok(token)
    }

    pub fn verify_access(&self, token: &str) -> anyhow::Result<AccessClaims> {
        let data = decode::<AccessClaims>(token, &self.access_decoding, &Validation::default())?;
        debug!(user_id = %data.claims.sub, "access token verified");
        Ok(data.claims)
    }

    pub fn verify_refresh(&self, token: &str) -> anyhow::Result<RefreshClaims> {
        let data = decode::<RefreshClaims>(token, &self.refresh_decoding, &Validation::default())?;
        debug!(user_id = %data.claims.sub, "refresh token verified");
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JwtConfig;
    use time::OffsetDateTime;

    fn test_config() -> JwtConfig {
        JwtConfig {
            access_secret: "test-access-secret".into(),
            refresh_secret: "test-refresh-secret".into(),
            access_ttl_minutes: 5,
            refresh_ttl_minutes: 60,
        }
    }

    fn test_user() -> User {
        User {
            id: Uuid::new_v4(),
            username: "alice".into(),
            email: "a@x.com".into(),
            full_name: "Alice Archer".into(),
            avatar: "https://fake.local/avatars/a.png".into(),
            cover_image: None,
            password_hash: "unused".into(),
            refresh_token: None,
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn sign_and_verify_access_token_carries_identity() {
        let keys = JwtKeys::from_config(&test_config());
        let user = test_user();
        let token = keys.sign_access(&user).expect("sign access");
        let claims = keys.verify_access(&token).expect("verify access");
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.email, "a@x.com");
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.full_name, "Alice Archer");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn sign_and_verify_refresh_token() {
        let keys = JwtKeys::from_config(&test_config());
        let user_id = Uuid::new_v4();
        let token = keys.sign_refresh(user_id).expect("sign refresh");
        let claims = keys.verify_refresh(&token).expect("verify refresh");
        assert_eq!(claims.sub, user_id);
    }

    #[test]
    fn refresh_verification_rejects_access_tokens() {
        let keys = JwtKeys::from_config(&test_config());
        let token = keys.sign_access(&test_user()).expect("sign access");
        assert!(keys.verify_refresh(&token).is_err());
    }

    #[test]
    fn access_verification_rejects_refresh_tokens() {
        let keys = JwtKeys::from_config(&test_config());
        let token = keys.sign_refresh(Uuid::new_v4()).expect("sign refresh");
        assert!(keys.verify_access(&token).is_err());
    }

    #[test]
    fn verify_rejects_garbage() {
        let keys = JwtKeys::from_config(&test_config());
        assert!(keys.verify_access("not-a-jwt").is_err());
        assert!(keys.verify_refresh("eyJhbGciOiJIUzI1NiJ9.broken.sig").is_err());
    }

    #[test]
    fn verify_rejects_expired_tokens() {
        // exp well past the jsonwebtoken default 60s leeway
        let keys = JwtKeys::from_config(&test_config());
        let now = OffsetDateTime::now_utc().unix_timestamp() as usize;
        let claims = RefreshClaims {
            sub: Uuid::new_v4(),
            iat: now - 7200,
            exp: now - 3600,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test-refresh-secret"),
        )
        .unwrap();
        assert!(keys.verify_refresh(&token).is_err());
    }

    #[test]
    fn tokens_signed_with_another_secret_fail() {
        let keys = JwtKeys::from_config(&test_config());
        let other = JwtKeys::from_config(&JwtConfig {
            access_secret: "other".into(),
            refresh_secret: "other".into(),
            access_ttl_minutes: 5,
            refresh_ttl_minutes: 60,
        });
        let token = other.sign_access(&test_user()).expect("sign access");
        assert!(keys.verify_access(&token).is_err());
    }
}
