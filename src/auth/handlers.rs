use axum::{
    extract::{FromRef, Multipart, State},
    routing::post,
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use bytes::Bytes;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{LoginData, LoginRequest, RefreshRequest, TokenPair, UserPublic},
        extractors::{AuthUser, ACCESS_COOKIE, REFRESH_COOKIE},
        jwt::JwtKeys,
        password::{hash_password, verify_password},
        repo_types::{NewUser, User},
        services::{is_valid_email, issue_token_pair, rotate_token_pair},
    },
    error::{ApiError, ApiResult},
    response::ApiResponse,
    state::AppState,
    users::services::upload_image,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/refresh", post(refresh))
}

fn secure_cookie(name: &'static str, value: String) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .secure(true)
        .path("/")
        .build()
}

fn with_token_cookies(jar: CookieJar, pair: &TokenPair) -> CookieJar {
    jar.add(secure_cookie(ACCESS_COOKIE, pair.access_token.clone()))
        .add(secure_cookie(REFRESH_COOKIE, pair.refresh_token.clone()))
}

#[instrument(skip(state, mp))]
pub async fn register(
    State(state): State<AppState>,
    mut mp: Multipart,
) -> ApiResult<ApiResponse<UserPublic>> {
    let mut username = None;
    let mut email = None;
    let mut full_name = None;
    let mut password = None;
    let mut avatar_file: Option<(Bytes, String)> = None;
    let mut cover_file: Option<(Bytes, String)> = None;

    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("malformed multipart body: {e}")))?
    {
        let name = field.name().map(|s| s.to_string());
        match name.as_deref() {
            Some("username") => username = Some(read_text(field).await?),
            Some("email") => email = Some(read_text(field).await?),
            Some("fullName") => full_name = Some(read_text(field).await?),
            Some("password") => password = Some(read_text(field).await?),
            Some("avatar") => avatar_file = Some(read_file(field).await?),
            Some("coverImage") => cover_file = Some(read_file(field).await?),
            _ => {}
        }
    }

    let username = username.unwrap_or_default().trim().to_lowercase();
    let email = email.unwrap_or_default().trim().to_lowercase();
    let full_name = full_name.unwrap_or_default().trim().to_string();
    let password = password.unwrap_or_default();

    if username.is_empty() || email.is_empty() || full_name.is_empty() || password.is_empty() {
        return Err(ApiError::Validation("all fields are required".into()));
    }
    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(ApiError::Validation("invalid email".into()));
    }
    if password.len() < 8 {
        return Err(ApiError::Validation("password too short".into()));
    }

    if User::find_by_username_or_email(&state.db, Some(&username), Some(&email))
        .await?
        .is_some()
    {
        warn!(username = %username, "username or email already registered");
        return Err(ApiError::Conflict(
            "user with this username or email already exists",
        ));
    }

    let (avatar_body, avatar_ct) =
        avatar_file.ok_or_else(|| ApiError::Validation("avatar file is required".into()))?;
    let avatar = upload_image(&state, "avatars", avatar_body, &avatar_ct).await?;

    let cover_image = match cover_file {
        Some((body, ct)) => Some(upload_image(&state, "covers", body, &ct).await?),
        None => None,
    };

    let hash = hash_password(&password)?;
    let user = User::create(
        &state.db,
        NewUser {
            username: &username,
            email: &email,
            full_name: &full_name,
            avatar: &avatar,
            cover_image: cover_image.as_deref(),
            password_hash: &hash,
        },
    )
    .await?;

    info!(user_id = %user.id, username = %user.username, "user registered");
    Ok(ApiResponse::created(
        UserPublic::from(user),
        "User registered successfully",
    ))
}

#[instrument(skip(state, jar, payload))]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<(CookieJar, ApiResponse<LoginData>)> {
    let username = payload
        .username
        .as_deref()
        .map(|u| u.trim().to_lowercase())
        .filter(|u| !u.is_empty());
    let email = payload
        .email
        .as_deref()
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty());

    if username.is_none() && email.is_none() {
        return Err(ApiError::Validation("username or email is required".into()));
    }

    let user =
        User::find_by_username_or_email(&state.db, username.as_deref(), email.as_deref())
            .await?
            .ok_or(ApiError::NotFound("user does not exist"))?;

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(ApiError::BadCredentials);
    }

    let keys = JwtKeys::from_ref(&state);
    let pair = issue_token_pair(&state.db, &keys, &user).await?;

    info!(user_id = %user.id, username = %user.username, "user logged in");
    let jar = with_token_cookies(jar, &pair);
    Ok((
        jar,
        ApiResponse::ok(
            LoginData {
                user: UserPublic::from(user),
                access_token: pair.access_token,
                refresh_token: pair.refresh_token,
            },
            "User logged in successfully",
        ),
    ))
}

#[instrument(skip(state, jar))]
pub async fn logout(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    jar: CookieJar,
) -> ApiResult<(CookieJar, ApiResponse<()>)> {
    User::clear_refresh_token(&state.db, user_id).await?;

    info!(user_id = %user_id, "user logged out");
    let jar = jar
        .remove(secure_cookie(ACCESS_COOKIE, String::new()))
        .remove(secure_cookie(REFRESH_COOKIE, String::new()));
    Ok((jar, ApiResponse::ok((), "User logged out")))
}

#[instrument(skip(state, jar, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Option<Json<RefreshRequest>>,
) -> ApiResult<(CookieJar, ApiResponse<TokenPair>)> {
    // Cookie takes precedence over a body-carried token.
    let incoming = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .or_else(|| payload.and_then(|Json(p)| p.refresh_token))
        .ok_or(ApiError::Unauthorized("refresh token is required"))?;

    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&incoming)
        .map_err(|e| ApiError::InvalidToken(e.to_string()))?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or(ApiError::NotFound("user does not exist"))?;

    let pair = rotate_token_pair(&state.db, &keys, &user, &incoming).await?;

    info!(user_id = %user.id, "tokens refreshed");
    let jar = with_token_cookies(jar, &pair);
    Ok((jar, ApiResponse::ok(pair, "Access token refreshed")))
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> ApiResult<String> {
    field
        .text()
        .await
        .map_err(|e| ApiError::Validation(format!("invalid form field: {e}")))
}

async fn read_file(field: axum::extract::multipart::Field<'_>) -> ApiResult<(Bytes, String)> {
    let content_type = field
        .content_type()
        .map(|s| s.to_string())
        .unwrap_or_else(|| "application/octet-stream".into());
    let data = field
        .bytes()
        .await
        .map_err(|e| ApiError::Validation(format!("invalid file field: {e}")))?;
    Ok((data, content_type))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_cookies_are_http_only_and_secure() {
        let jar = with_token_cookies(
            CookieJar::new(),
            &TokenPair {
                access_token: "aaa".into(),
                refresh_token: "rrr".into(),
            },
        );
        let access = jar.get(ACCESS_COOKIE).expect("access cookie set");
        let refresh = jar.get(REFRESH_COOKIE).expect("refresh cookie set");
        assert_eq!(access.value(), "aaa");
        assert_eq!(refresh.value(), "rrr");
        for c in [access, refresh] {
            assert_eq!(c.http_only(), Some(true));
            assert_eq!(c.secure(), Some(true));
            assert_eq!(c.path(), Some("/"));
        }
    }
}
