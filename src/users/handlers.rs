use axum::{
    extract::{Multipart, Path, State},
    routing::{get, patch, post},
    Json, Router,
};
use bytes::Bytes;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::UserPublic,
        extractors::{AuthUser, MaybeAuthUser},
        password::{hash_password, verify_password},
        repo_types::User,
        services::is_valid_email,
    },
    error::{ApiError, ApiResult},
    response::ApiResponse,
    state::AppState,
    users::{
        dto::{ChangePasswordRequest, ChannelProfile, UpdateProfileRequest, WatchHistoryVideo},
        repo,
        services::{release_stale_asset, upload_image},
    },
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users/me", get(me))
        .route("/users/change-password", post(change_password))
        .route("/users/profile", patch(update_profile))
        .route("/users/avatar", patch(update_avatar))
        .route("/users/cover-image", patch(update_cover_image))
        .route("/users/c/:username", get(channel_profile))
        .route("/users/watch-history", get(watch_history))
}

#[instrument(skip(state))]
pub async fn me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<ApiResponse<UserPublic>> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or(ApiError::NotFound("user not found"))?;
    Ok(ApiResponse::ok(
        UserPublic::from(user),
        "Current user fetched",
    ))
}

#[instrument(skip(state, payload))]
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> ApiResult<ApiResponse<()>> {
    // Confirmation is checked before anything is written.
    if payload.new_password != payload.confirm_password {
        return Err(ApiError::Validation(
            "new password and confirmation do not match".into(),
        ));
    }
    if payload.new_password.len() < 8 {
        return Err(ApiError::Validation("password too short".into()));
    }

    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or(ApiError::NotFound("user not found"))?;

    if !verify_password(&payload.old_password, &user.password_hash)? {
        warn!(user_id = %user.id, "change password with wrong old password");
        return Err(ApiError::BadCredentials);
    }

    let hash = hash_password(&payload.new_password)?;
    User::update_password(&state.db, user.id, &hash).await?;

    info!(user_id = %user.id, "password changed");
    Ok(ApiResponse::ok((), "Password changed successfully"))
}

#[instrument(skip(state, payload))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> ApiResult<ApiResponse<UserPublic>> {
    let full_name = payload.full_name.trim().to_string();
    let email = payload.email.trim().to_lowercase();

    if full_name.is_empty() || email.is_empty() {
        return Err(ApiError::Validation(
            "fullName and email are required".into(),
        ));
    }
    if !is_valid_email(&email) {
        return Err(ApiError::Validation("invalid email".into()));
    }

    let user = User::update_profile(&state.db, user_id, &full_name, &email).await?;

    info!(user_id = %user.id, "profile updated");
    Ok(ApiResponse::ok(UserPublic::from(user), "Profile updated"))
}

#[instrument(skip(state, mp))]
pub async fn update_avatar(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    mp: Multipart,
) -> ApiResult<ApiResponse<UserPublic>> {
    let (body, content_type) = file_field(mp, "avatar")
        .await?
        .ok_or_else(|| ApiError::Validation("avatar file is required".into()))?;

    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or(ApiError::NotFound("user not found"))?;

    let url = upload_image(&state, "avatars", body, &content_type).await?;
    let updated = User::update_avatar(&state.db, user.id, &url).await?;

    release_stale_asset(state.storage.clone(), Some(user.avatar));

    info!(user_id = %updated.id, "avatar updated");
    Ok(ApiResponse::ok(UserPublic::from(updated), "Avatar updated"))
}

#[instrument(skip(state, mp))]
pub async fn update_cover_image(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    mp: Multipart,
) -> ApiResult<ApiResponse<UserPublic>> {
    let (body, content_type) = file_field(mp, "coverImage")
        .await?
        .ok_or_else(|| ApiError::Validation("cover image file is required".into()))?;

    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or(ApiError::NotFound("user not found"))?;

    let url = upload_image(&state, "covers", body, &content_type).await?;
    let updated = User::update_cover_image(&state.db, user.id, &url).await?;

    release_stale_asset(state.storage.clone(), user.cover_image);

    info!(user_id = %updated.id, "cover image updated");
    Ok(ApiResponse::ok(
        UserPublic::from(updated),
        "Cover image updated",
    ))
}

#[instrument(skip(state))]
pub async fn channel_profile(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Path(username): Path<String>,
) -> ApiResult<ApiResponse<ChannelProfile>> {
    let username = username.trim().to_lowercase();
    if username.is_empty() {
        return Err(ApiError::Validation("username is required".into()));
    }

    let row = repo::channel_profile(&state.db, &username, viewer)
        .await?
        .ok_or(ApiError::NotFound("channel does not exist"))?;

    Ok(ApiResponse::ok(
        ChannelProfile::from(row),
        "Channel profile fetched",
    ))
}

#[instrument(skip(state))]
pub async fn watch_history(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<ApiResponse<Vec<WatchHistoryVideo>>> {
    let rows = repo::watch_history(&state.db, user_id).await?;
    let videos: Vec<WatchHistoryVideo> = rows.into_iter().map(Into::into).collect();
    Ok(ApiResponse::ok(videos, "Watch history fetched"))
}

/// Pull the named file field out of a multipart body, if present.
async fn file_field(
    mut mp: Multipart,
    name: &str,
) -> ApiResult<Option<(Bytes, String)>> {
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("malformed multipart body: {e}")))?
    {
        if field.name() != Some(name) {
            continue;
        }
        let content_type = field
            .content_type()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "application/octet-stream".into());
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::Validation(format!("invalid file field: {e}")))?;
        return Ok(Some((data, content_type)));
    }
    Ok(None)
}
