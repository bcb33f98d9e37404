use std::sync::Arc;

use bytes::Bytes;
use tracing::warn;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
    storage::StorageClient,
};

/// Upload an image to blob storage under `{prefix}/{uuid}.{ext}` and
/// return its durable URL. A collaborator that yields no URL is an
/// upload failure, not a silent empty field.
pub async fn upload_image(
    st: &AppState,
    prefix: &str,
    body: Bytes,
    content_type: &str,
) -> ApiResult<String> {
    if body.is_empty() {
        return Err(ApiError::Validation("uploaded file is empty".into()));
    }
    let ext = ext_from_mime(content_type).unwrap_or("bin");
    let key = format!("{}/{}.{}", prefix, Uuid::new_v4(), ext);
    let url = st
        .storage
        .put_object(&key, body, content_type)
        .await
        .map_err(|e| ApiError::Upload(e.to_string()))?;
    if url.is_empty() {
        return Err(ApiError::Upload("storage returned no url".into()));
    }
    Ok(url)
}

/// Best-effort deletion of a superseded asset. Runs detached so the
/// response is never blocked on cleanup; failures are logged and dropped.
pub fn release_stale_asset(storage: Arc<dyn StorageClient>, url: Option<String>) {
    let Some(url) = url else { return };
    tokio::spawn(async move {
        match storage.key_of(&url) {
            Some(key) => {
                if let Err(e) = storage.delete_object(&key).await {
                    warn!(error = %e, key = %key, "stale asset cleanup failed");
                }
            }
            None => warn!(url = %url, "stale asset url not recognized, skipping cleanup"),
        }
    });
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ext_from_mime() {
        assert_eq!(ext_from_mime("image/jpeg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/jpg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/png"), Some("png"));
        assert_eq!(ext_from_mime("image/webp"), Some("webp"));
        assert_eq!(ext_from_mime("image/heic"), Some("heic"));
        assert_eq!(ext_from_mime("application/octet-stream"), None);
        assert_eq!(ext_from_mime("whatever/else"), None);
    }

    #[tokio::test]
    async fn upload_image_returns_prefixed_url() {
        let state = AppState::fake();
        let url = upload_image(&state, "avatars", Bytes::from_static(b"png"), "image/png")
            .await
            .unwrap();
        assert!(url.starts_with("https://fake.local/avatars/"));
        assert!(url.ends_with(".png"));
        // The fake storage can map its own URLs back to keys for cleanup.
        let key = state.storage.key_of(&url).unwrap();
        assert!(key.starts_with("avatars/"));
    }

    #[tokio::test]
    async fn upload_image_rejects_empty_body() {
        let state = AppState::fake();
        let err = upload_image(&state, "avatars", Bytes::new(), "image/png")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }
}
