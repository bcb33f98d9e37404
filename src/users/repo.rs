use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// One row of the channel-profile aggregation.
#[derive(Debug, Clone, FromRow)]
pub struct ChannelProfileRow {
    pub full_name: String,
    pub username: String,
    pub email: String,
    pub avatar: String,
    pub cover_image: Option<String>,
    pub subscriber_count: i64,
    pub subscribed_to_count: i64,
    pub is_subscribed: bool,
}

/// Channel profile for a normalized username, with the viewer's
/// subscription state derived when a viewer is present. A single
/// statement so counts and membership come from one snapshot.
pub async fn channel_profile(
    db: &PgPool,
    username: &str,
    viewer: Option<Uuid>,
) -> anyhow::Result<Option<ChannelProfileRow>> {
    let rows = sqlx::query_as::<_, ChannelProfileRow>(
        r#"
        SELECT u.full_name,
               u.username,
               u.email,
               u.avatar,
               u.cover_image,
               (SELECT COUNT(*) FROM subscriptions s
                 WHERE s.channel_id = u.id)            AS subscriber_count,
               (SELECT COUNT(*) FROM subscriptions s
                 WHERE s.subscriber_id = u.id)         AS subscribed_to_count,
               EXISTS (SELECT 1 FROM subscriptions s
                 WHERE s.channel_id = u.id
                   AND s.subscriber_id = $2)           AS is_subscribed
        FROM users u
        WHERE u.username = $1
        "#,
    )
    .bind(username)
    .bind(viewer)
    .fetch_all(db)
    .await?;

    match rows.len() {
        0 => Ok(None),
        1 => Ok(rows.into_iter().next()),
        n => anyhow::bail!("channel aggregation returned {n} rows for username {username}"),
    }
}

/// One enriched watch-history entry: the video joined with its owner's
/// public fields only.
#[derive(Debug, Clone, FromRow)]
pub struct WatchHistoryRow {
    pub video_id: Uuid,
    pub title: String,
    pub thumbnail: String,
    pub duration_secs: i64,
    pub created_at: OffsetDateTime,
    pub owner_full_name: String,
    pub owner_username: String,
    pub owner_avatar: String,
}

/// Watch history in stored order, most recently watched first. Empty when
/// the user has watched nothing.
pub async fn watch_history(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<WatchHistoryRow>> {
    let rows = sqlx::query_as::<_, WatchHistoryRow>(
        r#"
        SELECT v.id            AS video_id,
               v.title,
               v.thumbnail,
               v.duration_secs,
               v.created_at,
               o.full_name     AS owner_full_name,
               o.username      AS owner_username,
               o.avatar        AS owner_avatar
        FROM watch_history wh
        JOIN videos v ON v.id = wh.video_id
        JOIN users o  ON o.id = v.owner_id
        WHERE wh.user_id = $1
        ORDER BY wh.watched_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}
