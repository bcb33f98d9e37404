use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::users::repo::{ChannelProfileRow, WatchHistoryRow};

/// Public channel view: profile fields plus graph-derived counts and the
/// viewer's subscription state.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelProfile {
    pub full_name: String,
    pub username: String,
    pub email: String,
    pub avatar: String,
    pub cover_image: Option<String>,
    pub subscriber_count: i64,
    pub subscribed_to_count: i64,
    pub is_subscribed: bool,
}

impl From<ChannelProfileRow> for ChannelProfile {
    fn from(r: ChannelProfileRow) -> Self {
        Self {
            full_name: r.full_name,
            username: r.username,
            email: r.email,
            avatar: r.avatar,
            cover_image: r.cover_image,
            subscriber_count: r.subscriber_count,
            subscribed_to_count: r.subscribed_to_count,
            is_subscribed: r.is_subscribed,
        }
    }
}

/// Owner projection attached to each watch-history entry. Only these three
/// fields of the owner are ever exposed.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoOwner {
    pub full_name: String,
    pub username: String,
    pub avatar: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchHistoryVideo {
    pub id: Uuid,
    pub title: String,
    pub thumbnail: String,
    pub duration_secs: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub owner: VideoOwner,
}

impl From<WatchHistoryRow> for WatchHistoryVideo {
    fn from(r: WatchHistoryRow) -> Self {
        Self {
            id: r.video_id,
            title: r.title,
            thumbnail: r.thumbnail,
            duration_secs: r.duration_secs,
            created_at: r.created_at,
            owner: VideoOwner {
                full_name: r.owner_full_name,
                username: r.owner_username,
                avatar: r.owner_avatar,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub full_name: String,
    pub email: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_profile_serializes_camel_case() {
        let profile = ChannelProfile::from(ChannelProfileRow {
            full_name: "Alice Archer".into(),
            username: "alice".into(),
            email: "a@x.com".into(),
            avatar: "https://fake.local/avatars/a.png".into(),
            cover_image: None,
            subscriber_count: 3,
            subscribed_to_count: 7,
            is_subscribed: true,
        });
        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["subscriberCount"], 3);
        assert_eq!(json["subscribedToCount"], 7);
        assert_eq!(json["isSubscribed"], true);
        assert_eq!(json["fullName"], "Alice Archer");
        assert_eq!(json["coverImage"], serde_json::Value::Null);
    }

    #[test]
    fn watch_history_entry_exposes_only_public_owner_fields() {
        let entry = WatchHistoryVideo::from(WatchHistoryRow {
            video_id: Uuid::new_v4(),
            title: "intro".into(),
            thumbnail: "https://fake.local/thumbs/t.png".into(),
            duration_secs: 42,
            created_at: OffsetDateTime::now_utc(),
            owner_full_name: "Bob".into(),
            owner_username: "bob".into(),
            owner_avatar: "https://fake.local/avatars/b.png".into(),
        });
        let json = serde_json::to_value(&entry).unwrap();
        let owner = &json["owner"];
        assert_eq!(owner["username"], "bob");
        assert_eq!(owner.as_object().unwrap().len(), 3);
        assert!(owner.get("email").is_none());
    }

    #[test]
    fn change_password_request_parses_camel_case() {
        let req: ChangePasswordRequest = serde_json::from_str(
            r#"{"oldPassword":"a","newPassword":"b","confirmPassword":"b"}"#,
        )
        .unwrap();
        assert_eq!(req.old_password, "a");
        assert_eq!(req.new_password, req.confirm_password);
    }
}
