use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::db::queries::instagram;
use crate::models::{InstagramPost, RemoteMedia};
use crate::state::AppState;

const FETCH_LIMIT: u32 = 50;
const KEEP_POSTS: i64 = 100;

#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn fetch_recent(&self, limit: u32) -> anyhow::Result<Vec<RemoteMedia>>;
}

pub struct GraphMediaSource {
    access_token: String,
    user_id: String,
    client: reqwest::Client,
}

impl GraphMediaSource {
    pub fn new(access_token: String, user_id: String) -> Self {
        Self {
            access_token,
            user_id,
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Deserialize)]
struct MediaPage {
    data: Vec<RemoteMedia>,
}

#[async_trait]
impl MediaSource for GraphMediaSource {
    async fn fetch_recent(&self, limit: u32) -> anyhow::Result<Vec<RemoteMedia>> {
        if self.access_token.is_empty() || self.user_id.is_empty() {
            anyhow::bail!("Instagram credentials not configured");
        }

        let resp = self
            .client
            .get(format!("https://graph.instagram.com/{}/media", self.user_id))
            .query(&[
                ("fields", "id,media_url,caption,permalink,timestamp,media_type"),
                ("access_token", self.access_token.as_str()),
                ("limit", &limit.to_string()),
            ])
            .send()
            .await
            .context("failed to call Instagram API")?
            .error_for_status()
            .context("Instagram API returned error")?;

        let page: MediaPage = resp
            .json()
            .await
            .context("failed to parse Instagram response")?;
        Ok(page.data)
    }
}

/// Graph API timestamps look like `2024-05-01T12:30:00+0000`.
fn parse_remote_timestamp(s: &str) -> NaiveDateTime {
    DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%z")
        .or_else(|_| DateTime::parse_from_rfc3339(s))
        .map(|dt| dt.with_timezone(&Utc).naive_utc())
        .unwrap_or_else(|_| Utc::now().naive_utc())
}

/// Pulls recent media, stores the images and keeps only the newest posts.
/// Returns how many images were fetched.
pub async fn sync_posts(state: &AppState) -> anyhow::Result<usize> {
    let media = state.media.fetch_recent(FETCH_LIMIT).await?;
    let images: Vec<RemoteMedia> = media.into_iter().filter(|m| m.is_image()).collect();

    let db = state
        .db
        .lock()
        .map_err(|_| anyhow::anyhow!("database mutex poisoned"))?;

    for item in &images {
        let post = InstagramPost {
            id: Uuid::new_v4().to_string(),
            instagram_id: item.id.clone(),
            image_url: item.media_url.clone(),
            caption: item.caption.clone(),
            permalink: item.permalink.clone(),
            timestamp: parse_remote_timestamp(&item.timestamp),
        };
        if let Err(e) = instagram::upsert_post(&db, &post) {
            tracing::error!(instagram_id = %item.id, error = %e, "failed to store Instagram post");
        }
    }

    let pruned = instagram::prune_posts(&db, KEEP_POSTS)?;
    tracing::info!(synced = images.len(), pruned, "Instagram sync finished");
    Ok(images.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_graph_timestamp() {
        let ts = parse_remote_timestamp("2024-05-01T12:30:00+0000");
        assert_eq!(ts.to_string(), "2024-05-01 12:30:00");

        let offset = parse_remote_timestamp("2024-05-01T12:30:00-0600");
        assert_eq!(offset.to_string(), "2024-05-01 18:30:00");
    }
}
