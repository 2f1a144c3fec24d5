use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstagramPost {
    pub id: String,
    pub instagram_id: String,
    pub image_url: String,
    pub caption: Option<String>,
    pub permalink: String,
    pub timestamp: NaiveDateTime,
}

/// One item of the Graph API `/{user}/media` listing.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteMedia {
    pub id: String,
    pub media_url: String,
    pub caption: Option<String>,
    pub permalink: String,
    pub timestamp: String,
    pub media_type: String,
}

impl RemoteMedia {
    /// Videos are skipped; only stills and carousels are mirrored.
    pub fn is_image(&self) -> bool {
        matches!(self.media_type.as_str(), "IMAGE" | "CAROUSEL_ALBUM")
    }
}
