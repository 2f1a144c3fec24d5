use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContactKind {
    General,
    CustomGuide,
}

impl ContactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactKind::General => "GENERAL",
            ContactKind::CustomGuide => "CUSTOM_GUIDE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "GENERAL" => Some(ContactKind::General),
            "CUSTOM_GUIDE" => Some(ContactKind::CustomGuide),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactForm {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ContactKind,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub message: String,
    pub date_range: Option<String>,
    pub mountain_type: Option<String>,
    pub experience: Option<String>,
    pub budget: Option<String>,
    pub is_read: bool,
    pub created_at: NaiveDateTime,
}
