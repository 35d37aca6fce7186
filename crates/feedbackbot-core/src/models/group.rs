use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Telegram chat type of a group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum GroupType {
    Group,
    Supergroup,
    Forum,
    #[serde(other)]
    Other,
}

impl GroupType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupType::Group => "group",
            GroupType::Supergroup => "supergroup",
            GroupType::Forum => "forum",
            GroupType::Other => "other",
        }
    }
}

/// A group chat the tenant's bot was added to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Group {
    #[serde(rename = "ID")]
    pub id: u64,
    pub tenant_id: u64,
    pub bot_id: u64,
    pub chat_id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "type")]
    pub group_type: GroupType,
    pub is_active: bool,
    #[serde(rename = "CreatedAt", default)]
    #[cfg_attr(feature = "ts", ts(type = "string | null"))]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "UpdatedAt", default)]
    #[cfg_attr(feature = "ts", ts(type = "string | null"))]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Per-group feedback delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct FeedbackConfig {
    #[serde(rename = "ID")]
    pub id: u64,
    pub group_id: u64,
    pub post_to_group: bool,
    #[serde(default)]
    pub forum_topic_id: Option<i64>,
}
