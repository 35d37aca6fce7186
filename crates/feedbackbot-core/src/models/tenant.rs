use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Tenant {
    #[serde(rename = "ID")]
    pub id: u64,
    pub name: String,
    pub slug: String,
    #[serde(rename = "CreatedAt", default)]
    #[cfg_attr(feature = "ts", ts(type = "string | null"))]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "UpdatedAt", default)]
    #[cfg_attr(feature = "ts", ts(type = "string | null"))]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A Telegram bot registered to a tenant. The bot token itself is never
/// returned by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Bot {
    #[serde(rename = "ID")]
    pub id: u64,
    pub tenant_id: u64,
    #[serde(default)]
    pub bot_username: String,
    #[serde(default)]
    pub bot_name: String,
    #[serde(default)]
    pub verified: bool,
    #[serde(rename = "CreatedAt", default)]
    #[cfg_attr(feature = "ts", ts(type = "string | null"))]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "UpdatedAt", default)]
    #[cfg_attr(feature = "ts", ts(type = "string | null"))]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Bot {
    /// `@username` handle, or the display name when the username is unknown
    pub fn handle(&self) -> String {
        if self.bot_username.is_empty() {
            self.bot_name.clone()
        } else {
            format!("@{}", self.bot_username)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bot() {
        let json = r#"{"ID":3,"tenant_id":1,"bot_username":"acme_feedback_bot","bot_name":"Acme Feedback","verified":true,"CreatedAt":"2025-01-05T10:11:12.123456+05:00","UpdatedAt":"2025-01-05T10:11:12Z","DeletedAt":null}"#;
        let bot: Bot = serde_json::from_str(json).expect("Failed to parse bot JSON");
        assert_eq!(bot.id, 3);
        assert!(bot.verified);
        assert_eq!(bot.handle(), "@acme_feedback_bot");
        let created = bot.created_at.expect("created_at");
        assert_eq!(created.to_rfc3339(), "2025-01-05T05:11:12.123456+00:00");
    }

    #[test]
    fn test_bot_handle_without_username() {
        let bot: Bot =
            serde_json::from_str(r#"{"ID":1,"tenant_id":1,"bot_name":"Unverified"}"#).expect("parse");
        assert_eq!(bot.handle(), "Unverified");
    }
}
