use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default page size used by the server when none is requested
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// A piece of feedback submitted through the bot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Feedback {
    #[serde(rename = "ID")]
    pub id: u64,
    pub tenant_id: u64,
    pub group_id: u64,
    pub message: String,
    pub admin_only: bool,
    pub posted: bool,
    #[serde(default)]
    pub group_name: Option<String>,
    #[serde(rename = "CreatedAt", default)]
    #[cfg_attr(feature = "ts", ts(type = "string | null"))]
    pub created_at: Option<DateTime<Utc>>,
}

/// One page of feedback plus paging totals.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct FeedbackPage {
    pub data: Vec<Feedback>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

impl FeedbackPage {
    pub fn total_pages(&self) -> u64 {
        let limit = u64::from(self.limit.max(1));
        self.total.div_ceil(limit)
    }

    pub fn has_next(&self) -> bool {
        u64::from(self.page) < self.total_pages()
    }
}

/// Visibility filter for feedback listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminFilter {
    AdminOnly,
    Public,
}

impl AdminFilter {
    pub fn as_query(&self) -> &'static str {
        match self {
            AdminFilter::AdminOnly => "true",
            AdminFilter::Public => "false",
        }
    }
}

/// Filters for listing or exporting feedback of one group.
#[derive(Debug, Clone, Default)]
pub struct FeedbackParams {
    pub group_id: u64,
    pub admin_only: Option<AdminFilter>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub search: Option<String>,
}

impl FeedbackParams {
    pub fn for_group(group_id: u64) -> Self {
        Self {
            group_id,
            ..Self::default()
        }
    }

    /// Query pairs in the order the server documents them. Unset (or zero /
    /// empty) filters are omitted; `group_id` is always present.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("group_id", self.group_id.to_string())];
        if let Some(filter) = self.admin_only {
            pairs.push(("admin_only", filter.as_query().to_string()));
        }
        if let Some(page) = self.page.filter(|p| *p > 0) {
            pairs.push(("page", page.to_string()));
        }
        if let Some(limit) = self.limit.filter(|l| *l > 0) {
            pairs.push(("limit", limit.to_string()));
        }
        let text_filters = [
            ("date_from", &self.date_from),
            ("date_to", &self.date_to),
            ("search", &self.search),
        ];
        for (key, value) in text_filters {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                pairs.push((key, value.to_string()));
            }
        }
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_pairs_only_group() {
        let params = FeedbackParams::for_group(5);
        assert_eq!(params.query_pairs(), vec![("group_id", "5".to_string())]);
    }

    #[test]
    fn test_query_pairs_all_filters() {
        let params = FeedbackParams {
            group_id: 5,
            admin_only: Some(AdminFilter::Public),
            page: Some(2),
            limit: Some(50),
            date_from: Some("2025-01-01".to_string()),
            date_to: Some(String::new()),
            search: Some("wifi".to_string()),
        };
        let keys: Vec<&str> = params.query_pairs().iter().map(|(k, _)| *k).collect();
        assert_eq!(
            keys,
            vec!["group_id", "admin_only", "page", "limit", "date_from", "search"]
        );
        assert_eq!(params.query_pairs()[1].1, "false");
    }

    #[test]
    fn test_query_pairs_skip_zero_page() {
        let params = FeedbackParams {
            page: Some(0),
            ..FeedbackParams::for_group(1)
        };
        assert_eq!(params.query_pairs().len(), 1);
    }

    #[test]
    fn test_page_math() {
        let page = FeedbackPage {
            data: Vec::new(),
            total: 41,
            page: 2,
            limit: 20,
        };
        assert_eq!(page.total_pages(), 3);
        assert!(page.has_next());

        let last = FeedbackPage { page: 3, ..page };
        assert!(!last.has_next());
    }

    #[test]
    fn test_parse_feedback_page() {
        let json = r#"{"data":[{"ID":1,"tenant_id":1,"group_id":5,"message":"More coffee","admin_only":false,"posted":true,"group_name":"Office","CreatedAt":"2025-03-01T09:00:00Z"}],"total":1,"page":1,"limit":20}"#;
        let page: FeedbackPage = serde_json::from_str(json).expect("Failed to parse page");
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.data[0].group_name.as_deref(), Some("Office"));
        assert!(!page.has_next());
    }
}
