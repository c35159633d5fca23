use serde::{Deserialize, Serialize};

/// Snapshot of a news item as returned by the backend.
///
/// The chat session holds these by value: once captured, an article is never
/// re-fetched or re-validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub published_at: String,
}

impl Article {
    /// Serialized form sent to the backend in `selected_news_article`.
    pub fn to_wire(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
