use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One stored submission with the comments that survived the filter.
#[derive(Debug, Clone, PartialEq)]
pub struct PostRecord {
    pub collected_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub community: String,
    pub title: String,
    pub url: String,
    pub score: i64,
    pub body: String,
    pub comments: Vec<CommentRecord>,
}

/// Comments are embedded in the post row as a JSON array.
/// Missing fields read back as "No Comment" / 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentRecord {
    #[serde(default = "no_comment")]
    pub text: String,
    #[serde(default)]
    pub score: i64,
}

fn no_comment() -> String {
    "No Comment".to_string()
}
