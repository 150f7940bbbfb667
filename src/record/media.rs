//! Screenshots and reviews owned by a record

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Screenshot {
    /// Identifying key: two screenshots with the same url are the same screenshot
    pub url: String,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

impl Screenshot {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            caption: None,
            is_default: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub summary: String,
    pub text: String,
    pub author: String,
    /// 0-100
    pub rating: i32,
    /// Unix timestamp
    pub date: i64,
}

impl Review {
    /// Reviews are considered duplicates when author, date and summary match
    pub fn same_review(&self, other: &Review) -> bool {
        self.author == other.author && self.date == other.date && self.summary == other.summary
    }
}
