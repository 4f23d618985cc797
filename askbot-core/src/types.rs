use chrono::{DateTime, Utc};

/// A submission fetched from the watched community. Lives for one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub id: String,
    pub title: String,
    /// Self-text of the post, empty for link posts.
    pub body: String,
    pub author: String,
    pub url: String,
    pub permalink: String,
    pub created_utc: DateTime<Utc>,
}

impl Post {
    /// Builds the text sent to the QA backend: title, a blank line, then the body.
    pub fn query_text(&self) -> String {
        format!("{}\n\n{}", self.title, self.body).trim().to_string()
    }

    /// Same as [`Post::query_text`] with an instruction prefix in front.
    pub fn query_text_with_prefix(&self, prefix: Option<&str>) -> String {
        match prefix.map(str::trim).filter(|p| !p.is_empty()) {
            Some(prefix) => format!("{}\n\n{}", prefix, self.query_text()),
            None => self.query_text(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerResponse {
    Success { answer: String },
    Failure { reason: String },
}

impl AnswerResponse {
    pub fn failure(reason: impl Into<String>) -> Self {
        Self::Failure {
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AnswerResponse::Success { .. })
    }
}
