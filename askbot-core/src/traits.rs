use crate::{AnswerResponse, CoreError, Post};
use async_trait::async_trait;

/// The discussion platform the bot reads from and replies on.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Newest posts of `community`, newest first, at most `limit` of them.
    async fn list_newest(&self, community: &str, limit: u32) -> Result<Vec<Post>, CoreError>;

    async fn reply(&self, post_id: &str, text: &str) -> Result<(), CoreError>;
}

/// Question-answering service. Transport problems are folded into
/// [`AnswerResponse::Failure`] rather than returned as errors.
#[async_trait]
pub trait AnswerBackend: Send + Sync {
    async fn ask(&self, query: &str) -> AnswerResponse;
}
