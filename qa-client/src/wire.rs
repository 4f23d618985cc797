use askbot_core::AnswerResponse;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct AskRequest<'a> {
    pub query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AskReply {
    pub status: bool,
    #[serde(default)]
    pub answer: Option<String>,
}

impl From<AskReply> for AnswerResponse {
    fn from(reply: AskReply) -> Self {
        if reply.status {
            AnswerResponse::Success {
                answer: reply.answer.unwrap_or_default(),
            }
        } else {
            AnswerResponse::failure("backend returned status=false")
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuotaEnvelope {
    pub quota: Quota,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Quota {
    pub thinking: ModeQuota,
    pub primary: ModeQuota,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModeQuota {
    pub available: bool,
}
