//! Reply-worthiness policy: which backend answers get posted publicly.

use crate::report::SkipReason;
use askbot_core::AnswerResponse;

/// The backend's literal "no information" answer.
pub const FALLBACK_ANSWER: &str = "I'm sorry, I don't have that information.";

pub const DISCLOSURE_FOOTER: &str =
    "\n\n---\n*I am a bot, and this action was performed automatically.*";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict<'a> {
    Reply(&'a str),
    Skip(SkipReason),
}

pub fn evaluate(response: &AnswerResponse) -> Verdict<'_> {
    match response {
        AnswerResponse::Failure { .. } => Verdict::Skip(SkipReason::BackendFailure),
        AnswerResponse::Success { answer } if answer.is_empty() => {
            Verdict::Skip(SkipReason::EmptyAnswer)
        }
        AnswerResponse::Success { answer } if answer == FALLBACK_ANSWER => {
            Verdict::Skip(SkipReason::FallbackAnswer)
        }
        AnswerResponse::Success { answer } => Verdict::Reply(answer),
    }
}

pub fn compose_reply(answer: &str) -> String {
    format!("{}{}", answer, DISCLOSURE_FOOTER)
}
