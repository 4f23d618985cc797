//! Scheduled poll-and-reply service.
//!
//! Every interval the service lists the newest posts of a community, asks the
//! QA backend about the ones created inside the look-back window and replies
//! to those with a substantive answer.

pub mod cycle;
pub mod policy;
pub mod report;
pub mod scheduler;
pub mod seen;

#[cfg(test)]
mod tests;

pub use cycle::{filter_recent, CycleSettings, PollCycle};
pub use policy::{compose_reply, DISCLOSURE_FOOTER, FALLBACK_ANSWER};
pub use report::{CycleReport, PostOutcome, SkipReason};
pub use scheduler::{spawn, SchedulerHandle};
pub use seen::SeenPosts;
