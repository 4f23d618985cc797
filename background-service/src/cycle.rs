//! One fetch, filter and reply pass over a community.

use crate::policy::{self, Verdict};
use crate::report::{CycleReport, PostOutcome, SkipReason};
use crate::seen::SeenPosts;
use askbot_core::{AnswerBackend, CoreError, Platform, Post};
use chrono::{DateTime, Duration, Utc};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, Instrument};

#[derive(Debug, Clone)]
pub struct CycleSettings {
    pub community: String,
    /// Look-back window, in minutes. Usually equal to the scheduling interval.
    pub interval_minutes: u64,
    pub max_posts: u32,
    pub query_prefix: Option<String>,
}

impl CycleSettings {
    pub fn from_config(config: &askbot_core::BotConfig) -> Self {
        Self {
            community: config.subreddit.clone(),
            interval_minutes: config.interval,
            max_posts: config.n,
            query_prefix: config.query_prefix.clone(),
        }
    }

    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let minutes = i64::try_from(self.interval_minutes).unwrap_or(i64::MAX);
        Duration::try_minutes(minutes)
            .and_then(|window| now.checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

pub struct PollCycle<P, B> {
    platform: Arc<P>,
    backend: Arc<B>,
    settings: CycleSettings,
}

impl<P: Platform, B: AnswerBackend> PollCycle<P, B> {
    pub fn new(platform: Arc<P>, backend: Arc<B>, settings: CycleSettings) -> Self {
        Self {
            platform,
            backend,
            settings,
        }
    }

    pub fn settings(&self) -> &CycleSettings {
        &self.settings
    }

    pub async fn run(&self, seen: &mut SeenPosts) -> CycleReport {
        self.run_at(Utc::now(), seen).await
    }

    /// Runs a cycle as if the current time were `now`. Never fails: every
    /// problem ends up in the returned report.
    pub async fn run_at(&self, now: DateTime<Utc>, seen: &mut SeenPosts) -> CycleReport {
        let mut report = CycleReport::new(now, self.settings.cutoff(now));
        let span = info_span!("cycle", id = %report.cycle_id, community = %self.settings.community);

        async {
            let posts = match self.fetch_recent(report.cutoff).await {
                Ok(posts) => posts,
                Err(e) => {
                    error!("Failed to fetch posts from r/{}: {}", self.settings.community, e);
                    report.fetch_error = Some(e.to_string());
                    return;
                }
            };
            report.fetched = posts.len();
            info!(
                "Fetched {} posts from the last {} minutes",
                posts.len(),
                self.settings.interval_minutes
            );

            for post in &posts {
                let outcome = self.handle_post(post, seen).await;
                if outcome.marks_seen() {
                    seen.insert(&post.id);
                }
                report.outcomes.push((post.id.clone(), outcome));
            }
        }
        .instrument(span)
        .await;

        report
    }

    /// Newest posts created at or after `cutoff`, newest first.
    async fn fetch_recent(&self, cutoff: DateTime<Utc>) -> Result<Vec<Post>, CoreError> {
        let posts = self
            .platform
            .list_newest(&self.settings.community, self.settings.max_posts)
            .await?;
        let recent = filter_recent(posts, cutoff, self.settings.max_posts);
        for post in &recent {
            info!(
                "[NEW POST] {} | created {} | {}",
                post.title, post.created_utc, post.url
            );
        }
        Ok(recent)
    }

    async fn handle_post(&self, post: &Post, seen: &SeenPosts) -> PostOutcome {
        if seen.contains(&post.id) {
            debug!("Skipping {}: already handled", post.id);
            return PostOutcome::Skipped(SkipReason::AlreadySeen);
        }

        let result = AssertUnwindSafe(self.answer_post(post)).catch_unwind().await;
        match result {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                error!("Failed to process post: {} - {}: {}", post.id, post.title, e);
                PostOutcome::Failed {
                    error: e.to_string(),
                }
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(
                    "Panicked while processing post: {} - {}: {}",
                    post.id, post.title, message
                );
                PostOutcome::Failed { error: message }
            }
        }
    }

    async fn answer_post(&self, post: &Post) -> Result<PostOutcome, CoreError> {
        let query = post.query_text_with_prefix(self.settings.query_prefix.as_deref());
        let response = self.backend.ask(&query).await;

        match policy::evaluate(&response) {
            Verdict::Skip(reason) => {
                debug!("Not replying to {}: {:?}", post.id, reason);
                Ok(PostOutcome::Skipped(reason))
            }
            Verdict::Reply(answer) => {
                self.platform
                    .reply(&post.id, &policy::compose_reply(answer))
                    .await?;
                info!("Replied to post: {} - {}: {}", post.id, post.title, answer);
                Ok(PostOutcome::Replied)
            }
        }
    }
}

/// Keeps posts with `created_utc >= cutoff`, preserving order, up to `max_posts`.
pub fn filter_recent(posts: Vec<Post>, cutoff: DateTime<Utc>, max_posts: u32) -> Vec<Post> {
    posts
        .into_iter()
        .filter(|post| post.created_utc >= cutoff)
        .take(max_posts as usize)
        .collect()
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
