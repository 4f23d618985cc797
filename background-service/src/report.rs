use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Already handled in an earlier cycle.
    AlreadySeen,
    BackendFailure,
    EmptyAnswer,
    FallbackAnswer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostOutcome {
    Replied,
    Skipped(SkipReason),
    Failed { error: String },
}

impl PostOutcome {
    /// Whether the post should be remembered so later cycles leave it alone.
    /// Backend failures and errors are not remembered and may be retried.
    pub fn marks_seen(&self) -> bool {
        matches!(
            self,
            PostOutcome::Replied
                | PostOutcome::Skipped(SkipReason::EmptyAnswer | SkipReason::FallbackAnswer)
        )
    }
}

/// What happened during one cycle, in processing order.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub cutoff: DateTime<Utc>,
    pub fetched: usize,
    pub fetch_error: Option<String>,
    pub outcomes: Vec<(String, PostOutcome)>,
}

impl CycleReport {
    pub fn new(started_at: DateTime<Utc>, cutoff: DateTime<Utc>) -> Self {
        Self {
            cycle_id: Uuid::new_v4(),
            started_at,
            cutoff,
            fetched: 0,
            fetch_error: None,
            outcomes: Vec::new(),
        }
    }

    pub fn replied(&self) -> usize {
        self.count(|o| matches!(o, PostOutcome::Replied))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, PostOutcome::Skipped(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, PostOutcome::Failed { .. }))
    }

    pub fn outcome_for(&self, post_id: &str) -> Option<&PostOutcome> {
        self.outcomes
            .iter()
            .find(|(id, _)| id == post_id)
            .map(|(_, outcome)| outcome)
    }

    pub fn summary(&self) -> String {
        match &self.fetch_error {
            Some(error) => format!("cycle {} aborted: fetch failed: {}", self.cycle_id, error),
            None => format!(
                "cycle {} done: {} fetched, {} replied, {} skipped, {} failed",
                self.cycle_id,
                self.fetched,
                self.replied(),
                self.skipped(),
                self.failed()
            ),
        }
    }

    fn count(&self, predicate: impl Fn(&PostOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| predicate(o)).count()
    }
}
