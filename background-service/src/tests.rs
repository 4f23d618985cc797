#[cfg(test)]
mod tests {
    use crate::cycle::{filter_recent, CycleSettings, PollCycle};
    use crate::policy::{DISCLOSURE_FOOTER, FALLBACK_ANSWER};
    use crate::report::{PostOutcome, SkipReason};
    use crate::scheduler;
    use crate::seen::SeenPosts;
    use askbot_core::{AnswerBackend, AnswerResponse, CoreError, Platform, Post, RedditApiError};
    use async_trait::async_trait;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio_util::sync::CancellationToken;

    #[derive(Default)]
    struct FakePlatform {
        posts: Vec<Post>,
        fail_listing: bool,
        reject_replies_to: HashSet<String>,
        list_calls: AtomicUsize,
        requested_limits: Mutex<Vec<u32>>,
        replies: Mutex<Vec<(String, String)>>,
    }

    impl FakePlatform {
        fn with_posts(posts: Vec<Post>) -> Self {
            Self {
                posts,
                ..Default::default()
            }
        }

        fn replies(&self) -> Vec<(String, String)> {
            self.replies.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Platform for FakePlatform {
        async fn list_newest(&self, _community: &str, limit: u32) -> Result<Vec<Post>, CoreError> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            self.requested_limits.lock().unwrap().push(limit);
            if self.fail_listing {
                return Err(CoreError::RedditApi(RedditApiError::ServerError {
                    status_code: 503,
                }));
            }
            Ok(self.posts.iter().take(limit as usize).cloned().collect())
        }

        async fn reply(&self, post_id: &str, text: &str) -> Result<(), CoreError> {
            if self.reject_replies_to.contains(post_id) {
                return Err(CoreError::RedditApi(RedditApiError::ReplyRejected {
                    post_id: post_id.to_string(),
                    reason: "THREAD_LOCKED".to_string(),
                }));
            }
            self.replies
                .lock()
                .unwrap()
                .push((post_id.to_string(), text.to_string()));
            Ok(())
        }
    }

    /// Answers by post title. Queries are matched on their first line.
    struct FakeBackend {
        answers: Mutex<HashMap<String, AnswerResponse>>,
        default: AnswerResponse,
        panic_on: Option<String>,
        queries: Mutex<Vec<String>>,
    }

    impl FakeBackend {
        fn answering(default: AnswerResponse) -> Self {
            Self {
                answers: Mutex::new(HashMap::new()),
                default,
                panic_on: None,
                queries: Mutex::new(Vec::new()),
            }
        }

        fn with_answer(self, title: &str, response: AnswerResponse) -> Self {
            self.set_answer(title, response);
            self
        }

        fn set_answer(&self, title: &str, response: AnswerResponse) {
            self.answers
                .lock()
                .unwrap()
                .insert(title.to_string(), response);
        }

        fn queries(&self) -> Vec<String> {
            self.queries.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AnswerBackend for FakeBackend {
        async fn ask(&self, query: &str) -> AnswerResponse {
            self.queries.lock().unwrap().push(query.to_string());
            let title = query.lines().next().unwrap_or_default().to_string();
            if self.panic_on.as_deref() == Some(title.as_str()) {
                panic!("backend exploded on {}", title);
            }
            self.answers
                .lock()
                .unwrap()
                .get(&title)
                .cloned()
                .unwrap_or_else(|| self.default.clone())
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 2, 12, 0, 0).unwrap()
    }

    fn post(id: &str, minutes_ago: i64) -> Post {
        Post {
            id: id.to_string(),
            title: format!("Question {}", id),
            body: format!("Details for {}", id),
            author: "student".to_string(),
            url: format!("https://www.reddit.com/r/PESU/comments/{}/", id),
            permalink: format!("https://www.reddit.com/r/PESU/comments/{}/", id),
            created_utc: now() - Duration::minutes(minutes_ago),
        }
    }

    fn success(answer: &str) -> AnswerResponse {
        AnswerResponse::Success {
            answer: answer.to_string(),
        }
    }

    fn settings(max_posts: u32) -> CycleSettings {
        CycleSettings {
            community: "PESU".to_string(),
            interval_minutes: 10,
            max_posts,
            query_prefix: None,
        }
    }

    fn cycle(
        platform: &Arc<FakePlatform>,
        backend: &Arc<FakeBackend>,
        settings: CycleSettings,
    ) -> PollCycle<FakePlatform, FakeBackend> {
        PollCycle::new(Arc::clone(platform), Arc::clone(backend), settings)
    }

    #[tokio::test]
    async fn test_window_boundary_is_inclusive() {
        let mut boundary = post("edge", 10);
        boundary.created_utc = now() - Duration::minutes(10);
        let mut just_outside = post("old", 10);
        just_outside.created_utc = now() - Duration::minutes(10) - Duration::seconds(1);

        let platform = Arc::new(FakePlatform::with_posts(vec![
            post("fresh", 1),
            boundary,
            just_outside,
        ]));
        let backend = Arc::new(FakeBackend::answering(success("Yes.")));

        let report = cycle(&platform, &backend, settings(10))
            .run_at(now(), &mut SeenPosts::disabled())
            .await;

        assert_eq!(report.cutoff, now() - Duration::minutes(10));
        assert_eq!(report.fetched, 2);
        assert_eq!(report.outcome_for("fresh"), Some(&PostOutcome::Replied));
        assert_eq!(report.outcome_for("edge"), Some(&PostOutcome::Replied));
        assert_eq!(report.outcome_for("old"), None);
        assert_eq!(backend.queries().len(), 2);
    }

    #[tokio::test]
    async fn test_backend_failure_is_silent_skip() {
        let platform = Arc::new(FakePlatform::with_posts(vec![post("a", 1)]));
        let backend = Arc::new(FakeBackend::answering(AnswerResponse::failure(
            "connection refused",
        )));

        let report = cycle(&platform, &backend, settings(10))
            .run_at(now(), &mut SeenPosts::new(10))
            .await;

        assert_eq!(
            report.outcome_for("a"),
            Some(&PostOutcome::Skipped(SkipReason::BackendFailure))
        );
        assert!(platform.replies().is_empty());
    }

    #[tokio::test]
    async fn test_empty_and_fallback_answers_are_skipped() {
        let platform = Arc::new(FakePlatform::with_posts(vec![post("a", 1), post("b", 2)]));
        let backend = Arc::new(
            FakeBackend::answering(success("unused"))
                .with_answer("Question a", success(""))
                .with_answer("Question b", success(FALLBACK_ANSWER)),
        );

        let report = cycle(&platform, &backend, settings(10))
            .run_at(now(), &mut SeenPosts::disabled())
            .await;

        assert_eq!(
            report.outcome_for("a"),
            Some(&PostOutcome::Skipped(SkipReason::EmptyAnswer))
        );
        assert_eq!(
            report.outcome_for("b"),
            Some(&PostOutcome::Skipped(SkipReason::FallbackAnswer))
        );
        assert!(platform.replies().is_empty());
    }

    #[tokio::test]
    async fn test_substantive_answer_gets_one_reply_with_footer() {
        let platform = Arc::new(FakePlatform::with_posts(vec![post("a", 3)]));
        let backend = Arc::new(FakeBackend::answering(success(
            "The ISA-1 schedule is on the notice board.",
        )));

        let report = cycle(&platform, &backend, settings(10))
            .run_at(now(), &mut SeenPosts::disabled())
            .await;

        assert_eq!(report.replied(), 1);
        let replies = platform.replies();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].0, "a");
        assert_eq!(
            replies[0].1,
            format!(
                "The ISA-1 schedule is on the notice board.{}",
                DISCLOSURE_FOOTER
            )
        );
        assert!(replies[0]
            .1
            .ends_with("*I am a bot, and this action was performed automatically.*"));
    }

    #[tokio::test]
    async fn test_query_is_title_then_body_with_prefix() {
        let platform = Arc::new(FakePlatform::with_posts(vec![post("a", 1)]));
        let backend = Arc::new(FakeBackend::answering(success("ok")));
        let mut with_prefix = settings(10);
        with_prefix.query_prefix = Some("Answer briefly.".to_string());

        cycle(&platform, &backend, settings(10))
            .run_at(now(), &mut SeenPosts::disabled())
            .await;
        cycle(&platform, &backend, with_prefix)
            .run_at(now(), &mut SeenPosts::disabled())
            .await;

        assert_eq!(
            backend.queries(),
            vec![
                "Question a\n\nDetails for a".to_string(),
                "Answer briefly.\n\nQuestion a\n\nDetails for a".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_max_posts_caps_processing() {
        let posts = (0..5).map(|i| post(&format!("p{}", i), i)).collect();
        let platform = Arc::new(FakePlatform::with_posts(posts));
        let backend = Arc::new(FakeBackend::answering(success("ok")));

        let report = cycle(&platform, &backend, settings(2))
            .run_at(now(), &mut SeenPosts::disabled())
            .await;

        assert_eq!(*platform.requested_limits.lock().unwrap(), vec![2]);
        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(platform.replies().len(), 2);
    }

    #[tokio::test]
    async fn test_processing_order_is_newest_first() {
        let platform = Arc::new(FakePlatform::with_posts(vec![
            post("newest", 1),
            post("middle", 4),
            post("oldest", 8),
        ]));
        let backend = Arc::new(FakeBackend::answering(success("ok")));

        let report = cycle(&platform, &backend, settings(10))
            .run_at(now(), &mut SeenPosts::disabled())
            .await;

        let ids: Vec<_> = report.outcomes.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["newest", "middle", "oldest"]);
    }

    #[tokio::test]
    async fn test_reply_failure_does_not_stop_cycle() {
        let mut platform = FakePlatform::with_posts(vec![post("1", 1), post("2", 2), post("3", 3)]);
        platform.reject_replies_to.insert("2".to_string());
        let platform = Arc::new(platform);
        let backend = Arc::new(FakeBackend::answering(success("Substantive answer")));

        let report = cycle(&platform, &backend, settings(10))
            .run_at(now(), &mut SeenPosts::disabled())
            .await;

        assert_eq!(report.outcome_for("1"), Some(&PostOutcome::Replied));
        assert!(matches!(
            report.outcome_for("2"),
            Some(PostOutcome::Failed { .. })
        ));
        assert_eq!(report.outcome_for("3"), Some(&PostOutcome::Replied));

        let replied: Vec<_> = platform.replies().into_iter().map(|(id, _)| id).collect();
        assert_eq!(replied, vec!["1".to_string(), "3".to_string()]);
    }

    #[tokio::test]
    async fn test_backend_panic_is_contained() {
        let platform = Arc::new(FakePlatform::with_posts(vec![post("1", 1), post("2", 2)]));
        let mut backend = FakeBackend::answering(success("ok"));
        backend.panic_on = Some("Question 1".to_string());
        let backend = Arc::new(backend);

        let report = cycle(&platform, &backend, settings(10))
            .run_at(now(), &mut SeenPosts::disabled())
            .await;

        match report.outcome_for("1") {
            Some(PostOutcome::Failed { error }) => assert!(error.contains("backend exploded")),
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(report.outcome_for("2"), Some(&PostOutcome::Replied));
    }

    #[tokio::test]
    async fn test_fetch_failure_is_recorded() {
        let platform = Arc::new(FakePlatform {
            fail_listing: true,
            ..Default::default()
        });
        let backend = Arc::new(FakeBackend::answering(success("ok")));

        let report = cycle(&platform, &backend, settings(10))
            .run_at(now(), &mut SeenPosts::new(10))
            .await;

        assert!(report.fetch_error.is_some());
        assert_eq!(report.fetched, 0);
        assert!(report.outcomes.is_empty());
        assert!(backend.queries().is_empty());
    }

    #[tokio::test]
    async fn test_repeated_cycles_reply_again_without_seen_set() {
        let platform = Arc::new(FakePlatform::with_posts(vec![post("a", 1)]));
        let backend = Arc::new(FakeBackend::answering(success("ok")));
        let poll = cycle(&platform, &backend, settings(10));
        let mut seen = SeenPosts::disabled();

        poll.run_at(now(), &mut seen).await;
        poll.run_at(now() + Duration::minutes(1), &mut seen).await;

        assert_eq!(platform.replies().len(), 2);
    }

    #[tokio::test]
    async fn test_seen_set_prevents_duplicate_replies() {
        let platform = Arc::new(FakePlatform::with_posts(vec![post("a", 1), post("b", 2)]));
        let backend = Arc::new(
            FakeBackend::answering(success("ok")).with_answer("Question b", success(FALLBACK_ANSWER)),
        );
        let poll = cycle(&platform, &backend, settings(10));
        let mut seen = SeenPosts::new(100);

        poll.run_at(now(), &mut seen).await;
        let second = poll.run_at(now() + Duration::minutes(1), &mut seen).await;

        assert_eq!(platform.replies().len(), 1);
        assert_eq!(
            second.outcome_for("a"),
            Some(&PostOutcome::Skipped(SkipReason::AlreadySeen))
        );
        assert_eq!(
            second.outcome_for("b"),
            Some(&PostOutcome::Skipped(SkipReason::AlreadySeen))
        );
        assert_eq!(backend.queries().len(), 2);
    }

    #[tokio::test]
    async fn test_backend_failure_is_retried_next_cycle() {
        let platform = Arc::new(FakePlatform::with_posts(vec![post("a", 1)]));
        let backend = Arc::new(FakeBackend::answering(AnswerResponse::failure("busy")));
        let poll = cycle(&platform, &backend, settings(10));
        let mut seen = SeenPosts::new(100);

        let first = poll.run_at(now(), &mut seen).await;
        backend.set_answer("Question a", success("Now I know."));
        let second = poll.run_at(now() + Duration::minutes(1), &mut seen).await;

        assert_eq!(
            first.outcome_for("a"),
            Some(&PostOutcome::Skipped(SkipReason::BackendFailure))
        );
        assert_eq!(second.outcome_for("a"), Some(&PostOutcome::Replied));
        assert!(seen.contains("a"));
    }

    #[test]
    fn test_filter_recent_keeps_order_and_cap() {
        let posts = vec![post("a", 1), post("b", 20), post("c", 2), post("d", 3)];
        let kept = filter_recent(posts, now() - Duration::minutes(10), 2);
        let ids: Vec<_> = kept.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_scheduler_runs_immediately_and_repeats() {
        let platform = Arc::new(FakePlatform::with_posts(Vec::new()));
        let backend = Arc::new(FakeBackend::answering(success("ok")));
        let handle = scheduler::spawn(
            cycle(&platform, &backend, settings(10)),
            std::time::Duration::from_millis(40),
            SeenPosts::new(10),
            CancellationToken::new(),
        );

        tokio::time::sleep(std::time::Duration::from_millis(150)).await;
        assert!(handle.cycles_completed() >= 2);

        handle.shutdown().await;
        let calls = platform.list_calls.load(Ordering::SeqCst);
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert_eq!(platform.list_calls.load(Ordering::SeqCst), calls);
    }

    #[tokio::test]
    async fn test_scheduler_cancelled_before_start_runs_nothing() {
        let platform = Arc::new(FakePlatform::with_posts(vec![post("a", 1)]));
        let backend = Arc::new(FakeBackend::answering(success("ok")));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let handle = scheduler::spawn(
            cycle(&platform, &backend, settings(10)),
            std::time::Duration::from_secs(60),
            SeenPosts::disabled(),
            cancel,
        );
        handle.shutdown().await;

        assert_eq!(platform.list_calls.load(Ordering::SeqCst), 0);
    }
}
