pub mod api;
pub mod auth;
pub mod metrics;
pub mod rate_limiter;
pub mod retry;


use api::{RedditApiClient, REDDIT_API_BASE};
use askbot_core::{CoreError, Credentials, Platform, Post, RedditApiError};
use async_trait::async_trait;
use auth::PasswordAuthenticator;
use retry::{RetryConfig, RetryExecutor};
use std::time::Duration;
use tracing::{debug, warn};

pub const REDDIT_TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";

#[derive(Debug, Clone)]
pub struct RedditConfig {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
    pub user_agent: String,
    pub api_base: String,
    pub token_url: String,
    pub request_timeout: Duration,
    pub retry: RetryConfig,
}

impl RedditConfig {
    pub fn new(
        client_id: String,
        client_secret: String,
        username: String,
        password: String,
        user_agent: String,
    ) -> Self {
        Self {
            client_id,
            client_secret,
            username,
            password,
            user_agent,
            api_base: REDDIT_API_BASE.to_string(),
            token_url: REDDIT_TOKEN_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            retry: RetryConfig::reddit(),
        }
    }

    pub fn from_credentials(credentials: &Credentials, user_agent: &str) -> Self {
        Self::new(
            credentials.client_id.clone(),
            credentials.client_secret.clone(),
            credentials.username.clone(),
            credentials.password.clone(),
            user_agent.to_string(),
        )
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Points both the API and the token endpoint at `base`. Used against mock servers.
    pub fn with_base_url(mut self, base: &str) -> Self {
        let base = base.trim_end_matches('/');
        self.api_base = base.to_string();
        self.token_url = format!("{}/api/v1/access_token", base);
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

/// Long-lived Reddit session shared across polling cycles.
#[derive(Debug)]
pub struct RedditClient {
    auth: PasswordAuthenticator,
    api: RedditApiClient,
    retry: RetryExecutor,
}

impl RedditClient {
    pub fn new(config: RedditConfig) -> Result<Self, CoreError> {
        let http_client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.request_timeout)
            .build()?;

        let auth = PasswordAuthenticator::new(
            config.client_id,
            config.client_secret,
            config.username,
            config.password,
            &config.token_url,
            http_client.clone(),
        )?;

        Ok(Self {
            auth,
            api: RedditApiClient::new(http_client, config.api_base),
            retry: RetryExecutor::new(config.retry),
        })
    }

    pub fn api(&self) -> &RedditApiClient {
        &self.api
    }

    pub async fn metrics(&self) -> metrics::ApiMetrics {
        self.api.get_metrics().await
    }

    pub async fn is_authenticated(&self) -> bool {
        self.auth
            .cached_token()
            .await
            .is_some_and(|token| !token.is_expired())
    }

    /// Forces the next request to re-authenticate when Reddit says the token is bad.
    async fn forget_token_on_auth_error<T>(&self, result: &Result<T, CoreError>) {
        if let Err(CoreError::RedditApi(RedditApiError::InvalidToken)) = result {
            warn!("Reddit rejected the access token, dropping it");
            self.auth.invalidate().await;
        }
    }
}

#[async_trait]
impl Platform for RedditClient {
    async fn list_newest(&self, community: &str, limit: u32) -> Result<Vec<Post>, CoreError> {
        let operation = format!("list r/{}", community);
        let result = self
            .retry
            .execute(&operation, || async {
                let token = self.auth.access_token().await?;
                self.api.get_new_posts(&token, community, limit).await
            })
            .await;
        self.forget_token_on_auth_error(&result).await;
        debug!("Reddit API usage: {}", self.metrics().await.summary());
        result
    }

    /// Never retried: a retry after an ambiguous failure could post twice.
    async fn reply(&self, post_id: &str, text: &str) -> Result<(), CoreError> {
        let token = self.auth.access_token().await?;
        let result = self.api.submit_comment(&token, post_id, text).await;
        self.forget_token_on_auth_error(&result).await;
        if result.is_ok() {
            debug!("Replied to {}", post_id);
        }
        result
    }
}
